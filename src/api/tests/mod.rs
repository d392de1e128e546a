use super::*;
use crate::downloader::test_helpers::*;
use crate::search::FrameDecoder;
use crate::search::merger::SearchEvent;
use crate::source::SourceRegistry;
use crate::types::{SearchResult, SourceId, Variables};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Build a router over a test downloader with the given sources
async fn test_app(sources: SourceRegistry) -> (Router, TestContext) {
    let ctx = create_test_downloader(sources, |_| {}).await;
    let downloader = Arc::new(ctx.downloader.clone());
    let config = downloader.get_config();
    let app = create_router(downloader, config);
    (app, ctx)
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn searchable_source(id: i64, name: &str, results: Vec<SearchResult>) -> ScriptedSource {
    let mut source = ScriptedSource::new(id, name, 3);
    source.search_results = results;
    source
}

fn hit(name: &str, source_id: i64, source_name: &str) -> SearchResult {
    SearchResult {
        name: name.to_string(),
        author: None,
        book_url: format!("https://example.com/{}", name.replace(' ', "-")),
        cover_url: None,
        intro: None,
        kind: None,
        last_chapter: None,
        word_count: None,
        source_id: SourceId(source_id),
        source_name: source_name.to_string(),
        variables: Variables::new(),
    }
}

#[tokio::test]
async fn health_returns_ok() {
    let (app, _ctx) = test_app(SourceRegistry::new()).await;

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn sources_endpoint_lists_registered_sources() {
    let registry =
        single_source_registry(searchable_source(1, "alpha", vec![hit("rust book", 1, "alpha")]));
    let (app, _ctx) = test_app(registry).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/sources")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body[0]["id"], 1);
    assert_eq!(body[0]["name"], "alpha");
    assert_eq!(body[0]["enabled"], true);
}

#[tokio::test]
async fn search_stream_endpoint_frames_events() {
    let registry =
        single_source_registry(searchable_source(1, "alpha", vec![hit("rust book", 1, "alpha")]));
    let (app, _ctx) = test_app(registry).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/search/stream",
            json!({"keyword": "rust"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    assert!(content_type.contains("text/event-stream"));

    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let mut decoder = FrameDecoder::new();
    let events = decoder.push(&bytes);

    assert_eq!(events.len(), 2, "one batch plus the terminal marker");
    assert!(matches!(events[0], SearchEvent::Batch { .. }));
    assert_eq!(events[1], SearchEvent::done());
}

#[tokio::test]
async fn search_stream_rejects_empty_keyword() {
    let (app, _ctx) = test_app(SourceRegistry::new()).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/search/stream",
            json!({"keyword": "   "}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "validation_error");
}

#[tokio::test]
async fn combined_search_returns_merged_results() {
    let mut registry = SourceRegistry::new();
    registry.register(Arc::new(searchable_source(
        1,
        "alpha",
        vec![hit("rust book", 1, "alpha")],
    )));
    registry.register(Arc::new(searchable_source(
        2,
        "beta",
        vec![hit("rust at work", 2, "beta"), hit("more rust", 2, "beta")],
    )));
    let (app, _ctx) = test_app(registry).await;

    let response = app
        .oneshot(json_request("POST", "/search", json!({"keyword": "rust"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn by_source_search_maps_unknown_source_to_404() {
    let (app, _ctx) = test_app(SourceRegistry::new()).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/search/by-source/42?keyword=rust")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "source_not_found");
}

#[tokio::test]
async fn download_flow_start_then_observe_completion() {
    let registry = single_source_registry(ScriptedSource::new(1, "alpha", 5));
    let (app, _ctx) = test_app(registry).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/downloads",
            json!({
                "book_id": 100,
                "book_url": "https://example.com/book/100",
                "source_id": 1,
                "book_name": "Book 100"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await;
    assert_eq!(body["status"], "started");

    // Poll the progress endpoint until the job is terminal
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/downloads/100")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let view = body_json(response).await;

        if view["status"] == "completed" {
            assert_eq!(view["downloaded_chapters"], 5);
            assert_eq!(view["total_chapters"], 5);
            assert_eq!(view["progress"], 100);
            assert_eq!(view["book_name"], "Book 100");
            break;
        }

        assert!(
            tokio::time::Instant::now() < deadline,
            "download never completed; last view: {view}"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn second_start_reports_already_in_progress() {
    // Gate keeps the first job running while the second request lands
    let gate = Arc::new(tokio::sync::Semaphore::new(0));
    let registry =
        single_source_registry(ScriptedSource::new(1, "alpha", 5).with_gate(gate.clone()));
    let (app, _ctx) = test_app(registry).await;

    let body = json!({
        "book_id": 100,
        "book_url": "https://example.com/book/100",
        "source_id": 1
    });

    let first = app
        .clone()
        .oneshot(json_request("POST", "/downloads", body.clone()))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::ACCEPTED);

    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = app
        .clone()
        .oneshot(json_request("POST", "/downloads", body))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    let response = body_json(second).await;
    assert_eq!(response["status"], "already_in_progress");

    gate.add_permits(64);
}

#[tokio::test]
async fn start_download_rejects_invalid_url() {
    let registry = single_source_registry(ScriptedSource::new(1, "alpha", 5));
    let (app, _ctx) = test_app(registry).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/downloads",
            json!({
                "book_id": 100,
                "book_url": "not a url",
                "source_id": 1
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "validation_error");
}

#[tokio::test]
async fn progress_for_unknown_book_is_not_started() {
    let (app, _ctx) = test_app(SourceRegistry::new()).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/downloads/31337")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "not_started");
    assert_eq!(body["progress"], 0);
}

#[tokio::test]
async fn active_downloads_endpoint_returns_collection() {
    let (app, _ctx) = test_app(SourceRegistry::new()).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/downloads/active")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_api_server_spawns() {
    let ctx = create_test_downloader(SourceRegistry::new(), |config| {
        // Port 0 = OS assigns a free port
        config.server.api.bind_address = "127.0.0.1:0".parse().unwrap();
    })
    .await;
    let downloader = Arc::new(ctx.downloader.clone());
    let config = downloader.get_config();

    let api_handle = tokio::spawn({
        let downloader = downloader.clone();
        let config = config.clone();
        async move { start_api_server(downloader, config).await }
    });

    // Give it a moment to start, then stop it
    tokio::time::sleep(Duration::from_millis(100)).await;
    api_handle.abort();
}
