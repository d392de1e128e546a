//! Search handlers.

use super::{BySourceQuery, SearchRequest};
use crate::api::AppState;
use crate::error::ApiError;
use crate::search::frame;
use crate::types::SourceId;
use axum::{
    Json,
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use std::convert::Infallible;

/// POST /search/stream - Fan-out search with chunked event delivery
///
/// Each enabled (or named) source is queried concurrently; its batch or error
/// is written to the response the moment it resolves, framed as one
/// `data: <json>` record per event, ending with `{"done": true}`. Closing the
/// connection cancels all outstanding source calls.
#[utoipa::path(
    post,
    path = "/api/v1/search/stream",
    tag = "search",
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Chunked search event stream", content_type = "text/event-stream"),
        (status = 400, description = "Empty keyword")
    )
)]
pub async fn search_stream(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Response {
    if request.keyword.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiError::validation("keyword must not be empty")),
        )
            .into_response();
    }

    let events =
        state
            .downloader
            .search_stream(request.keyword, request.page, request.source_ids);

    // Each record is produced as one complete string; only the transport may
    // split it across chunk boundaries.
    let body_stream = events.filter_map(|event| async move {
        match frame::encode_event(&event) {
            Ok(record) => Some(Ok::<_, Infallible>(Bytes::from(record))),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode search event");
                None
            }
        }
    });

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(body_stream),
    )
        .into_response()
}

/// POST /search - Fan-out search, combined response
///
/// Waits for every source and returns all batches merged. Failed sources
/// contribute nothing and do not fail the request.
#[utoipa::path(
    post,
    path = "/api/v1/search",
    tag = "search",
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Combined results from all sources", body = Vec<crate::types::SearchResult>),
        (status = 400, description = "Empty keyword")
    )
)]
pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Response {
    if request.keyword.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiError::validation("keyword must not be empty")),
        )
            .into_response();
    }

    let results = state
        .downloader
        .search(&request.keyword, request.page, request.source_ids)
        .await;

    (StatusCode::OK, Json(results)).into_response()
}

/// GET /search/by-source/:id - Search one specific source
#[utoipa::path(
    get,
    path = "/api/v1/search/by-source/{id}",
    tag = "search",
    params(
        ("id" = i64, Path, description = "Source ID"),
        BySourceQuery
    ),
    responses(
        (status = 200, description = "Results from this source", body = Vec<crate::types::SearchResult>),
        (status = 404, description = "Source not registered"),
        (status = 409, description = "Source is disabled"),
        (status = 504, description = "Source timed out")
    )
)]
pub async fn search_by_source(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<BySourceQuery>,
) -> Response {
    if query.keyword.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiError::validation("keyword must not be empty")),
        )
            .into_response();
    }

    match state
        .downloader
        .search_by_source(SourceId(id), &query.keyword, query.page)
        .await
    {
        Ok(results) => (StatusCode::OK, Json(results)).into_response(),
        Err(e) => e.into_response(),
    }
}
