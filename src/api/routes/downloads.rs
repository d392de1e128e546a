//! Download management handlers.

use crate::api::AppState;
use crate::error::ApiError;
use crate::types::{BookId, StartDownload, StartOutcome};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// POST /downloads - Start a background book download
///
/// Idempotent: starting a book whose job is already active anywhere reports
/// "already in progress" rather than an error. The download is detached from
/// this connection; progress is observable from any worker process.
#[utoipa::path(
    post,
    path = "/api/v1/downloads",
    tag = "downloads",
    request_body = StartDownload,
    responses(
        (status = 202, description = "Download started"),
        (status = 200, description = "Download already in progress"),
        (status = 400, description = "Invalid book URL"),
        (status = 404, description = "Source not registered"),
        (status = 503, description = "Shutting down")
    )
)]
pub async fn start_download(
    State(state): State<AppState>,
    Json(request): Json<StartDownload>,
) -> Response {
    if url::Url::parse(&request.book_url).is_err() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiError::validation(format!(
                "book_url is not a valid URL: {}",
                request.book_url
            ))),
        )
            .into_response();
    }

    let book_id = request.book_id;
    match state.downloader.start_download(request).await {
        Ok(StartOutcome::Started) => (
            StatusCode::ACCEPTED,
            Json(json!({"status": "started", "book_id": book_id})),
        )
            .into_response(),
        Ok(StartOutcome::AlreadyActive) => (
            StatusCode::OK,
            Json(json!({"status": "already_in_progress", "book_id": book_id})),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /downloads/:book_id - One job's progress
///
/// Served from this process's cache when it owns the job, otherwise from the
/// job store; a book with no job row reports `not_started`.
#[utoipa::path(
    get,
    path = "/api/v1/downloads/{book_id}",
    tag = "downloads",
    params(
        ("book_id" = i64, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Job progress view", body = crate::types::JobView),
        (status = 500, description = "Job store unavailable")
    )
)]
pub async fn download_progress(
    State(state): State<AppState>,
    Path(book_id): Path<i64>,
) -> Response {
    match state.downloader.progress(BookId(book_id)).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(e) => {
            tracing::error!(book_id, error = %e, "Failed to resolve job state");
            e.into_response()
        }
    }
}

/// GET /downloads/active - All jobs currently downloading
///
/// Includes jobs owned by other worker processes, reported at checkpoint
/// granularity.
#[utoipa::path(
    get,
    path = "/api/v1/downloads/active",
    tag = "downloads",
    responses(
        (status = 200, description = "Active job views", body = Vec<crate::types::JobView>),
        (status = 500, description = "Job store unavailable")
    )
)]
pub async fn active_downloads(State(state): State<AppState>) -> Response {
    match state.downloader.active_downloads().await {
        Ok(views) => (StatusCode::OK, Json(views)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to list active downloads");
            e.into_response()
        }
    }
}
