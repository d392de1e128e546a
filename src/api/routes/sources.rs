//! Source listing handlers.

use crate::api::AppState;
use axum::{Json, extract::State, response::IntoResponse};

/// GET /sources - Registered sources
#[utoipa::path(
    get,
    path = "/api/v1/sources",
    tag = "sources",
    responses(
        (status = 200, description = "All registered sources", body = Vec<crate::source::SourceInfo>)
    )
)]
pub async fn list_sources(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.downloader.sources().infos())
}
