//! Mapping crate errors onto HTTP responses.

use crate::error::{ApiError, Error, ToHttpStatus};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Render a crate error as a structured JSON response with the status code
/// chosen by [`ToHttpStatus`].
pub fn error_response(error: Error) -> Response {
    let status = StatusCode::from_u16(error.status_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body: ApiError = error.into();
    (status, Json(body)).into_response()
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        error_response(self)
    }
}
