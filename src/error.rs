//! Error types for bookdl
//!
//! This module provides comprehensive error handling for the library, including:
//! - Domain-specific error types (Source, Job, Database)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for bookdl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for bookdl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "download_dir")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Source adapter error
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// Download job error
    #[error("download job error: {0}")]
    Job(#[from] JobError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Shutdown in progress - not accepting new downloads
    #[error("shutdown in progress: not accepting new downloads")]
    ShuttingDown,

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),
}

/// Source adapter errors
///
/// `Timeout` and `Request` are transient (retried by the orchestrator,
/// surfaced as per-source error events in a search); `Parse` and `Gone`
/// are persistent and terminal for the affected operation.
#[derive(Debug, Error)]
pub enum SourceError {
    /// No source registered under this id
    #[error("source {id} not registered")]
    NotFound {
        /// The source id that was requested
        id: i64,
    },

    /// The source exists but is disabled
    #[error("source {id} is disabled")]
    Disabled {
        /// The disabled source id
        id: i64,
    },

    /// The source call exceeded its deadline
    #[error("source '{source_name}' timed out")]
    Timeout {
        /// Display name of the source
        source_name: String,
    },

    /// The source call failed in a way that may succeed on retry
    #[error("source '{source_name}' request failed: {message}")]
    Request {
        /// Display name of the source
        source_name: String,
        /// What went wrong
        message: String,
    },

    /// The source returned data the adapter could not interpret
    #[error("source '{source_name}' returned malformed data: {message}")]
    Parse {
        /// Display name of the source
        source_name: String,
        /// What went wrong
        message: String,
    },

    /// The requested content is permanently unavailable at this source
    #[error("source '{source_name}' no longer has this content: {message}")]
    Gone {
        /// Display name of the source
        source_name: String,
        /// What went wrong
        message: String,
    },
}

/// Download job errors
#[derive(Debug, Error)]
pub enum JobError {
    /// A second start attempt while an orchestrator owns the job
    #[error("download for book {book_id} is already in progress")]
    AlreadyActive {
        /// The book id whose job is already claimed
        book_id: i64,
    },

    /// The source produced an empty chapter list for this book
    #[error("book {book_id} has no chapters at this source")]
    EmptyChapterList {
        /// The affected book id
        book_id: i64,
    },
}

/// API error response format
///
/// Returned by API endpoints when an error occurs: a machine-readable code,
/// a human-readable message, and optional contextual details.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "already_active",
///     "message": "download for book 123 is already in progress",
///     "details": {
///       "book_id": 123
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "validation_error")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create an API error with additional details
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create a "conflict" error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("conflict", message)
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::Config { .. } => 400,

            // 404 Not Found
            Error::NotFound(_) => 404,
            Error::Source(SourceError::NotFound { .. }) => 404,

            // 409 Conflict
            Error::Source(SourceError::Disabled { .. }) => 409,
            Error::Job(JobError::AlreadyActive { .. }) => 409,

            // 410 Gone - content permanently unavailable upstream
            Error::Source(SourceError::Gone { .. }) => 410,

            // 422 Unprocessable Entity - semantic errors
            Error::Job(JobError::EmptyChapterList { .. }) => 422,

            // 500 Internal Server Error
            Error::Database(_) => 500,
            Error::Sqlx(_) => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,

            // 502 Bad Gateway - upstream source failures
            Error::Source(SourceError::Request { .. }) => 502,
            Error::Source(SourceError::Parse { .. }) => 502,
            Error::Network(_) => 502,

            // 503 Service Unavailable
            Error::ShuttingDown => 503,

            // 504 Gateway Timeout - upstream source deadline exceeded
            Error::Source(SourceError::Timeout { .. }) => 504,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Database(_) => "database_error",
            Error::Sqlx(_) => "database_error",
            Error::Source(e) => match e {
                SourceError::NotFound { .. } => "source_not_found",
                SourceError::Disabled { .. } => "source_disabled",
                SourceError::Timeout { .. } => "source_timeout",
                SourceError::Request { .. } => "source_request_failed",
                SourceError::Parse { .. } => "source_parse_failed",
                SourceError::Gone { .. } => "content_gone",
            },
            Error::Job(e) => match e {
                JobError::AlreadyActive { .. } => "already_active",
                JobError::EmptyChapterList { .. } => "empty_chapter_list",
            },
            Error::Io(_) => "io_error",
            Error::NotFound(_) => "not_found",
            Error::ShuttingDown => "shutting_down",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        // Add contextual details for specific error types
        let details = match &error {
            Error::Job(JobError::AlreadyActive { book_id }) => Some(serde_json::json!({
                "book_id": book_id,
            })),
            Error::Job(JobError::EmptyChapterList { book_id }) => Some(serde_json::json!({
                "book_id": book_id,
            })),
            Error::Source(SourceError::NotFound { id }) => Some(serde_json::json!({
                "source_id": id,
            })),
            Error::Source(SourceError::Disabled { id }) => Some(serde_json::json!({
                "source_id": id,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
