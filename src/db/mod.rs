//! Database layer for bookdl
//!
//! Handles SQLite persistence for download jobs — the single source of truth
//! shared by all worker processes. The table survives restarts and is the only
//! cross-process coordination point.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] — Database lifecycle, schema migrations
//! - [`jobs`] — Download job CRUD, atomic claim, checkpoints

use crate::types::BookId;
use sqlx::{FromRow, sqlite::SqlitePool};

mod jobs;
mod migrations;

pub use jobs::{ClaimOutcome, JobCheckpoint};

/// New download job to be upserted into the database
#[derive(Debug, Clone)]
pub struct NewJob {
    /// Book this job downloads (primary key)
    pub book_id: BookId,
    /// Book title for progress views
    pub book_name: Option<String>,
    /// Book author for progress views
    pub book_author: Option<String>,
    /// Cover image URL for progress views
    pub book_cover_url: Option<String>,
    /// Source the book is downloaded from
    pub source_id: i64,
    /// Source-specific URL identifying the book
    pub book_url: String,
    /// Opaque source state, serialized as JSON
    pub variables: Option<String>,
}

/// Download job record from database
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    /// Book this job downloads (primary key)
    pub book_id: BookId,
    /// Book title
    pub book_name: Option<String>,
    /// Book author
    pub book_author: Option<String>,
    /// Cover image URL
    pub book_cover_url: Option<String>,
    /// Source the book is downloaded from
    pub source_id: i64,
    /// Source-specific URL identifying the book
    pub book_url: String,
    /// Opaque source state, serialized as JSON
    pub variables: Option<String>,
    /// Current status code (0=not_started, 1=downloading, 2=completed, 3=failed)
    pub status: i32,
    /// Total units (chapters) in the book, 0 until known
    pub total_units: i64,
    /// Units fetched so far
    pub completed_units: i64,
    /// Whether the job finished successfully (mirrors status=completed)
    pub is_complete: i32,
    /// Error message from the last terminal failure
    pub last_error: Option<String>,
    /// Unix timestamp when the row was created
    pub created_at: i64,
    /// Unix timestamp of the last checkpoint; freshness tiebreaker for readers
    pub updated_at: i64,
}

/// Database handle for bookdl
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
