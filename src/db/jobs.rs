//! Download job CRUD, atomic claim, and checkpoint writes.

use crate::error::DatabaseError;
use crate::types::{BookId, JobStatus};
use crate::{Error, Result};
use std::time::Duration;

use super::{Database, JobRow, NewJob};

/// Result of an atomic claim attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This caller now owns the job
    Claimed,
    /// Another orchestrator owns the job and its claim is still fresh
    AlreadyActive,
}

/// A durable progress write for one job
#[derive(Debug, Clone)]
pub struct JobCheckpoint {
    /// Units fetched so far
    pub completed_units: u32,
    /// Total units in the book
    pub total_units: u32,
    /// Job status at this checkpoint
    pub status: JobStatus,
    /// Error message, set on transition to failed
    pub last_error: Option<String>,
}

impl Database {
    /// Insert a job row, or refresh its book metadata if one already exists.
    ///
    /// Progress columns are never touched here; only the claiming
    /// orchestrator writes those.
    pub async fn upsert_job(&self, job: &NewJob) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO download_jobs (
                book_id, book_name, book_author, book_cover_url,
                source_id, book_url, variables,
                status, total_units, completed_units, is_complete,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, 0, 0, 0, 0, ?, ?)
            ON CONFLICT(book_id) DO UPDATE SET
                book_name = excluded.book_name,
                book_author = excluded.book_author,
                book_cover_url = excluded.book_cover_url,
                source_id = excluded.source_id,
                book_url = excluded.book_url,
                variables = excluded.variables
            "#,
        )
        .bind(job.book_id)
        .bind(&job.book_name)
        .bind(&job.book_author)
        .bind(&job.book_cover_url)
        .bind(job.source_id)
        .bind(&job.book_url)
        .bind(&job.variables)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to upsert job: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Get a job by book id
    pub async fn get_job(&self, book_id: BookId) -> Result<Option<JobRow>> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT
                book_id, book_name, book_author, book_cover_url,
                source_id, book_url, variables,
                status, total_units, completed_units, is_complete,
                last_error, created_at, updated_at
            FROM download_jobs
            WHERE book_id = ?
            "#,
        )
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get job: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// Atomically claim a job for this caller.
    ///
    /// The conditional UPDATE succeeds only when the row is not currently
    /// `downloading`, or when its last checkpoint is older than `stale_after`
    /// (the previous owner is presumed dead). SQLite serializes writers, so at
    /// most one of N concurrent callers observes `Claimed`.
    ///
    /// A successful claim resets the progress counters and clears the last
    /// error, so a re-download of a failed or completed book starts clean.
    pub async fn claim_job(&self, book_id: BookId, stale_after: Duration) -> Result<ClaimOutcome> {
        let now = chrono::Utc::now().timestamp();
        let stale_cutoff = now - stale_after.as_secs() as i64;
        let downloading = JobStatus::Downloading.to_i32();

        let result = sqlx::query(
            r#"
            UPDATE download_jobs
            SET status = ?, completed_units = 0, is_complete = 0,
                last_error = NULL, updated_at = ?
            WHERE book_id = ? AND (status != ? OR updated_at < ?)
            "#,
        )
        .bind(downloading)
        .bind(now)
        .bind(book_id)
        .bind(downloading)
        .bind(stale_cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to claim job: {}",
                e
            )))
        })?;

        if result.rows_affected() == 0 {
            Ok(ClaimOutcome::AlreadyActive)
        } else {
            Ok(ClaimOutcome::Claimed)
        }
    }

    /// Write a durable progress checkpoint for a job.
    ///
    /// `updated_at` is refreshed on every checkpoint; readers in other
    /// processes use it as the freshness tiebreaker, and the claim uses it to
    /// detect abandoned jobs.
    pub async fn checkpoint_job(&self, book_id: BookId, checkpoint: &JobCheckpoint) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let is_complete = i32::from(checkpoint.status == JobStatus::Completed);

        sqlx::query(
            r#"
            UPDATE download_jobs
            SET completed_units = ?, total_units = ?, status = ?,
                is_complete = ?, last_error = ?, updated_at = ?
            WHERE book_id = ?
            "#,
        )
        .bind(i64::from(checkpoint.completed_units))
        .bind(i64::from(checkpoint.total_units))
        .bind(checkpoint.status.to_i32())
        .bind(is_complete)
        .bind(&checkpoint.last_error)
        .bind(now)
        .bind(book_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to checkpoint job: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// List all jobs currently marked as downloading
    pub async fn list_active_jobs(&self) -> Result<Vec<JobRow>> {
        let rows = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT
                book_id, book_name, book_author, book_cover_url,
                source_id, book_url, variables,
                status, total_units, completed_units, is_complete,
                last_error, created_at, updated_at
            FROM download_jobs
            WHERE status = ?
            ORDER BY updated_at DESC
            "#,
        )
        .bind(JobStatus::Downloading.to_i32())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list active jobs: {}",
                e
            )))
        })?;

        Ok(rows)
    }
}
