//! State reconciler — answers "what is this job's state" from any process.
//!
//! Read path: this process's cache entry wins (it is written synchronously
//! before every checkpoint, so it is never staler than the store for jobs this
//! process owns). Otherwise the store row is used; a missing row synthesizes a
//! `not_started` view. Cross-process staleness is bounded by the checkpoint
//! interval.

use crate::db::JobRow;
use crate::error::Result;
use crate::types::{BookId, JobStatus, JobView, progress_percent};
use std::collections::HashSet;

use super::BookDownloader;
use super::cache::JobSnapshot;

impl BookDownloader {
    /// Resolve the current state of a job.
    ///
    /// Never returns a value staler than this process's cache. A store read
    /// failure degrades to the cached state (for owned jobs) rather than
    /// erroring, since metadata enrichment is best-effort.
    pub async fn progress(&self, book_id: BookId) -> Result<JobView> {
        if let Some(snapshot) = self.cache.get(book_id).await {
            let row = match self.db.get_job(book_id).await {
                Ok(row) => row,
                Err(e) => {
                    tracing::warn!(
                        book_id = %book_id,
                        error = %e,
                        "Job store read failed; serving cached state"
                    );
                    None
                }
            };
            return Ok(view_from_snapshot(book_id, &snapshot, row.as_ref()));
        }

        match self.db.get_job(book_id).await? {
            Some(row) => Ok(view_from_row(&row)),
            None => Ok(not_started_view(book_id)),
        }
    }

    /// All jobs currently downloading, from any process.
    ///
    /// Store rows are overridden by this process's cache entries where
    /// present (freshest); rows claimed by other workers are reported at
    /// checkpoint granularity.
    pub async fn active_downloads(&self) -> Result<Vec<JobView>> {
        let rows = self.db.list_active_jobs().await?;

        let mut views = Vec::new();
        let mut seen = HashSet::new();

        for (book_id, snapshot) in self.cache.entries().await {
            if snapshot.status != JobStatus::Downloading {
                continue;
            }
            let row = rows.iter().find(|row| row.book_id == book_id);
            views.push(view_from_snapshot(book_id, &snapshot, row));
            seen.insert(book_id);
        }

        for row in &rows {
            if !seen.contains(&row.book_id) {
                views.push(view_from_row(row));
            }
        }

        Ok(views)
    }
}

/// View backed purely by a store row (no cache entry in this process)
fn view_from_row(row: &JobRow) -> JobView {
    let status = JobStatus::from_i32(row.status);
    let completed = row.completed_units as u32;
    let total = row.total_units as u32;

    let message = match status {
        // Another worker owns this job; we only know the last checkpoint
        JobStatus::Downloading => Some(format!("Downloading chapter {}", completed + 1)),
        JobStatus::Failed => row.last_error.clone(),
        _ => None,
    };

    JobView {
        book_id: row.book_id,
        book_name: row.book_name.clone(),
        book_author: row.book_author.clone(),
        book_cover_url: row.book_cover_url.clone(),
        total_chapters: total,
        downloaded_chapters: completed,
        progress: progress_percent(completed, total),
        status,
        message,
    }
}

/// View from this process's cache, enriched with store metadata if available
fn view_from_snapshot(book_id: BookId, snapshot: &JobSnapshot, row: Option<&JobRow>) -> JobView {
    JobView {
        book_id,
        book_name: row.and_then(|r| r.book_name.clone()),
        book_author: row.and_then(|r| r.book_author.clone()),
        book_cover_url: row.and_then(|r| r.book_cover_url.clone()),
        total_chapters: snapshot.total_units,
        downloaded_chapters: snapshot.completed_units,
        progress: progress_percent(snapshot.completed_units, snapshot.total_units),
        status: snapshot.status,
        message: snapshot
            .message
            .clone()
            .or_else(|| snapshot.last_error.clone()),
    }
}

fn not_started_view(book_id: BookId) -> JobView {
    JobView {
        book_id,
        book_name: None,
        book_author: None,
        book_cover_url: None,
        total_chapters: 0,
        downloaded_chapters: 0,
        progress: 0,
        status: JobStatus::NotStarted,
        message: None,
    }
}
