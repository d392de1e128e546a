//! Per-process job snapshot cache.
//!
//! Every progress mutation an orchestrator makes lands here synchronously,
//! before (and more often than) the durable checkpoint. The cache is owned
//! exclusively by its process: other workers never see it and answer from the
//! job store instead. Entries are discarded on process exit — the store is
//! authoritative.

use crate::types::{BookId, JobStatus};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-local mirror of a job's mutable fields
#[derive(Clone, Debug, PartialEq)]
pub struct JobSnapshot {
    /// Current job status
    pub status: JobStatus,
    /// Total units in the book, 0 until the chapter list is known
    pub total_units: u32,
    /// Units fetched so far
    pub completed_units: u32,
    /// Human-readable progress message
    pub message: Option<String>,
    /// Error message from a terminal failure
    pub last_error: Option<String>,
    /// Unix timestamp of the last mutation
    pub updated_at: i64,
}

impl JobSnapshot {
    fn starting() -> Self {
        Self {
            status: JobStatus::Downloading,
            total_units: 0,
            completed_units: 0,
            message: Some("Starting download".to_string()),
            last_error: None,
            updated_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Map of job id to last-known state for jobs owned by this process
#[derive(Clone, Default)]
pub(crate) struct LocalJobCache {
    entries: Arc<RwLock<HashMap<BookId, JobSnapshot>>>,
}

impl LocalJobCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Seed a fresh entry for a newly claimed job
    pub(crate) async fn begin(&self, book_id: BookId) {
        self.entries
            .write()
            .await
            .insert(book_id, JobSnapshot::starting());
    }

    /// Mutate an entry in place; missing entries are created first.
    ///
    /// The timestamp is refreshed on every call so reconciler reads can
    /// compare freshness against store rows.
    pub(crate) async fn update<F>(&self, book_id: BookId, mutate: F)
    where
        F: FnOnce(&mut JobSnapshot),
    {
        let mut entries = self.entries.write().await;
        let snapshot = entries.entry(book_id).or_insert_with(JobSnapshot::starting);
        mutate(snapshot);
        snapshot.updated_at = chrono::Utc::now().timestamp();
    }

    /// Last-known state of a job owned by this process
    pub(crate) async fn get(&self, book_id: BookId) -> Option<JobSnapshot> {
        self.entries.read().await.get(&book_id).cloned()
    }

    /// Drop an entry once the store is authoritative for the terminal state
    pub(crate) async fn remove(&self, book_id: BookId) {
        self.entries.write().await.remove(&book_id);
    }

    /// Snapshot of every cached entry
    pub(crate) async fn entries(&self) -> Vec<(BookId, JobSnapshot)> {
        self.entries
            .read()
            .await
            .iter()
            .map(|(id, snapshot)| (*id, snapshot.clone()))
            .collect()
    }
}
