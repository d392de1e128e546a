//! Download orchestrator — per-job background task.
//!
//! A job is claimed atomically in the store, then fetched unit by unit. The
//! local cache is updated on every unit; the store sees a checkpoint every
//! `checkpoint_interval` units and at every state transition. A client
//! disconnect never cancels a job — only shutdown does, and a cancelled job
//! checkpoints its progress so a later claim can pick it up.

use crate::db::{ClaimOutcome, JobCheckpoint, NewJob};
use crate::error::{Error, Result};
use crate::retry::fetch_with_retry;
use crate::source::SourceAdapter;
use crate::storage::BookInfo;
use crate::types::{BookId, Event, JobStatus, StartDownload, StartOutcome, progress_percent};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::BookDownloader;

impl BookDownloader {
    /// Start a background download for a book.
    ///
    /// Idempotent: if another orchestrator (in this or any other process)
    /// already owns the job, returns [`StartOutcome::AlreadyActive`] without
    /// spawning a second task.
    pub async fn start_download(&self, request: StartDownload) -> Result<StartOutcome> {
        if !self
            .jobs
            .accepting_new
            .load(std::sync::atomic::Ordering::SeqCst)
        {
            return Err(Error::ShuttingDown);
        }

        let source = self.sources.lookup(request.source_id)?;
        let book_id = request.book_id;

        let variables = if request.variables.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&request.variables)?)
        };

        self.db
            .upsert_job(&NewJob {
                book_id,
                book_name: request.book_name.clone(),
                book_author: request.book_author.clone(),
                book_cover_url: request.book_cover_url.clone(),
                source_id: request.source_id.get(),
                book_url: request.book_url.clone(),
                variables,
            })
            .await?;

        match self
            .db
            .claim_job(book_id, self.config.download.stale_claim_after)
            .await?
        {
            ClaimOutcome::AlreadyActive => {
                tracing::info!(book_id = %book_id, "Download already in progress");
                return Ok(StartOutcome::AlreadyActive);
            }
            ClaimOutcome::Claimed => {}
        }

        // Cache before spawning: a progress query racing the spawn must
        // already see the job as downloading.
        self.cache.begin(book_id).await;

        let cancel = CancellationToken::new();
        self.jobs.active.lock().await.insert(book_id, cancel.clone());

        let downloader = self.clone();
        tokio::spawn(async move {
            downloader.run_download_job(request, source, cancel).await;
        });

        self.emit_event(Event::DownloadStarted { book_id });
        tracing::info!(book_id = %book_id, "Download started");

        Ok(StartOutcome::Started)
    }

    /// Core job task — fetches every unit, checkpointing as it goes.
    async fn run_download_job(
        self,
        request: StartDownload,
        source: Arc<dyn SourceAdapter>,
        cancel: CancellationToken,
    ) {
        let book_id = request.book_id;

        // Phase 1: chapter list
        let chapters = match fetch_with_retry(&self.config.retry, || {
            source.chapter_list(&request.book_url, &request.variables)
        })
        .await
        {
            Ok(chapters) if chapters.is_empty() => {
                self.fail_job(book_id, 0, 0, "source returned an empty chapter list".to_string())
                    .await;
                self.deregister(book_id).await;
                return;
            }
            Ok(chapters) => chapters,
            Err(e) => {
                self.fail_job(
                    book_id,
                    0,
                    0,
                    format!("failed to fetch chapter list: {}", e),
                )
                .await;
                self.deregister(book_id).await;
                return;
            }
        };

        let total = chapters.len() as u32;
        self.cache
            .update(book_id, |snapshot| {
                snapshot.total_units = total;
            })
            .await;

        // Initial checkpoint records the total so other processes can compute
        // a meaningful percentage from the first read onward.
        if let Err(e) = self
            .db
            .checkpoint_job(
                book_id,
                &JobCheckpoint {
                    completed_units: 0,
                    total_units: total,
                    status: JobStatus::Downloading,
                    last_error: None,
                },
            )
            .await
        {
            tracing::warn!(book_id = %book_id, error = %e, "Initial checkpoint failed");
        }

        if let Err(e) = self
            .content_store
            .put_info(
                book_id,
                &BookInfo {
                    name: request.book_name.clone(),
                    author: request.book_author.clone(),
                    cover_url: request.book_cover_url.clone(),
                    total_chapters: total,
                },
            )
            .await
        {
            // Metadata is reproducible from the job store; not worth failing the job
            tracing::warn!(book_id = %book_id, error = %e, "Failed to store book info");
        }

        // Phase 2: fetch units
        let interval = self.config.download.checkpoint_interval.max(1);
        let delay = self.config.unit_fetch_delay();
        let mut completed: u32 = 0;

        for unit in &chapters {
            if cancel.is_cancelled() {
                tracing::info!(
                    book_id = %book_id,
                    completed_units = completed,
                    "Download cancelled; checkpointing progress"
                );
                if let Err(e) = self
                    .db
                    .checkpoint_job(
                        book_id,
                        &JobCheckpoint {
                            completed_units: completed,
                            total_units: total,
                            status: JobStatus::Downloading,
                            last_error: None,
                        },
                    )
                    .await
                {
                    tracing::warn!(book_id = %book_id, error = %e, "Cancellation checkpoint failed");
                }
                self.deregister(book_id).await;
                return;
            }

            match self.fetch_and_store_unit(book_id, &source, unit).await {
                Ok(()) => {
                    completed += 1;
                    let percent = progress_percent(completed, total);
                    self.cache
                        .update(book_id, |snapshot| {
                            snapshot.completed_units = completed;
                            snapshot.message = Some(format!("Downloading: {}", unit.name));
                        })
                        .await;
                    self.emit_event(Event::DownloadProgress {
                        book_id,
                        completed_units: completed,
                        total_units: total,
                        percent,
                    });

                    if completed % interval == 0 {
                        if let Err(e) = self
                            .db
                            .checkpoint_job(
                                book_id,
                                &JobCheckpoint {
                                    completed_units: completed,
                                    total_units: total,
                                    status: JobStatus::Downloading,
                                    last_error: None,
                                },
                            )
                            .await
                        {
                            // Infrastructure hiccup: retried at the next boundary
                            tracing::warn!(
                                book_id = %book_id,
                                error = %e,
                                "Checkpoint failed, will retry at next boundary"
                            );
                        }
                    }
                }
                Err(e) => {
                    self.fail_job(
                        book_id,
                        completed,
                        total,
                        format!("chapter {} ('{}') unavailable: {}", unit.index + 1, unit.name, e),
                    )
                    .await;
                    self.deregister(book_id).await;
                    return;
                }
            }

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        // Phase 3: terminal checkpoint
        self.complete_job(book_id, completed, total).await;
        self.deregister(book_id).await;
    }

    /// Fetch one unit with retries and hand it to the content store
    async fn fetch_and_store_unit(
        &self,
        book_id: BookId,
        source: &Arc<dyn SourceAdapter>,
        unit: &crate::source::UnitRef,
    ) -> Result<()> {
        let content =
            fetch_with_retry(&self.config.retry, || source.fetch_unit(unit)).await?;
        self.content_store.put_unit(book_id, unit, &content).await
    }

    /// Persist a successful completion and clear the cache entry.
    ///
    /// If the terminal write fails, the cache keeps the completed snapshot so
    /// this process still answers correctly; the store row stays
    /// `downloading` until a later claim reconciles it.
    async fn complete_job(&self, book_id: BookId, completed: u32, total: u32) {
        let checkpoint = JobCheckpoint {
            completed_units: completed,
            total_units: total,
            status: JobStatus::Completed,
            last_error: None,
        };

        match self.db.checkpoint_job(book_id, &checkpoint).await {
            Ok(()) => {
                self.cache.remove(book_id).await;
            }
            Err(e) => {
                tracing::warn!(
                    book_id = %book_id,
                    error = %e,
                    "Failed to persist completion; serving terminal state from cache"
                );
                self.cache
                    .update(book_id, |snapshot| {
                        snapshot.status = JobStatus::Completed;
                        snapshot.completed_units = completed;
                        snapshot.total_units = total;
                        snapshot.message =
                            Some(format!("Download completed, {}/{} chapters", completed, total));
                    })
                    .await;
            }
        }

        tracing::info!(
            book_id = %book_id,
            completed_units = completed,
            total_units = total,
            "Download completed"
        );
        self.emit_event(Event::DownloadComplete {
            book_id,
            completed_units: completed,
            total_units: total,
        });
    }

    /// Persist a terminal failure.
    ///
    /// The cache entry stays either way: on a failed terminal write the store
    /// still says `downloading`, and this process must keep answering with
    /// the failure.
    async fn fail_job(&self, book_id: BookId, completed: u32, total: u32, message: String) {
        tracing::error!(book_id = %book_id, error = %message, "Download failed");

        self.cache
            .update(book_id, |snapshot| {
                snapshot.status = JobStatus::Failed;
                snapshot.completed_units = completed;
                snapshot.total_units = total;
                snapshot.last_error = Some(message.clone());
                snapshot.message = Some(message.clone());
            })
            .await;

        let checkpoint = JobCheckpoint {
            completed_units: completed,
            total_units: total,
            status: JobStatus::Failed,
            last_error: Some(message.clone()),
        };

        match self.db.checkpoint_job(book_id, &checkpoint).await {
            Ok(()) => {
                self.cache.remove(book_id).await;
            }
            Err(e) => {
                tracing::warn!(
                    book_id = %book_id,
                    error = %e,
                    "Failed to persist failure; serving terminal state from cache"
                );
            }
        }

        self.emit_event(Event::DownloadFailed {
            book_id,
            error: message,
        });
    }

    async fn deregister(&self, book_id: BookId) {
        self.jobs.active.lock().await.remove(&book_id);
    }
}
