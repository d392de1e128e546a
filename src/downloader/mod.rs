//! Core downloader implementation split into focused submodules.
//!
//! The `BookDownloader` struct and its methods are organized by domain:
//! - [`cache`] - Per-process job snapshot cache
//! - [`orchestrator`] - Background download job execution
//! - [`reconciler`] - Read path merging cache and job store
//! - [`search_ops`] - Search fan-out entry points
//! - [`lifecycle`] - Shutdown coordination

pub(crate) mod cache;
mod lifecycle;
mod orchestrator;
mod reconciler;
mod search_ops;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::source::SourceRegistry;
use crate::storage::{ContentStore, FsContentStore};
use crate::types::{BookId, Event};

use cache::LocalJobCache;

/// Active job tracking shared by the orchestrator and shutdown path
#[derive(Clone)]
pub(crate) struct JobsState {
    /// Cancellation tokens of jobs owned by this process
    pub(crate) active: std::sync::Arc<
        tokio::sync::Mutex<
            std::collections::HashMap<BookId, tokio_util::sync::CancellationToken>,
        >,
    >,
    /// Cleared during shutdown so no new jobs are accepted
    pub(crate) accepting_new: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
///
/// One `BookDownloader` per worker process. Download jobs it starts are
/// tracked in its local cache; jobs started by other processes are still
/// observable through the job store (see [`BookDownloader::progress`]).
#[derive(Clone)]
pub struct BookDownloader {
    /// Job store handle (wrapped in Arc for sharing across tasks)
    /// Public for integration tests to query job state
    pub db: std::sync::Arc<Database>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: std::sync::Arc<Config>,
    /// Closed set of source adapters, fixed at startup
    pub(crate) sources: std::sync::Arc<SourceRegistry>,
    /// Sink for downloaded chapter content
    pub(crate) content_store: std::sync::Arc<dyn ContentStore>,
    /// This process's job snapshot cache; never read by other processes
    pub(crate) cache: LocalJobCache,
    /// Active job tracking
    pub(crate) jobs: JobsState,
}

impl BookDownloader {
    /// Create a new BookDownloader with a filesystem content store rooted at
    /// the configured download directory.
    ///
    /// This initializes all core components:
    /// - Creates the download directory
    /// - Opens/creates the SQLite job store and runs migrations
    /// - Sets up the event broadcast channel
    pub async fn new(config: Config, sources: SourceRegistry) -> Result<Self> {
        tokio::fs::create_dir_all(&config.download.download_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create download directory '{}': {}",
                        config.download.download_dir.display(),
                        e
                    ),
                ))
            })?;

        let store = std::sync::Arc::new(FsContentStore::new(
            config.download.download_dir.clone(),
        ));

        Self::with_content_store(config, sources, store).await
    }

    /// Create a new BookDownloader with a custom content store.
    ///
    /// Useful when chapter text should land somewhere other than the local
    /// filesystem (object storage, a database, a test double).
    pub async fn with_content_store(
        config: Config,
        sources: SourceRegistry,
        content_store: std::sync::Arc<dyn ContentStore>,
    ) -> Result<Self> {
        let db = Database::new(&config.persistence.database_path).await?;

        // Broadcast channel for lifecycle events; slow subscribers lag rather
        // than block the orchestrators
        let (event_tx, _rx) = tokio::sync::broadcast::channel(256);

        let jobs = JobsState {
            active: std::sync::Arc::new(tokio::sync::Mutex::new(
                std::collections::HashMap::new(),
            )),
            accepting_new: std::sync::Arc::new(std::sync::atomic::AtomicBool::new(true)),
        };

        Ok(Self {
            db: std::sync::Arc::new(db),
            event_tx,
            config: std::sync::Arc::new(config),
            sources: std::sync::Arc::new(sources),
            content_store,
            cache: LocalJobCache::new(),
            jobs,
        })
    }

    /// Subscribe to download events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events
    /// independently; one that falls more than 256 events behind receives a
    /// `RecvError::Lagged`.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> std::sync::Arc<Config> {
        std::sync::Arc::clone(&self.config)
    }

    /// The registered sources
    pub fn sources(&self) -> &SourceRegistry {
        &self.sources
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers the event is silently dropped; a
    /// download proceeds whether or not anyone is listening.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Spawn the REST API server in a background task
    ///
    /// The server runs concurrently with download processing and listens on
    /// the configured bind address.
    pub fn spawn_api_server(
        self: &std::sync::Arc<Self>,
    ) -> tokio::task::JoinHandle<Result<()>> {
        let downloader = self.clone();
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(downloader, config).await })
    }
}
