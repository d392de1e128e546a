//! Shutdown coordination.

use crate::error::Result;
use crate::types::Event;
use std::time::Duration;

use super::BookDownloader;

/// How long shutdown waits for active jobs to checkpoint and deregister
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

impl BookDownloader {
    /// Gracefully shut down the downloader.
    ///
    /// Stops accepting new downloads, cancels every active job owned by this
    /// process, and waits for each to write a final progress checkpoint. Jobs
    /// interrupted here stay `downloading` in the store and become claimable
    /// again once their checkpoint ages past the stale-claim window.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Shutting down downloader");

        self.jobs
            .accepting_new
            .store(false, std::sync::atomic::Ordering::SeqCst);

        let tokens: Vec<_> = {
            let active = self.jobs.active.lock().await;
            active.values().cloned().collect()
        };
        for token in &tokens {
            token.cancel();
        }

        let deadline = tokio::time::Instant::now() + SHUTDOWN_GRACE;
        loop {
            let remaining = self.jobs.active.lock().await.len();
            if remaining == 0 {
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(
                    remaining,
                    "Shutdown grace period elapsed with jobs still active"
                );
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        self.emit_event(Event::Shutdown);
        tracing::info!("Downloader shut down");
        Ok(())
    }
}
