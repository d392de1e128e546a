//! Fan-out dispatcher — one concurrent, timeout-guarded call per source.

use crate::config::SearchConfig;
use crate::error::Result;
use crate::source::SourceAdapter;
use crate::types::{SearchResult, SourceId};
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Sources reporting fewer results than this on a page are assumed to be on
/// their last page, so later pages are not requested.
const LAST_PAGE_THRESHOLD: usize = 5;

/// One source's contribution to a search session
#[derive(Clone, Debug, PartialEq)]
pub enum SourceOutcome {
    /// The source answered; its batch may be empty
    Batch {
        /// Source that answered
        source_id: SourceId,
        /// Display name of that source
        source_name: String,
        /// Filtered results from all fetched pages
        results: Vec<SearchResult>,
    },

    /// The source errored or timed out; other sources are unaffected
    Failed {
        /// Source that failed
        source_id: SourceId,
        /// Display name of that source
        source_name: String,
        /// What went wrong
        message: String,
    },

    /// Every dispatched source has produced an outcome
    Done,
}

/// Dispatch one search task per source.
///
/// Outcomes arrive on the returned channel in completion order — the point is
/// lowest latency-to-first-result, not determinism. After every source has
/// resolved (success, error, or timeout) a single [`SourceOutcome::Done`] is
/// pushed. Cancelling `cancel` aborts all still-running source calls; no
/// further work is scheduled.
pub(crate) fn dispatch(
    sources: Vec<Arc<dyn SourceAdapter>>,
    keyword: String,
    page: u32,
    config: &SearchConfig,
    cancel: CancellationToken,
) -> mpsc::Receiver<SourceOutcome> {
    let (tx, rx) = mpsc::channel(sources.len().max(1) + 1);
    let limit = Arc::new(Semaphore::new(config.max_concurrent_sources.max(1)));
    let timeout = config.per_source_timeout;
    let max_pages = config.max_pages;

    let mut tasks = JoinSet::new();
    for source in sources {
        let keyword = keyword.clone();
        let tx = tx.clone();
        let limit = limit.clone();
        let cancel = cancel.clone();

        tasks.spawn(async move {
            let _permit = match limit.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };

            let source_id = source.id();
            let source_name = source.name().to_string();

            let outcome = tokio::select! {
                _ = cancel.cancelled() => return,
                result = tokio::time::timeout(
                    timeout,
                    search_source(source.as_ref(), &keyword, page, max_pages),
                ) => match result {
                    Ok(Ok(results)) => SourceOutcome::Batch {
                        source_id,
                        source_name,
                        results,
                    },
                    Ok(Err(e)) => SourceOutcome::Failed {
                        source_id,
                        source_name,
                        message: e.to_string(),
                    },
                    Err(_) => SourceOutcome::Failed {
                        source_id,
                        source_name,
                        message: format!("search timed out after {}s", timeout.as_secs()),
                    },
                },
            };

            tx.send(outcome).await.ok();
        });
    }

    // Coordinator: wait for every source task, then emit the terminal marker.
    tokio::spawn(async move {
        while tasks.join_next().await.is_some() {}
        tx.send(SourceOutcome::Done).await.ok();
    });

    rx
}

/// Search one source across up to `max_pages` result pages.
///
/// Stops early on an empty page or one that looks like the last page. Results
/// not matching the keyword are dropped, see [`matches_keyword`].
pub(crate) async fn search_source(
    source: &dyn SourceAdapter,
    keyword: &str,
    page: u32,
    max_pages: u32,
) -> Result<Vec<SearchResult>> {
    let mut all_results = Vec::new();

    for current_page in page..page.saturating_add(max_pages.max(1)) {
        let results = source.search(keyword, current_page).await?;

        if results.is_empty() {
            break;
        }

        let page_len = results.len();
        all_results.extend(
            results
                .into_iter()
                .filter(|result| matches_keyword(result, keyword)),
        );

        if page_len < LAST_PAGE_THRESHOLD {
            break;
        }
    }

    Ok(all_results)
}

/// Relevance filter for raw source results.
///
/// Keywords of two or more characters must appear in the title or author,
/// case-insensitively. Single-character keywords trust the source: sources
/// often match those against fields we never see.
pub(crate) fn matches_keyword(result: &SearchResult, keyword: &str) -> bool {
    if keyword.chars().count() < 2 {
        return true;
    }

    let keyword_lower = keyword.to_lowercase();
    if result.name.to_lowercase().contains(&keyword_lower) {
        return true;
    }

    result
        .author
        .as_deref()
        .is_some_and(|author| author.to_lowercase().contains(&keyword_lower))
}
