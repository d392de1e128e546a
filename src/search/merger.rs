//! Streaming merger — serializes per-source outcomes into the client-facing
//! event sequence.
//!
//! The merger performs no re-ordering, filtering, or cross-source
//! deduplication; it guarantees exactly one terminal done event and keeps
//! per-session bookkeeping for the closing log line.

use super::dispatcher::SourceOutcome;
use crate::types::{SearchResult, SourceId};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio_util::sync::DropGuard;

/// One event in a search response stream.
///
/// Serialized untagged: the three shapes are distinguished by their fields,
/// matching the wire protocol — a batch object, a per-source error object, or
/// the `{"done": true}` terminal marker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SearchEvent {
    /// One source's result batch
    Batch {
        /// Source that answered
        source_id: SourceId,
        /// Display name of that source
        source_name: String,
        /// The batch; may be empty
        results: Vec<SearchResult>,
    },

    /// One source failed; the stream continues
    SourceError {
        /// Display name of the failed source
        source_name: String,
        /// What went wrong
        error: String,
    },

    /// Terminal marker; no further events follow
    Done {
        /// Always true
        done: bool,
    },
}

impl SearchEvent {
    /// The terminal marker
    pub fn done() -> Self {
        SearchEvent::Done { done: true }
    }
}

/// Per-source outcome as tracked by a session
#[derive(Clone, Debug, PartialEq, Eq)]
enum SessionOutcome {
    Pending,
    Success { result_count: usize },
    Error,
}

/// Request-scoped bookkeeping for one search.
///
/// Tracks the dispatched source set, each source's outcome, and a completion
/// counter; destroyed when the response stream ends or the client disconnects.
pub(crate) struct SearchSession {
    keyword: String,
    outcomes: HashMap<SourceId, SessionOutcome>,
    dispatched: usize,
    completed: usize,
    total_results: usize,
}

impl SearchSession {
    pub(crate) fn new(keyword: &str, dispatched: &[SourceId]) -> Self {
        Self {
            keyword: keyword.to_string(),
            outcomes: dispatched
                .iter()
                .map(|id| (*id, SessionOutcome::Pending))
                .collect(),
            dispatched: dispatched.len(),
            completed: 0,
            total_results: 0,
        }
    }

    /// Record one outcome and translate it into its client-facing event
    fn record(&mut self, outcome: SourceOutcome) -> SearchEvent {
        match outcome {
            SourceOutcome::Batch {
                source_id,
                source_name,
                results,
            } => {
                self.completed += 1;
                self.total_results += results.len();
                self.outcomes.insert(
                    source_id,
                    SessionOutcome::Success {
                        result_count: results.len(),
                    },
                );
                SearchEvent::Batch {
                    source_id,
                    source_name,
                    results,
                }
            }
            SourceOutcome::Failed {
                source_id,
                source_name,
                message,
            } => {
                self.completed += 1;
                self.outcomes.insert(source_id, SessionOutcome::Error);
                tracing::warn!(
                    source = %source_name,
                    error = %message,
                    "Source search failed"
                );
                SearchEvent::SourceError {
                    source_name,
                    error: message,
                }
            }
            SourceOutcome::Done => SearchEvent::done(),
        }
    }

    fn log_summary(&self) {
        let failed = self
            .outcomes
            .values()
            .filter(|o| **o == SessionOutcome::Error)
            .count();
        tracing::debug!(
            keyword = %self.keyword,
            sources = self.dispatched,
            completed = self.completed,
            failed = failed,
            results = self.total_results,
            "Search session finished"
        );
    }
}

struct MergeState {
    session: SearchSession,
    rx: mpsc::Receiver<SourceOutcome>,
    done: bool,
    // Dropping the stream (client disconnect) drops this guard, which cancels
    // every still-running source task of the session.
    _cancel_on_drop: DropGuard,
}

/// Turn the dispatcher's outcome channel into the client event stream.
///
/// Yields events in arrival order and ends after exactly one
/// [`SearchEvent::Done`]. If the channel closes without a done marker the
/// merger synthesizes one, so the "search always terminates" contract holds
/// regardless of dispatcher failure.
pub(crate) fn merge(
    session: SearchSession,
    rx: mpsc::Receiver<SourceOutcome>,
    cancel_on_drop: DropGuard,
) -> impl Stream<Item = SearchEvent> + Send + 'static {
    let state = MergeState {
        session,
        rx,
        done: false,
        _cancel_on_drop: cancel_on_drop,
    };

    futures::stream::unfold(state, |mut state| async move {
        if state.done {
            return None;
        }

        let event = match state.rx.recv().await {
            Some(outcome) => state.session.record(outcome),
            None => SearchEvent::done(),
        };

        if matches!(event, SearchEvent::Done { .. }) {
            state.done = true;
            state.session.log_summary();
        }

        Some((event, state))
    })
}
