//! Source adapters — the per-provider capability boundary
//!
//! A source is an external content provider (one site, one API). The crate
//! treats each one as an opaque [`SourceAdapter`]: given a keyword it returns
//! search results, given a book URL it returns a chapter list, and given a
//! chapter reference it returns the chapter text. How an adapter obtains any
//! of that (HTTP, scraping rules, a local fixture) is its own business.
//!
//! Adapters form a closed set registered at startup in a [`SourceRegistry`];
//! there is no runtime code loading. New providers implement the trait.

use crate::error::{Result, SourceError};
use crate::types::{SearchResult, SourceId, Variables};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

/// Reference to one downloadable unit (chapter) of a book
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitRef {
    /// Zero-based position within the book
    pub index: u32,
    /// Chapter title
    pub name: String,
    /// Source-specific URL for this chapter
    pub url: String,
    /// Opaque source state carried from the chapter listing
    #[serde(default)]
    pub variables: Variables,
}

/// Fetched content of one unit
#[derive(Clone, Debug, PartialEq)]
pub struct UnitContent {
    /// Chapter text
    pub text: String,
}

/// Capability interface of one book source.
///
/// Implementations must be cheap to share (`Arc`) and safe to call
/// concurrently; the fan-out dispatcher issues one call per source per search
/// and the download orchestrator calls `fetch_unit` in a loop.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable identifier of this source
    fn id(&self) -> SourceId;

    /// Human-readable name of this source
    fn name(&self) -> &str;

    /// Search this source for books matching a keyword.
    ///
    /// `page` is 1-based. An empty result list is a valid answer.
    async fn search(&self, keyword: &str, page: u32) -> Result<Vec<SearchResult>>;

    /// List the chapters of a book previously found at this source
    async fn chapter_list(&self, book_url: &str, variables: &Variables) -> Result<Vec<UnitRef>>;

    /// Fetch the content of one chapter
    async fn fetch_unit(&self, unit: &UnitRef) -> Result<UnitContent>;
}

/// Registered-source summary for API listings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SourceInfo {
    /// Stable identifier
    pub id: SourceId,
    /// Human-readable name
    pub name: String,
    /// Whether this source participates in searches and downloads
    pub enabled: bool,
}

struct SourceEntry {
    adapter: Arc<dyn SourceAdapter>,
    enabled: bool,
}

/// Closed set of source adapters, fixed at startup.
///
/// Registration order is preserved and used as the dispatch order for
/// searches that do not name explicit sources.
#[derive(Default)]
pub struct SourceRegistry {
    entries: Vec<SourceEntry>,
}

impl SourceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an enabled adapter
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        self.entries.push(SourceEntry {
            adapter,
            enabled: true,
        });
    }

    /// Register an adapter that is present but excluded from searches and
    /// downloads until re-registered as enabled
    pub fn register_disabled(&mut self, adapter: Arc<dyn SourceAdapter>) {
        self.entries.push(SourceEntry {
            adapter,
            enabled: false,
        });
    }

    /// Number of registered sources (enabled or not)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an enabled adapter by id.
    ///
    /// Returns `SourceError::NotFound` for unknown ids and
    /// `SourceError::Disabled` for registered-but-disabled sources.
    pub fn lookup(&self, id: SourceId) -> Result<Arc<dyn SourceAdapter>> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.adapter.id() == id)
            .ok_or(SourceError::NotFound { id: id.get() })?;

        if !entry.enabled {
            return Err(SourceError::Disabled { id: id.get() }.into());
        }

        Ok(entry.adapter.clone())
    }

    /// Select the enabled adapters a search should fan out to.
    ///
    /// `None` means all enabled sources in registration order. An explicit id
    /// list preserves the caller's order and silently skips ids that are
    /// unknown or disabled, matching the permissive behavior of the search
    /// endpoints.
    pub fn select(&self, ids: Option<&[SourceId]>) -> Vec<Arc<dyn SourceAdapter>> {
        match ids {
            None => self
                .entries
                .iter()
                .filter(|e| e.enabled)
                .map(|e| e.adapter.clone())
                .collect(),
            Some(ids) => ids
                .iter()
                .filter_map(|id| {
                    self.entries
                        .iter()
                        .find(|e| e.enabled && e.adapter.id() == *id)
                        .map(|e| e.adapter.clone())
                })
                .collect(),
        }
    }

    /// Summaries of every registered source, for API listings
    pub fn infos(&self) -> Vec<SourceInfo> {
        self.entries
            .iter()
            .map(|e| SourceInfo {
                id: e.adapter.id(),
                name: e.adapter.name().to_string(),
                enabled: e.enabled,
            })
            .collect()
    }
}
