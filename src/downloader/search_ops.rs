//! Search entry points — fan-out, gather, and single-source variants.

use crate::error::{Result, SourceError};
use crate::search::dispatcher;
use crate::search::merger::{self, SearchEvent, SearchSession};
use crate::types::{SearchResult, SourceId};
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use super::BookDownloader;

impl BookDownloader {
    /// Dispatch a search across sources and stream events as they arrive.
    ///
    /// `source_ids: None` fans out to every enabled source. The stream yields
    /// per-source batches and errors in completion order and ends with exactly
    /// one done event. Dropping the stream (client disconnect) cancels every
    /// still-running source call.
    pub fn search_stream(
        &self,
        keyword: impl Into<String>,
        page: u32,
        source_ids: Option<Vec<SourceId>>,
    ) -> impl Stream<Item = SearchEvent> + Send + 'static {
        let keyword = keyword.into();
        let sources = self.sources.select(source_ids.as_deref());
        let ids: Vec<SourceId> = sources.iter().map(|s| s.id()).collect();

        tracing::debug!(
            keyword = %keyword,
            sources = ids.len(),
            "Dispatching search"
        );

        let cancel = CancellationToken::new();
        let session = SearchSession::new(&keyword, &ids);
        let rx = dispatcher::dispatch(
            sources,
            keyword,
            page.max(1),
            &self.config.search,
            cancel.clone(),
        );

        merger::merge(session, rx, cancel.drop_guard())
    }

    /// Search all (or the named) sources and return the combined results.
    ///
    /// Gather-everything variant of [`search_stream`](Self::search_stream):
    /// waits for every source before returning. Failed sources contribute
    /// nothing; they never fail the request.
    pub async fn search(
        &self,
        keyword: &str,
        page: u32,
        source_ids: Option<Vec<SourceId>>,
    ) -> Vec<SearchResult> {
        let mut stream = Box::pin(self.search_stream(keyword, page, source_ids));
        let mut all_results = Vec::new();

        while let Some(event) = stream.next().await {
            match event {
                SearchEvent::Batch { results, .. } => all_results.extend(results),
                SearchEvent::SourceError { .. } => {} // logged by the session
                SearchEvent::Done { .. } => break,
            }
        }

        all_results
    }

    /// Search one specific source, bounded by the per-source timeout.
    ///
    /// Unlike the fan-out variants this surfaces the source's failure to the
    /// caller, since there is nothing else to fall back on.
    pub async fn search_by_source(
        &self,
        source_id: SourceId,
        keyword: &str,
        page: u32,
    ) -> Result<Vec<SearchResult>> {
        let source = self.sources.lookup(source_id)?;
        let timeout = self.config.search.per_source_timeout;

        match tokio::time::timeout(
            timeout,
            dispatcher::search_source(
                source.as_ref(),
                keyword,
                page.max(1),
                self.config.search.max_pages,
            ),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout {
                source_name: source.name().to_string(),
            }
            .into()),
        }
    }
}
