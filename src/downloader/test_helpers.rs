//! Shared fixtures for downloader and API tests.

use crate::config::{Config, RetryConfig};
use crate::error::{Result, SourceError};
use crate::source::{SourceAdapter, SourceRegistry, UnitContent, UnitRef};
use crate::storage::{BookInfo, ContentStore};
use crate::types::{BookId, Event, SearchResult, SourceId, StartDownload, Variables};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Semaphore;

use super::BookDownloader;

/// Scripted fetch behavior for [`ScriptedSource`]
pub(crate) enum FetchBehavior {
    /// Every unit fetch succeeds
    Succeed,
    /// The first N fetch calls fail with a transient error, the rest succeed
    FailFirst(u32),
    /// This unit index fails persistently; everything else succeeds
    FailUnit(u32),
}

/// Deterministic in-memory source adapter
pub(crate) struct ScriptedSource {
    pub(crate) id: SourceId,
    pub(crate) name: String,
    pub(crate) chapters: Vec<UnitRef>,
    pub(crate) search_results: Vec<SearchResult>,
    pub(crate) behavior: FetchBehavior,
    pub(crate) fetch_calls: AtomicU32,
    /// When set, each unit fetch consumes one permit; tests meter progress by
    /// adding permits
    pub(crate) gate: Option<Arc<Semaphore>>,
}

impl ScriptedSource {
    pub(crate) fn new(id: i64, name: &str, chapter_count: u32) -> Self {
        Self {
            id: SourceId(id),
            name: name.to_string(),
            chapters: make_chapters(chapter_count),
            search_results: vec![],
            behavior: FetchBehavior::Succeed,
            fetch_calls: AtomicU32::new(0),
            gate: None,
        }
    }

    pub(crate) fn with_behavior(mut self, behavior: FetchBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub(crate) fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }
}

#[async_trait]
impl SourceAdapter for ScriptedSource {
    fn id(&self) -> SourceId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, _keyword: &str, page: u32) -> Result<Vec<SearchResult>> {
        if page == 1 {
            Ok(self.search_results.clone())
        } else {
            Ok(vec![])
        }
    }

    async fn chapter_list(&self, _book_url: &str, _variables: &Variables) -> Result<Vec<UnitRef>> {
        Ok(self.chapters.clone())
    }

    async fn fetch_unit(&self, unit: &UnitRef) -> Result<UnitContent> {
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        let call = self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            FetchBehavior::Succeed => {}
            FetchBehavior::FailFirst(n) => {
                if call < *n {
                    return Err(SourceError::Request {
                        source_name: self.name.clone(),
                        message: "simulated transient failure".to_string(),
                    }
                    .into());
                }
            }
            FetchBehavior::FailUnit(index) => {
                if unit.index == *index {
                    return Err(SourceError::Gone {
                        source_name: self.name.clone(),
                        message: "simulated permanent removal".to_string(),
                    }
                    .into());
                }
            }
        }

        Ok(UnitContent {
            text: format!("content of {}", unit.name),
        })
    }
}

/// Build a chapter list with sequential indexes
pub(crate) fn make_chapters(count: u32) -> Vec<UnitRef> {
    (0..count)
        .map(|index| UnitRef {
            index,
            name: format!("Chapter {}", index + 1),
            url: format!("https://example.com/chapter/{}", index),
            variables: Variables::new(),
        })
        .collect()
}

/// Content store that records every write in memory
#[derive(Clone, Default)]
pub(crate) struct MemContentStore {
    pub(crate) units: Arc<Mutex<HashMap<(i64, u32), String>>>,
    pub(crate) infos: Arc<Mutex<HashMap<i64, BookInfo>>>,
}

#[async_trait]
impl ContentStore for MemContentStore {
    async fn put_info(&self, book_id: BookId, info: &BookInfo) -> Result<()> {
        self.infos.lock().unwrap().insert(book_id.get(), info.clone());
        Ok(())
    }

    async fn put_unit(&self, book_id: BookId, unit: &UnitRef, content: &UnitContent) -> Result<()> {
        self.units
            .lock()
            .unwrap()
            .insert((book_id.get(), unit.index), content.text.clone());
        Ok(())
    }
}

/// Everything a downloader test needs to hold on to
pub(crate) struct TestContext {
    pub(crate) downloader: BookDownloader,
    pub(crate) store: MemContentStore,
    pub(crate) temp_dir: TempDir,
}

/// Create a downloader backed by a temp database and an in-memory content
/// store, with fast retries and no politeness delay.
pub(crate) async fn create_test_downloader(
    sources: SourceRegistry,
    tweak: impl FnOnce(&mut Config),
) -> TestContext {
    let temp_dir = tempfile::tempdir().unwrap();

    let mut config = Config::default();
    config.persistence.database_path = temp_dir.path().join("bookdl.db");
    config.download.download_dir = temp_dir.path().join("downloads");
    config.download.unit_fetch_delay_ms = 0;
    config.retry = RetryConfig {
        max_attempts: 2,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        backoff_multiplier: 2.0,
        jitter: false,
    };
    tweak(&mut config);

    let store = MemContentStore::default();
    let downloader =
        BookDownloader::with_content_store(config, sources, Arc::new(store.clone()))
            .await
            .unwrap();

    TestContext {
        downloader,
        store,
        temp_dir,
    }
}

/// A registry holding one scripted source
pub(crate) fn single_source_registry(source: ScriptedSource) -> SourceRegistry {
    let mut registry = SourceRegistry::new();
    registry.register(Arc::new(source));
    registry
}

/// A plain start request for the given book and source
pub(crate) fn start_request(book_id: i64, source_id: i64) -> StartDownload {
    StartDownload {
        book_id: BookId(book_id),
        book_url: format!("https://example.com/book/{}", book_id),
        source_id: SourceId(source_id),
        book_name: Some(format!("Book {}", book_id)),
        book_author: Some("Author".to_string()),
        book_cover_url: None,
        variables: Variables::new(),
    }
}

/// Wait for the job's terminal event (complete or failed), with a timeout
pub(crate) async fn wait_for_terminal(
    rx: &mut tokio::sync::broadcast::Receiver<Event>,
) -> Event {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match rx.recv().await.expect("event channel closed") {
                event @ (Event::DownloadComplete { .. } | Event::DownloadFailed { .. }) => {
                    return event;
                }
                _ => {}
            }
        }
    })
    .await
    .expect("no terminal event within timeout")
}
