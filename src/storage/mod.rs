//! Content storage for downloaded books
//!
//! The orchestrator hands fetched chapter text to a [`ContentStore`]; where
//! it ends up is a deployment concern. [`FsContentStore`] writes one
//! directory per book with an `info.json` and numbered chapter files, which
//! is enough for a reader frontend to serve content without re-fetching.

use crate::error::Result;
use crate::source::{UnitContent, UnitRef};
use crate::types::BookId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Book metadata written once per download
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BookInfo {
    /// Book title
    pub name: Option<String>,
    /// Book author
    pub author: Option<String>,
    /// Cover image URL
    pub cover_url: Option<String>,
    /// Total number of chapters
    pub total_chapters: u32,
}

/// Sink for downloaded book content
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Persist book metadata
    async fn put_info(&self, book_id: BookId, info: &BookInfo) -> Result<()>;

    /// Persist the text of one chapter
    async fn put_unit(&self, book_id: BookId, unit: &UnitRef, content: &UnitContent) -> Result<()>;
}

/// Filesystem-backed content store.
///
/// Layout: `<root>/book_<id>/info.json` and
/// `<root>/book_<id>/chapters/<index>.txt` with zero-padded indexes so a
/// directory listing sorts in reading order.
pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    /// Create a store rooted at `root`; the directory is created lazily
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn book_dir(&self, book_id: BookId) -> PathBuf {
        self.root.join(format!("book_{}", book_id))
    }
}

#[async_trait]
impl ContentStore for FsContentStore {
    async fn put_info(&self, book_id: BookId, info: &BookInfo) -> Result<()> {
        let dir = self.book_dir(book_id);
        tokio::fs::create_dir_all(&dir).await?;

        let json = serde_json::to_vec_pretty(info)?;
        tokio::fs::write(dir.join("info.json"), json).await?;
        Ok(())
    }

    async fn put_unit(&self, book_id: BookId, unit: &UnitRef, content: &UnitContent) -> Result<()> {
        let chapters = self.book_dir(book_id).join("chapters");
        tokio::fs::create_dir_all(&chapters).await?;

        let file = chapters.join(format!("{:04}.txt", unit.index));
        tokio::fs::write(file, content.text.as_bytes()).await?;
        Ok(())
    }
}
