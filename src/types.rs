//! Core types for bookdl

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

/// Opaque per-result key/value bag supplied by a source and passed back to it
/// unchanged on later requests (chapter listing, unit fetches).
pub type Variables = HashMap<String, serde_json::Value>;

/// Unique identifier for a book (and therefore for its download job)
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct BookId(pub i64);

impl BookId {
    /// Create a new BookId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for BookId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<BookId> for i64 {
    fn from(id: BookId) -> Self {
        id.0
    }
}

impl std::fmt::Display for BookId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for BookId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

// Implement sqlx Type, Encode, and Decode for database operations
impl sqlx::Type<sqlx::Sqlite> for BookId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for BookId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for BookId {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(id))
    }
}

/// Unique identifier for a registered book source
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct SourceId(pub i64);

impl SourceId {
    /// Create a new SourceId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for SourceId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Download job status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// No download has been started for this book
    NotStarted,
    /// A download orchestrator currently owns this job
    Downloading,
    /// All units fetched and persisted
    Completed,
    /// Terminal failure, see the job's last error
    Failed,
    /// Status code in the store was not recognized
    Unknown,
}

impl JobStatus {
    /// Convert integer status code to JobStatus
    pub fn from_i32(status: i32) -> Self {
        match status {
            0 => JobStatus::NotStarted,
            1 => JobStatus::Downloading,
            2 => JobStatus::Completed,
            3 => JobStatus::Failed,
            _ => JobStatus::Unknown,
        }
    }

    /// Convert JobStatus to integer status code
    pub fn to_i32(&self) -> i32 {
        match self {
            JobStatus::NotStarted => 0,
            JobStatus::Downloading => 1,
            JobStatus::Completed => 2,
            JobStatus::Failed => 3,
            JobStatus::Unknown => -1,
        }
    }

    /// Whether this status is terminal (the job row is immutable afterwards)
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Derive an integer progress percentage from unit counts.
///
/// Returns 0 when the total is unknown (0), otherwise
/// `round(100 * completed / total)` clamped to 0..=100.
pub fn progress_percent(completed_units: u32, total_units: u32) -> u8 {
    if total_units == 0 {
        return 0;
    }
    let pct = (f64::from(completed_units) * 100.0 / f64::from(total_units)).round() as i64;
    pct.clamp(0, 100) as u8
}

/// One search hit from a single source
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SearchResult {
    /// Book title
    pub name: String,

    /// Book author, if the source reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Source-specific URL identifying the book
    pub book_url: String,

    /// Cover image URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,

    /// Short description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intro: Option<String>,

    /// Genre/category label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Most recent chapter title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_chapter: Option<String>,

    /// Word count as reported by the source (free-form text)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_count: Option<String>,

    /// Source that produced this result
    pub source_id: SourceId,

    /// Display name of that source
    pub source_name: String,

    /// Opaque state the source needs back on follow-up requests
    #[serde(default)]
    pub variables: Variables,
}

/// Client-facing view of a download job, assembled by the state reconciler
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct JobView {
    /// Book identifier
    pub book_id: BookId,

    /// Book title, if known to the job store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_name: Option<String>,

    /// Book author, if known to the job store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_author: Option<String>,

    /// Cover image URL, if known to the job store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_cover_url: Option<String>,

    /// Total number of chapters (0 until the chapter list is known)
    pub total_chapters: u32,

    /// Chapters fetched so far
    pub downloaded_chapters: u32,

    /// Integer progress percentage, 0..=100
    pub progress: u8,

    /// Current job status
    pub status: JobStatus,

    /// Human-readable progress or error message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Request to start (or re-start) a book download
#[derive(Clone, Debug, Deserialize, Serialize, ToSchema)]
pub struct StartDownload {
    /// Book identifier the job will be keyed on
    pub book_id: BookId,

    /// Source-specific URL identifying the book
    pub book_url: String,

    /// Source to download from
    pub source_id: SourceId,

    /// Book title, persisted for progress views
    #[serde(default)]
    pub book_name: Option<String>,

    /// Book author, persisted for progress views
    #[serde(default)]
    pub book_author: Option<String>,

    /// Cover image URL, persisted for progress views
    #[serde(default)]
    pub book_cover_url: Option<String>,

    /// Opaque source state carried over from the search result
    #[serde(default)]
    pub variables: Variables,
}

/// Outcome of a start-download request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartOutcome {
    /// The job was claimed and a background task was spawned
    Started,
    /// Another orchestrator already owns this job (idempotent start)
    AlreadyActive,
}

/// Event emitted during the download lifecycle
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A download job was claimed and its orchestrator task spawned
    DownloadStarted {
        /// Book identifier
        book_id: BookId,
    },

    /// One more unit was fetched and stored
    DownloadProgress {
        /// Book identifier
        book_id: BookId,
        /// Units fetched so far
        completed_units: u32,
        /// Total units in the book
        total_units: u32,
        /// Integer progress percentage
        percent: u8,
    },

    /// All units fetched, job is terminal
    DownloadComplete {
        /// Book identifier
        book_id: BookId,
        /// Units fetched
        completed_units: u32,
        /// Total units in the book
        total_units: u32,
    },

    /// The job hit a persistent error and stopped
    DownloadFailed {
        /// Book identifier
        book_id: BookId,
        /// Human-readable failure reason
        error: String,
    },

    /// The downloader is shutting down
    Shutdown,
}
