//! Configuration types for bookdl

use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// Search fan-out configuration
///
/// Groups settings for how a search request is dispatched across sources.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SearchConfig {
    /// Deadline for one source's whole search call (default: 15 seconds)
    ///
    /// A source that exceeds this yields an error event for that source only;
    /// the overall session is bounded by the largest per-source timeout since
    /// sources run concurrently.
    #[serde(default = "default_per_source_timeout", with = "duration_serde")]
    pub per_source_timeout: Duration,

    /// Result pages to fetch per source before stopping (default: 3)
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Maximum source calls in flight at once (default: 8)
    #[serde(default = "default_max_concurrent_sources")]
    pub max_concurrent_sources: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            per_source_timeout: default_per_source_timeout(),
            max_pages: default_max_pages(),
            max_concurrent_sources: default_max_concurrent_sources(),
        }
    }
}

/// Download behavior configuration
///
/// Groups settings for the per-job orchestrator and its checkpointing cadence.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DownloadConfig {
    /// Root directory for stored book content (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Persist a progress checkpoint every N fetched units (default: 10)
    ///
    /// This is also the cross-process staleness window: a reader in another
    /// worker can lag the owning orchestrator by at most one interval.
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: u32,

    /// Pause between unit fetches in milliseconds (default: 100)
    ///
    /// Keeps the crate from hammering a source; set to 0 to disable.
    #[serde(default = "default_unit_fetch_delay_ms")]
    pub unit_fetch_delay_ms: u64,

    /// Age after which a `downloading` row is considered abandoned and may be
    /// re-claimed (default: 600 seconds)
    ///
    /// Without this, a worker that died mid-download would block the job
    /// forever, since the claim only yields to non-downloading rows.
    #[serde(default = "default_stale_claim_after", with = "duration_serde")]
    pub stale_claim_after: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            checkpoint_interval: default_checkpoint_interval(),
            unit_fetch_delay_ms: default_unit_fetch_delay_ms(),
            stale_claim_after: default_stale_claim_after(),
        }
    }
}

/// Retry behavior for transient unit-fetch failures
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PersistenceConfig {
    /// Job store database path (default: "./bookdl.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// API and external server integration configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ServerIntegrationConfig {
    /// REST API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:7670)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

/// Main configuration for [`BookDownloader`](crate::BookDownloader)
///
/// Fields are organized into logical sub-configs:
/// - [`search`](SearchConfig) — fan-out timeouts and concurrency
/// - [`download`](DownloadConfig) — content directory, checkpoint cadence
/// - [`retry`](RetryConfig) — transient-failure backoff
/// - [`persistence`](PersistenceConfig) — job store location
/// - [`server`](ServerIntegrationConfig) — REST API settings
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Search fan-out settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Download orchestrator settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Retry behavior for transient failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Data storage and state management
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// API and external server integration
    #[serde(default)]
    pub server: ServerIntegrationConfig,
}

// Convenience accessors — allow call sites to avoid digging through sub-configs.
impl Config {
    /// Root directory for stored book content
    pub fn download_dir(&self) -> &PathBuf {
        &self.download.download_dir
    }

    /// Pause between unit fetches
    pub fn unit_fetch_delay(&self) -> Duration {
        Duration::from_millis(self.download.unit_fetch_delay_ms)
    }
}

fn default_per_source_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_max_pages() -> u32 {
    3
}

fn default_max_concurrent_sources() -> usize {
    8
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_checkpoint_interval() -> u32 {
    10
}

fn default_unit_fetch_delay_ms() -> u64 {
    100
}

fn default_stale_claim_after() -> Duration {
    Duration::from_secs(600)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./bookdl.db")
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 7670))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (integer seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
