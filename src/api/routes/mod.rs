//! Route handlers, organized by domain.

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::types::SourceId;

mod downloads;
mod search;
mod sources;
mod system;

pub use downloads::*;
pub use search::*;
pub use sources::*;
pub use system::*;

/// Body of the search endpoints
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SearchRequest {
    /// Keyword to search for
    pub keyword: String,

    /// 1-based result page to start from (default: 1)
    #[serde(default = "default_page")]
    pub page: u32,

    /// Restrict the fan-out to these sources; omit for all enabled sources
    #[serde(default)]
    pub source_ids: Option<Vec<SourceId>>,
}

/// Query parameters of the single-source search endpoint
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct BySourceQuery {
    /// Keyword to search for
    pub keyword: String,

    /// 1-based result page (default: 1)
    #[serde(default = "default_page")]
    pub page: u32,
}

fn default_page() -> u32 {
    1
}
