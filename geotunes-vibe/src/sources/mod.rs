//! Result sources
//!
//! A `SourceFetcher` executes one `QuerySpec` against an external source.
//! Two families exist:
//!
//! - **search**: keyword search against a music catalog (`SearchCatalog`,
//!   realized by the Spotify Web API)
//! - **content**: folder-keyed content store (`ContentStore`, realized by
//!   Google Drive) where the canonical vibe selects a container
//!
//! Fetchers report "nothing found" as an empty vector and transport or auth
//! trouble as `VibeError::SourceUnavailable`. They never see the "all"
//! sentinel; the planner has already expanded it.

pub mod content_store;
pub mod drive;
pub mod oauth;
pub mod search;
pub mod spotify;

pub use content_store::{ContentItem, ContentStore, ContentStoreFetcher};
pub use drive::{DriveContentStore, DriveCredentials};
pub use search::{CatalogItem, SearchCatalog, SearchFetcher};
pub use spotify::SpotifyCatalog;

use crate::error::VibeResult;
use crate::types::{QuerySpec, ResultRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Executes a single query spec
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Short source name used in logs and failure reports
    fn name(&self) -> &'static str;

    /// Fetch records for one spec
    ///
    /// Returned records carry `spec.variant_label()` and `spec.query`.
    async fn fetch(&self, spec: &QuerySpec) -> VibeResult<Vec<ResultRecord>>;
}

/// Which source family a request targets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Search,
    Content,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Search => "search",
            SourceKind::Content => "content",
        }
    }

    /// Whether the variant changes what a fetch returns
    ///
    /// A content store resolves the container from the canonical key alone.
    pub fn filters_by_variant(&self) -> bool {
        matches!(self, SourceKind::Search)
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
