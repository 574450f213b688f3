//! Search-backed fetcher
//!
//! Maps catalog search hits onto `ResultRecord`s. The catalog itself is a
//! trait so the fetcher can be driven by the Spotify client in production and
//! by canned catalogs in tests.

use super::SourceFetcher;
use crate::error::VibeResult;
use crate::types::{CatalogKind, QuerySpec, ResultRecord};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// One search hit as returned by a catalog
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogItem {
    /// Catalog identifier (may be empty)
    pub id: String,
    pub name: String,
    /// Owner display name (playlists) or joined artist names (tracks)
    pub subtitle: String,
    /// Canonical link to the item
    pub external_url: String,
    /// Image URLs, largest first
    pub images: Vec<String>,
}

/// Keyword search against a music catalog
///
/// Catalogs may return `None` entries for items they could not render; the
/// fetcher skips those.
#[async_trait]
pub trait SearchCatalog: Send + Sync {
    fn name(&self) -> &'static str;

    async fn search(
        &self,
        query: &str,
        kind: CatalogKind,
        limit: u32,
    ) -> VibeResult<Vec<Option<CatalogItem>>>;
}

/// `SourceFetcher` over a `SearchCatalog`
pub struct SearchFetcher {
    catalog: Arc<dyn SearchCatalog>,
}

impl SearchFetcher {
    pub fn new(catalog: Arc<dyn SearchCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl SourceFetcher for SearchFetcher {
    fn name(&self) -> &'static str {
        self.catalog.name()
    }

    async fn fetch(&self, spec: &QuerySpec) -> VibeResult<Vec<ResultRecord>> {
        let items = self
            .catalog
            .search(&spec.query, spec.kind, spec.limit)
            .await?;

        let total = items.len();
        let records: Vec<ResultRecord> = items
            .into_iter()
            .flatten()
            .take(spec.limit as usize)
            .map(|item| ResultRecord {
                id: item.id,
                title: item.name,
                secondary_text: item.subtitle,
                external_url: item.external_url,
                image_url: item.images.into_iter().next(),
                source_query: spec.query.clone(),
                variant: spec.variant_label().to_string(),
                payload: None,
            })
            .collect();

        debug!(
            source = self.catalog.name(),
            query = %spec.query,
            returned = total,
            kept = records.len(),
            "Catalog search complete"
        );

        Ok(records)
    }
}

// ============================================================================
// Tests
// ============================================================================
