//! Content-store fetcher
//!
//! The canonical vibe key picks a container through the container table. The
//! container's children are listed once per key and cached; each request then
//! downloads the children's bytes one after another. A child that fails to
//! download is skipped, a listing that fails surfaces as `SourceUnavailable`
//! and is retried on the next request.

use super::SourceFetcher;
use crate::error::VibeResult;
use crate::normalizer::VibeTables;
use crate::types::{QuerySpec, ResultRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, warn};

/// One child of a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItem {
    pub id: String,
    pub name: String,
    pub mime_type: Option<String>,
}

/// Folder-keyed content store
#[async_trait]
pub trait ContentStore: Send + Sync {
    fn name(&self) -> &'static str;

    /// List the (non-trashed) children of a container
    async fn list_children(&self, container_id: &str) -> VibeResult<Vec<ContentItem>>;

    /// Download one child's bytes
    async fn fetch_child_bytes(&self, item_id: &str) -> VibeResult<Vec<u8>>;

    /// Shareable link to a child
    fn item_url(&self, item_id: &str) -> String;
}

type Listing = Arc<Vec<ContentItem>>;

/// `SourceFetcher` over a `ContentStore`
pub struct ContentStoreFetcher {
    store: Arc<dyn ContentStore>,
    tables: Arc<VibeTables>,
    listings: RwLock<HashMap<String, Arc<OnceCell<Listing>>>>,
}

impl ContentStoreFetcher {
    pub fn new(store: Arc<dyn ContentStore>, tables: Arc<VibeTables>) -> Self {
        Self {
            store,
            tables,
            listings: RwLock::new(HashMap::new()),
        }
    }

    /// Cached listing for a canonical key
    ///
    /// Concurrent callers for the same key share one in-flight listing call.
    async fn listing(&self, canonical_key: &str, container_id: &str) -> VibeResult<Listing> {
        let cell = {
            let read = self.listings.read().await;
            read.get(canonical_key).cloned()
        };
        let cell = match cell {
            Some(cell) => cell,
            None => {
                let mut write = self.listings.write().await;
                write
                    .entry(canonical_key.to_string())
                    .or_insert_with(|| Arc::new(OnceCell::new()))
                    .clone()
            }
        };

        let listing = cell
            .get_or_try_init(|| async {
                debug!(
                    source = self.store.name(),
                    key = %canonical_key,
                    container = %container_id,
                    "Listing container"
                );
                self.store.list_children(container_id).await.map(Arc::new)
            })
            .await?;

        Ok(listing.clone())
    }
}

#[async_trait]
impl SourceFetcher for ContentStoreFetcher {
    fn name(&self) -> &'static str {
        self.store.name()
    }

    async fn fetch(&self, spec: &QuerySpec) -> VibeResult<Vec<ResultRecord>> {
        let Some(container_id) = self.tables.container_for(&spec.canonical_key) else {
            debug!(key = %spec.canonical_key, "No container mapped for vibe");
            return Ok(Vec::new());
        };

        let listing = self.listing(&spec.canonical_key, container_id).await?;

        let mut records = Vec::new();
        for item in listing.iter().take(spec.limit as usize) {
            match self.store.fetch_child_bytes(&item.id).await {
                Ok(bytes) => records.push(ResultRecord {
                    id: item.id.clone(),
                    title: item.name.clone(),
                    secondary_text: spec.canonical_key.clone(),
                    external_url: self.store.item_url(&item.id),
                    image_url: None,
                    source_query: spec.query.clone(),
                    variant: spec.variant_label().to_string(),
                    payload: Some(Arc::new(bytes)),
                }),
                Err(e) => {
                    warn!(
                        source = self.store.name(),
                        item = %item.id,
                        name = %item.name,
                        error = %e,
                        "Skipping item that failed to download"
                    );
                }
            }
        }

        Ok(records)
    }
}

// ============================================================================
// Tests
// ============================================================================
