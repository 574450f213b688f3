//! Test Helper Utilities
//!
//! Scripted collaborators for exercising the pipeline without network access:
//! fetchers with per-variant delays and failures, a recording geocoder, and a
//! small Kerala classifier.

#![allow(dead_code)]

use async_trait::async_trait;
use geotunes_vibe::classifier::{KnnModel, SpatialClassifier};
use geotunes_vibe::geocode::{Address, ReverseGeocoder};
use geotunes_vibe::sources::{ContentItem, ContentStore, SourceFetcher};
use geotunes_vibe::types::{CatalogKind, Coordinate, QuerySpec, ResultRecord};
use geotunes_vibe::{VibeError, VibeResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Records and specs
// ============================================================================

pub fn record(id: &str, variant: &str) -> ResultRecord {
    ResultRecord {
        id: id.to_string(),
        title: format!("Title {}", id),
        secondary_text: "Owner".to_string(),
        external_url: format!("https://open.spotify.com/playlist/{}", id),
        image_url: None,
        source_query: String::new(),
        variant: variant.to_string(),
        payload: None,
    }
}

pub fn spec(variant: &str) -> QuerySpec {
    QuerySpec {
        canonical_key: "beach".to_string(),
        variant: Some(variant.to_string()),
        limit: 5,
        query: format!("beach {} music", variant),
        kind: CatalogKind::Playlist,
    }
}

// ============================================================================
// Scripted fetcher
// ============================================================================

/// What a scripted variant does when fetched
#[derive(Clone)]
pub enum Script {
    /// Return records with these ids
    Ids(Vec<&'static str>),
    /// Fail with `SourceUnavailable`
    Fail(&'static str),
    /// Panic inside the worker
    Panic,
}

/// Fetcher answering per variant label, optionally after a delay
#[derive(Default)]
pub struct ScriptedFetcher {
    scripts: HashMap<String, (Duration, Script)>,
    calls: AtomicUsize,
    seen: Mutex<Vec<QuerySpec>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, variant: &str, script: Script) -> Self {
        self.scripts
            .insert(variant.to_string(), (Duration::ZERO, script));
        self
    }

    pub fn on_after(mut self, variant: &str, delay: Duration, script: Script) -> Self {
        self.scripts.insert(variant.to_string(), (delay, script));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_specs(&self) -> Vec<QuerySpec> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceFetcher for ScriptedFetcher {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn fetch(&self, spec: &QuerySpec) -> VibeResult<Vec<ResultRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(spec.clone());

        let variant = spec.variant_label();
        let Some((delay, script)) = self.scripts.get(variant).cloned() else {
            return Ok(Vec::new());
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match script {
            Script::Ids(ids) => Ok(ids
                .into_iter()
                .map(|id| {
                    let mut r = record(id, variant);
                    r.source_query = spec.query.clone();
                    r
                })
                .collect()),
            Script::Fail(reason) => Err(VibeError::source_unavailable("scripted", reason)),
            Script::Panic => panic!("scripted worker panic for {}", variant),
        }
    }
}

// ============================================================================
// Content store
// ============================================================================

/// In-memory folder store counting listings and downloads
pub struct CountingStore {
    pub children: Vec<ContentItem>,
    pub list_calls: AtomicUsize,
    pub downloads: AtomicUsize,
}

impl CountingStore {
    pub fn new(count: usize) -> Self {
        Self {
            children: (0..count)
                .map(|i| ContentItem {
                    id: format!("f{}", i),
                    name: format!("track{}.mp3", i),
                    mime_type: Some("audio/mpeg".to_string()),
                })
                .collect(),
            list_calls: AtomicUsize::new(0),
            downloads: AtomicUsize::new(0),
        }
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentStore for CountingStore {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn list_children(&self, _container_id: &str) -> VibeResult<Vec<ContentItem>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.children.clone())
    }

    async fn fetch_child_bytes(&self, item_id: &str) -> VibeResult<Vec<u8>> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(item_id.as_bytes().to_vec())
    }

    fn item_url(&self, item_id: &str) -> String {
        format!("https://store.invalid/{}", item_id)
    }
}

// ============================================================================
// Geocoder
// ============================================================================

/// Geocoder returning a fixed address and counting calls
pub struct FixedGeocoder {
    pub address: Option<Address>,
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl FixedGeocoder {
    pub fn new(city: &str) -> Self {
        Self {
            address: Some(Address {
                full_address: Some(format!("{}, Kerala, India", city)),
                city: Some(city.to_string()),
                state: Some("Kerala".to_string()),
                country: Some("India".to_string()),
                ..Default::default()
            }),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReverseGeocoder for FixedGeocoder {
    async fn reverse(&self, _coord: &Coordinate, _zoom: u8, _language: &str) -> Option<Address> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.address.clone()
    }
}

// ============================================================================
// Classifier
// ============================================================================

pub fn coord(lat: f64, lon: f64) -> Coordinate {
    Coordinate::new(lat, lon).unwrap()
}

/// Varkala cliff
pub fn varkala() -> Coordinate {
    coord(8.7379, 76.7163)
}

/// Munnar tea estates
pub fn munnar() -> Coordinate {
    coord(10.0889, 77.0595)
}

/// Four-point k = 1 model over Kerala
pub fn kerala_classifier() -> Arc<SpatialClassifier> {
    let model = KnnModel::from_labeled_points(
        1,
        &[
            (varkala(), "Beach"),
            (munnar(), "hill_town"),
            (coord(9.9312, 76.2673), "urban"),
            (coord(10.5946, 76.0369), "Temple Town"),
        ],
    )
    .unwrap();
    Arc::new(SpatialClassifier::new(model))
}
