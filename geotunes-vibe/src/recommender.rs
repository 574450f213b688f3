//! End-to-end pipeline
//!
//! coordinate (or manual label) → classifier → normalizer → planner →
//! aggregator over the chosen source, with reverse geocoding running
//! alongside the fan-out.

use crate::aggregator::Aggregator;
use crate::classifier::SpatialClassifier;
use crate::error::{VibeError, VibeResult};
use crate::geocode::{Address, ReverseGeocoder};
use crate::normalizer::VibeNormalizer;
use crate::planner::{QueryComposition, QueryPlanner};
use crate::sources::{SourceFetcher, SourceKind};
use crate::types::{AggregationOutcome, CanonicalVibe, Coordinate, VibeLabel};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Where the vibe comes from
#[derive(Debug, Clone, PartialEq)]
pub enum VibeInput {
    /// Classify this coordinate
    Coordinate(Coordinate),
    /// Use a typed label directly (no model needed)
    Label(String),
}

/// One recommendation request
#[derive(Debug, Clone)]
pub struct RecommendationRequest {
    pub input: VibeInput,
    pub variants: Vec<String>,
    pub limit_per_variant: i64,
    pub source: SourceKind,
    pub composition: QueryComposition,
}

/// Classification of a coordinate plus its address
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VibeDescription {
    pub raw_label: VibeLabel,
    pub vibe: CanonicalVibe,
    pub coordinate: Option<Coordinate>,
    pub address: Option<Address>,
}

/// Pipeline output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    #[serde(flatten)]
    pub description: VibeDescription,
    pub source: SourceKind,
    pub outcome: AggregationOutcome,
}

/// Reverse geocoder plus the request parameters it is called with
#[derive(Clone)]
struct GeocodeSetup {
    geocoder: Arc<dyn ReverseGeocoder>,
    zoom: u8,
    language: String,
}

/// Pipeline façade
///
/// Holds only read-only collaborators; share it behind an `Arc`.
pub struct Recommender {
    classifier: Arc<SpatialClassifier>,
    normalizer: VibeNormalizer,
    planner: QueryPlanner,
    aggregator: Aggregator,
    geocode: Option<GeocodeSetup>,
    fetchers: HashMap<SourceKind, Arc<dyn SourceFetcher>>,
}

impl Recommender {
    pub fn new(
        classifier: Arc<SpatialClassifier>,
        normalizer: VibeNormalizer,
        planner: QueryPlanner,
        aggregator: Aggregator,
    ) -> Self {
        Self {
            classifier,
            normalizer,
            planner,
            aggregator,
            geocode: None,
            fetchers: HashMap::new(),
        }
    }

    pub fn with_geocoder(
        mut self,
        geocoder: Arc<dyn ReverseGeocoder>,
        zoom: u8,
        language: impl Into<String>,
    ) -> Self {
        self.geocode = Some(GeocodeSetup {
            geocoder,
            zoom,
            language: language.into(),
        });
        self
    }

    /// Register the fetcher serving a source family (replaces any previous one)
    pub fn with_fetcher(mut self, kind: SourceKind, fetcher: Arc<dyn SourceFetcher>) -> Self {
        self.fetchers.insert(kind, fetcher);
        self
    }

    pub fn classifier(&self) -> &SpatialClassifier {
        &self.classifier
    }

    pub fn planner(&self) -> &QueryPlanner {
        &self.planner
    }

    pub fn has_source(&self, kind: SourceKind) -> bool {
        self.fetchers.contains_key(&kind)
    }

    /// Classify a coordinate and resolve its address
    pub async fn describe(&self, coord: Coordinate) -> VibeResult<VibeDescription> {
        let (raw_label, vibe) = self.resolve(&VibeInput::Coordinate(coord))?;
        let address = self.reverse_geocode(Some(coord)).await;
        Ok(VibeDescription {
            raw_label,
            vibe,
            coordinate: Some(coord),
            address,
        })
    }

    /// Run the full pipeline
    ///
    /// Input, model, limit and source problems fail before any fetch starts.
    /// Fetch failures never fail the call; they land in `outcome.failures`.
    pub async fn recommend(&self, request: RecommendationRequest) -> VibeResult<Recommendation> {
        let (raw_label, vibe) = self.resolve(&request.input)?;

        // one unfiltered spec when variants would only repeat the same fetch
        let variants: &[String] = if request.source.filters_by_variant() {
            &request.variants
        } else {
            &[]
        };
        let specs = self.planner.plan_with(
            &vibe,
            variants,
            request.limit_per_variant,
            &request.composition,
        )?;

        let fetcher = self
            .fetchers
            .get(&request.source)
            .cloned()
            .ok_or_else(|| VibeError::SourceNotConfigured(request.source.to_string()))?;

        let coordinate = match request.input {
            VibeInput::Coordinate(coord) => Some(coord),
            VibeInput::Label(_) => None,
        };

        let (outcome, address) = tokio::join!(
            self.aggregator.aggregate(&specs, fetcher),
            self.reverse_geocode(coordinate)
        );

        info!(
            vibe = %vibe.key,
            source = %request.source,
            specs = specs.len(),
            records = outcome.result.len(),
            failures = outcome.failures.len(),
            "Recommendation complete"
        );

        Ok(Recommendation {
            description: VibeDescription {
                raw_label,
                vibe,
                coordinate,
                address,
            },
            source: request.source,
            outcome,
        })
    }

    fn resolve(&self, input: &VibeInput) -> VibeResult<(VibeLabel, CanonicalVibe)> {
        let raw_label = match input {
            VibeInput::Coordinate(coord) => self.classifier.classify(coord)?,
            VibeInput::Label(label) => {
                let label = label.trim();
                if label.is_empty() {
                    return Err(VibeError::InvalidInput("vibe label is empty".into()));
                }
                label.to_string()
            }
        };
        let vibe = self.normalizer.normalize(&raw_label);
        debug!(raw = %raw_label, key = %vibe.key, display = %vibe.display, "Resolved vibe");
        Ok((raw_label, vibe))
    }

    async fn reverse_geocode(&self, coordinate: Option<Coordinate>) -> Option<Address> {
        let setup = self.geocode.as_ref()?;
        let coord = coordinate?;
        setup
            .geocoder
            .reverse(&coord, setup.zoom, &setup.language)
            .await
    }
}

impl std::fmt::Debug for Recommender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recommender")
            .field("model_loaded", &self.classifier.is_loaded())
            .field("planner", &self.planner)
            .field("aggregator", &self.aggregator)
            .field("geocoder", &self.geocode.is_some())
            .field("sources", &self.fetchers.keys().collect::<Vec<_>>())
            .finish()
    }
}

