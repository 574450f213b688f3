//! Core types for the geo-vibe pipeline
//!
//! Data flow:
//! `Coordinate` → classifier → raw label → normalizer → `CanonicalVibe`
//! → planner → `QuerySpec`s → fetchers → `ResultRecord`s → aggregator
//! → `AggregationOutcome`
//!
//! Everything here lives for one request; nothing is persisted.

use crate::error::{VibeError, VibeResult};
use serde::{Deserialize, Serialize, Serializer};
use std::sync::Arc;

/// Variant sentinel meaning "every supported variant"
///
/// Also used as the group label for specs planned without a variant.
pub const ALL_VARIANTS: &str = "all";

// ============================================================================
// Coordinate
// ============================================================================

/// Validated latitude/longitude pair in degrees
///
/// Fields are private so every instance has passed range validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    /// Create a coordinate, rejecting non-finite or out-of-range values
    pub fn new(latitude: f64, longitude: f64) -> VibeResult<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(VibeError::InvalidInput(format!(
                "latitude {} outside [-90, 90]",
                latitude
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(VibeError::InvalidInput(format!(
                "longitude {} outside [-180, 180]",
                longitude
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Parse manually typed coordinates
    pub fn parse(latitude: &str, longitude: &str) -> VibeResult<Self> {
        let lat = latitude.trim().parse::<f64>().map_err(|_| {
            VibeError::InvalidInput(format!("latitude '{}' is not a number", latitude.trim()))
        })?;
        let lon = longitude.trim().parse::<f64>().map_err(|_| {
            VibeError::InvalidInput(format!("longitude '{}' is not a number", longitude.trim()))
        })?;
        Self::new(lat, lon)
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// (latitude, longitude) in radians
    pub fn to_radians(&self) -> (f64, f64) {
        (self.latitude.to_radians(), self.longitude.to_radians())
    }
}

// ============================================================================
// Vibe labels
// ============================================================================

/// Raw label emitted by the classifier; may not match any alias key
pub type VibeLabel = String;

/// Normalized vibe used for every downstream lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalVibe {
    /// Lower-case, hyphenated identifier (never empty)
    pub key: String,
    /// Human-readable presentation string (never empty)
    pub display: String,
}

// ============================================================================
// Query planning
// ============================================================================

/// Catalog result kind a query targets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogKind {
    /// Playlist-style intent
    #[default]
    Playlist,
    /// Track-style intent
    Track,
}

impl CatalogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogKind::Playlist => "playlist",
            CatalogKind::Track => "track",
        }
    }
}

/// One unit of fan-out work
///
/// Always carries a single concrete variant (or none); the "all" sentinel is
/// expanded by the planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuerySpec {
    /// Canonical vibe key the query was planned for
    pub canonical_key: String,
    /// Language or source filter
    pub variant: Option<String>,
    /// Maximum number of results requested from the source
    pub limit: u32,
    /// Composed search text (key tokens + variant + trailing keyword)
    pub query: String,
    /// Result kind for search-backed sources
    pub kind: CatalogKind,
}

impl QuerySpec {
    /// Variant name used for grouping and failure reports
    pub fn variant_label(&self) -> &str {
        self.variant.as_deref().unwrap_or(ALL_VARIANTS)
    }
}

// ============================================================================
// Results
// ============================================================================

/// One media item returned by a source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    /// Source-assigned identifier; empty when the source had none
    /// (the aggregator synthesizes one)
    pub id: String,
    /// Playlist or track name
    pub title: String,
    /// Owner, artists, or container name depending on the source
    pub secondary_text: String,
    /// Canonical link to the item
    pub external_url: String,
    /// First image, if the source provided any
    pub image_url: Option<String>,
    /// Exact query text that produced this record
    pub source_query: String,
    /// Variant of the `QuerySpec` that produced this record
    pub variant: String,
    /// Downloaded bytes (content-store sources only)
    #[serde(
        rename = "payload_bytes",
        serialize_with = "serialize_payload_len",
        skip_serializing_if = "Option::is_none"
    )]
    pub payload: Option<Arc<Vec<u8>>>,
}

fn serialize_payload_len<S: Serializer>(
    payload: &Option<Arc<Vec<u8>>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match payload {
        Some(bytes) => serializer.serialize_u64(bytes.len() as u64),
        None => serializer.serialize_none(),
    }
}

/// Records retained for one variant, in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VariantGroup {
    pub variant: String,
    pub records: Vec<ResultRecord>,
}

/// Deduplicated, grouped aggregation result
///
/// Invariant: every `id` appears at most once in `records`, and the group it
/// sits in is the variant of its first occurrence in planned order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregatedResult {
    /// Non-empty groups in planned variant order
    pub groups: Vec<VariantGroup>,
    /// Flat deduplicated sequence in first-seen order
    pub records: Vec<ResultRecord>,
}

impl AggregatedResult {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Records retained under `variant`, if any
    pub fn group(&self, variant: &str) -> Option<&[ResultRecord]> {
        self.groups
            .iter()
            .find(|g| g.variant == variant)
            .map(|g| g.records.as_slice())
    }

    /// Flat sequence of ids
    pub fn ids(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.id.as_str()).collect()
    }
}

/// A spec that produced nothing because its fetch failed or timed out
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchFailure {
    pub variant: String,
    pub query: String,
    pub reason: String,
}

/// Aggregation result plus the failures that shaped it
///
/// `failures` measured against `attempted` is what separates "no results"
/// from "total outage"; the result shape is identical in both cases.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregationOutcome {
    pub result: AggregatedResult,
    pub failures: Vec<FetchFailure>,
    /// Number of specs dispatched
    pub attempted: usize,
}

impl AggregationOutcome {
    /// Every dispatched spec failed
    pub fn is_total_outage(&self) -> bool {
        self.attempted > 0 && self.failures.len() == self.attempted
    }

    /// Variants that failed, in planned order
    pub fn failed_variants(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.variant.as_str()).collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_range_validation() {
        assert!(Coordinate::new(9.93, 76.26).is_ok());
        assert!(Coordinate::new(90.0, 180.0).is_ok());
        assert!(Coordinate::new(-90.0, -180.0).is_ok());

        assert!(matches!(
            Coordinate::new(90.5, 0.0),
            Err(VibeError::InvalidInput(_))
        ));
        assert!(matches!(
            Coordinate::new(0.0, -180.01),
            Err(VibeError::InvalidInput(_))
        ));
        assert!(matches!(
            Coordinate::new(f64::NAN, 0.0),
            Err(VibeError::InvalidInput(_))
        ));
        assert!(matches!(
            Coordinate::new(0.0, f64::INFINITY),
            Err(VibeError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_coordinate_parse() {
        let coord = Coordinate::parse(" 8.5241 ", "76.9366").unwrap();
        assert_eq!(coord.latitude(), 8.5241);
        assert_eq!(coord.longitude(), 76.9366);

        assert!(matches!(
            Coordinate::parse("north", "76.9"),
            Err(VibeError::InvalidInput(_))
        ));
        assert!(matches!(
            Coordinate::parse("8.5", ""),
            Err(VibeError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_coordinate_to_radians() {
        let coord = Coordinate::new(90.0, 180.0).unwrap();
        let (lat, lon) = coord.to_radians();
        assert!((lat - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert!((lon - std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn test_variant_label_defaults_to_all() {
        let spec = QuerySpec {
            canonical_key: "beach".into(),
            variant: None,
            limit: 5,
            query: "beach music".into(),
            kind: CatalogKind::Playlist,
        };
        assert_eq!(spec.variant_label(), ALL_VARIANTS);
    }

    #[test]
    fn test_payload_serialized_as_length() {
        let record = ResultRecord {
            id: "f1".into(),
            title: "Waves".into(),
            secondary_text: "beach".into(),
            external_url: "https://example.invalid/f1".into(),
            image_url: None,
            source_query: "beach".into(),
            variant: "all".into(),
            payload: Some(Arc::new(vec![0u8; 42])),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["payload_bytes"], 42);

        let record = ResultRecord {
            payload: None,
            ..record
        };
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("payload_bytes").is_none());
    }

    #[test]
    fn test_total_outage_vs_empty() {
        let empty = AggregationOutcome::default();
        assert!(!empty.is_total_outage());

        let failure = FetchFailure {
            variant: "Hindi".into(),
            query: "beach Hindi music".into(),
            reason: "timed out".into(),
        };
        let outage = AggregationOutcome {
            result: AggregatedResult::default(),
            failures: vec![failure.clone()],
            attempted: 1,
        };
        assert!(outage.is_total_outage());
        assert_eq!(outage.failed_variants(), vec!["Hindi"]);

        // the other variant answered, just with nothing
        let partial = AggregationOutcome {
            attempted: 2,
            ..outage
        };
        assert!(partial.result.is_empty());
        assert!(!partial.is_total_outage());
    }
}
