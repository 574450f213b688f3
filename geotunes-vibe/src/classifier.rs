//! Spatial vibe classifier
//!
//! Nearest-neighbour lookup over a pre-built model artifact. Distances are
//! great-circle (haversine) central angles computed on radians; the model's
//! decision boundaries are angular, so raw degrees are never compared.
//!
//! # Model artifact
//! ```json
//! {
//!   "k": 1,
//!   "classes": ["beach", "mountain"],
//!   "points": [
//!     {"latitude": 9.97, "longitude": 76.24, "class": 0},
//!     {"latitude": 10.09, "longitude": 77.06, "class": 1}
//!   ]
//! }
//! ```
//! `classes` is the label encoder: a point's `class` indexes into it.

use crate::error::{VibeError, VibeResult};
use crate::types::{Coordinate, VibeLabel};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info};

fn default_k() -> usize {
    1
}

#[derive(Debug, Deserialize)]
struct ModelArtifact {
    #[serde(default = "default_k")]
    k: usize,
    classes: Vec<String>,
    points: Vec<ArtifactPoint>,
}

#[derive(Debug, Deserialize)]
struct ArtifactPoint {
    latitude: f64,
    longitude: f64,
    class: usize,
}

/// Training point, stored in radians
#[derive(Debug, Clone, Copy)]
struct TrainingPoint {
    lat_rad: f64,
    lon_rad: f64,
    class: usize,
}

/// Great-circle central angle between two points given in radians
pub fn haversine(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * a.clamp(0.0, 1.0).sqrt().asin()
}

/// Immutable k-nearest-neighbour model
#[derive(Debug, Clone)]
pub struct KnnModel {
    k: usize,
    classes: Vec<String>,
    points: Vec<TrainingPoint>,
}

impl KnnModel {
    /// Load a model artifact from disk
    pub fn from_path(path: &Path) -> VibeResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            VibeError::ModelUnavailable(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Parse and validate a model artifact
    pub fn from_json(json: &str) -> VibeResult<Self> {
        let artifact: ModelArtifact = serde_json::from_str(json)
            .map_err(|e| VibeError::ModelUnavailable(format!("malformed artifact: {}", e)))?;

        if artifact.classes.is_empty() {
            return Err(VibeError::ModelUnavailable("artifact has no classes".into()));
        }
        if artifact.points.is_empty() {
            return Err(VibeError::ModelUnavailable("artifact has no points".into()));
        }
        if artifact.k == 0 || artifact.k > artifact.points.len() {
            return Err(VibeError::ModelUnavailable(format!(
                "k = {} invalid for {} points",
                artifact.k,
                artifact.points.len()
            )));
        }

        let mut points = Vec::with_capacity(artifact.points.len());
        for (index, p) in artifact.points.iter().enumerate() {
            if p.class >= artifact.classes.len() {
                return Err(VibeError::ModelUnavailable(format!(
                    "point {} has class {} but only {} classes exist",
                    index,
                    p.class,
                    artifact.classes.len()
                )));
            }
            let coord = Coordinate::new(p.latitude, p.longitude).map_err(|e| {
                VibeError::ModelUnavailable(format!("point {}: {}", index, e))
            })?;
            let (lat_rad, lon_rad) = coord.to_radians();
            points.push(TrainingPoint {
                lat_rad,
                lon_rad,
                class: p.class,
            });
        }

        Ok(Self {
            k: artifact.k,
            classes: artifact.classes,
            points,
        })
    }

    /// Build a model from labelled coordinates (classes assigned in first-seen order)
    pub fn from_labeled_points(k: usize, labeled: &[(Coordinate, &str)]) -> VibeResult<Self> {
        if labeled.is_empty() || k == 0 || k > labeled.len() {
            return Err(VibeError::ModelUnavailable(format!(
                "k = {} invalid for {} points",
                k,
                labeled.len()
            )));
        }

        let mut classes: Vec<String> = Vec::new();
        let mut points = Vec::with_capacity(labeled.len());
        for (coord, label) in labeled {
            let class = match classes.iter().position(|c| c == label) {
                Some(idx) => idx,
                None => {
                    classes.push(label.to_string());
                    classes.len() - 1
                }
            };
            let (lat_rad, lon_rad) = coord.to_radians();
            points.push(TrainingPoint {
                lat_rad,
                lon_rad,
                class,
            });
        }

        Ok(Self { k, classes, points })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Number of training points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Label of the nearest point (k = 1) or the majority of the k nearest
    ///
    /// Distance ties resolve to the lowest training index. Vote ties resolve
    /// to the label whose best-ranked neighbour is nearest.
    pub fn predict(&self, coord: &Coordinate) -> VibeLabel {
        let (lat, lon) = coord.to_radians();

        let mut ranked: Vec<(f64, usize)> = self
            .points
            .iter()
            .enumerate()
            .map(|(idx, p)| (haversine(lat, lon, p.lat_rad, p.lon_rad), idx))
            .collect();
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        ranked.truncate(self.k);

        // (class, votes, rank of first neighbour)
        let mut tally: Vec<(usize, usize, usize)> = Vec::new();
        for (rank, (_, idx)) in ranked.iter().enumerate() {
            let class = self.points[*idx].class;
            match tally.iter_mut().find(|(c, _, _)| *c == class) {
                Some(entry) => entry.1 += 1,
                None => tally.push((class, 1, rank)),
            }
        }

        let winner = tally
            .iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.2.cmp(&a.2)))
            .map(|(class, _, _)| *class)
            .unwrap_or(self.points[ranked[0].1].class);

        debug!(
            nearest_distance_rad = ranked[0].0,
            k = self.k,
            label = %self.classes[winner],
            "Nearest-neighbour prediction"
        );

        self.classes[winner].clone()
    }
}

/// Process-wide classifier handle
///
/// Holds the loaded model, or the reason it could not be loaded. Read-only
/// after construction.
#[derive(Debug, Clone)]
pub struct SpatialClassifier {
    model: Option<Arc<KnnModel>>,
    unavailable_reason: String,
}

impl SpatialClassifier {
    pub fn new(model: KnnModel) -> Self {
        Self {
            model: Some(Arc::new(model)),
            unavailable_reason: String::new(),
        }
    }

    /// Classifier with no model; every classification fails
    pub fn unloaded(reason: impl Into<String>) -> Self {
        Self {
            model: None,
            unavailable_reason: reason.into(),
        }
    }

    /// Load the model artifact, degrading to an unloaded classifier on failure
    pub fn load(path: &Path) -> Self {
        match KnnModel::from_path(path) {
            Ok(model) => {
                info!(
                    path = %path.display(),
                    points = model.len(),
                    classes = model.classes().len(),
                    k = model.k(),
                    "Vibe model loaded"
                );
                Self::new(model)
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to load vibe model");
                Self::unloaded(e.to_string())
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn model(&self) -> Option<&KnnModel> {
        self.model.as_deref()
    }

    /// Classify a coordinate into a raw vibe label
    pub fn classify(&self, coord: &Coordinate) -> VibeResult<VibeLabel> {
        let model = self.model.as_ref().ok_or_else(|| {
            if self.unavailable_reason.is_empty() {
                VibeError::ModelUnavailable("no model loaded".into())
            } else {
                VibeError::ModelUnavailable(self.unavailable_reason.clone())
            }
        })?;
        Ok(model.predict(coord))
    }
}

// ============================================================================
// Tests
// ============================================================================
