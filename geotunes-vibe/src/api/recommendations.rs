//! Recommendation endpoint
//!
//! POST /recommendations runs the whole pipeline for either a coordinate or a
//! typed vibe label and returns grouped, deduplicated results plus the
//! per-variant failures.

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::recommender::{Recommendation, RecommendationRequest, VibeInput};
use crate::sources::SourceKind;
use crate::types::{CatalogKind, Coordinate};
use crate::AppState;

/// Request body
#[derive(Debug, Default, Deserialize)]
pub struct RecommendationBody {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Manual vibe label, used instead of a coordinate
    pub label: Option<String>,
    #[serde(default)]
    pub variants: Vec<String>,
    pub limit: Option<i64>,
    #[serde(default)]
    pub source: SourceKind,
    #[serde(default)]
    pub intent: CatalogKind,
}

#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    #[serde(flatten)]
    pub recommendation: Recommendation,
    /// No records and at least one failed variant
    pub total_outage: bool,
}

fn input_from_body(body: &RecommendationBody) -> ApiResult<VibeInput> {
    let label = body
        .label
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty());

    match (body.latitude, body.longitude, label) {
        (Some(lat), Some(lon), None) => Ok(VibeInput::Coordinate(Coordinate::new(lat, lon)?)),
        (None, None, Some(label)) => Ok(VibeInput::Label(label.to_string())),
        (None, None, None) => Err(ApiError::BadRequest(
            "either latitude/longitude or label is required".into(),
        )),
        (_, _, Some(_)) => Err(ApiError::BadRequest(
            "give either latitude/longitude or label, not both".into(),
        )),
        _ => Err(ApiError::BadRequest(
            "latitude and longitude must be given together".into(),
        )),
    }
}

/// POST /recommendations
pub async fn recommend(
    State(state): State<AppState>,
    Json(body): Json<RecommendationBody>,
) -> ApiResult<Json<RecommendationResponse>> {
    let input = input_from_body(&body)?;

    let composition = match body.intent {
        CatalogKind::Playlist => state.defaults.playlist.clone(),
        CatalogKind::Track => state.defaults.track.clone(),
    };

    let request = RecommendationRequest {
        input,
        variants: body.variants,
        limit_per_variant: body.limit.unwrap_or(state.defaults.limit_per_variant as i64),
        source: body.source,
        composition,
    };

    match state.recommender.recommend(request).await {
        Ok(recommendation) => {
            let total_outage = recommendation.outcome.is_total_outage();
            if total_outage {
                *state.last_error.write().await = Some(format!(
                    "all variants failed for '{}'",
                    recommendation.description.vibe.key
                ));
            }
            Ok(Json(RecommendationResponse {
                recommendation,
                total_outage,
            }))
        }
        Err(e) => {
            state.record_error(&e).await;
            Err(e.into())
        }
    }
}

pub fn recommendation_routes() -> Router<AppState> {
    Router::new().route("/recommendations", post(recommend))
}
