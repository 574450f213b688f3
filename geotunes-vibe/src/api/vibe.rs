//! Coordinate classification endpoint

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::recommender::VibeDescription;
use crate::types::Coordinate;
use crate::AppState;

/// Query string for GET /vibe
///
/// Kept as text so malformed numbers get the service's own error body.
#[derive(Debug, Deserialize)]
pub struct VibeQuery {
    pub lat: Option<String>,
    pub lon: Option<String>,
}

/// GET /vibe?lat=..&lon=..
pub async fn classify_coordinate(
    State(state): State<AppState>,
    Query(query): Query<VibeQuery>,
) -> ApiResult<Json<VibeDescription>> {
    let (Some(lat), Some(lon)) = (query.lat.as_deref(), query.lon.as_deref()) else {
        return Err(ApiError::BadRequest(
            "both 'lat' and 'lon' query parameters are required".into(),
        ));
    };

    let result = match Coordinate::parse(lat, lon) {
        Ok(coord) => state.recommender.describe(coord).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(description) => Ok(Json(description)),
        Err(e) => {
            state.record_error(&e).await;
            Err(e.into())
        }
    }
}

pub fn vibe_routes() -> Router<AppState> {
    Router::new().route("/vibe", get(classify_coordinate))
}
