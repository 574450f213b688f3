//! geotunes-vibe library interface
//!
//! Location-driven music recommendation: classify a coordinate into a place
//! vibe, normalize it, plan one query per language variant, fan the queries
//! out to a result source and merge the answers.

pub mod aggregator;
pub mod api;
pub mod classifier;
pub mod config;
pub mod error;
pub mod geocode;
pub mod normalizer;
pub mod planner;
pub mod recommender;
pub mod sources;
pub mod types;

pub use crate::error::{ApiError, ApiResult, VibeError, VibeResult};

use crate::classifier::SpatialClassifier;
use crate::config::ServiceConfig;
use crate::geocode::NominatimClient;
use crate::normalizer::VibeNormalizer;
use crate::planner::QueryComposition;
use crate::recommender::Recommender;
use crate::sources::{
    ContentStoreFetcher, DriveContentStore, DriveCredentials, SearchFetcher, SourceKind,
    SpotifyCatalog,
};
use anyhow::Context;
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Request defaults applied when a body leaves a field out
#[derive(Debug, Clone)]
pub struct RequestDefaults {
    pub limit_per_variant: u32,
    pub playlist: QueryComposition,
    pub track: QueryComposition,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            limit_per_variant: 5,
            playlist: QueryComposition::playlist(),
            track: QueryComposition::track(),
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub recommender: Arc<Recommender>,
    pub defaults: RequestDefaults,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(recommender: Arc<Recommender>, defaults: RequestDefaults) -> Self {
        Self {
            recommender,
            defaults,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Remember a failure for /health
    pub async fn record_error(&self, err: &VibeError) {
        *self.last_error.write().await = Some(err.to_string());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::vibe_routes())
        .merge(api::recommendation_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Wire every collaborator the config enables
///
/// Sources without credentials are left out; requests for them fail with
/// `SourceNotConfigured`. The geocoder is optional as well.
pub fn build_recommender(
    config: &ServiceConfig,
    classifier: Arc<SpatialClassifier>,
) -> anyhow::Result<Recommender> {
    let tables = Arc::new(config.vibe_tables());
    let mut recommender = Recommender::new(
        classifier,
        VibeNormalizer::new(Arc::clone(&tables)),
        config.query_planner(),
        config.aggregator(),
    );

    match config.spotify_credentials() {
        Some((client_id, client_secret)) => {
            let mut catalog = SpotifyCatalog::new(
                client_id,
                client_secret,
                config.spotify.requests_per_second,
                Duration::from_secs(config.spotify.timeout_secs),
            )
            .context("Failed to build Spotify client")?;
            if let (Some(api_base), Some(token_url)) =
                (config.spotify.api_base.as_ref(), config.spotify.token_url.as_ref())
            {
                catalog = catalog.with_endpoints(api_base.clone(), token_url.clone());
            }
            recommender = recommender.with_fetcher(
                SourceKind::Search,
                Arc::new(SearchFetcher::new(Arc::new(catalog))),
            );
            info!("Search source: Spotify");
        }
        None => warn!("Spotify credentials not configured; search source disabled"),
    }

    match config.drive_credentials() {
        Some(credentials) => {
            if matches!(credentials, DriveCredentials::AccessToken(_)) {
                warn!("Drive uses a fixed access token; it will not be refreshed when it expires");
            }
            let mut store =
                DriveContentStore::new(credentials, Duration::from_secs(config.drive.timeout_secs))
                    .context("Failed to build Drive client")?;
            if let Some(api_base) = config.drive.api_base.as_ref() {
                store = store.with_api_base(api_base.clone());
            }
            if let Some(token_url) = config.drive.token_url.as_ref() {
                store = store.with_token_url(token_url.clone());
            }
            recommender = recommender.with_fetcher(
                SourceKind::Content,
                Arc::new(ContentStoreFetcher::new(Arc::new(store), tables)),
            );
            info!("Content source: Google Drive");
        }
        None => warn!("Drive credentials not configured; content source disabled"),
    }

    if config.geocode.enabled {
        let mut geocoder = NominatimClient::new(
            config.geocode.user_agent.clone(),
            Duration::from_secs(config.geocode.timeout_secs),
        )
        .context("Failed to build geocoder client")?;
        if let Some(url) = config.geocode.url.as_ref() {
            geocoder = geocoder.with_url(url.clone());
        }
        recommender = recommender.with_geocoder(
            Arc::new(geocoder),
            config.geocode.zoom,
            config.geocode.language.clone(),
        );
    }

    Ok(recommender)
}

/// Request defaults from the config
pub fn request_defaults(config: &ServiceConfig) -> RequestDefaults {
    RequestDefaults {
        limit_per_variant: config.aggregation.default_limit_per_variant.max(1),
        playlist: config.planner.playlist.clone(),
        track: config.planner.track.clone(),
    }
}
