//! geotunes-vibe - location-driven music recommendation service
//!
//! Loads the classifier model and vibe tables once at start-up, wires the
//! configured sources and serves the JSON API.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use geotunes_vibe::classifier::SpatialClassifier;
use geotunes_vibe::config::{ServiceConfig, CONFIG_ENV_VAR};
use geotunes_vibe::normalizer::log_table_warnings;
use geotunes_vibe::{build_recommender, build_router, request_defaults, AppState};

#[derive(Debug, Parser)]
#[command(name = "geotunes-vibe", version, about = "Location-driven music recommendation service")]
struct Args {
    /// Config file (overrides GEOTUNES_CONFIG and the per-user default)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bind address (overrides [server] bind)
    #[arg(long)]
    bind: Option<String>,

    /// Model artifact (overrides [model] path)
    #[arg(long)]
    model: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (mut config, config_path) = ServiceConfig::load(args.config.as_deref())?;

    // RUST_LOG wins over [logging] level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        "Starting geotunes-vibe v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    match &config_path {
        Some(path) if path.exists() => info!("Config: {}", path.display()),
        Some(path) => warn!("Config file {} not found, using defaults", path.display()),
        None => info!("No config file ({} unset), using defaults", CONFIG_ENV_VAR),
    }

    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(model) = args.model {
        config.model.path = Some(model);
    }

    let tables = config.vibe_tables();
    log_table_warnings(&tables.audit());

    let classifier = match config.model.path.as_deref() {
        Some(path) => SpatialClassifier::load(path),
        None => {
            warn!("No model path configured; coordinate classification disabled");
            SpatialClassifier::unloaded("no model path configured")
        }
    };

    let recommender = match build_recommender(&config, Arc::new(classifier)) {
        Ok(recommender) => recommender,
        Err(e) => {
            error!("Failed to initialize pipeline: {:#}", e);
            return Err(e);
        }
    };

    let state = AppState::new(Arc::new(recommender), request_defaults(&config));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!("Listening on http://{}", config.server.bind);
    info!("Health check: http://{}/health", config.server.bind);

    axum::serve(listener, app).await?;

    Ok(())
}
