//! Service configuration for geotunes-vibe
//!
//! Resolution order for the file: `--config` → `GEOTUNES_CONFIG` →
//! `~/.config/geotunes/geotunes-vibe.toml` → compiled defaults. Credentials
//! resolve ENV → TOML.

use crate::aggregator::{Aggregator, DEFAULT_FETCH_TIMEOUT};
use crate::geocode::{DEFAULT_LANGUAGE, DEFAULT_USER_AGENT, DEFAULT_ZOOM};
use crate::normalizer::VibeTables;
use crate::planner::{QueryComposition, QueryPlanner, DEFAULT_MAX_LIMIT, DEFAULT_VARIANTS};
use crate::sources::DriveCredentials;
use geotunes_common::config::{load_or_default, resolve_config_path, resolve_secret, LoggingConfig};
use geotunes_common::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const MODULE_NAME: &str = "geotunes-vibe";
pub const CONFIG_ENV_VAR: &str = "GEOTUNES_CONFIG";
pub const SPOTIFY_CLIENT_ID_ENV: &str = "GEOTUNES_SPOTIFY_CLIENT_ID";
pub const SPOTIFY_CLIENT_SECRET_ENV: &str = "GEOTUNES_SPOTIFY_CLIENT_SECRET";
pub const DRIVE_ACCESS_TOKEN_ENV: &str = "GEOTUNES_DRIVE_ACCESS_TOKEN";
pub const DRIVE_CLIENT_ID_ENV: &str = "GEOTUNES_DRIVE_CLIENT_ID";
pub const DRIVE_CLIENT_SECRET_ENV: &str = "GEOTUNES_DRIVE_CLIENT_SECRET";
pub const DRIVE_REFRESH_TOKEN_ENV: &str = "GEOTUNES_DRIVE_REFRESH_TOKEN";

pub const DEFAULT_BIND: &str = "127.0.0.1:5740";

/// Top-level TOML document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub logging: LoggingConfig,
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub spotify: SpotifyConfig,
    pub drive: DriveConfig,
    pub geocode: GeocodeConfig,
    pub aggregation: AggregationConfig,
    pub planner: PlannerConfig,
    pub tables: TablesConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model artifact (JSON); no path means the service starts without a model
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotifyConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub requests_per_second: u32,
    pub timeout_secs: u64,
    pub api_base: Option<String>,
    pub token_url: Option<String>,
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            requests_per_second: 5,
            timeout_secs: 15,
            api_base: None,
            token_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// Short-lived; only for setups that rotate it externally
    pub access_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    pub timeout_secs: u64,
    pub api_base: Option<String>,
    pub token_url: Option<String>,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            client_id: None,
            client_secret: None,
            refresh_token: None,
            timeout_secs: 30,
            api_base: None,
            token_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodeConfig {
    pub enabled: bool,
    pub zoom: u8,
    pub language: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub url: Option<String>,
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            zoom: DEFAULT_ZOOM,
            language: DEFAULT_LANGUAGE.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 10,
            url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub fetch_timeout_ms: u64,
    pub max_limit_per_variant: u32,
    pub default_limit_per_variant: u32,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT.as_millis() as u64,
            max_limit_per_variant: DEFAULT_MAX_LIMIT,
            default_limit_per_variant: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Priority order "all" expands to
    pub supported_variants: Vec<String>,
    pub playlist: QueryComposition,
    pub track: QueryComposition,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            supported_variants: DEFAULT_VARIANTS.iter().map(|v| v.to_string()).collect(),
            playlist: QueryComposition::playlist(),
            track: QueryComposition::track(),
        }
    }
}

/// Per-entry overrides merged over the built-in tables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TablesConfig {
    pub aliases: HashMap<String, String>,
    pub display: HashMap<String, String>,
    pub containers: HashMap<String, String>,
}

impl ServiceConfig {
    /// Resolve the config file and load it
    ///
    /// Returns the config and the path it came from (if any).
    pub fn load(cli_path: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let path = resolve_config_path(cli_path, CONFIG_ENV_VAR, MODULE_NAME);
        let config = load_or_default(path.as_deref())?;
        Ok((config, path))
    }

    /// Spotify client id and secret, if both resolve
    pub fn spotify_credentials(&self) -> Option<(String, String)> {
        let id = resolve_secret(
            SPOTIFY_CLIENT_ID_ENV,
            self.spotify.client_id.as_deref(),
            "Spotify client id",
        )?;
        let secret = resolve_secret(
            SPOTIFY_CLIENT_SECRET_ENV,
            self.spotify.client_secret.as_deref(),
            "Spotify client secret",
        )?;
        Some((id, secret))
    }

    /// Drive credentials: a complete refresh-token set wins over a fixed
    /// access token
    pub fn drive_credentials(&self) -> Option<DriveCredentials> {
        let client_id = resolve_secret(
            DRIVE_CLIENT_ID_ENV,
            self.drive.client_id.as_deref(),
            "Drive client id",
        );
        let client_secret = resolve_secret(
            DRIVE_CLIENT_SECRET_ENV,
            self.drive.client_secret.as_deref(),
            "Drive client secret",
        );
        let refresh_token = resolve_secret(
            DRIVE_REFRESH_TOKEN_ENV,
            self.drive.refresh_token.as_deref(),
            "Drive refresh token",
        );
        if let (Some(client_id), Some(client_secret), Some(refresh_token)) =
            (client_id, client_secret, refresh_token)
        {
            return Some(DriveCredentials::RefreshToken {
                client_id,
                client_secret,
                refresh_token,
            });
        }

        resolve_secret(
            DRIVE_ACCESS_TOKEN_ENV,
            self.drive.access_token.as_deref(),
            "Drive access token",
        )
        .map(DriveCredentials::AccessToken)
    }

    /// Built-in tables with `[tables]` overrides applied
    pub fn vibe_tables(&self) -> VibeTables {
        VibeTables::default().with_overrides(
            self.tables.aliases.clone(),
            self.tables.display.clone(),
            self.tables.containers.clone(),
        )
    }

    pub fn query_planner(&self) -> QueryPlanner {
        QueryPlanner::new(
            self.planner.supported_variants.clone(),
            self.aggregation.max_limit_per_variant,
        )
        .with_composition(self.planner.playlist.clone())
    }

    pub fn aggregator(&self) -> Aggregator {
        Aggregator::new(Duration::from_millis(self.aggregation.fetch_timeout_ms.max(1)))
    }
}
