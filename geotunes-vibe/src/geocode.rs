//! Best-effort reverse geocoding
//!
//! Resolves a coordinate to a human-readable address for presentation. Any
//! failure is logged and reported as `None`; the pipeline never depends on it.

use crate::types::Coordinate;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

pub const NOMINATIM_REVERSE_URL: &str = "https://nominatim.openstreetmap.org/reverse";
pub const DEFAULT_ZOOM: u8 = 18;
pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_USER_AGENT: &str =
    concat!("geotunes-vibe/", env!("CARGO_PKG_VERSION"), " (reverse geocoding)");

/// Address fields used for presentation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Address {
    pub full_address: Option<String>,
    pub neighbourhood: Option<String>,
    pub postcode: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

impl Address {
    /// Build from a display name and a component map
    ///
    /// Neighbourhood falls back to suburb then quarter; city falls back to
    /// town, village, then municipality.
    pub fn from_components(full_address: Option<String>, components: &HashMap<String, String>) -> Self {
        let first = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| components.get(*k))
                .map(|v| v.trim())
                .find(|v| !v.is_empty())
                .map(str::to_string)
        };

        Self {
            full_address: full_address.filter(|s| !s.trim().is_empty()),
            neighbourhood: first(&["neighbourhood", "suburb", "quarter"]),
            postcode: first(&["postcode"]),
            city: first(&["city", "town", "village", "municipality"]),
            state: first(&["state"]),
            country: first(&["country"]),
        }
    }
}

/// Coordinate → address lookup
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse(&self, coord: &Coordinate, zoom: u8, language: &str) -> Option<Address>;
}

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    display_name: Option<String>,
    #[serde(default)]
    address: HashMap<String, String>,
    error: Option<String>,
}

/// OpenStreetMap Nominatim client
pub struct NominatimClient {
    url: String,
    user_agent: String,
    client: reqwest::Client,
}

impl NominatimClient {
    pub fn new(user_agent: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            url: NOMINATIM_REVERSE_URL.to_string(),
            user_agent: user_agent.into(),
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    async fn lookup(&self, coord: &Coordinate, zoom: u8, language: &str) -> anyhow::Result<Address> {
        let lat = format!("{:.7}", coord.latitude());
        let lon = format!("{:.7}", coord.longitude());
        let zoom = zoom.to_string();
        let params = [
            ("format", "json"),
            ("lat", lat.as_str()),
            ("lon", lon.as_str()),
            ("addressdetails", "1"),
            ("zoom", zoom.as_str()),
            ("namedetails", "0"),
            ("extratags", "0"),
        ];

        let response = self
            .client
            .get(&self.url)
            .query(&params)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .header(reqwest::header::ACCEPT_LANGUAGE, language)
            .send()
            .await?
            .error_for_status()?;

        let body: NominatimResponse = response.json().await?;
        if let Some(error) = body.error {
            anyhow::bail!("Nominatim error: {}", error);
        }

        Ok(Address::from_components(body.display_name, &body.address))
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimClient {
    async fn reverse(&self, coord: &Coordinate, zoom: u8, language: &str) -> Option<Address> {
        match self.lookup(coord, zoom, language).await {
            Ok(address) => {
                debug!(
                    lat = coord.latitude(),
                    lon = coord.longitude(),
                    city = ?address.city,
                    "Reverse geocode complete"
                );
                Some(address)
            }
            Err(e) => {
                warn!(
                    lat = coord.latitude(),
                    lon = coord.longitude(),
                    error = %e,
                    "Reverse geocode failed"
                );
                None
            }
        }
    }
}
