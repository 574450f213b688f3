//! Spotify Web API catalog
//!
//! Client-credentials flow: the access token is fetched on first use and
//! reused until shortly before it expires. Search requests are rate limited
//! with governor.

use super::oauth::{TokenCache, TokenGrant};
use super::search::{CatalogItem, SearchCatalog};
use crate::error::{VibeError, VibeResult};
use crate::types::CatalogKind;
use async_trait::async_trait;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{debug, warn};

const SOURCE_NAME: &str = "spotify";
pub const SPOTIFY_API_BASE: &str = "https://api.spotify.com/v1";
pub const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    playlists: Option<Page<PlaylistObject>>,
    tracks: Option<Page<TrackObject>>,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    items: Vec<Option<T>>,
}

#[derive(Debug, Default, Deserialize)]
struct ExternalUrls {
    spotify: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Image {
    url: String,
}

#[derive(Debug, Deserialize)]
struct Owner {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistObject {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    owner: Option<Owner>,
    #[serde(default)]
    external_urls: ExternalUrls,
    images: Option<Vec<Image>>,
}

#[derive(Debug, Deserialize)]
struct ArtistObject {
    name: String,
}

#[derive(Debug, Deserialize)]
struct AlbumObject {
    images: Option<Vec<Image>>,
}

#[derive(Debug, Deserialize)]
struct TrackObject {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    artists: Vec<ArtistObject>,
    #[serde(default)]
    external_urls: ExternalUrls,
    album: Option<AlbumObject>,
}

impl From<PlaylistObject> for CatalogItem {
    fn from(p: PlaylistObject) -> Self {
        CatalogItem {
            id: p.id,
            name: p.name,
            subtitle: p.owner.and_then(|o| o.display_name).unwrap_or_default(),
            external_url: p.external_urls.spotify.unwrap_or_default(),
            images: p
                .images
                .unwrap_or_default()
                .into_iter()
                .map(|i| i.url)
                .collect(),
        }
    }
}

impl From<TrackObject> for CatalogItem {
    fn from(t: TrackObject) -> Self {
        let artists: Vec<String> = t.artists.into_iter().map(|a| a.name).collect();
        CatalogItem {
            id: t.id,
            name: t.name,
            subtitle: artists.join(", "),
            external_url: t.external_urls.spotify.unwrap_or_default(),
            images: t
                .album
                .and_then(|a| a.images)
                .unwrap_or_default()
                .into_iter()
                .map(|i| i.url)
                .collect(),
        }
    }
}

fn items_for_kind(response: SearchResponse, kind: CatalogKind) -> Vec<Option<CatalogItem>> {
    match kind {
        CatalogKind::Playlist => response
            .playlists
            .map(|page| page.items)
            .unwrap_or_default()
            .into_iter()
            .map(|item| item.map(CatalogItem::from))
            .collect(),
        CatalogKind::Track => response
            .tracks
            .map(|page| page.items)
            .unwrap_or_default()
            .into_iter()
            .map(|item| item.map(CatalogItem::from))
            .collect(),
    }
}

// ============================================================================
// Client
// ============================================================================

/// Spotify search catalog
pub struct SpotifyCatalog {
    api_base: String,
    client: reqwest::Client,
    token: TokenCache,
    rate_limiter: governor::RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl SpotifyCatalog {
    /// Create a catalog against the public Spotify endpoints
    pub fn new(
        client_id: String,
        client_secret: String,
        requests_per_second: u32,
        timeout: Duration,
    ) -> VibeResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VibeError::source_unavailable(SOURCE_NAME, e.to_string()))?;

        let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = governor::RateLimiter::direct(governor::Quota::per_second(rps));

        let token = TokenCache::new(
            SOURCE_NAME,
            TokenGrant {
                token_url: SPOTIFY_TOKEN_URL.to_string(),
                basic_auth: Some((client_id, client_secret)),
                form: vec![("grant_type", "client_credentials".to_string())],
            },
        );

        Ok(Self {
            api_base: SPOTIFY_API_BASE.to_string(),
            client,
            token,
            rate_limiter,
        })
    }

    /// Point the client at different endpoints (proxies, test servers)
    pub fn with_endpoints(mut self, api_base: impl Into<String>, token_url: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self.token.set_token_url(token_url);
        self
    }
}

#[async_trait]
impl SearchCatalog for SpotifyCatalog {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn search(
        &self,
        query: &str,
        kind: CatalogKind,
        limit: u32,
    ) -> VibeResult<Vec<Option<CatalogItem>>> {
        let token = self.token.access_token(&self.client).await?;

        self.rate_limiter.until_ready().await;

        let limit = limit.to_string();
        let params = [("q", query), ("type", kind.as_str()), ("limit", limit.as_str())];

        debug!(query = %query, kind = kind.as_str(), "Querying Spotify search");

        let response = self
            .client
            .get(format!("{}/search", self.api_base))
            .bearer_auth(&token)
            .query(&params)
            .send()
            .await
            .map_err(|e| VibeError::source_unavailable(SOURCE_NAME, e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            warn!("Spotify rejected cached token; will refresh on next request");
            self.token.invalidate().await;
            return Err(VibeError::source_unavailable(SOURCE_NAME, "401 Unauthorized"));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VibeError::source_unavailable(
                SOURCE_NAME,
                format!("search returned {}: {}", status, body),
            ));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| VibeError::source_unavailable(SOURCE_NAME, format!("invalid search response: {}", e)))?;

        Ok(items_for_kind(body, kind))
    }
}
