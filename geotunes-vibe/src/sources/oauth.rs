//! OAuth2 access-token cache
//!
//! Holds one bearer token and refreshes it shortly before the provider says
//! it expires. Concurrent callers wait on the same refresh.

use crate::error::{VibeError, VibeResult};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// Refresh the token this long before the provider says it expires
pub const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Token endpoint response (RFC 6749 §5.1)
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: u64,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Token endpoint plus the grant form posted to it
pub struct TokenGrant {
    pub token_url: String,
    /// Sent as HTTP basic auth when present
    pub basic_auth: Option<(String, String)>,
    pub form: Vec<(&'static str, String)>,
}

pub struct TokenCache {
    source: &'static str,
    grant: TokenGrant,
    slot: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(source: &'static str, grant: TokenGrant) -> Self {
        Self {
            source,
            grant,
            slot: Mutex::new(None),
        }
    }

    pub fn set_token_url(&mut self, token_url: impl Into<String>) {
        self.grant.token_url = token_url.into();
    }

    /// Cached token, or a fresh one from the token endpoint
    pub async fn access_token(&self, client: &reqwest::Client) -> VibeResult<String> {
        let mut cached = self.slot.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        debug!(source = self.source, "Requesting access token");

        let mut request = client.post(&self.grant.token_url).form(&self.grant.form);
        if let Some((user, password)) = self.grant.basic_auth.as_ref() {
            request = request.basic_auth(user, Some(password));
        }

        let response = request.send().await.map_err(|e| {
            VibeError::source_unavailable(self.source, format!("token request failed: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(VibeError::source_unavailable(
                self.source,
                format!("token request rejected: {}", status),
            ));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            VibeError::source_unavailable(self.source, format!("invalid token response: {}", e))
        })?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_REFRESH_MARGIN);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });

        Ok(token.access_token)
    }

    /// Drop the cached token so the next call refreshes
    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }
}
