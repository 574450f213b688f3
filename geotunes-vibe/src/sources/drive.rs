//! Google Drive content store
//!
//! Lists folder children through files.list and downloads each file with
//! files.get?alt=media, reading the body chunk by chunk. Authenticates with
//! either a fixed access token or an OAuth refresh token that is exchanged
//! for short-lived access tokens as they expire.

use super::content_store::{ContentItem, ContentStore};
use super::oauth::{TokenCache, TokenGrant};
use crate::error::{VibeError, VibeResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const SOURCE_NAME: &str = "drive";
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// How the store obtains its bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriveCredentials {
    /// Used as-is; expires after about an hour unless rotated externally
    AccessToken(String),
    /// Exchanged at the token endpoint whenever the cached token runs out
    RefreshToken {
        client_id: String,
        client_secret: String,
        refresh_token: String,
    },
}

enum Auth {
    Fixed(String),
    Refreshing(TokenCache),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: String,
    mime_type: Option<String>,
}

/// Query selecting the live children of a folder
fn children_query(container_id: &str) -> String {
    format!("'{}' in parents and trashed = false", container_id.replace('\'', "\\'"))
}

/// Drive v3 client
pub struct DriveContentStore {
    auth: Auth,
    api_base: String,
    client: reqwest::Client,
}

impl DriveContentStore {
    pub fn new(credentials: DriveCredentials, timeout: Duration) -> VibeResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VibeError::source_unavailable(SOURCE_NAME, e.to_string()))?;

        let auth = match credentials {
            DriveCredentials::AccessToken(token) => Auth::Fixed(token),
            DriveCredentials::RefreshToken {
                client_id,
                client_secret,
                refresh_token,
            } => Auth::Refreshing(TokenCache::new(
                SOURCE_NAME,
                TokenGrant {
                    token_url: GOOGLE_TOKEN_URL.to_string(),
                    basic_auth: None,
                    form: vec![
                        ("grant_type", "refresh_token".to_string()),
                        ("client_id", client_id),
                        ("client_secret", client_secret),
                        ("refresh_token", refresh_token),
                    ],
                },
            )),
        };

        Ok(Self {
            auth,
            api_base: DRIVE_API_BASE.to_string(),
            client,
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Token endpoint for refresh-token credentials; ignored for a fixed token
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        if let Auth::Refreshing(cache) = &mut self.auth {
            cache.set_token_url(token_url);
        }
        self
    }

    async fn bearer(&self) -> VibeResult<String> {
        match &self.auth {
            Auth::Fixed(token) => Ok(token.clone()),
            Auth::Refreshing(cache) => cache.access_token(&self.client).await,
        }
    }

    async fn get(&self, url: &str, params: &[(&str, &str)]) -> VibeResult<reqwest::Response> {
        let token = self.bearer().await?;
        let response = self
            .client
            .get(url)
            .bearer_auth(&token)
            .query(params)
            .send()
            .await
            .map_err(|e| VibeError::source_unavailable(SOURCE_NAME, e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            match &self.auth {
                Auth::Refreshing(cache) => {
                    warn!("Drive rejected cached token; will refresh on next request");
                    cache.invalidate().await;
                }
                Auth::Fixed(_) => warn!("Drive rejected the configured access token"),
            }
            return Err(VibeError::source_unavailable(SOURCE_NAME, "401 Unauthorized"));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VibeError::source_unavailable(
                SOURCE_NAME,
                format!("{} returned {}: {}", url, status, body),
            ));
        }
        Ok(response)
    }
}

#[async_trait]
impl ContentStore for DriveContentStore {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn list_children(&self, container_id: &str) -> VibeResult<Vec<ContentItem>> {
        let url = format!("{}/files", self.api_base);
        let q = children_query(container_id);
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params = vec![
                ("q", q.as_str()),
                ("fields", "nextPageToken, files(id, name, mimeType)"),
                ("pageSize", "1000"),
            ];
            if let Some(token) = page_token.as_deref() {
                params.push(("pageToken", token));
            }

            let list: FileList = self
                .get(&url, &params)
                .await?
                .json()
                .await
                .map_err(|e| VibeError::source_unavailable(SOURCE_NAME, format!("invalid file list: {}", e)))?;

            items.extend(list.files.into_iter().map(|f| ContentItem {
                id: f.id,
                name: f.name,
                mime_type: f.mime_type,
            }));

            match list.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!(container = %container_id, children = items.len(), "Listed Drive folder");
        Ok(items)
    }

    async fn fetch_child_bytes(&self, item_id: &str) -> VibeResult<Vec<u8>> {
        let url = format!("{}/files/{}", self.api_base, item_id);
        let mut response = self.get(&url, &[("alt", "media")]).await?;

        let mut bytes = Vec::with_capacity(response.content_length().unwrap_or(0) as usize);
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| VibeError::source_unavailable(SOURCE_NAME, format!("download interrupted: {}", e)))?
        {
            bytes.extend_from_slice(&chunk);
        }

        debug!(item = %item_id, bytes = bytes.len(), "Downloaded Drive file");
        Ok(bytes)
    }

    fn item_url(&self, item_id: &str) -> String {
        format!("https://drive.google.com/file/d/{}/view", item_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Local stand-in for Google: `/token` issues `tok-N` with the given
    /// lifetime, `/files` accepts only the newest token
    async fn local_google(expires_in: u64) -> (String, Arc<AtomicUsize>) {
        let issued = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/token",
                post(move |State(issued): State<Arc<AtomicUsize>>| async move {
                    let n = issued.fetch_add(1, Ordering::SeqCst) + 1;
                    Json(serde_json::json!({
                        "access_token": format!("tok-{}", n),
                        "expires_in": expires_in,
                        "token_type": "Bearer"
                    }))
                }),
            )
            .route(
                "/files",
                get(|State(issued): State<Arc<AtomicUsize>>, headers: HeaderMap| async move {
                    let expected = format!("Bearer tok-{}", issued.load(Ordering::SeqCst));
                    let sent = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default();
                    if sent != expected {
                        return Err(StatusCode::UNAUTHORIZED);
                    }
                    Ok(Json(serde_json::json!({
                        "files": [{"id": "f1", "name": "waves.mp3", "mimeType": "audio/mpeg"}]
                    })))
                }),
            )
            .with_state(issued.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), issued)
    }

    fn refreshing_store(base: &str) -> DriveContentStore {
        DriveContentStore::new(
            DriveCredentials::RefreshToken {
                client_id: "client".into(),
                client_secret: "secret".into(),
                refresh_token: "1//refresh".into(),
            },
            Duration::from_secs(2),
        )
        .unwrap()
        .with_api_base(base)
        .with_token_url(format!("{}/token", base))
    }

    #[test]
    fn test_children_query() {
        assert_eq!(
            children_query("1EbnPGTeVtCaKVT6VmWSCc3MDH_esd06a"),
            "'1EbnPGTeVtCaKVT6VmWSCc3MDH_esd06a' in parents and trashed = false"
        );
        assert_eq!(children_query("a'b"), "'a\\'b' in parents and trashed = false");
    }

    #[test]
    fn test_file_list_parsing() {
        let list: FileList = serde_json::from_str(
            r#"{"files":[{"id":"f1","name":"waves.mp3","mimeType":"audio/mpeg"},{"id":"f2"}],"nextPageToken":"abc"}"#,
        )
        .unwrap();
        assert_eq!(list.files.len(), 2);
        assert_eq!(list.files[0].mime_type.as_deref(), Some("audio/mpeg"));
        assert_eq!(list.files[1].name, "");
        assert_eq!(list.next_page_token.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_unreachable_api_is_source_unavailable() {
        let store = DriveContentStore::new(
            DriveCredentials::AccessToken("token".into()),
            Duration::from_millis(500),
        )
        .unwrap()
        .with_api_base("http://127.0.0.1:9");
        let err = store.list_children("folder").await.unwrap_err();
        assert!(matches!(err, VibeError::SourceUnavailable { .. }));
        assert_eq!(store.item_url("f1"), "https://drive.google.com/file/d/f1/view");
    }

    #[tokio::test]
    async fn test_refresh_token_exchanged_once_while_valid() {
        let (base, issued) = local_google(3600).await;
        let store = refreshing_store(&base);

        assert_eq!(store.list_children("folder").await.unwrap().len(), 1);
        assert_eq!(store.list_children("folder").await.unwrap().len(), 1);
        assert_eq!(issued.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expiring_token_is_refreshed() {
        // lifetime inside the refresh margin, so every call needs a new token
        let (base, issued) = local_google(30).await;
        let store = refreshing_store(&base);

        assert_eq!(store.list_children("folder").await.unwrap().len(), 1);
        assert_eq!(store.list_children("folder").await.unwrap().len(), 1);
        assert_eq!(issued.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stale_fixed_token_is_source_unavailable() {
        let (base, _issued) = local_google(3600).await;
        let store = DriveContentStore::new(
            DriveCredentials::AccessToken("tok-expired".into()),
            Duration::from_secs(2),
        )
        .unwrap()
        .with_api_base(&base);

        let err = store.list_children("folder").await.unwrap_err();
        assert!(matches!(err, VibeError::SourceUnavailable { ref reason, .. } if reason.contains("401")));
    }
}
