use chrono::{Duration, Utc};
use serde::Deserialize;
use std::path::PathBuf;
use tokio::sync::Mutex;

use super::ServiceError;
use crate::models::identity::{self, TokenBundle};

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Access token source backed by the cached bundle on disk.
///
/// The bundle is read lazily, refreshed with the refresh token when it is
/// expired (or its expiry is unknown), and written back after each refresh.
pub struct TokenCache {
    path: PathBuf,
    http: reqwest::Client,
    bundle: Mutex<Option<TokenBundle>>,
}

impl TokenCache {
    pub fn new(path: PathBuf, http: reqwest::Client) -> Self {
        Self { path, http, bundle: Mutex::new(None) }
    }

    pub async fn access_token(&self) -> Result<String, ServiceError> {
        let mut guard = self.bundle.lock().await;
        if guard.is_none() {
            *guard = identity::load(&self.path)
                .map_err(|e| ServiceError::Unexpected(format!("token file unreadable: {e}")))?;
        }
        let bundle = guard.as_mut().ok_or(ServiceError::NoIdentity)?;

        let stale = bundle.expiry.is_none() || bundle.is_expired(Utc::now());
        if stale && bundle.can_refresh() {
            self.refresh(bundle).await?;
            if let Err(e) = identity::save(&self.path, bundle) {
                log::warn!("Could not persist refreshed token: {e}");
            }
        }
        Ok(bundle.token.clone())
    }

    /// Drop the in-memory copy; the next call re-reads the file.
    pub async fn forget(&self) {
        *self.bundle.lock().await = None;
    }

    async fn refresh(&self, bundle: &mut TokenBundle) -> Result<(), ServiceError> {
        log::info!("Refreshing cloud access token");
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", bundle.refresh_token.as_str()),
            ("client_id", bundle.client_id.as_str()),
            ("client_secret", bundle.client_secret.as_str()),
        ];
        let resp = self.http.post(&bundle.token_uri).form(&params).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ServiceError::Status { service: "token endpoint", status: status.as_u16(), body });
        }
        let refreshed: RefreshResponse = resp.json().await?;
        bundle.token = refreshed.access_token;
        bundle.expiry = Some(Utc::now() + Duration::seconds(refreshed.expires_in.unwrap_or(3600)));
        Ok(())
    }
}
