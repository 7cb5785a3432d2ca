use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::errors::AppError;

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Cached OAuth token bundle (`google_creds.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBundle {
    pub token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// When the access token stops being valid; unknown for freshly uploaded bundles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl TokenBundle {
    /// Expired, or within a minute of expiring.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => now + Duration::seconds(60) >= expiry,
            None => false,
        }
    }

    pub fn can_refresh(&self) -> bool {
        !self.refresh_token.is_empty() && !self.client_id.is_empty()
    }
}

/// Validate an uploaded bundle. Returns a list of problems, empty when usable.
pub fn validate(bundle: &TokenBundle) -> Vec<String> {
    let mut errors = Vec::new();
    if bundle.token.trim().is_empty() && bundle.refresh_token.trim().is_empty() {
        errors.push("Token bundle has neither an access token nor a refresh token".to_string());
    }
    if !bundle.refresh_token.is_empty() && (bundle.client_id.is_empty() || bundle.client_secret.is_empty()) {
        errors.push("A refresh token needs client_id and client_secret".to_string());
    }
    errors
}

pub fn load(path: &Path) -> Result<Option<TokenBundle>, AppError> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&contents)?))
}

pub fn save(path: &Path, bundle: &TokenBundle) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(bundle)?)?;
    Ok(())
}

/// Forget the cached identity. Missing file is not an error.
pub fn clear(path: &Path) -> Result<(), AppError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
