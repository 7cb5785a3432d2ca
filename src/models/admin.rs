use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::auth::password;
use crate::errors::AppError;

/// Contents of `admin_auth.json`: the single administrator password hash.
#[derive(Debug, Serialize, Deserialize)]
pub struct AdminCredential {
    pub password: String,
}

pub fn exists(path: &Path) -> bool {
    path.exists()
}

pub fn load(path: &Path) -> Result<AdminCredential, AppError> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Hash and store a new administrator password, replacing any existing one.
pub fn set_password(path: &Path, new_password: &str) -> Result<(), AppError> {
    let hash = password::hash_password(new_password).map_err(AppError::Hash)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(&AdminCredential { password: hash })?;
    fs::write(path, json)?;
    Ok(())
}

/// True when `candidate` matches the stored hash. A missing file never verifies.
pub fn verify(path: &Path, candidate: &str) -> Result<bool, AppError> {
    if !exists(path) {
        return Ok(false);
    }
    let cred = load(path)?;
    Ok(password::verify_password(candidate, &cred.password).unwrap_or(false))
}

/// Replace the password after checking the current one. Ok(false) when
/// `current` is wrong; nothing is written then.
pub fn change_password(path: &Path, current: &str, new_password: &str) -> Result<bool, AppError> {
    if !verify(path, current)? {
        return Ok(false);
    }
    set_password(path, new_password)?;
    Ok(true)
}
