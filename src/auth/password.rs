use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use super::validate;

/// Hash with a fresh random salt; the PHC string embeds salt and parameters.
pub fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| e.to_string())
}

/// Err only when `hash` is not a PHC string; a wrong password is Ok(false).
pub fn verify_password(password: &str, hash: &str) -> Result<bool, String> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| e.to_string())?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Problems with a new administrator password and its confirmation.
pub fn check_new_password(new_password: &str, confirm: &str) -> Vec<String> {
    let mut errors = Vec::new();
    errors.extend(validate::validate_password(new_password));
    if new_password != confirm {
        errors.push("Passwords do not match".to_string());
    }
    errors
}
