use crate::secrets::validate_secret_strength;
use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};
use std::collections::HashSet;
use std::sync::OnceLock;

/// Header carrying the static API key on every protected request.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Global store for valid API keys
static VALID_API_KEYS: OnceLock<HashSet<String>> = OnceLock::new();

/// Initialize the API keys from environment
///
/// # Security
/// This function requires the `OMS_API_KEYS` environment variable to be
/// set (comma-separated list). If no API keys are configured, the
/// application will **panic** to prevent running in an insecure state.
/// This is intentional fail-secure behavior.
///
/// # Panics
/// Panics if `OMS_API_KEYS` is not set, is empty, or contains a key
/// that fails the strength check.
pub fn init_api_keys() {
    let keys_env = std::env::var("OMS_API_KEYS")
        .expect("SECURITY ERROR: OMS_API_KEYS environment variable is not set. \
                 Set OMS_API_KEYS to a comma-separated list of secure API keys. \
                 Generate one with: openssl rand -base64 32");

    let mut keys = HashSet::new();
    for key in keys_env.split(',') {
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        if let Err(e) = validate_secret_strength(key, 32) {
            tracing::error!("SECURITY ERROR: rejected weak API key: {}", e);
            panic!(
                "SECURITY ERROR: API key failed the strength check ({}). \
                 Generate a secure key with: openssl rand -base64 32",
                e
            );
        }
        keys.insert(key.to_string());
    }

    if keys.is_empty() {
        panic!(
            "SECURITY ERROR: No valid API keys found in OMS_API_KEYS. \
             At least one API key is required."
        );
    }

    VALID_API_KEYS
        .set(keys)
        .expect("API keys already initialized");
    tracing::info!(
        "✓ API authentication initialized with {} valid key(s)",
        VALID_API_KEYS.get().map(|k| k.len()).unwrap_or(0)
    );
}

/// Check if an API key is valid
fn is_valid_api_key(key: &str) -> bool {
    VALID_API_KEYS
        .get()
        .map(|keys| keys.contains(key))
        .unwrap_or(false)
}

/// Middleware to require the `X-API-Key` header on protected endpoints.
/// The root banner and `/health` are mounted outside this layer.
pub async fn require_auth(request: Request, next: Next) -> Result<Response, StatusCode> {
    let api_key = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    match api_key {
        Some(key) if is_valid_api_key(key) => Ok(next.run(request).await),
        Some(_) => {
            tracing::warn!("Invalid API key attempted");
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            tracing::warn!("Missing {} header", API_KEY_HEADER);
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_validation() {
        // Initialize with test keys
        let mut keys = HashSet::new();
        keys.insert("k1_abcdefghijklmnopqrstuvwxyz_012345".to_string());
        keys.insert("k2_abcdefghijklmnopqrstuvwxyz_012345".to_string());
        let _ = VALID_API_KEYS.set(keys);

        assert!(is_valid_api_key("k1_abcdefghijklmnopqrstuvwxyz_012345"));
        assert!(is_valid_api_key("k2_abcdefghijklmnopqrstuvwxyz_012345"));
        assert!(!is_valid_api_key("invalid_key"));
        assert!(!is_valid_api_key(""));
    }
}
