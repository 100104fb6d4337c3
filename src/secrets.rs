//! Secret handling
//!
//! API keys for the OMS itself and for the brokerage sandbox are loaded
//! from the environment into `zeroize`-backed strings so they are wiped
//! from memory when dropped, and checked against minimum strength
//! requirements before the service will start with them.

use std::env;
use zeroize::Zeroizing;

/// Error type for secret loading operations
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("Environment variable not set: {0}")]
    EnvVarNotSet(String),

    #[error("Secret validation failed: {0}")]
    ValidationFailed(String),
}

/// Load a secret from an environment variable, wrapped in `Zeroizing`
/// so it is wiped from memory on drop.
pub fn load_secret(env_var_name: &str) -> Result<Zeroizing<String>, SecretError> {
    env::var(env_var_name)
        .map(Zeroizing::new)
        .map_err(|_| SecretError::EnvVarNotSet(env_var_name.to_string()))
}

/// Validate that a secret meets minimum security requirements
pub fn validate_secret_strength(secret: &str, min_length: usize) -> Result<(), SecretError> {
    if secret.len() < min_length {
        return Err(SecretError::ValidationFailed(format!(
            "Secret too short: {} characters (minimum: {})",
            secret.len(),
            min_length
        )));
    }

    // Check for obviously weak secrets
    let weak_patterns = ["test", "demo", "example", "placeholder", "changeme", "12345"];
    let secret_lower = secret.to_lowercase();

    for pattern in &weak_patterns {
        if secret_lower.contains(pattern) {
            return Err(SecretError::ValidationFailed(format!(
                "Secret contains weak pattern: {}",
                pattern
            )));
        }
    }

    Ok(())
}
