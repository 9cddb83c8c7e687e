//! Secret handling
//!
//! Secrets (the webhook shared secret, the Telegram bot token) are read from
//! the environment once at startup and held in `Zeroizing` buffers so they
//! are wiped from memory when dropped. Comparisons against caller-supplied
//! values are constant-time.

use std::env;
use tracing::warn;
use zeroize::Zeroizing;

/// Error type for secret validation
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SecretError {
    #[error("Secret validation failed: {0}")]
    ValidationFailed(String),
}

/// Load an optional secret from the environment. Blank values count as unset.
pub fn load_secret(env_var_name: &str) -> Option<Zeroizing<String>> {
    let value = Zeroizing::new(env::var(env_var_name).ok()?);
    if value.trim().is_empty() {
        return None;
    }
    Some(Zeroizing::new(value.trim().to_string()))
}

/// Load a secret and warn, without refusing it, when it looks weak.
pub fn load_checked_secret(env_var_name: &str, min_length: usize) -> Option<Zeroizing<String>> {
    let secret = load_secret(env_var_name)?;
    if let Err(e) = validate_secret_strength(&secret, min_length) {
        warn!("⚠️  {} is weak: {}", env_var_name, e);
    }
    Some(secret)
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

/// Compare two strings without short-circuiting on the first differing byte.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let mut diff = a.len() ^ b.len();
    for i in 0..a.len().max(b.len()) {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        diff |= usize::from(x ^ y);
    }
    diff == 0
}
