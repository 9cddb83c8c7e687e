use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::collections::HashSet;
use std::sync::Arc;

use crate::secrets::constant_time_eq;

/// Minimum accepted operator key length (256 bits of hex or base64).
pub const MIN_KEY_LENGTH: usize = 32;

/// Bearer keys accepted by the operator API.
///
/// An empty set is allowed at startup; every operator call is then rejected
/// with 401 while the public ingestion route keeps working.
#[derive(Clone, Default)]
pub struct ApiKeys {
    keys: Arc<HashSet<String>>,
}

impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeys")
            .field("count", &self.keys.len())
            .finish()
    }
}

impl ApiKeys {
    /// Parse a comma-separated key list. Keys shorter than
    /// [`MIN_KEY_LENGTH`] are dropped with an error log.
    pub fn from_csv(raw: &str) -> Self {
        let mut keys = HashSet::new();

        for key in raw.split(',') {
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            if key.len() < MIN_KEY_LENGTH {
                tracing::error!(
                    "SECURITY: ignoring weak API key (length: {}, minimum: {}). \
                     Generate one with: openssl rand -base64 32",
                    key.len(),
                    MIN_KEY_LENGTH
                );
                continue;
            }
            keys.insert(key.to_string());
        }

        Self {
            keys: Arc::new(keys),
        }
    }

    pub fn from_env() -> Self {
        let keys = Self::from_csv(&std::env::var("API_KEYS").unwrap_or_default());
        if keys.is_empty() {
            tracing::warn!("API_KEYS not set; the operator API will reject every request");
        } else {
            tracing::info!("✓ API authentication initialized with {} valid key(s)", keys.len());
        }
        keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn is_valid(&self, candidate: &str) -> bool {
        self.keys
            .iter()
            .fold(false, |found, key| constant_time_eq(key, candidate) | found)
    }
}

/// Middleware to require a bearer key on operator endpoints.
pub async fn require_api_key(
    State(keys): State<ApiKeys>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match auth_header.and_then(|auth| auth.strip_prefix("Bearer ")) {
        Some(key) if keys.is_valid(key) => Ok(next.run(request).await),
        Some(_) => {
            tracing::warn!("Invalid API key attempted on {}", request.uri().path());
            Err(StatusCode::UNAUTHORIZED)
        }
        None if auth_header.is_some() => {
            tracing::warn!("Invalid Authorization header format (expected Bearer token)");
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            tracing::warn!("Missing Authorization header on {}", request.uri().path());
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_A: &str = "test_key_0123456789abcdef0123456789";
    const KEY_B: &str = "another_key_0123456789abcdef012345";

    #[test]
    fn test_api_key_validation() {
        let keys = ApiKeys::from_csv(&format!("{}, {} ,", KEY_A, KEY_B));

        assert_eq!(keys.len(), 2);
        assert!(keys.is_valid(KEY_A));
        assert!(keys.is_valid(KEY_B));
        assert!(!keys.is_valid("invalid_key"));
        assert!(!keys.is_valid(""));
    }

    #[test]
    fn test_weak_keys_are_dropped() {
        let keys = ApiKeys::from_csv(&format!("short,{}", KEY_A));
        assert_eq!(keys.len(), 1);
        assert!(!keys.is_valid("short"));
    }

    #[test]
    fn test_empty_set_rejects_everything() {
        let keys = ApiKeys::from_csv("");
        assert!(keys.is_empty());
        assert!(!keys.is_valid(KEY_A));
    }
}
