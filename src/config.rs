use std::fmt::Display;
use std::net::SocketAddr;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::auth::ApiKeys;
use crate::domain::services::trade_lifecycle::DEFAULT_DEDUP_WINDOW_SECS;
use crate::infrastructure::adapters::telegram::{TelegramConfig, DEFAULT_API_BASE};
use crate::infrastructure::forwarder::DestinationSettings;
use crate::persistence::DatabaseConfig;
use crate::rate_limit::RateLimiterConfig;
use crate::secrets::{load_checked_secret, load_secret};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_FORWARD_TIMEOUT_MS: u64 = 10_000;
const MIN_WEBHOOK_SECRET_LENGTH: usize = 16;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid BIND_ADDR '{value}': {reason}")]
    InvalidBindAddr { value: String, reason: String },
}

/// Process configuration, loaded once at startup.
#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database: DatabaseConfig,
    /// `None` accepts every submission.
    pub webhook_secret: Option<Zeroizing<String>>,
    pub api_keys: ApiKeys,
    pub destinations: DestinationSettings,
    pub forward_timeout: Duration,
    pub dedup_window_secs: i64,
    pub rate_limit: RateLimiterConfig,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("database", &self.database)
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "***"))
            .field("api_keys", &self.api_keys)
            .field("destinations", &self.destinations)
            .field("forward_timeout", &self.forward_timeout)
            .field("dedup_window_secs", &self.dedup_window_secs)
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// Out-of-range or unparsable optional values fall back to their default
    /// with a warning. Only an unusable bind address is fatal.
    pub fn from_env() -> Result<AppConfig, ConfigError> {
        let raw_bind = env_var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw_bind
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidBindAddr {
                value: raw_bind.clone(),
                reason: e.to_string(),
            })?;

        let forward_timeout_ms = parse_bounded(
            "FORWARD_TIMEOUT_MS",
            env_var("FORWARD_TIMEOUT_MS").as_deref(),
            1_000..=60_000,
            DEFAULT_FORWARD_TIMEOUT_MS,
        );
        let dedup_window_secs = parse_bounded(
            "DEDUP_WINDOW_SECONDS",
            env_var("DEDUP_WINDOW_SECONDS").as_deref(),
            1..=3_600,
            DEFAULT_DEDUP_WINDOW_SECS,
        );
        let requests_per_minute = parse_bounded(
            "WEBHOOK_RATE_LIMIT_PER_MINUTE",
            env_var("WEBHOOK_RATE_LIMIT_PER_MINUTE").as_deref(),
            1..=100_000,
            RateLimiterConfig::default().requests_per_minute,
        );

        Ok(AppConfig {
            bind_addr,
            database: DatabaseConfig::from_env(),
            webhook_secret: load_checked_secret("WEBHOOK_SECRET", MIN_WEBHOOK_SECRET_LENGTH),
            api_keys: ApiKeys::from_env(),
            destinations: destinations_from_env(),
            forward_timeout: Duration::from_millis(forward_timeout_ms),
            dedup_window_secs,
            rate_limit: RateLimiterConfig {
                requests_per_minute,
            },
        })
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn destinations_from_env() -> DestinationSettings {
    let telegram = match (load_secret("TELEGRAM_BOT_TOKEN"), env_var("TELEGRAM_CHAT_ID")) {
        (Some(bot_token), Some(chat_id)) => Some(TelegramConfig {
            api_base: http_url("TELEGRAM_API_BASE", env_var("TELEGRAM_API_BASE"))
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            bot_token,
            chat_id,
        }),
        (None, None) => None,
        _ => {
            tracing::warn!(
                "Telegram needs both TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID, notifications disabled"
            );
            None
        }
    };

    DestinationSettings {
        telegram,
        discord_webhook_url: http_url("DISCORD_WEBHOOK_URL", env_var("DISCORD_WEBHOOK_URL")),
        external_dashboard_url: http_url("EXTERNAL_DASHBOARD_URL", env_var("EXTERNAL_DASHBOARD_URL")),
    }
}

/// Keep `raw` only if it is an absolute http(s) URL.
fn http_url(name: &str, raw: Option<String>) -> Option<String> {
    let raw = raw?;
    match url::Url::parse(&raw) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Some(raw),
        Ok(parsed) => {
            tracing::warn!(
                "Ignoring {}: unsupported scheme '{}' (expected http or https)",
                name,
                parsed.scheme()
            );
            None
        }
        Err(e) => {
            tracing::warn!("Ignoring {}: invalid URL: {}", name, e);
            None
        }
    }
}

fn parse_bounded<T>(name: &str, raw: Option<&str>, range: RangeInclusive<T>, default: T) -> T
where
    T: FromStr + PartialOrd + Display + Copy,
    T::Err: Display,
{
    let Some(raw) = raw else {
        return default;
    };
    match raw.parse::<T>() {
        Ok(value) if range.contains(&value) => value,
        Ok(value) => {
            tracing::warn!(
                "Invalid {} value: {} (must be between {} and {}), using default: {}",
                name,
                value,
                range.start(),
                range.end(),
                default
            );
            default
        }
        Err(e) => {
            tracing::warn!("Failed to parse {} '{}': {}, using default: {}", name, raw, e, default);
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bounded() {
        assert_eq!(parse_bounded("X", None, 1_000..=60_000, 10_000u64), 10_000);
        assert_eq!(parse_bounded("X", Some("2500"), 1_000..=60_000, 10_000u64), 2_500);
        assert_eq!(parse_bounded("X", Some("999"), 1_000..=60_000, 10_000u64), 10_000);
        assert_eq!(parse_bounded("X", Some("fast"), 1_000..=60_000, 10_000u64), 10_000);
        assert_eq!(parse_bounded("X", Some("-5"), 1..=3_600, 60i64), 60);
    }

    #[test]
    fn test_http_url() {
        assert_eq!(
            http_url("X", Some("https://discord.com/api/webhooks/1/abc".to_string())).as_deref(),
            Some("https://discord.com/api/webhooks/1/abc")
        );
        assert!(http_url("X", Some("ftp://example.com".to_string())).is_none());
        assert!(http_url("X", Some("not a url".to_string())).is_none());
        assert!(http_url("X", None).is_none());
    }

    #[test]
    fn test_defaults_parse() {
        assert!(DEFAULT_BIND_ADDR.parse::<SocketAddr>().is_ok());
        assert_eq!(RateLimiterConfig::default().requests_per_minute, 600);
    }
}
