//! Broker-relay forwarding configuration
//!
//! One `ForwardingConfig` per downstream broker-automation account. Each
//! config decides independently whether an entry signal reaches it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::signal::{Signal, SignalKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundingMode {
    Up,
    #[default]
    Down,
}

impl RoundingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundingMode::Up => "up",
            RoundingMode::Down => "down",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "up" => Some(RoundingMode::Up),
            "down" => Some(RoundingMode::Down),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardingConfig {
    pub id: i64,
    pub name: String,
    pub enabled: bool,
    pub webhook_urls: Vec<String>,
    /// ticker -> allowed strategies. Empty list allows every strategy,
    /// a missing ticker is never forwarded.
    pub allowed_tickers: HashMap<String, Vec<String>>,
    /// ticker -> contract symbol sent to the relay.
    pub symbol_map: HashMap<String, String>,
    pub risk_percentage: f64,
    pub rounding_mode: RoundingMode,
    pub token: String,
    pub account_id: String,
    pub paused_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Operator-supplied fields for create and update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardingConfigInput {
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub webhook_urls: Vec<String>,
    #[serde(default)]
    pub allowed_tickers: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub symbol_map: HashMap<String, String>,
    #[serde(default = "default_risk_percentage")]
    pub risk_percentage: f64,
    #[serde(default)]
    pub rounding_mode: RoundingMode,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub account_id: String,
}

fn default_risk_percentage() -> f64 {
    100.0
}

impl ForwardingConfigInput {
    /// Reject configs that could never deliver, or would deliver garbage.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is required".to_string());
        }
        if !self.risk_percentage.is_finite()
            || self.risk_percentage <= 0.0
            || self.risk_percentage > 1000.0
        {
            return Err(format!(
                "riskPercentage must be in (0, 1000], got {}",
                self.risk_percentage
            ));
        }
        for raw in &self.webhook_urls {
            match url::Url::parse(raw) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
                Ok(parsed) => {
                    return Err(format!("unsupported URL scheme '{}' in {}", parsed.scheme(), raw))
                }
                Err(e) => return Err(format!("invalid URL {}: {}", raw, e)),
            }
        }
        if self.enabled {
            if self.webhook_urls.is_empty() {
                return Err("enabled configs need at least one webhook URL".to_string());
            }
            if self.token.trim().is_empty() || self.account_id.trim().is_empty() {
                return Err("enabled configs need token and accountId".to_string());
            }
        }
        Ok(())
    }
}

/// Why a config did not receive a signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    Paused,
    NotEntry,
    TickerNotAllowed,
    StrategyNotAllowed,
    MissingCredentials,
    NoUrls,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            SkipReason::Disabled => "disabled",
            SkipReason::Paused => "paused",
            SkipReason::NotEntry => "not an entry signal",
            SkipReason::TickerNotAllowed => "ticker not in allow-list",
            SkipReason::StrategyNotAllowed => "strategy not allowed for ticker",
            SkipReason::MissingCredentials => "token or account id not configured",
            SkipReason::NoUrls => "no webhook URLs configured",
        };
        f.write_str(text)
    }
}

impl ForwardingConfig {
    pub fn is_paused(&self, now: DateTime<Utc>) -> bool {
        self.paused_until.map(|until| now < until).unwrap_or(false)
    }

    /// Allow-list check for a ticker and optional strategy label.
    pub fn allows(&self, ticker: &str, strategy: Option<&str>) -> Result<(), SkipReason> {
        let strategies = self
            .allowed_tickers
            .get(ticker)
            .ok_or(SkipReason::TickerNotAllowed)?;
        if strategies.is_empty() {
            return Ok(());
        }
        match strategy {
            Some(s) if strategies.iter().any(|allowed| allowed == s) => Ok(()),
            _ => Err(SkipReason::StrategyNotAllowed),
        }
    }

    /// Every gate a signal must pass before this config receives it.
    pub fn admits(&self, signal: &Signal, now: DateTime<Utc>) -> Result<(), SkipReason> {
        if !self.enabled {
            return Err(SkipReason::Disabled);
        }
        if self.is_paused(now) {
            return Err(SkipReason::Paused);
        }
        if signal.kind != SignalKind::Entry {
            return Err(SkipReason::NotEntry);
        }
        self.allows(&signal.ticker, signal.strategy.as_deref())?;
        if self.webhook_urls.is_empty() {
            return Err(SkipReason::NoUrls);
        }
        if self.token.is_empty() || self.account_id.is_empty() {
            return Err(SkipReason::MissingCredentials);
        }
        Ok(())
    }

    /// Quantity scaled by `risk_percentage`, rounded per `rounding_mode`,
    /// never below one contract.
    /// Whole contracts, never fewer than one.
    pub fn scaled_quantity(&self, quantity: f64) -> u32 {
        let scaled = quantity * self.risk_percentage / 100.0;
        let rounded = match self.rounding_mode {
            RoundingMode::Up => scaled.ceil(),
            RoundingMode::Down => scaled.floor(),
        };
        // `as` saturates, so oversized values clamp to u32::MAX.
        rounded.max(1.0) as u32
    }

    pub fn contract_symbol<'a>(&'a self, ticker: &'a str) -> &'a str {
        self.symbol_map
            .get(ticker)
            .map(String::as_str)
            .unwrap_or(ticker)
    }
}
