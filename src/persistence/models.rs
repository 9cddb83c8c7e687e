//! Database Models
//!
//! Row shapes as stored in SQLite and their conversion into domain entities.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::collections::HashMap;

use crate::domain::entities::activity::{ActivityEntry, LogCategory, LogLevel};
use crate::domain::entities::forwarding_config::{ForwardingConfig, RoundingMode};
use crate::domain::entities::trade::{
    Direction, EventType, ExitReason, Trade, TradeEvent, TradeStatus,
};
use crate::domain::repositories::RepositoryError;

/// Trade record in database
#[derive(Debug, Clone, FromRow)]
pub struct TradeRow {
    pub id: i64,
    pub ticker: String,
    pub direction: String,
    pub entry_price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub quantity: f64,
    pub strategy: Option<String>,
    pub status: String,
    pub exit_price: Option<f64>,
    pub exit_reason: Option<String>,
    pub pnl: Option<f64>,
    pub pnl_percent: Option<f64>,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl TryFrom<TradeRow> for Trade {
    type Error = RepositoryError;

    fn try_from(row: TradeRow) -> Result<Self, Self::Error> {
        let direction = Direction::parse(&row.direction)
            .ok_or_else(|| corrupt("trades.direction", &row.direction))?;
        let status =
            TradeStatus::parse(&row.status).ok_or_else(|| corrupt("trades.status", &row.status))?;
        let exit_reason = match row.exit_reason {
            Some(reason) => Some(
                ExitReason::parse(&reason).ok_or_else(|| corrupt("trades.exit_reason", &reason))?,
            ),
            None => None,
        };

        Ok(Trade {
            id: row.id,
            ticker: row.ticker,
            direction,
            entry_price: row.entry_price,
            stop_loss: row.stop_loss,
            take_profit: row.take_profit,
            quantity: row.quantity,
            strategy: row.strategy,
            status,
            exit_price: row.exit_price,
            exit_reason,
            pnl: row.pnl,
            pnl_percent: row.pnl_percent,
            opened_at: row.opened_at,
            closed_at: row.closed_at,
        })
    }
}

/// Trade event record in database
#[derive(Debug, Clone, FromRow)]
pub struct TradeEventRow {
    pub id: i64,
    pub trade_id: i64,
    pub event_type: String,
    pub price: f64,
    pub raw_payload: String, // JSON string
    pub created_at: DateTime<Utc>,
}

impl TryFrom<TradeEventRow> for TradeEvent {
    type Error = RepositoryError;

    fn try_from(row: TradeEventRow) -> Result<Self, Self::Error> {
        Ok(TradeEvent {
            id: row.id,
            trade_id: row.trade_id,
            event_type: EventType::parse(&row.event_type)
                .ok_or_else(|| corrupt("trade_events.event_type", &row.event_type))?,
            price: row.price,
            raw_payload: serde_json::from_str(&row.raw_payload)
                .map_err(|e| corrupt("trade_events.raw_payload", &e.to_string()))?,
            created_at: row.created_at,
        })
    }
}

/// Forwarding config record in database
#[derive(Debug, Clone, FromRow)]
pub struct ForwardingConfigRow {
    pub id: i64,
    pub name: String,
    pub enabled: bool,
    pub webhook_urls: String,    // JSON array
    pub allowed_tickers: String, // JSON object
    pub symbol_map: String,      // JSON object
    pub risk_percentage: f64,
    pub rounding_mode: String,
    pub token: String,
    pub account_id: String,
    pub paused_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ForwardingConfigRow> for ForwardingConfig {
    type Error = RepositoryError;

    fn try_from(row: ForwardingConfigRow) -> Result<Self, Self::Error> {
        let webhook_urls: Vec<String> = serde_json::from_str(&row.webhook_urls)
            .map_err(|e| corrupt("forwarding_configs.webhook_urls", &e.to_string()))?;
        let allowed_tickers: HashMap<String, Vec<String>> =
            serde_json::from_str(&row.allowed_tickers)
                .map_err(|e| corrupt("forwarding_configs.allowed_tickers", &e.to_string()))?;
        let symbol_map: HashMap<String, String> = serde_json::from_str(&row.symbol_map)
            .map_err(|e| corrupt("forwarding_configs.symbol_map", &e.to_string()))?;
        let rounding_mode = RoundingMode::parse(&row.rounding_mode)
            .ok_or_else(|| corrupt("forwarding_configs.rounding_mode", &row.rounding_mode))?;

        Ok(ForwardingConfig {
            id: row.id,
            name: row.name,
            enabled: row.enabled,
            webhook_urls,
            allowed_tickers,
            symbol_map,
            risk_percentage: row.risk_percentage,
            rounding_mode,
            token: row.token,
            account_id: row.account_id,
            paused_until: row.paused_until,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Activity log record in database
#[derive(Debug, Clone, FromRow)]
pub struct ActivityLogRow {
    pub id: i64,
    pub level: String,
    pub category: String,
    pub message: String,
    pub metadata: String, // JSON string
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ActivityLogRow> for ActivityEntry {
    type Error = RepositoryError;

    fn try_from(row: ActivityLogRow) -> Result<Self, Self::Error> {
        Ok(ActivityEntry {
            id: row.id,
            level: LogLevel::parse(&row.level).ok_or_else(|| corrupt("activity_log.level", &row.level))?,
            category: LogCategory::parse(&row.category)
                .ok_or_else(|| corrupt("activity_log.category", &row.category))?,
            message: row.message,
            metadata: serde_json::from_str(&row.metadata).unwrap_or(serde_json::Value::Null),
            created_at: row.created_at,
        })
    }
}

fn corrupt(column: &str, value: &str) -> RepositoryError {
    RepositoryError::CorruptRow(format!("{} = {:?}", column, value))
}
