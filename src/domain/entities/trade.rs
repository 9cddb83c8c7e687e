//! Trade lifecycle entities
//!
//! A `Trade` is one position opened by an entry signal and closed by a
//! take-profit, stop-loss or manual completion. Every signal that touched
//! a trade is kept as an append-only `TradeEvent`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Long => "long",
            Direction::Short => "short",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "long" | "buy" => Some(Direction::Long),
            "short" | "sell" => Some(Direction::Short),
            _ => None,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Open,
    Closed,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Open => "open",
            TradeStatus::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(TradeStatus::Open),
            "closed" => Some(TradeStatus::Closed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
    Manual,
    Breakeven,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::TakeProfit => "take_profit",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::Manual => "manual",
            ExitReason::Breakeven => "breakeven",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "take_profit" => Some(ExitReason::TakeProfit),
            "stop_loss" => Some(ExitReason::StopLoss),
            "manual" => Some(ExitReason::Manual),
            "breakeven" => Some(ExitReason::Breakeven),
            _ => None,
        }
    }

    /// Event type recorded alongside the close.
    pub fn event_type(&self) -> EventType {
        match self {
            ExitReason::TakeProfit => EventType::TakeProfit,
            ExitReason::StopLoss => EventType::StopLoss,
            ExitReason::Manual | ExitReason::Breakeven => EventType::Manual,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Entry,
    TakeProfit,
    StopLoss,
    Manual,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Entry => "entry",
            EventType::TakeProfit => "take_profit",
            EventType::StopLoss => "stop_loss",
            EventType::Manual => "manual",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "entry" => Some(EventType::Entry),
            "take_profit" => Some(EventType::TakeProfit),
            "stop_loss" => Some(EventType::StopLoss),
            "manual" => Some(EventType::Manual),
            _ => None,
        }
    }
}

/// One position lifecycle.
///
/// Exit fields are all `None` while `status` is `Open` and all `Some` once
/// it is `Closed`; the repository writes them in a single update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub id: i64,
    pub ticker: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub quantity: f64,
    pub strategy: Option<String>,
    pub status: TradeStatus,
    pub exit_price: Option<f64>,
    pub exit_reason: Option<ExitReason>,
    pub pnl: Option<f64>,
    pub pnl_percent: Option<f64>,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Trade {
    pub fn is_open(&self) -> bool {
        self.status == TradeStatus::Open
    }

    /// P&L for closing this trade at `exit_price`, in price points times quantity.
    pub fn computed_pnl(&self, exit_price: f64) -> f64 {
        match self.direction {
            Direction::Long => (exit_price - self.entry_price) * self.quantity,
            Direction::Short => (self.entry_price - exit_price) * self.quantity,
        }
    }

    /// Price move in percent of entry. Independent of direction.
    pub fn pnl_percent_at(&self, exit_price: f64) -> f64 {
        (exit_price - self.entry_price) / self.entry_price * 100.0
    }
}

/// Append-only audit record of a signal applied to a trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeEvent {
    pub id: i64,
    pub trade_id: i64,
    pub event_type: EventType,
    pub price: f64,
    pub raw_payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Fields fixed when a trade is opened.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTrade {
    pub ticker: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub quantity: f64,
    pub strategy: Option<String>,
}

/// Exit fields written atomically when a trade is closed.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeClose {
    pub exit_price: f64,
    pub exit_reason: ExitReason,
    pub pnl: f64,
    pub pnl_percent: f64,
    pub closed_at: DateTime<Utc>,
}
