//! Canonical trading signal
//!
//! Every inbound alert, whatever its wire format, ends up as one `Signal`.
//! The `SignalKind` tag is decided once during normalization; lifecycle and
//! routing only ever look at the tag.

use serde::Serialize;
use serde_json::json;

use super::trade::{Direction, ExitReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// Market entry, opens a trade.
    Entry,
    /// Resting limit order. Acknowledged only.
    LimitEntry,
    /// Order cancellation. Acknowledged only.
    CancelOrder,
    TakeProfit,
    StopLoss,
}

impl SignalKind {
    /// Action string as it appears on the wire and in forwarded payloads.
    pub fn action(&self) -> &'static str {
        match self {
            SignalKind::Entry | SignalKind::LimitEntry => "entry",
            SignalKind::CancelOrder => "cancel",
            SignalKind::TakeProfit => "take_profit",
            SignalKind::StopLoss => "stop_loss",
        }
    }

    pub fn is_exit(&self) -> bool {
        matches!(self, SignalKind::TakeProfit | SignalKind::StopLoss)
    }

    pub fn exit_reason(&self) -> Option<ExitReason> {
        match self {
            SignalKind::TakeProfit => Some(ExitReason::TakeProfit),
            SignalKind::StopLoss => Some(ExitReason::StopLoss),
            _ => None,
        }
    }

    /// Order-management kinds never reach the trade book or any destination.
    pub fn is_order_management(&self) -> bool {
        matches!(self, SignalKind::LimitEntry | SignalKind::CancelOrder)
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SignalKind::Entry => "entry",
            SignalKind::LimitEntry => "limit_entry",
            SignalKind::CancelOrder => "cancel",
            SignalKind::TakeProfit => "take_profit",
            SignalKind::StopLoss => "stop_loss",
        };
        f.write_str(label)
    }
}

/// Normalized signal.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub kind: SignalKind,
    pub ticker: String,
    pub price: f64,
    pub direction: Option<Direction>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub quantity: Option<f64>,
    pub pnl: Option<f64>,
    pub strategy: Option<String>,
}

impl Signal {
    pub fn action(&self) -> &'static str {
        self.kind.action()
    }

    pub fn direction_or_default(&self) -> Direction {
        self.direction.unwrap_or(Direction::Long)
    }

    pub fn quantity_or_default(&self) -> f64 {
        self.quantity.unwrap_or(1.0)
    }

    /// Snapshot stored on trade events. Never carries the shared secret.
    pub fn to_payload(&self) -> serde_json::Value {
        json!({
            "action": self.action(),
            "kind": self.kind,
            "ticker": self.ticker,
            "price": self.price,
            "direction": self.direction,
            "stopLoss": self.stop_loss,
            "takeProfit": self.take_profit,
            "quantity": self.quantity,
            "pnl": self.pnl,
            "strategy": self.strategy,
        })
    }
}
