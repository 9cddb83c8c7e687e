//! Generic external dashboard sink.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::services::forwarding_router::ForwardedSignal;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalSignal {
    pub symbol: String,
    pub action: &'static str,
    pub price: f64,
    /// Unix milliseconds.
    pub timestamp: i64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub position_size: f64,
    pub strategy: Option<String>,
}

pub fn build_body(forwarded: &ForwardedSignal, at: DateTime<Utc>) -> ExternalSignal {
    let signal = &forwarded.signal;
    ExternalSignal {
        symbol: signal.ticker.clone(),
        action: signal.action(),
        price: signal.price,
        timestamp: at.timestamp_millis(),
        stop_loss: signal.stop_loss.filter(|v| *v != 0.0),
        take_profit: signal.take_profit.filter(|v| *v != 0.0),
        position_size: signal.quantity.filter(|q| *q > 0.0).unwrap_or(1.0),
        strategy: signal.strategy.clone(),
    }
}
