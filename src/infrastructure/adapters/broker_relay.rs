//! Broker-automation relay adapter
//!
//! The relay accepts one market order per POST. Field order and the zeroed
//! bracket/trailing fields are part of its contract and are reproduced as-is.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};

use crate::domain::entities::trade::Direction;
use crate::domain::services::forwarding_router::{BrokerOrder, ForwardedSignal};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelayAccount {
    pub token: String,
    pub account_id: String,
    pub risk_percentage: u32,
    pub quantity_multiplier: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelayOrder {
    pub symbol: String,
    pub date: String,
    pub data: &'static str,
    pub quantity: u32,
    pub risk_percentage: u32,
    #[serde(serialize_with = "js_number")]
    pub price: f64,
    pub gtd_in_second: u32,
    pub stp_limit_stp_price: u32,
    #[serde(serialize_with = "js_number")]
    pub tp: f64,
    pub percentage_tp: u32,
    pub dollar_tp: u32,
    #[serde(serialize_with = "js_number")]
    pub sl: f64,
    pub percentage_sl: u32,
    pub dollar_sl: u32,
    pub trail: u32,
    pub trail_stop: u32,
    pub trail_trigger: u32,
    pub trail_freq: u32,
    pub update_tp: bool,
    pub update_sl: bool,
    pub breakeven: u32,
    pub breakeven_offset: u32,
    pub token: String,
    pub pyramid: bool,
    pub same_direction_ignore: bool,
    pub reverse_order_close: bool,
    pub order_type: &'static str,
    pub multiple_accounts: Vec<RelayAccount>,
}

/// Largest integer an f64 holds exactly (2^53 - 1).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Whole values go out as JSON integers (`21500`, `0`), the way the relay
/// receives them from script senders.
fn js_number<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}

pub fn build_order(order: &BrokerOrder, forwarded: &ForwardedSignal, at: DateTime<Utc>) -> RelayOrder {
    let signal = &forwarded.signal;
    let data = match signal.direction_or_default() {
        Direction::Long => "buy",
        Direction::Short => "sell",
    };

    RelayOrder {
        symbol: order.symbol.clone(),
        date: at.to_rfc3339_opts(SecondsFormat::Millis, true),
        data,
        quantity: order.quantity,
        risk_percentage: 0,
        price: signal.price,
        gtd_in_second: 0,
        stp_limit_stp_price: 0,
        tp: signal.take_profit.unwrap_or(0.0),
        percentage_tp: 0,
        dollar_tp: 0,
        sl: signal.stop_loss.unwrap_or(0.0),
        percentage_sl: 0,
        dollar_sl: 0,
        trail: 0,
        trail_stop: 0,
        trail_trigger: 0,
        trail_freq: 0,
        update_tp: false,
        update_sl: false,
        breakeven: 0,
        breakeven_offset: 0,
        token: order.token.clone(),
        pyramid: false,
        same_direction_ignore: false,
        reverse_order_close: true,
        order_type: "MKT",
        multiple_accounts: vec![RelayAccount {
            token: order.token.clone(),
            account_id: order.account_id.clone(),
            risk_percentage: 0,
            quantity_multiplier: 1,
        }],
    }
}
