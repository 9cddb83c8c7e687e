//! Forwarding router
//!
//! Pure routing decision: given a lifecycle outcome, the signal that caused
//! it and the broker-relay configs, decide which destinations receive it and
//! with which per-destination adjustments. No I/O happens here; the
//! infrastructure forwarder executes the resulting plan.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::trade_lifecycle::LifecycleOutcome;
use crate::domain::entities::forwarding_config::{ForwardingConfig, SkipReason};
use crate::domain::entities::signal::{Signal, SignalKind};

/// Signal enriched with the trade it produced, as handed to every adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardedSignal {
    pub signal: Signal,
    pub trade_id: Option<i64>,
    pub entry_price: Option<f64>,
    pub pnl: Option<f64>,
    pub pnl_percent: Option<f64>,
}

impl ForwardedSignal {
    pub fn new(signal: Signal, outcome: &LifecycleOutcome) -> Self {
        let trade = outcome.trade();
        Self {
            trade_id: trade.map(|t| t.id),
            entry_price: trade.map(|t| t.entry_price),
            pnl: trade.and_then(|t| t.pnl).or(signal.pnl),
            pnl_percent: trade.and_then(|t| t.pnl_percent),
            signal,
        }
    }
}

/// One broker-relay delivery, already scaled and remapped for its config.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerOrder {
    pub config_id: i64,
    pub config_name: String,
    pub webhook_urls: Vec<String>,
    pub token: String,
    pub account_id: String,
    pub symbol: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedConfig {
    pub config_id: i64,
    pub config_name: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutePlan {
    /// Chat and external-dashboard destinations.
    pub notify: bool,
    pub broker_orders: Vec<BrokerOrder>,
    pub skipped: Vec<SkippedConfig>,
}

impl RoutePlan {
    pub fn is_empty(&self) -> bool {
        !self.notify && self.broker_orders.is_empty()
    }
}

/// Notification destinations take market entries and exits only.
pub fn notifies(kind: SignalKind) -> bool {
    matches!(
        kind,
        SignalKind::Entry | SignalKind::TakeProfit | SignalKind::StopLoss
    )
}

pub fn plan_routes(
    outcome: &LifecycleOutcome,
    signal: &Signal,
    configs: &[ForwardingConfig],
    now: DateTime<Utc>,
) -> RoutePlan {
    if !outcome.should_forward() {
        return RoutePlan::default();
    }

    let mut plan = RoutePlan {
        notify: notifies(signal.kind),
        ..RoutePlan::default()
    };

    for config in configs {
        match config.admits(signal, now) {
            Ok(()) => plan.broker_orders.push(BrokerOrder {
                config_id: config.id,
                config_name: config.name.clone(),
                webhook_urls: config.webhook_urls.clone(),
                token: config.token.clone(),
                account_id: config.account_id.clone(),
                symbol: config.contract_symbol(&signal.ticker).to_string(),
                quantity: config.scaled_quantity(signal.quantity_or_default()),
            }),
            Err(reason) => plan.skipped.push(SkippedConfig {
                config_id: config.id,
                config_name: config.name.clone(),
                reason,
            }),
        }
    }

    plan
}
