//! Forwarder
//!
//! Executes a `RoutePlan`: shapes one request per destination URL, sends all
//! of them concurrently through the `DestinationSink`, and records every
//! outcome. A failing delivery never affects the others and is never retried.

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::adapters::telegram::TelegramConfig;
use super::adapters::{broker_relay, discord, external_dashboard, telegram};
use crate::domain::entities::activity::LogCategory;
use crate::domain::entities::forwarding_config::SkipReason;
use crate::domain::errors::DestinationError;
use crate::domain::repositories::DestinationSink;
use crate::domain::services::activity_log::ActivityLog;
use crate::domain::services::forwarding_router::{ForwardedSignal, RoutePlan};

/// Notification destinations configured for this process.
#[derive(Debug, Clone, Default)]
pub struct DestinationSettings {
    pub telegram: Option<TelegramConfig>,
    pub discord_webhook_url: Option<String>,
    pub external_dashboard_url: Option<String>,
}

/// One outbound request.
#[derive(Debug, Clone)]
struct Delivery {
    category: LogCategory,
    /// Safe to log; never contains credentials.
    target: String,
    url: String,
    body: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryReport {
    pub category: LogCategory,
    pub target: String,
    pub result: Result<(), DestinationError>,
}

#[derive(Clone)]
pub struct Forwarder {
    sink: Arc<dyn DestinationSink>,
    settings: DestinationSettings,
    activity: ActivityLog,
}

impl Forwarder {
    pub fn new(sink: Arc<dyn DestinationSink>, settings: DestinationSettings, activity: ActivityLog) -> Self {
        Self {
            sink,
            settings,
            activity,
        }
    }

    pub fn settings(&self) -> &DestinationSettings {
        &self.settings
    }

    fn deliveries(&self, plan: &RoutePlan, forwarded: &ForwardedSignal, at: DateTime<Utc>) -> Vec<Delivery> {
        let mut deliveries = Vec::new();

        if plan.notify {
            match &self.settings.discord_webhook_url {
                Some(url) => deliveries.push(Delivery {
                    category: LogCategory::Discord,
                    target: "discord".to_string(),
                    url: url.clone(),
                    body: discord::build_body(forwarded, at),
                }),
                None => debug!("Discord webhook not configured, skipping"),
            }

            match &self.settings.telegram {
                Some(config) => {
                    let (url, body) = telegram::build_request(config, forwarded, at);
                    deliveries.push(Delivery {
                        category: LogCategory::Telegram,
                        target: "telegram".to_string(),
                        url,
                        body,
                    });
                }
                None => debug!("Telegram credentials not configured, skipping"),
            }

            match &self.settings.external_dashboard_url {
                Some(url) => match serde_json::to_value(external_dashboard::build_body(forwarded, at)) {
                    Ok(body) => deliveries.push(Delivery {
                        category: LogCategory::External,
                        target: "external dashboard".to_string(),
                        url: url.clone(),
                        body,
                    }),
                    Err(e) => error!("Failed to encode external dashboard payload: {}", e),
                },
                None => debug!("External dashboard URL not configured, skipping"),
            }
        }

        for order in &plan.broker_orders {
            let body = match serde_json::to_value(broker_relay::build_order(order, forwarded, at)) {
                Ok(body) => body,
                Err(e) => {
                    error!("Failed to encode relay order for [{}]: {}", order.config_name, e);
                    continue;
                }
            };
            for url in &order.webhook_urls {
                deliveries.push(Delivery {
                    category: LogCategory::Broker,
                    target: format!("broker relay [{}] {}", order.config_name, url),
                    url: url.clone(),
                    body: body.clone(),
                });
            }
        }

        deliveries
    }

    /// Send everything in `plan` and wait for all deliveries to settle.
    pub async fn dispatch(&self, plan: &RoutePlan, forwarded: &ForwardedSignal) -> Vec<DeliveryReport> {
        let signal = &forwarded.signal;

        for skipped in &plan.skipped {
            let message = format!(
                "Broker relay [{}]: skipped {} {} ({})",
                skipped.config_name, signal.action(), signal.ticker, skipped.reason
            );
            match skipped.reason {
                SkipReason::MissingCredentials | SkipReason::NoUrls => {
                    warn!("{}", message);
                    self.activity
                        .warn(LogCategory::Broker, &message, json!({"configId": skipped.config_id}))
                        .await;
                }
                _ => debug!("{}", message),
            }
        }

        let deliveries = self.deliveries(plan, forwarded, Utc::now());
        if deliveries.is_empty() {
            debug!("No destinations for {} {}", signal.action(), signal.ticker);
            return Vec::new();
        }

        let sink = &self.sink;
        let results = join_all(deliveries.iter().map(|d| sink.send(&d.url, &d.body))).await;

        let mut reports = Vec::with_capacity(deliveries.len());
        for (delivery, result) in deliveries.into_iter().zip(results) {
            let metadata = json!({
                "target": delivery.target,
                "ticker": signal.ticker,
                "action": signal.action(),
                "tradeId": forwarded.trade_id,
            });
            match &result {
                Ok(()) => {
                    info!("✓ Forwarded {} {} to {}", signal.action(), signal.ticker, delivery.target);
                    self.activity
                        .info(
                            delivery.category,
                            format!("Forwarded {} {} to {}", signal.action(), signal.ticker, delivery.target),
                            metadata,
                        )
                        .await;
                }
                Err(e) if e.is_transient() => {
                    warn!("✗ {} unreachable: {}", delivery.target, e);
                    self.activity
                        .error(delivery.category, format!("{} unreachable: {}", delivery.target, e), metadata)
                        .await;
                }
                Err(e) => {
                    error!("✗ {} rejected signal: {}", delivery.target, e);
                    self.activity
                        .error(delivery.category, format!("{} rejected signal: {}", delivery.target, e), metadata)
                        .await;
                }
            }
            reports.push(DeliveryReport {
                category: delivery.category,
                target: delivery.target,
                result,
            });
        }

        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::signal::{Signal, SignalKind};
    use crate::domain::services::forwarding_router::BrokerOrder;
    use crate::persistence::init_memory_database;
    use crate::persistence::repository::SqliteActivityLogRepository;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use zeroize::Zeroizing;

    /// Records every call; fails URLs containing "fail" or "slow".
    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<(String, serde_json::Value)>>,
    }

    #[async_trait]
    impl DestinationSink for RecordingSink {
        async fn send(&self, url: &str, body: &serde_json::Value) -> Result<(), DestinationError> {
            self.calls.lock().unwrap().push((url.to_string(), body.clone()));
            if url.contains("fail") {
                return Err(DestinationError::Rejected {
                    status: 500,
                    body: "boom".to_string(),
                });
            }
            if url.contains("slow") {
                return Err(DestinationError::Timeout);
            }
            Ok(())
        }
    }

    fn forwarded() -> ForwardedSignal {
        ForwardedSignal {
            signal: Signal {
                kind: SignalKind::Entry,
                ticker: "MNQ1!".to_string(),
                price: 21500.0,
                direction: None,
                stop_loss: None,
                take_profit: None,
                quantity: Some(2.0),
                pnl: None,
                strategy: None,
            },
            trade_id: Some(1),
            entry_price: Some(21500.0),
            pnl: None,
            pnl_percent: None,
        }
    }

    async fn forwarder(sink: Arc<RecordingSink>, settings: DestinationSettings) -> Forwarder {
        let pool = init_memory_database().await.unwrap();
        let activity = ActivityLog::new(Arc::new(SqliteActivityLogRepository::new(pool)));
        Forwarder::new(sink, settings, activity)
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let sink = Arc::new(RecordingSink::default());
        let settings = DestinationSettings {
            telegram: Some(TelegramConfig {
                api_base: "http://tg.local".to_string(),
                bot_token: Zeroizing::new("secret-token".to_string()),
                chat_id: "1".to_string(),
            }),
            discord_webhook_url: Some("http://discord.local/fail".to_string()),
            external_dashboard_url: Some("http://dash.local/slow".to_string()),
        };
        let forwarder = forwarder(sink.clone(), settings).await;

        let plan = RoutePlan {
            notify: true,
            broker_orders: vec![BrokerOrder {
                config_id: 1,
                config_name: "main".to_string(),
                webhook_urls: vec!["http://relay.local/a".to_string(), "http://relay.local/b".to_string()],
                token: "tok".to_string(),
                account_id: "acc".to_string(),
                symbol: "MNQZ5".to_string(),
                quantity: 1,
            }],
            skipped: vec![],
        };

        let reports = forwarder.dispatch(&plan, &forwarded()).await;
        assert_eq!(reports.len(), 5);
        assert_eq!(sink.calls.lock().unwrap().len(), 5);

        let ok = reports.iter().filter(|r| r.result.is_ok()).count();
        assert_eq!(ok, 3);
        assert!(reports.iter().all(|r| !r.target.contains("secret-token")));

        let relay_bodies: Vec<_> = sink
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(url, _)| url.starts_with("http://relay.local"))
            .map(|(_, body)| body.clone())
            .collect();
        assert_eq!(relay_bodies.len(), 2);
        assert_eq!(relay_bodies[0]["symbol"], "MNQZ5");
        assert_eq!(relay_bodies[0]["data"], "buy");
    }

    #[tokio::test]
    async fn test_unconfigured_destinations_are_skipped() {
        let sink = Arc::new(RecordingSink::default());
        let forwarder = forwarder(sink.clone(), DestinationSettings::default()).await;

        let plan = RoutePlan {
            notify: true,
            ..RoutePlan::default()
        };
        assert!(forwarder.dispatch(&plan, &forwarded()).await.is_empty());
        assert!(sink.calls.lock().unwrap().is_empty());
    }
}
