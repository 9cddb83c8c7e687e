//! Webhook ingestion
//!
//! Orchestrates one inbound alert: classify the body, check the shared
//! secret, validate, apply it to the trade book, push a live update and
//! hand the result to the forwarder. The caller is answered as soon as the
//! trade book reflects the signal; forwarding runs on its own task.

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

use super::broadcast::{BroadcastRegistry, LiveEvent};
use crate::domain::entities::activity::LogCategory;
use crate::domain::entities::signal::Signal;
use crate::domain::errors::{ParseError, ValidationError};
use crate::domain::repositories::ForwardingConfigRepository;
use crate::domain::services::activity_log::ActivityLog;
use crate::domain::services::forwarding_router::{plan_routes, ForwardedSignal};
use crate::domain::services::payload_normalizer::InboundPayload;
use crate::domain::services::trade_lifecycle::{
    LifecycleError, LifecycleOutcome, TradeLifecycleManager,
};
use crate::infrastructure::forwarder::{DeliveryReport, Forwarder};
use crate::secrets::constant_time_eq;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Invalid webhook secret")]
    Unauthorized,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to process signal: {0}")]
    Repository(#[from] LifecycleError),
}

/// Body returned to the alert sender.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub success: bool,
    pub message: String,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_id: Option<i64>,
}

#[derive(Debug)]
pub struct IngestReceipt {
    pub signal: Signal,
    pub outcome: LifecycleOutcome,
    /// Background forwarding, if anything was forwarded. Dropping the
    /// handle detaches the task.
    pub forwarding: Option<JoinHandle<Vec<DeliveryReport>>>,
}

impl IngestReceipt {
    pub fn response(&self) -> IngestResponse {
        IngestResponse {
            success: true,
            message: self.outcome.message(&self.signal),
            outcome: self.outcome.as_str(),
            trade_id: self.outcome.trade().map(|t| t.id),
        }
    }
}

pub struct IngestionService {
    webhook_secret: Option<Zeroizing<String>>,
    lifecycle: Arc<TradeLifecycleManager>,
    configs: Arc<dyn ForwardingConfigRepository>,
    forwarder: Forwarder,
    broadcaster: BroadcastRegistry,
    activity: ActivityLog,
}

impl IngestionService {
    pub fn new(
        webhook_secret: Option<Zeroizing<String>>,
        lifecycle: Arc<TradeLifecycleManager>,
        configs: Arc<dyn ForwardingConfigRepository>,
        forwarder: Forwarder,
        broadcaster: BroadcastRegistry,
        activity: ActivityLog,
    ) -> Self {
        Self {
            webhook_secret,
            lifecycle,
            configs,
            forwarder,
            broadcaster,
            activity,
        }
    }

    pub fn secret_configured(&self) -> bool {
        self.webhook_secret.is_some()
    }

    /// Free text carries no secret field, so it is trusted as-is; a bare JSON
    /// object must present the configured secret.
    fn authorize(&self, payload: &InboundPayload) -> bool {
        let Some(expected) = &self.webhook_secret else {
            return true;
        };
        match payload.secret() {
            Some(presented) => constant_time_eq(presented, expected),
            None => payload.is_text(),
        }
    }

    pub async fn ingest(&self, body: &str) -> Result<IngestReceipt, IngestError> {
        let payload = match InboundPayload::parse(body) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Unparseable webhook body: {}", e);
                self.activity
                    .error(
                        LogCategory::Webhook,
                        format!("Failed to parse webhook: {}", e),
                        json!({"body": truncated(body)}),
                    )
                    .await;
                return Err(e.into());
            }
        };

        if !self.authorize(&payload) {
            warn!("Rejected webhook with invalid secret");
            self.activity
                .warn(LogCategory::Webhook, "Rejected webhook: invalid secret", json!(null))
                .await;
            return Err(IngestError::Unauthorized);
        }

        let signal = match payload.into_signal() {
            Ok(signal) => signal,
            Err(e) => {
                warn!("Invalid webhook signal: {}", e);
                self.activity
                    .error(LogCategory::Webhook, format!("Invalid signal: {}", e), json!(null))
                    .await;
                return Err(e.into());
            }
        };

        info!(
            "📨 Received {} signal for {} @ {} (strategy: {})",
            signal.kind,
            signal.ticker,
            signal.price,
            signal.strategy.as_deref().unwrap_or("-")
        );
        self.activity
            .info(
                LogCategory::Webhook,
                format!("Received {} for {} @ {}", signal.action(), signal.ticker, signal.price),
                signal.to_payload(),
            )
            .await;

        let outcome = match self.lifecycle.apply(&signal).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Lifecycle failed for {} {}: {}", signal.action(), signal.ticker, e);
                self.activity
                    .error(
                        LogCategory::System,
                        format!("Failed to process {} for {}: {}", signal.action(), signal.ticker, e),
                        json!(null),
                    )
                    .await;
                return Err(e.into());
            }
        };

        self.record_outcome(&signal, &outcome).await;
        self.broadcaster.broadcast(&LiveEvent::TradeUpdate {
            outcome: outcome.as_str().to_string(),
            trade: outcome.trade().cloned(),
        });

        let forwarding = outcome.should_forward().then(|| self.spawn_forwarding(&signal, &outcome));

        Ok(IngestReceipt {
            signal,
            outcome,
            forwarding,
        })
    }

    async fn record_outcome(&self, signal: &Signal, outcome: &LifecycleOutcome) {
        let message = outcome.message(signal);
        let metadata = json!({
            "outcome": outcome.as_str(),
            "ticker": signal.ticker,
            "strategy": signal.strategy,
            "tradeId": outcome.trade().map(|t| t.id),
        });
        match outcome {
            LifecycleOutcome::Opened(_) | LifecycleOutcome::Closed(_) => {
                self.activity.info(LogCategory::Webhook, message, metadata).await
            }
            LifecycleOutcome::Ignored(_) => {
                debug!("{}", message);
                self.activity.info(LogCategory::Webhook, message, metadata).await
            }
            _ => {
                warn!("{}", message);
                self.activity.warn(LogCategory::Webhook, message, metadata).await
            }
        }
    }

    fn spawn_forwarding(
        &self,
        signal: &Signal,
        outcome: &LifecycleOutcome,
    ) -> JoinHandle<Vec<DeliveryReport>> {
        let forwarder = self.forwarder.clone();
        let configs = self.configs.clone();
        let outcome = outcome.clone();
        let signal = signal.clone();

        tokio::spawn(async move {
            let enabled = match configs.list_enabled().await {
                Ok(enabled) => enabled,
                Err(e) => {
                    error!("Failed to load forwarding configs, broker relay skipped: {}", e);
                    Vec::new()
                }
            };
            let plan = plan_routes(&outcome, &signal, &enabled, Utc::now());
            let forwarded = ForwardedSignal::new(signal, &outcome);
            forwarder.dispatch(&plan, &forwarded).await
        })
    }
}

fn truncated(body: &str) -> String {
    body.chars().take(500).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::DestinationError;
    use crate::domain::repositories::DestinationSink;
    use crate::infrastructure::forwarder::DestinationSettings;
    use crate::persistence::init_memory_database;
    use crate::persistence::repository::{
        SqliteActivityLogRepository, SqliteForwardingConfigRepository, SqliteTradeRepository,
    };
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        urls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DestinationSink for RecordingSink {
        async fn send(&self, url: &str, _body: &serde_json::Value) -> Result<(), DestinationError> {
            self.urls.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    async fn service(secret: Option<&str>) -> (IngestionService, Arc<RecordingSink>, BroadcastRegistry) {
        let pool = init_memory_database().await.unwrap();
        let activity = ActivityLog::new(Arc::new(SqliteActivityLogRepository::new(pool.clone())));
        let lifecycle = Arc::new(TradeLifecycleManager::new(Arc::new(SqliteTradeRepository::new(
            pool.clone(),
        ))));
        let sink = Arc::new(RecordingSink::default());
        let settings = DestinationSettings {
            discord_webhook_url: Some("http://discord.local/hook".to_string()),
            ..DestinationSettings::default()
        };
        let forwarder = Forwarder::new(sink.clone(), settings, activity.clone());
        let broadcaster = BroadcastRegistry::new();
        let service = IngestionService::new(
            secret.map(|s| Zeroizing::new(s.to_string())),
            lifecycle,
            Arc::new(SqliteForwardingConfigRepository::new(pool)),
            forwarder,
            broadcaster.clone(),
            activity,
        );
        (service, sink, broadcaster)
    }

    #[tokio::test]
    async fn test_json_entry_opens_and_forwards() {
        let (service, sink, _) = service(None).await;
        let receipt = service
            .ingest(r#"{"action":"entry","ticker":"MNQ1!","price":"21500","direction":"long"}"#)
            .await
            .unwrap();

        assert_eq!(receipt.outcome.as_str(), "opened");
        let response = receipt.response();
        assert_eq!(response.message, "entry processed successfully");
        assert!(response.trade_id.is_some());

        let reports = receipt.forwarding.unwrap().await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(sink.urls.lock().unwrap().as_slice(), ["http://discord.local/hook"]);
    }

    #[tokio::test]
    async fn test_secret_rules() {
        let (service, _, _) = service(Some("s3cret-value")).await;

        let err = service
            .ingest(r#"{"action":"entry","ticker":"ES1!","price":5000}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Unauthorized));

        let err = service
            .ingest(r#"{"secret":"wrong","action":"entry","ticker":"ES1!","price":5000}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Unauthorized));

        let ok = service
            .ingest(r#"{"secret":"s3cret-value","action":"entry","ticker":"ES1!","price":5000}"#)
            .await
            .unwrap();
        assert_eq!(ok.outcome.as_str(), "opened");
    }

    #[tokio::test]
    async fn test_unauthorized_caller_learns_nothing_about_fields() {
        let (service, _, _) = service(Some("s3cret-value")).await;
        let err = service.ingest(r#"{"ticker":"ES1!"}"#).await.unwrap_err();
        assert!(matches!(err, IngestError::Unauthorized));
    }

    #[tokio::test]
    async fn test_validation_and_parse_errors() {
        let (service, _, _) = service(None).await;
        let err = service.ingest(r#"{"action":"entry","ticker":"ES1!"}"#).await.unwrap_err();
        assert!(matches!(err, IngestError::Validation(_)));

        let err = service.ingest("").await.unwrap_err();
        assert!(matches!(err, IngestError::Parse(_)));
    }

    #[tokio::test]
    async fn test_duplicate_is_not_forwarded_and_is_broadcast() {
        let (service, sink, broadcaster) = service(None).await;
        let mut live = broadcaster.register();
        let body = r#"{"action":"entry","ticker":"CL1!","price":70.5,"strategy":"S1"}"#;

        let first = service.ingest(body).await.unwrap();
        first.forwarding.unwrap().await.unwrap();

        let second = service.ingest(body).await.unwrap();
        assert_eq!(second.outcome.as_str(), "duplicate");
        assert!(second.forwarding.is_none());
        assert_eq!(sink.urls.lock().unwrap().len(), 1);

        let first_event: serde_json::Value =
            serde_json::from_str(&live.receiver.recv().await.unwrap()).unwrap();
        assert_eq!(first_event["outcome"], "opened");
        let second_event: serde_json::Value =
            serde_json::from_str(&live.receiver.recv().await.unwrap()).unwrap();
        assert_eq!(second_event["outcome"], "duplicate");
    }

    #[tokio::test]
    async fn test_order_management_acknowledged_only() {
        let (service, sink, _) = service(None).await;
        let receipt = service
            .ingest(r#"{"action":"entry","orderType":"LMT","ticker":"NQ1!","price":21000}"#)
            .await
            .unwrap();
        assert_eq!(receipt.outcome.as_str(), "ignored");
        assert!(receipt.response().trade_id.is_none());
        assert!(receipt.forwarding.is_none());
        assert!(sink.urls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exit_without_trade() {
        let (service, _, _) = service(None).await;
        let receipt = service
            .ingest(r#"{"action":"take_profit","ticker":"GC1!","price":2400}"#)
            .await
            .unwrap();
        assert_eq!(receipt.outcome.as_str(), "no_open_trade");
        assert_eq!(receipt.response().message, "No open trade found for GC1!");
    }
}
