use chrono::Duration;
use std::sync::Arc;

use super::services::broadcast::BroadcastRegistry;
use super::services::ingestion_service::IngestionService;
use crate::auth::ApiKeys;
use crate::config::AppConfig;
use crate::domain::repositories::{DestinationSink, ForwardingConfigRepository, TradeRepository};
use crate::domain::services::activity_log::ActivityLog;
use crate::domain::services::trade_lifecycle::TradeLifecycleManager;
use crate::infrastructure::forwarder::{DestinationSettings, Forwarder};
use crate::persistence::repository::{
    SqliteActivityLogRepository, SqliteForwardingConfigRepository, SqliteTradeRepository,
};
use crate::persistence::DbPool;

/// Shared handler state. Cloned per request, every field is a handle.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub trades: Arc<dyn TradeRepository>,
    pub configs: Arc<dyn ForwardingConfigRepository>,
    pub lifecycle: Arc<TradeLifecycleManager>,
    pub ingestion: Arc<IngestionService>,
    pub activity: ActivityLog,
    pub broadcaster: BroadcastRegistry,
    pub api_keys: ApiKeys,
    pub destinations: DestinationSettings,
}

impl AppState {
    /// Wire repositories and services over one pool.
    pub fn new(pool: DbPool, config: &AppConfig, sink: Arc<dyn DestinationSink>) -> Self {
        let trades: Arc<dyn TradeRepository> = Arc::new(SqliteTradeRepository::new(pool.clone()));
        let configs: Arc<dyn ForwardingConfigRepository> =
            Arc::new(SqliteForwardingConfigRepository::new(pool.clone()));
        let activity = ActivityLog::new(Arc::new(SqliteActivityLogRepository::new(pool.clone())));
        let broadcaster = BroadcastRegistry::new();

        let lifecycle = Arc::new(
            TradeLifecycleManager::new(trades.clone())
                .with_dedup_window(Duration::seconds(config.dedup_window_secs)),
        );
        let forwarder = Forwarder::new(sink, config.destinations.clone(), activity.clone());
        let ingestion = Arc::new(IngestionService::new(
            config.webhook_secret.clone(),
            lifecycle.clone(),
            configs.clone(),
            forwarder,
            broadcaster.clone(),
            activity.clone(),
        ));

        Self {
            pool,
            trades,
            configs,
            lifecycle,
            ingestion,
            activity,
            broadcaster,
            api_keys: config.api_keys.clone(),
            destinations: config.destinations.clone(),
        }
    }
}
