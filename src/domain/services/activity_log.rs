//! Operator activity log
//!
//! Every received signal, parse outcome, lifecycle decision and forwarding
//! attempt is written here as well as to `tracing`. Writes never fail the
//! caller; storage problems are only reported through `tracing`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::entities::activity::{ActivityEntry, LogCategory, LogLevel};
use crate::domain::repositories::{ActivityLogRepository, RepositoryResult};

/// Rows retained after pruning.
pub const ACTIVITY_LOG_CAPACITY: i64 = 1000;

/// Prune once every this many appends.
const PRUNE_EVERY: u64 = 50;

#[derive(Clone)]
pub struct ActivityLog {
    repository: Arc<dyn ActivityLogRepository>,
    appends: Arc<AtomicU64>,
    capacity: i64,
}

impl ActivityLog {
    pub fn new(repository: Arc<dyn ActivityLogRepository>) -> Self {
        Self {
            repository,
            appends: Arc::new(AtomicU64::new(0)),
            capacity: ACTIVITY_LOG_CAPACITY,
        }
    }

    pub fn with_capacity(mut self, capacity: i64) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub async fn record(
        &self,
        level: LogLevel,
        category: LogCategory,
        message: impl AsRef<str>,
        metadata: serde_json::Value,
    ) {
        let message = message.as_ref();
        if let Err(e) = self
            .repository
            .append(level, category, message, &metadata)
            .await
        {
            warn!("Failed to write activity log ({}): {}", category.as_str(), e);
            return;
        }

        let count = self.appends.fetch_add(1, Ordering::Relaxed) + 1;
        if count % PRUNE_EVERY == 0 {
            match self.repository.prune(self.capacity).await {
                Ok(0) => {}
                Ok(removed) => debug!("Pruned {} activity log rows", removed),
                Err(e) => warn!("Failed to prune activity log: {}", e),
            }
        }
    }

    pub async fn info(&self, category: LogCategory, message: impl AsRef<str>, metadata: serde_json::Value) {
        self.record(LogLevel::Info, category, message, metadata).await
    }

    pub async fn warn(&self, category: LogCategory, message: impl AsRef<str>, metadata: serde_json::Value) {
        self.record(LogLevel::Warn, category, message, metadata).await
    }

    pub async fn error(&self, category: LogCategory, message: impl AsRef<str>, metadata: serde_json::Value) {
        self.record(LogLevel::Error, category, message, metadata).await
    }

    pub async fn recent(
        &self,
        category: Option<LogCategory>,
        limit: i64,
    ) -> RepositoryResult<Vec<ActivityEntry>> {
        self.repository.recent(category, limit).await
    }
}
