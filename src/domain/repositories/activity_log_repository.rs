use async_trait::async_trait;

use super::RepositoryResult;
use crate::domain::entities::activity::{ActivityEntry, LogCategory, LogLevel};

#[async_trait]
pub trait ActivityLogRepository: Send + Sync {
    async fn append(
        &self,
        level: LogLevel,
        category: LogCategory,
        message: &str,
        metadata: &serde_json::Value,
    ) -> RepositoryResult<()>;

    /// Newest first.
    async fn recent(
        &self,
        category: Option<LogCategory>,
        limit: i64,
    ) -> RepositoryResult<Vec<ActivityEntry>>;

    /// Drop everything but the newest `keep` rows. Returns rows removed.
    async fn prune(&self, keep: i64) -> RepositoryResult<u64>;
}
