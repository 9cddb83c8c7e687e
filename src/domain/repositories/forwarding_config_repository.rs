use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::RepositoryResult;
use crate::domain::entities::forwarding_config::{ForwardingConfig, ForwardingConfigInput};

#[async_trait]
pub trait ForwardingConfigRepository: Send + Sync {
    async fn list(&self) -> RepositoryResult<Vec<ForwardingConfig>>;

    async fn list_enabled(&self) -> RepositoryResult<Vec<ForwardingConfig>>;

    async fn get(&self, id: i64) -> RepositoryResult<Option<ForwardingConfig>>;

    async fn create(&self, input: ForwardingConfigInput) -> RepositoryResult<ForwardingConfig>;

    async fn update(
        &self,
        id: i64,
        input: ForwardingConfigInput,
    ) -> RepositoryResult<Option<ForwardingConfig>>;

    async fn delete(&self, id: i64) -> RepositoryResult<bool>;

    async fn set_paused_until(
        &self,
        id: i64,
        paused_until: Option<DateTime<Utc>>,
    ) -> RepositoryResult<Option<ForwardingConfig>>;
}
