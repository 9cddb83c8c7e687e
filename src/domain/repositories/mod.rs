pub mod activity_log_repository;
pub mod destination_sink;
pub mod forwarding_config_repository;
pub mod trade_repository;

use thiserror::Error;

pub use activity_log_repository::ActivityLogRepository;
pub use destination_sink::DestinationSink;
pub use forwarding_config_repository::ForwardingConfigRepository;
pub use trade_repository::{TradeFilter, TradeRepository};

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RepositoryError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}
