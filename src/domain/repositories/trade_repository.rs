//! Trade Repository Trait
//!
//! Persistence seam for trades and their events. The lifecycle manager only
//! relies on single-row atomicity plus the two composite writes below
//! (create-with-event and close-with-event), which implementations must run
//! in one transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::RepositoryResult;
use crate::domain::entities::trade::{
    EventType, ExitReason, NewTrade, Trade, TradeClose, TradeEvent, TradeStatus,
};

/// Filter for operator listings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeFilter {
    pub ticker: Option<String>,
    pub status: Option<TradeStatus>,
    pub strategy: Option<String>,
}

#[async_trait]
pub trait TradeRepository: Send + Sync {
    /// Insert an open trade and its `entry` event.
    async fn create_open_trade(
        &self,
        trade: NewTrade,
        payload: &serde_json::Value,
    ) -> RepositoryResult<Trade>;

    /// Open trades for `(ticker, strategy)` opened at or after `since`,
    /// oldest first (ties broken by id).
    async fn find_open_trades_since(
        &self,
        ticker: &str,
        strategy: Option<&str>,
        since: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Trade>>;

    /// All open trades for a ticker regardless of strategy, oldest first.
    async fn find_open_trades(&self, ticker: &str) -> RepositoryResult<Vec<Trade>>;

    /// Trade owning the most recent event of `event_type` created at or after
    /// `since`, keyed on `(ticker, strategy)`: `strategy = None` matches only
    /// trades without a strategy.
    async fn find_recent_event_trade(
        &self,
        ticker: &str,
        strategy: Option<&str>,
        event_type: EventType,
        since: DateTime<Utc>,
    ) -> RepositoryResult<Option<Trade>>;

    /// Most recently closed trade with `reason` closed at or after `since`.
    /// `strategy = None` matches any strategy on the ticker.
    async fn find_recently_closed(
        &self,
        ticker: &str,
        strategy: Option<&str>,
        reason: ExitReason,
        since: DateTime<Utc>,
    ) -> RepositoryResult<Option<Trade>>;

    /// Close an open trade and append its exit event. Returns `None` when the
    /// trade is missing or no longer open; nothing is written in that case.
    async fn close_trade(
        &self,
        id: i64,
        close: TradeClose,
        payload: &serde_json::Value,
    ) -> RepositoryResult<Option<Trade>>;

    /// Delete a trade and, by cascade, its events. Returns whether a row went away.
    async fn delete_trade(&self, id: i64) -> RepositoryResult<bool>;

    async fn get_trade(&self, id: i64) -> RepositoryResult<Option<Trade>>;

    /// Newest first.
    async fn list_trades(
        &self,
        filter: &TradeFilter,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<Trade>>;

    async fn count_trades(&self, filter: &TradeFilter) -> RepositoryResult<i64>;

    /// Every trade matching `filter`, for statistics.
    async fn all_trades(&self, filter: &TradeFilter) -> RepositoryResult<Vec<Trade>>;

    /// Oldest first.
    async fn list_events(&self, trade_id: i64) -> RepositoryResult<Vec<TradeEvent>>;
}
