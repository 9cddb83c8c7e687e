//! Database Repository
//!
//! SQLite implementations of the domain repository traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, error};

use super::models::*;
use super::DbPool;
use crate::domain::entities::activity::{ActivityEntry, LogCategory, LogLevel};
use crate::domain::entities::forwarding_config::{ForwardingConfig, ForwardingConfigInput};
use crate::domain::entities::trade::{
    EventType, ExitReason, NewTrade, Trade, TradeClose, TradeEvent,
};
use crate::domain::repositories::{
    ActivityLogRepository, ForwardingConfigRepository, RepositoryError, RepositoryResult,
    TradeFilter, TradeRepository,
};

fn query_failed(context: &'static str) -> impl Fn(sqlx::Error) -> RepositoryError {
    move |e| {
        error!("Failed to {}: {}", context, e);
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                RepositoryError::Unavailable(format!("Failed to {}: {}", context, e))
            }
            other => RepositoryError::Query(format!("Failed to {}: {}", context, other)),
        }
    }
}

fn to_json_text<T: serde::Serialize>(value: &T) -> RepositoryResult<String> {
    serde_json::to_string(value)
        .map_err(|e| RepositoryError::Query(format!("Failed to serialize JSON column: {}", e)))
}

fn into_trades(rows: Vec<TradeRow>) -> RepositoryResult<Vec<Trade>> {
    rows.into_iter().map(Trade::try_from).collect()
}

/// Trade repository
#[derive(Clone)]
pub struct SqliteTradeRepository {
    pool: DbPool,
}

impl SqliteTradeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const TRADE_FILTER: &str = "(?1 IS NULL OR ticker = ?1) AND (?2 IS NULL OR status = ?2) AND (?3 IS NULL OR strategy = ?3)";

#[async_trait]
impl TradeRepository for SqliteTradeRepository {
    async fn create_open_trade(
        &self,
        trade: NewTrade,
        payload: &serde_json::Value,
    ) -> RepositoryResult<Trade> {
        let now = Utc::now();
        let payload_json = to_json_text(payload)?;

        let mut tx = self.pool.begin().await.map_err(query_failed("begin transaction"))?;

        let row = sqlx::query_as::<_, TradeRow>(
            r#"
            INSERT INTO trades (
                ticker, direction, entry_price, stop_loss, take_profit,
                quantity, strategy, status, opened_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'open', ?8)
            RETURNING *
            "#,
        )
        .bind(&trade.ticker)
        .bind(trade.direction.as_str())
        .bind(trade.entry_price)
        .bind(trade.stop_loss)
        .bind(trade.take_profit)
        .bind(trade.quantity)
        .bind(&trade.strategy)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(query_failed("create trade"))?;

        sqlx::query(
            r#"
            INSERT INTO trade_events (trade_id, event_type, price, raw_payload, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(row.id)
        .bind(EventType::Entry.as_str())
        .bind(trade.entry_price)
        .bind(&payload_json)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(query_failed("create entry event"))?;

        tx.commit().await.map_err(query_failed("commit trade"))?;

        debug!("Created trade: {} for {}", row.id, row.ticker);
        Trade::try_from(row)
    }

    async fn find_open_trades_since(
        &self,
        ticker: &str,
        strategy: Option<&str>,
        since: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Trade>> {
        let rows = sqlx::query_as::<_, TradeRow>(
            r#"
            SELECT * FROM trades
            WHERE ticker = ?1 AND strategy IS ?2 AND status = 'open' AND opened_at >= ?3
            ORDER BY id ASC
            "#,
        )
        .bind(ticker)
        .bind(strategy)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed("find recent open trades"))?;

        into_trades(rows)
    }

    async fn find_open_trades(&self, ticker: &str) -> RepositoryResult<Vec<Trade>> {
        let rows = sqlx::query_as::<_, TradeRow>(
            "SELECT * FROM trades WHERE ticker = ?1 AND status = 'open' ORDER BY id ASC",
        )
        .bind(ticker)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed("find open trades"))?;

        into_trades(rows)
    }

    async fn find_recent_event_trade(
        &self,
        ticker: &str,
        strategy: Option<&str>,
        event_type: EventType,
        since: DateTime<Utc>,
    ) -> RepositoryResult<Option<Trade>> {
        let row = sqlx::query_as::<_, TradeRow>(
            r#"
            SELECT t.* FROM trade_events e
            JOIN trades t ON t.id = e.trade_id
            WHERE t.ticker = ?1
              AND t.strategy IS ?2
              AND e.event_type = ?3
              AND e.created_at >= ?4
            ORDER BY e.id DESC
            LIMIT 1
            "#,
        )
        .bind(ticker)
        .bind(strategy)
        .bind(event_type.as_str())
        .bind(since)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed("find recent trade event"))?;

        row.map(Trade::try_from).transpose()
    }

    async fn find_recently_closed(
        &self,
        ticker: &str,
        strategy: Option<&str>,
        reason: ExitReason,
        since: DateTime<Utc>,
    ) -> RepositoryResult<Option<Trade>> {
        let row = sqlx::query_as::<_, TradeRow>(
            r#"
            SELECT * FROM trades
            WHERE ticker = ?1
              AND (?2 IS NULL OR strategy = ?2)
              AND status = 'closed'
              AND exit_reason = ?3
              AND closed_at >= ?4
            ORDER BY closed_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(ticker)
        .bind(strategy)
        .bind(reason.as_str())
        .bind(since)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed("find recently closed trade"))?;

        row.map(Trade::try_from).transpose()
    }

    async fn close_trade(
        &self,
        id: i64,
        close: TradeClose,
        payload: &serde_json::Value,
    ) -> RepositoryResult<Option<Trade>> {
        let payload_json = to_json_text(payload)?;
        let mut tx = self.pool.begin().await.map_err(query_failed("begin transaction"))?;

        let row = sqlx::query_as::<_, TradeRow>(
            r#"
            UPDATE trades
            SET status = 'closed', exit_price = ?1, exit_reason = ?2,
                pnl = ?3, pnl_percent = ?4, closed_at = ?5
            WHERE id = ?6 AND status = 'open'
            RETURNING *
            "#,
        )
        .bind(close.exit_price)
        .bind(close.exit_reason.as_str())
        .bind(close.pnl)
        .bind(close.pnl_percent)
        .bind(close.closed_at)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(query_failed("close trade"))?;

        let Some(row) = row else {
            debug!("Trade {} not open, close skipped", id);
            return Ok(None);
        };

        sqlx::query(
            r#"
            INSERT INTO trade_events (trade_id, event_type, price, raw_payload, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(id)
        .bind(close.exit_reason.event_type().as_str())
        .bind(close.exit_price)
        .bind(&payload_json)
        .bind(close.closed_at)
        .execute(&mut *tx)
        .await
        .map_err(query_failed("create exit event"))?;

        tx.commit().await.map_err(query_failed("commit close"))?;

        debug!("Closed trade: {}", id);
        Trade::try_from(row).map(Some)
    }

    async fn delete_trade(&self, id: i64) -> RepositoryResult<bool> {
        let rows_affected = sqlx::query("DELETE FROM trades WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(query_failed("delete trade"))?
            .rows_affected();

        debug!("Deleted trade {} ({} rows)", id, rows_affected);
        Ok(rows_affected > 0)
    }

    async fn get_trade(&self, id: i64) -> RepositoryResult<Option<Trade>> {
        let row = sqlx::query_as::<_, TradeRow>("SELECT * FROM trades WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed("get trade"))?;

        row.map(Trade::try_from).transpose()
    }

    async fn list_trades(
        &self,
        filter: &TradeFilter,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<Trade>> {
        let sql = format!(
            "SELECT * FROM trades WHERE {} ORDER BY opened_at DESC, id DESC LIMIT ?4 OFFSET ?5",
            TRADE_FILTER
        );
        let rows = sqlx::query_as::<_, TradeRow>(&sql)
            .bind(&filter.ticker)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(&filter.strategy)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed("list trades"))?;

        into_trades(rows)
    }

    async fn count_trades(&self, filter: &TradeFilter) -> RepositoryResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM trades WHERE {}", TRADE_FILTER);
        let (count,): (i64,) = sqlx::query_as(&sql)
            .bind(&filter.ticker)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(&filter.strategy)
            .fetch_one(&self.pool)
            .await
            .map_err(query_failed("count trades"))?;

        Ok(count)
    }

    async fn all_trades(&self, filter: &TradeFilter) -> RepositoryResult<Vec<Trade>> {
        let sql = format!("SELECT * FROM trades WHERE {} ORDER BY id ASC", TRADE_FILTER);
        let rows = sqlx::query_as::<_, TradeRow>(&sql)
            .bind(&filter.ticker)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(&filter.strategy)
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed("load trades"))?;

        into_trades(rows)
    }

    async fn list_events(&self, trade_id: i64) -> RepositoryResult<Vec<TradeEvent>> {
        let rows = sqlx::query_as::<_, TradeEventRow>(
            "SELECT * FROM trade_events WHERE trade_id = ?1 ORDER BY created_at ASC, id ASC",
        )
        .bind(trade_id)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed("list trade events"))?;

        rows.into_iter().map(TradeEvent::try_from).collect()
    }
}

/// Forwarding config repository
#[derive(Clone)]
pub struct SqliteForwardingConfigRepository {
    pool: DbPool,
}

impl SqliteForwardingConfigRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ForwardingConfigRepository for SqliteForwardingConfigRepository {
    async fn list(&self) -> RepositoryResult<Vec<ForwardingConfig>> {
        let rows = sqlx::query_as::<_, ForwardingConfigRow>(
            "SELECT * FROM forwarding_configs ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed("list forwarding configs"))?;

        rows.into_iter().map(ForwardingConfig::try_from).collect()
    }

    async fn list_enabled(&self) -> RepositoryResult<Vec<ForwardingConfig>> {
        let rows = sqlx::query_as::<_, ForwardingConfigRow>(
            "SELECT * FROM forwarding_configs WHERE enabled = 1 ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed("list enabled forwarding configs"))?;

        rows.into_iter().map(ForwardingConfig::try_from).collect()
    }

    async fn get(&self, id: i64) -> RepositoryResult<Option<ForwardingConfig>> {
        let row = sqlx::query_as::<_, ForwardingConfigRow>(
            "SELECT * FROM forwarding_configs WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed("get forwarding config"))?;

        row.map(ForwardingConfig::try_from).transpose()
    }

    async fn create(&self, input: ForwardingConfigInput) -> RepositoryResult<ForwardingConfig> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, ForwardingConfigRow>(
            r#"
            INSERT INTO forwarding_configs (
                name, enabled, webhook_urls, allowed_tickers, symbol_map,
                risk_percentage, rounding_mode, token, account_id,
                paused_until, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL, ?10, ?10)
            RETURNING *
            "#,
        )
        .bind(&input.name)
        .bind(input.enabled)
        .bind(to_json_text(&input.webhook_urls)?)
        .bind(to_json_text(&input.allowed_tickers)?)
        .bind(to_json_text(&input.symbol_map)?)
        .bind(input.risk_percentage)
        .bind(input.rounding_mode.as_str())
        .bind(&input.token)
        .bind(&input.account_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(query_failed("create forwarding config"))?;

        debug!("Created forwarding config: {} ({})", row.id, row.name);
        ForwardingConfig::try_from(row)
    }

    async fn update(
        &self,
        id: i64,
        input: ForwardingConfigInput,
    ) -> RepositoryResult<Option<ForwardingConfig>> {
        let row = sqlx::query_as::<_, ForwardingConfigRow>(
            r#"
            UPDATE forwarding_configs
            SET name = ?1, enabled = ?2, webhook_urls = ?3, allowed_tickers = ?4,
                symbol_map = ?5, risk_percentage = ?6, rounding_mode = ?7,
                token = ?8, account_id = ?9, updated_at = ?10
            WHERE id = ?11
            RETURNING *
            "#,
        )
        .bind(&input.name)
        .bind(input.enabled)
        .bind(to_json_text(&input.webhook_urls)?)
        .bind(to_json_text(&input.allowed_tickers)?)
        .bind(to_json_text(&input.symbol_map)?)
        .bind(input.risk_percentage)
        .bind(input.rounding_mode.as_str())
        .bind(&input.token)
        .bind(&input.account_id)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed("update forwarding config"))?;

        row.map(ForwardingConfig::try_from).transpose()
    }

    async fn delete(&self, id: i64) -> RepositoryResult<bool> {
        let rows_affected = sqlx::query("DELETE FROM forwarding_configs WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(query_failed("delete forwarding config"))?
            .rows_affected();

        Ok(rows_affected > 0)
    }

    async fn set_paused_until(
        &self,
        id: i64,
        paused_until: Option<DateTime<Utc>>,
    ) -> RepositoryResult<Option<ForwardingConfig>> {
        let row = sqlx::query_as::<_, ForwardingConfigRow>(
            r#"
            UPDATE forwarding_configs
            SET paused_until = ?1, updated_at = ?2
            WHERE id = ?3
            RETURNING *
            "#,
        )
        .bind(paused_until)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed("pause forwarding config"))?;

        row.map(ForwardingConfig::try_from).transpose()
    }
}

/// Activity log repository
#[derive(Clone)]
pub struct SqliteActivityLogRepository {
    pool: DbPool,
}

impl SqliteActivityLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivityLogRepository for SqliteActivityLogRepository {
    async fn append(
        &self,
        level: LogLevel,
        category: LogCategory,
        message: &str,
        metadata: &serde_json::Value,
    ) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO activity_log (level, category, message, metadata, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(level.as_str())
        .bind(category.as_str())
        .bind(message)
        .bind(to_json_text(metadata)?)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(query_failed("append activity log"))?;

        Ok(())
    }

    async fn recent(
        &self,
        category: Option<LogCategory>,
        limit: i64,
    ) -> RepositoryResult<Vec<ActivityEntry>> {
        let rows = sqlx::query_as::<_, ActivityLogRow>(
            r#"
            SELECT * FROM activity_log
            WHERE (?1 IS NULL OR category = ?1)
            ORDER BY id DESC
            LIMIT ?2
            "#,
        )
        .bind(category.map(|c| c.as_str()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed("read activity log"))?;

        rows.into_iter().map(ActivityEntry::try_from).collect()
    }

    async fn prune(&self, keep: i64) -> RepositoryResult<u64> {
        let removed = sqlx::query(
            r#"
            DELETE FROM activity_log
            WHERE id NOT IN (SELECT id FROM activity_log ORDER BY id DESC LIMIT ?1)
            "#,
        )
        .bind(keep)
        .execute(&self.pool)
        .await
        .map_err(query_failed("prune activity log"))?
        .rows_affected();

        Ok(removed)
    }
}
