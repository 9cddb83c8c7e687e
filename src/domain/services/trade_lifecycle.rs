//! Trade lifecycle manager
//!
//! Applies a normalized signal to the trade book. Each `(ticker, strategy)`
//! key moves through no-trade -> open -> closed.
//!
//! # Deduplication
//!
//! Alerts are redelivered and occasionally race each other, and the store
//! only guarantees single-row atomicity. Entries are therefore created
//! optimistically and reconciled afterwards: every caller re-reads the open
//! trades for its key inside the dedup window, ordered by id, and deletes
//! all but the first. Every caller that observes the same rows agrees on the
//! survivor, so at most one open trade per key outlives the reconciliation
//! step. A caller whose own row was deleted reports `Duplicate` and must not
//! forward the signal.
//!
//! Exits are deduplicated by looking for an exit event of the same type on
//! the key inside the window, and the close itself is conditional on the
//! trade still being open.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::entities::signal::{Signal, SignalKind};
use crate::domain::entities::trade::{ExitReason, NewTrade, Trade, TradeClose};
use crate::domain::repositories::{RepositoryError, TradeRepository};

pub const DEFAULT_DEDUP_WINDOW_SECS: i64 = 60;

/// Result of applying one signal. Only `Opened` and `Closed` are forwarded.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleOutcome {
    Opened(Trade),
    Closed(Trade),
    /// Redelivery or lost race; carries the trade that already reflects it.
    Duplicate(Trade),
    /// Exit signal that could not be tied to exactly one open trade.
    Unmatched { reason: String },
    NoOpenTrade,
    /// Order-management signal, acknowledged without touching the book.
    Ignored(SignalKind),
}

impl LifecycleOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleOutcome::Opened(_) => "opened",
            LifecycleOutcome::Closed(_) => "closed",
            LifecycleOutcome::Duplicate(_) => "duplicate",
            LifecycleOutcome::Unmatched { .. } => "unmatched",
            LifecycleOutcome::NoOpenTrade => "no_open_trade",
            LifecycleOutcome::Ignored(_) => "ignored",
        }
    }

    pub fn trade(&self) -> Option<&Trade> {
        match self {
            LifecycleOutcome::Opened(t)
            | LifecycleOutcome::Closed(t)
            | LifecycleOutcome::Duplicate(t) => Some(t),
            _ => None,
        }
    }

    pub fn should_forward(&self) -> bool {
        matches!(self, LifecycleOutcome::Opened(_) | LifecycleOutcome::Closed(_))
    }

    /// Human-readable acknowledgement returned to the alert sender.
    pub fn message(&self, signal: &Signal) -> String {
        match self {
            LifecycleOutcome::Opened(_) | LifecycleOutcome::Closed(_) => {
                format!("{} processed successfully", signal.action())
            }
            LifecycleOutcome::Duplicate(t) => {
                format!("Duplicate {} signal ignored (trade {})", signal.action(), t.id)
            }
            LifecycleOutcome::Unmatched { reason } => {
                format!("No matching open trade: {}", reason)
            }
            LifecycleOutcome::NoOpenTrade => {
                format!("No open trade found for {}", signal.ticker)
            }
            LifecycleOutcome::Ignored(kind) => format!("{} signal acknowledged", kind),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LifecycleError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("Trade {0} not found")]
    TradeNotFound(i64),

    #[error("Trade {0} is already closed")]
    AlreadyClosed(i64),

    #[error("Invalid exit: {0}")]
    InvalidExit(String),
}

pub struct TradeLifecycleManager {
    trades: Arc<dyn TradeRepository>,
    dedup_window: Duration,
}

impl TradeLifecycleManager {
    pub fn new(trades: Arc<dyn TradeRepository>) -> Self {
        Self {
            trades,
            dedup_window: Duration::seconds(DEFAULT_DEDUP_WINDOW_SECS),
        }
    }

    pub fn with_dedup_window(mut self, window: Duration) -> Self {
        self.dedup_window = window;
        self
    }

    pub fn dedup_window(&self) -> Duration {
        self.dedup_window
    }

    pub async fn apply(&self, signal: &Signal) -> Result<LifecycleOutcome, LifecycleError> {
        match signal.kind {
            SignalKind::Entry => self.open(signal).await,
            SignalKind::TakeProfit | SignalKind::StopLoss => self.close(signal).await,
            kind @ (SignalKind::LimitEntry | SignalKind::CancelOrder) => {
                debug!("{} signal for {} acknowledged only", kind, signal.ticker);
                Ok(LifecycleOutcome::Ignored(kind))
            }
        }
    }

    async fn open(&self, signal: &Signal) -> Result<LifecycleOutcome, LifecycleError> {
        let strategy = signal.strategy.as_deref();
        let created = self
            .trades
            .create_open_trade(
                NewTrade {
                    ticker: signal.ticker.clone(),
                    direction: signal.direction_or_default(),
                    entry_price: signal.price,
                    stop_loss: signal.stop_loss,
                    take_profit: signal.take_profit,
                    quantity: signal.quantity_or_default(),
                    strategy: signal.strategy.clone(),
                },
                &signal.to_payload(),
            )
            .await?;

        let since = self.window_start(Utc::now());
        let siblings = self
            .trades
            .find_open_trades_since(&signal.ticker, strategy, since)
            .await?;

        let Some(keeper) = siblings.first() else {
            return self.resolve_vanished_entry(signal, created).await;
        };

        for duplicate in siblings.iter().skip(1) {
            if self.trades.delete_trade(duplicate.id).await? {
                warn!(
                    "Removed duplicate open trade {} for {} {:?} (kept {})",
                    duplicate.id, signal.ticker, strategy, keeper.id
                );
            }
        }

        if keeper.id == created.id {
            info!(
                "Opened trade {}: {} {} @ {} x{}",
                created.id, created.direction, created.ticker, created.entry_price, created.quantity
            );
            Ok(LifecycleOutcome::Opened(created))
        } else {
            info!(
                "Duplicate entry for {} {:?}: trade {} already open",
                signal.ticker, strategy, keeper.id
            );
            Ok(LifecycleOutcome::Duplicate(keeper.clone()))
        }
    }

    /// Our own row is always visible to reconciliation unless a concurrent
    /// caller removed it in favour of an older trade. Report that trade, or
    /// nothing, so the entry is not forwarded twice.
    async fn resolve_vanished_entry(
        &self,
        signal: &Signal,
        created: Trade,
    ) -> Result<LifecycleOutcome, LifecycleError> {
        if let Some(current) = self.trades.get_trade(created.id).await? {
            return Ok(LifecycleOutcome::Opened(current));
        }

        warn!(
            "Trade {} vanished during reconciliation for {}",
            created.id, signal.ticker
        );
        let strategy = signal.strategy.as_deref();
        let survivor = self
            .trades
            .find_open_trades(&signal.ticker)
            .await?
            .into_iter()
            .find(|t| t.strategy.as_deref() == strategy);

        Ok(match survivor {
            Some(trade) => LifecycleOutcome::Duplicate(trade),
            None => LifecycleOutcome::NoOpenTrade,
        })
    }

    async fn close(&self, signal: &Signal) -> Result<LifecycleOutcome, LifecycleError> {
        let Some(reason) = signal.kind.exit_reason() else {
            return Ok(LifecycleOutcome::Ignored(signal.kind));
        };
        let strategy = signal.strategy.as_deref();
        let now = Utc::now();
        let since = self.window_start(now);

        if let Some(existing) = self
            .trades
            .find_recent_event_trade(&signal.ticker, strategy, reason.event_type(), since)
            .await?
        {
            info!(
                "Duplicate {} for {}: trade {} already has this exit",
                reason.as_str(),
                signal.ticker,
                existing.id
            );
            return Ok(LifecycleOutcome::Duplicate(existing));
        }

        let open = self.trades.find_open_trades(&signal.ticker).await?;
        let open_count = open.len();
        let target = match strategy {
            Some(s) => open.into_iter().find(|t| t.strategy.as_deref() == Some(s)),
            None if open_count == 1 => open.into_iter().next(),
            None => None,
        };

        let Some(trade) = target else {
            if let Some(closed) = self
                .trades
                .find_recently_closed(&signal.ticker, strategy, reason, since)
                .await?
            {
                info!(
                    "Duplicate {} for {}: trade {} closed moments ago",
                    reason.as_str(),
                    signal.ticker,
                    closed.id
                );
                return Ok(LifecycleOutcome::Duplicate(closed));
            }
            if open_count == 0 {
                info!("No open trade for {} {}", signal.ticker, reason.as_str());
                return Ok(LifecycleOutcome::NoOpenTrade);
            }
            let reason = match strategy {
                Some(s) => format!(
                    "no open {} trade with strategy '{}' ({} open on ticker)",
                    signal.ticker, s, open_count
                ),
                None => format!(
                    "{} open {} trades and no strategy to choose between them",
                    open_count, signal.ticker
                ),
            };
            warn!("Unmatched exit signal: {}", reason);
            return Ok(LifecycleOutcome::Unmatched { reason });
        };

        let close = TradeClose {
            exit_price: signal.price,
            exit_reason: reason,
            pnl: signal.pnl.unwrap_or_else(|| trade.computed_pnl(signal.price)),
            pnl_percent: trade.pnl_percent_at(signal.price),
            closed_at: now,
        };

        match self.trades.close_trade(trade.id, close, &signal.to_payload()).await? {
            Some(closed) => {
                info!(
                    "Closed trade {} via {} @ {} (pnl {:.2})",
                    closed.id,
                    reason.as_str(),
                    signal.price,
                    closed.pnl.unwrap_or_default()
                );
                Ok(LifecycleOutcome::Closed(closed))
            }
            None => {
                // Lost the conditional update to a concurrent close.
                let current = self.trades.get_trade(trade.id).await?.unwrap_or(trade);
                info!("Trade {} closed concurrently, treating as duplicate", current.id);
                Ok(LifecycleOutcome::Duplicate(current))
            }
        }
    }

    /// Operator-initiated close. `pnl` defaults to the price-derived value.
    pub async fn complete_manually(
        &self,
        id: i64,
        exit_price: f64,
        pnl: Option<f64>,
        reason: ExitReason,
    ) -> Result<Trade, LifecycleError> {
        if !exit_price.is_finite() || exit_price <= 0.0 {
            return Err(LifecycleError::InvalidExit(format!(
                "exit price must be positive, got {}",
                exit_price
            )));
        }
        if !matches!(reason, ExitReason::Manual | ExitReason::Breakeven) {
            return Err(LifecycleError::InvalidExit(format!(
                "manual completion cannot use reason {}",
                reason.as_str()
            )));
        }

        let trade = self
            .trades
            .get_trade(id)
            .await?
            .ok_or(LifecycleError::TradeNotFound(id))?;
        if !trade.is_open() {
            return Err(LifecycleError::AlreadyClosed(id));
        }

        let pnl = pnl.unwrap_or_else(|| trade.computed_pnl(exit_price));
        let close = TradeClose {
            exit_price,
            exit_reason: reason,
            pnl,
            pnl_percent: trade.pnl_percent_at(exit_price),
            closed_at: Utc::now(),
        };
        let payload = json!({
            "action": "manual",
            "exitPrice": exit_price,
            "pnl": pnl,
            "exitReason": reason,
        });

        let closed = self
            .trades
            .close_trade(id, close, &payload)
            .await?
            .ok_or(LifecycleError::AlreadyClosed(id))?;

        info!(
            "Trade {} manually completed @ {} (pnl {:.2}, {})",
            id,
            exit_price,
            pnl,
            reason.as_str()
        );
        Ok(closed)
    }

    fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.dedup_window
    }
}
