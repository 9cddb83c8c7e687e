use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use super::{api_error, internal_error, not_found, ApiError};
use crate::application::services::broadcast::LiveEvent;
use crate::application::state::AppState;
use crate::domain::entities::trade::{ExitReason, Trade, TradeEvent, TradeStatus};
use crate::domain::repositories::TradeFilter;
use crate::domain::services::trade_lifecycle::LifecycleError;
use crate::domain::services::trade_stats::{compute_stats, TradeStats};

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 500;

/// Query parameters for the trade listing
#[derive(Debug, Default, Deserialize)]
pub struct TradesQuery {
    pub ticker: Option<String>,
    /// `open` or `closed`
    pub status: Option<String>,
    pub strategy: Option<String>,
    /// Page size (default 100, max 500)
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
}

impl Pagination {
    fn new(total: i64, limit: i64, offset: i64) -> Self {
        Self {
            total,
            limit,
            offset,
            has_more: offset.saturating_add(limit) < total,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TradesResponse {
    pub trades: Vec<Trade>,
    pub pagination: Pagination,
    pub stats: TradeStats,
}

#[derive(Debug, Serialize)]
pub struct TradeDetailResponse {
    #[serde(flatten)]
    pub trade: Trade,
    pub events: Vec<TradeEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteTradeRequest {
    pub exit_price: f64,
    pub pnl: Option<f64>,
    pub exit_reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
}

impl TradesQuery {
    fn filter(&self) -> Result<TradeFilter, ApiError> {
        let status = match self.status.as_deref().filter(|s| !s.is_empty()) {
            Some(raw) => Some(TradeStatus::parse(raw).ok_or_else(|| {
                api_error(
                    StatusCode::BAD_REQUEST,
                    format!("Invalid status '{}' (expected open or closed)", raw),
                )
            })?),
            None => None,
        };
        Ok(TradeFilter {
            ticker: self.ticker.clone().filter(|t| !t.is_empty()),
            status,
            strategy: self.strategy.clone().filter(|s| !s.is_empty()),
        })
    }
}

/// List trades, newest first, with statistics over the whole filtered set.
pub async fn list_trades(
    State(state): State<AppState>,
    Query(params): Query<TradesQuery>,
) -> Result<Json<TradesResponse>, ApiError> {
    let filter = params.filter()?;
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let trades = state
        .trades
        .list_trades(&filter, limit, offset)
        .await
        .map_err(|e| internal_error("Failed to fetch trades", e))?;
    let total = state
        .trades
        .count_trades(&filter)
        .await
        .map_err(|e| internal_error("Failed to count trades", e))?;
    let all = state
        .trades
        .all_trades(&filter)
        .await
        .map_err(|e| internal_error("Failed to compute trade stats", e))?;

    Ok(Json(TradesResponse {
        trades,
        pagination: Pagination::new(total, limit, offset),
        stats: compute_stats(&all),
    }))
}

pub async fn get_trade(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<TradeDetailResponse>, ApiError> {
    let trade = state
        .trades
        .get_trade(id)
        .await
        .map_err(|e| internal_error("Failed to fetch trade", e))?
        .ok_or_else(|| not_found("Trade", id))?;
    let events = state
        .trades
        .list_events(id)
        .await
        .map_err(|e| internal_error("Failed to fetch trade events", e))?;

    Ok(Json(TradeDetailResponse { trade, events }))
}

/// Manually complete an open trade.
pub async fn complete_trade(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<CompleteTradeRequest>, JsonRejection>,
) -> Result<Json<Trade>, ApiError> {
    let Json(request) = payload.map_err(|e| api_error(StatusCode::BAD_REQUEST, e.body_text()))?;

    let reason = match request.exit_reason.as_deref() {
        None | Some("") => ExitReason::Manual,
        Some(raw) => ExitReason::parse(raw)
            .filter(|r| matches!(r, ExitReason::Manual | ExitReason::Breakeven))
            .ok_or_else(|| {
                api_error(
                    StatusCode::BAD_REQUEST,
                    format!("Invalid exitReason '{}' (expected manual or breakeven)", raw),
                )
            })?,
    };

    let trade = state
        .lifecycle
        .complete_manually(id, request.exit_price, request.pnl, reason)
        .await
        .map_err(|e| match e {
            LifecycleError::TradeNotFound(id) => not_found("Trade", id),
            LifecycleError::AlreadyClosed(_) => api_error(StatusCode::CONFLICT, e.to_string()),
            LifecycleError::InvalidExit(_) => api_error(StatusCode::BAD_REQUEST, e.to_string()),
            LifecycleError::Repository(_) => internal_error("Failed to complete trade", e),
        })?;

    state.broadcaster.broadcast(&LiveEvent::TradeUpdate {
        outcome: "closed".to_string(),
        trade: Some(trade.clone()),
    });

    Ok(Json(trade))
}

pub async fn delete_trade(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let deleted = state
        .trades
        .delete_trade(id)
        .await
        .map_err(|e| internal_error("Failed to delete trade", e))?;
    if !deleted {
        return Err(not_found("Trade", id));
    }

    tracing::info!("Trade {} deleted by operator", id);
    state
        .broadcaster
        .broadcast(&LiveEvent::TradeDeleted { trade_id: id });

    Ok(Json(DeleteResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_has_more() {
        assert!(Pagination::new(3, 2, 0).has_more);
        assert!(!Pagination::new(3, 2, 2).has_more);
        assert!(!Pagination::new(3, 500, i64::MAX).has_more);
    }
}
