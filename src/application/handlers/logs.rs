use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use super::{api_error, internal_error, ApiError};
use crate::application::state::AppState;
use crate::domain::entities::activity::{ActivityEntry, LogCategory};

#[derive(Debug, Default, Deserialize)]
pub struct LogsQuery {
    /// Default 100, max 1000
    pub limit: Option<i64>,
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub logs: Vec<ActivityEntry>,
}

pub async fn list_logs(
    State(state): State<AppState>,
    Query(params): Query<LogsQuery>,
) -> Result<Json<LogsResponse>, ApiError> {
    let category = match params.category.as_deref().filter(|c| !c.is_empty()) {
        Some(raw) => Some(LogCategory::parse(raw).ok_or_else(|| {
            api_error(StatusCode::BAD_REQUEST, format!("Unknown log category '{}'", raw))
        })?),
        None => None,
    };
    let limit = params.limit.unwrap_or(100).clamp(1, 1000);

    let logs = state
        .activity
        .recent(category, limit)
        .await
        .map_err(|e| internal_error("Failed to fetch logs", e))?;
    Ok(Json(LogsResponse { logs }))
}
