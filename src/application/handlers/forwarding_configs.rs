use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use super::{api_error, internal_error, not_found, ApiError};
use crate::application::state::AppState;
use crate::domain::entities::activity::LogCategory;
use crate::domain::entities::forwarding_config::{ForwardingConfig, ForwardingConfigInput};
use crate::domain::services::session_calendar::next_session_open;

#[derive(Debug, Serialize)]
pub struct ConfigsResponse {
    pub configs: Vec<ForwardingConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseResponse {
    pub success: bool,
    pub config: ForwardingConfig,
    pub is_paused: bool,
    pub paused_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
}

fn validated(
    payload: Result<Json<ForwardingConfigInput>, JsonRejection>,
) -> Result<ForwardingConfigInput, ApiError> {
    let Json(input) = payload.map_err(|e| api_error(StatusCode::BAD_REQUEST, e.body_text()))?;
    input
        .validate()
        .map_err(|reason| api_error(StatusCode::BAD_REQUEST, reason))?;
    Ok(input)
}

pub async fn list_configs(State(state): State<AppState>) -> Result<Json<ConfigsResponse>, ApiError> {
    let configs = state
        .configs
        .list()
        .await
        .map_err(|e| internal_error("Failed to fetch forwarding configs", e))?;
    Ok(Json(ConfigsResponse { configs }))
}

pub async fn create_config(
    State(state): State<AppState>,
    payload: Result<Json<ForwardingConfigInput>, JsonRejection>,
) -> Result<(StatusCode, Json<ForwardingConfig>), ApiError> {
    let input = validated(payload)?;
    let config = state
        .configs
        .create(input)
        .await
        .map_err(|e| internal_error("Failed to create forwarding config", e))?;

    state
        .activity
        .info(
            LogCategory::System,
            format!("Forwarding config [{}] created", config.name),
            json!({"configId": config.id}),
        )
        .await;
    Ok((StatusCode::CREATED, Json(config)))
}

pub async fn update_config(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<ForwardingConfigInput>, JsonRejection>,
) -> Result<Json<ForwardingConfig>, ApiError> {
    let input = validated(payload)?;
    let config = state
        .configs
        .update(id, input)
        .await
        .map_err(|e| internal_error("Failed to update forwarding config", e))?
        .ok_or_else(|| not_found("Forwarding config", id))?;

    state
        .activity
        .info(
            LogCategory::System,
            format!("Forwarding config [{}] updated", config.name),
            json!({"configId": config.id}),
        )
        .await;
    Ok(Json(config))
}

pub async fn delete_config(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let deleted = state
        .configs
        .delete(id)
        .await
        .map_err(|e| internal_error("Failed to delete forwarding config", e))?;
    if !deleted {
        return Err(not_found("Forwarding config", id));
    }
    Ok(Json(DeleteResponse { success: true }))
}

/// Pause until the next session open, or resume if currently paused.
pub async fn toggle_pause(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PauseResponse>, ApiError> {
    let current = state
        .configs
        .get(id)
        .await
        .map_err(|e| internal_error("Failed to fetch forwarding config", e))?
        .ok_or_else(|| not_found("Forwarding config", id))?;

    let now = Utc::now();
    let paused_until = if current.is_paused(now) {
        None
    } else {
        Some(next_session_open(now))
    };

    let config = state
        .configs
        .set_paused_until(id, paused_until)
        .await
        .map_err(|e| internal_error("Failed to update forwarding config", e))?
        .ok_or_else(|| not_found("Forwarding config", id))?;

    let message = match paused_until {
        Some(until) => format!("Forwarding config [{}] paused until {}", config.name, until.to_rfc3339()),
        None => format!("Forwarding config [{}] resumed", config.name),
    };
    tracing::info!("{}", message);
    state
        .activity
        .info(LogCategory::Broker, message, json!({"configId": config.id}))
        .await;

    Ok(Json(PauseResponse {
        success: true,
        is_paused: paused_until.is_some(),
        paused_until,
        config,
    }))
}
