use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::application::state::AppState;
use crate::persistence;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationStatus {
    pub telegram: bool,
    pub discord: bool,
    pub external_dashboard: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub database: &'static str,
    pub destinations: DestinationStatus,
    pub webhook_secret: bool,
    pub live_clients: usize,
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database_ok = match persistence::ping(&state.pool).await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!("Health check database ping failed: {}", e);
            false
        }
    };

    let response = HealthResponse {
        status: if database_ok { "healthy" } else { "unhealthy" },
        timestamp: Utc::now(),
        database: if database_ok { "connected" } else { "disconnected" },
        destinations: DestinationStatus {
            telegram: state.destinations.telegram.is_some(),
            discord: state.destinations.discord_webhook_url.is_some(),
            external_dashboard: state.destinations.external_dashboard_url.is_some(),
        },
        webhook_secret: state.ingestion.secret_configured(),
        live_clients: state.broadcaster.client_count(),
    };

    let status = if database_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}
