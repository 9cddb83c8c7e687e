use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use super::handlers::{events, forwarding_configs, health, logs, trades, webhook};
use super::state::AppState;
use crate::auth::require_api_key;
use crate::rate_limit::{rate_limit_middleware, GlobalRateLimiter};

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Public ingestion and health routes plus the bearer-protected operator API.
pub fn build_router(state: AppState, rate_limiter: GlobalRateLimiter) -> Router {
    let ingestion = Router::new()
        .route("/webhook", post(webhook::receive_webhook))
        .route_layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ));

    let operator = Router::new()
        .route("/api/trades", get(trades::list_trades))
        .route(
            "/api/trades/:id",
            get(trades::get_trade)
                .patch(trades::complete_trade)
                .delete(trades::delete_trade),
        )
        .route(
            "/api/forwarding-configs",
            get(forwarding_configs::list_configs).post(forwarding_configs::create_config),
        )
        .route(
            "/api/forwarding-configs/:id",
            put(forwarding_configs::update_config).delete(forwarding_configs::delete_config),
        )
        .route(
            "/api/forwarding-configs/:id/pause",
            post(forwarding_configs::toggle_pause),
        )
        .route("/api/logs", get(logs::list_logs))
        .route("/api/events", get(events::live_events))
        .route_layer(middleware::from_fn_with_state(
            state.api_keys.clone(),
            require_api_key,
        ));

    Router::new()
        .route("/health", get(health::health))
        .merge(ingestion)
        .merge(operator)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
