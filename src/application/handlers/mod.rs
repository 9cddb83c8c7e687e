pub mod events;
pub mod forwarding_configs;
pub mod health;
pub mod logs;
pub mod trades;
pub mod webhook;

use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            details: None,
        }),
    )
}

pub(crate) fn api_error_with_details(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Display,
) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            details: Some(details.to_string()),
        }),
    )
}

/// 500 for storage failures. The cause is logged and echoed as `details`.
pub(crate) fn internal_error(context: &str, cause: impl Display) -> ApiError {
    tracing::error!("{}: {}", context, cause);
    api_error_with_details(StatusCode::INTERNAL_SERVER_ERROR, context, cause)
}

pub(crate) fn not_found(what: &str, id: i64) -> ApiError {
    api_error(StatusCode::NOT_FOUND, format!("{} {} not found", what, id))
}
