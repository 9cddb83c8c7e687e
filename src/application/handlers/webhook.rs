use axum::{extract::State, http::StatusCode, Json};

use super::{api_error, api_error_with_details, internal_error, ApiError};
use crate::application::services::ingestion_service::{IngestError, IngestResponse};
use crate::application::state::AppState;

/// Receive one alert. Accepts JSON, a JSON `content` envelope, or plain text.
pub async fn receive_webhook(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<IngestResponse>, ApiError> {
    let receipt = state.ingestion.ingest(&body).await.map_err(|e| match e {
        IngestError::Parse(cause) => api_error_with_details(
            StatusCode::BAD_REQUEST,
            "Unable to parse webhook content",
            cause,
        ),
        IngestError::Unauthorized => {
            api_error(StatusCode::UNAUTHORIZED, "Unauthorized: Invalid webhook secret")
        }
        IngestError::Validation(cause) => api_error(StatusCode::BAD_REQUEST, cause.to_string()),
        IngestError::Repository(cause) => internal_error("Internal server error", cause),
    })?;

    Ok(Json(receipt.response()))
}
