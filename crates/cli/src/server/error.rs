use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use firegpt_core::AppError;
use serde_json::json;

/// An [`AppError`] rendered as `{"error": message}` with a matching status.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Geo(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if self.0.is_client_error() {
            tracing::warn!("Rejected request: {}", self.0);
        } else {
            tracing::error!("Request failed: {}", self.0);
        }

        // Client errors carry the bare message
        let message = match self.0 {
            AppError::InvalidInput(msg) | AppError::PayloadTooLarge(msg) => msg,
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
