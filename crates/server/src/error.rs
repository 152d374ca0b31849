//! Error-to-response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use monitor_core::MonitorError;

/// Wrapper giving `MonitorError` an HTTP rendering.
///
/// Transient and internal failures surface as a generic 500; the full detail
/// stays in the logs only.
#[derive(Debug)]
pub struct ApiError(pub MonitorError);

impl From<MonitorError> for ApiError {
    fn from(err: MonitorError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            MonitorError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            MonitorError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            MonitorError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            MonitorError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            MonitorError::Transient(e) => {
                error!(error = %e, "Transient failure reached the HTTP surface");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
            MonitorError::Internal(msg) => {
                error!(error = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };

        let body = Json(json!({ "success": false, "error": message }));
        (status, body).into_response()
    }
}
