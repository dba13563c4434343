use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Error body returned to host-facing callers.
///
/// Gateway-facing rejections never go through this path: the callback
/// endpoint answers every outcome with a signed XML envelope instead.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Order cannot be loaded: {0}")]
    OrderNotFound(String),

    #[error("{0}")]
    UnsupportedOperation(&'static str),

    #[error("Gateway configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("Gateway unreachable: {0}")]
    GatewayUnreachable(String),
}

impl GatewayError {
    /// Single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::OrderNotFound(_) => StatusCode::NOT_FOUND,
            Self::UnsupportedOperation(_) => StatusCode::NOT_IMPLEMENTED,
            Self::ConfigurationMissing(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::GatewayUnreachable(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Message suitable for HTTP responses. Transport detail stays in the logs.
    pub fn response_message(&self) -> String {
        match self {
            Self::GatewayUnreachable(_) => "Payment gateway unreachable".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        (status, Json(err)).into_response()
    }
}
