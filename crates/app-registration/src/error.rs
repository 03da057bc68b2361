//! Error types for the registration handshake.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Registration and authentication errors.
///
/// Messages never carry secret material; only shop ids and parameter names
/// are interpolated.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Shop not found: {0}")]
    ShopNotFound(String),

    #[error("Request signature is invalid")]
    SignatureInvalid,

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Request body too large or unreadable")]
    PayloadTooLarge,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RegistrationError {
    /// Shorthand for a missing parameter error.
    pub fn missing(name: impl Into<String>) -> Self {
        RegistrationError::MissingParameter(name.into())
    }

    /// HTTP status and machine-readable code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            RegistrationError::MissingParameter(_) => {
                (StatusCode::BAD_REQUEST, "MISSING_PARAMETER")
            }
            RegistrationError::ShopNotFound(_) => (StatusCode::NOT_FOUND, "SHOP_NOT_FOUND"),
            RegistrationError::SignatureInvalid => (StatusCode::UNAUTHORIZED, "SIGNATURE_INVALID"),
            RegistrationError::Persistence(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "PERSISTENCE_ERROR")
            }
            RegistrationError::Notification(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "NOTIFICATION_ERROR")
            }
            RegistrationError::RateLimitExceeded => {
                (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT_EXCEEDED")
            }
            RegistrationError::PayloadTooLarge => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE")
            }
            RegistrationError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for RegistrationError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for RegistrationError {
    fn from(e: std::io::Error) -> Self {
        RegistrationError::Persistence(e.to_string())
    }
}

impl From<serde_json::Error> for RegistrationError {
    fn from(e: serde_json::Error) -> Self {
        RegistrationError::Persistence(format!("JSON serialization error: {}", e))
    }
}

impl From<aes_gcm::Error> for RegistrationError {
    fn from(_: aes_gcm::Error) -> Self {
        RegistrationError::Persistence("AES-GCM encryption/decryption failed".to_string())
    }
}
