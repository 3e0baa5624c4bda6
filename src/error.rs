//! Error types for chatrelay.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Result type alias for chatrelay operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for chatrelay.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("API key not configured for this provider")]
    MissingApiKey,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Invalid email")]
    InvalidEmail,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Provider(String),

    #[error("Upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("Failed to {action} data")]
    Storage { action: &'static str, details: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP status used when this error is returned as a plain response
    /// rather than as an in-stream event.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Error::InvalidEmail | Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::Provider(_) | Error::Upstream(_) => StatusCode::BAD_GATEWAY,
            Error::MissingApiKey
            | Error::Config(_)
            | Error::Storage { .. }
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = match &self {
            Error::Storage { details, .. } => serde_json::json!({
                "error": self.to_string(),
                "details": details,
            }),
            _ => serde_json::json!({ "error": self.to_string() }),
        };

        (status, axum::Json(body)).into_response()
    }
}
