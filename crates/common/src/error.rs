//! Error types for pushgate.
//!
//! This module provides a unified error type for the entire application,
//! with automatic conversion from common error types using the `#[from]`
//! attribute.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Application result type.
pub type AppResult<T> = Result<T, AppError>;

/// Application error type.
///
/// This enum represents all possible errors in the application, categorized
/// into client errors (4xx) and server errors (5xx).
#[derive(Debug, Error)]
pub enum AppError {
    // === Client Errors (4xx) ===
    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or invalid request signature.
    #[error("Unauthorized")]
    Unauthorized,

    /// Invalid request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Validation failed with structured errors.
    #[error("Validation error: {0}")]
    ValidationErrors(#[from] validator::ValidationErrors),

    /// Validation failed with a message.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Resource conflict (unique-constraint violation).
    #[error("Conflict: {0}")]
    Conflict(String),

    // === Server Errors (5xx) ===
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// Task broker operation failed.
    #[error("Queue error: {0}")]
    Queue(String),

    /// Web Push protocol error (message building, key material).
    #[error("Push error: {0}")]
    Push(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Feature requires configuration that is absent.
    #[error("Not configured: {0}")]
    NotConfigured(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) | Self::ValidationErrors(_) | Self::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Database(_)
            | Self::Queue(_)
            | Self::Push(_)
            | Self::Config(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::ValidationErrors(_) | Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::NotConfigured(_) => "NOT_CONFIGURED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Queue(_) => "QUEUE_ERROR",
            Self::Push(_) => "PUSH_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns whether this error should be logged at error level.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        if self.is_server_error() {
            tracing::error!(error = %self, code = code, "Server error occurred");
        } else {
            tracing::debug!(error = %self, code = code, "Client error occurred");
        }

        // Authentication failures get a generic body to avoid leaking detail.
        let message = if matches!(self, Self::Unauthorized) {
            "Unauthorized".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(AppError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::Validation("field".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Conflict("duplicate key".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::NotConfigured("vapid".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::Database("down".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(AppError::Unauthorized.error_code(), "UNAUTHORIZED");
        assert_eq!(AppError::Queue("e".into()).error_code(), "QUEUE_ERROR");
    }

    #[test]
    fn test_is_server_error() {
        assert!(AppError::Internal("boom".into()).is_server_error());
        assert!(!AppError::BadRequest("nope".into()).is_server_error());
    }
}
