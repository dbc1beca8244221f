//! Unified error handling with Sentry integration.
//!
//! All route handlers return `Result<T, AppError>`. Errors render as JSON:
//!
//! ```json
//! { "error": "Face verification failed", "code": "face_mismatch" }
//! ```
//!
//! Server errors are captured to Sentry before responding, and their details
//! never reach the client.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::AttendanceError;

/// Application-level error type for the attendance API.
#[derive(Debug, Error)]
pub enum AppError {
    /// A pipeline stage failed.
    #[error(transparent)]
    Attendance(#[from] AttendanceError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Caller is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request body exceeds the configured upload limit.
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Human-readable message.
    pub error: String,
    /// Stable machine-readable kind.
    pub code: &'static str,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Attendance(err) => err.status_code(),
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Stable machine-readable kind.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Attendance(err) => err.code(),
            Self::Database(_) => "database_error",
            Self::Unauthorized(_) => "unauthorized",
            Self::BadRequest(_) => "invalid_input",
            Self::PayloadTooLarge(_) => "payload_too_large",
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Attendance(err) => err.public_message(),
            Self::Database(_) => "Internal server error".to_string(),
            Self::Unauthorized(_) => "Unauthorized".to_string(),
            Self::BadRequest(msg) | Self::PayloadTooLarge(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                code = self.code(),
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let body = ErrorBody {
            error: self.public_message(),
            code: self.code(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for the authenticated caller.
pub fn set_sentry_user(user_id: &impl ToString, username: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            username: Some(username.to_string()),
            ..Default::default()
        }));
    });
}
