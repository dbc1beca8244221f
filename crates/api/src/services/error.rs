//! Pipeline error taxonomy shared by check-in and enrollment.

use axum::http::StatusCode;
use thiserror::Error;

use crate::biometric::VerificationError;
use crate::db::RepositoryError;

/// Why a check-in or face registration did not complete.
#[derive(Debug, Error)]
pub enum AttendanceError {
    /// A required field is missing or not usable. Always local.
    #[error("{0}")]
    InvalidInput(String),

    /// The reported location is outside every active geofence.
    #[error("You are not within the allowed area for attendance")]
    OutOfArea {
        /// Distance to the nearest evaluated zone center, for logs.
        nearest_distance_m: f64,
    },

    /// The authenticated user has no account row.
    #[error("User not found")]
    UserNotFound,

    /// The user has not registered a face yet.
    #[error("Face not registered. Please register your face first.")]
    FaceNotRegistered,

    /// The user already has a registered face.
    #[error("Face already registered")]
    AlreadyRegistered,

    /// The biometric service says the face belongs to someone else.
    #[error("Face verification failed")]
    FaceMismatch {
        /// Distance reported by the service.
        distance: f64,
    },

    /// The subject id references no subject.
    #[error("Unknown subject")]
    UnknownSubject,

    /// The biometric service failed or refused the request.
    #[error(transparent)]
    Verification(#[from] VerificationError),

    /// Reading from the record store failed.
    #[error("record store error: {0}")]
    Storage(#[source] RepositoryError),

    /// A verified check-in could not be recorded.
    #[error("failed to record attendance: {0}")]
    Persistence(#[source] RepositoryError),
}

impl AttendanceError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_)
            | Self::FaceNotRegistered
            | Self::UnknownSubject
            | Self::Verification(VerificationError::Rejected { .. }) => StatusCode::BAD_REQUEST,
            Self::OutOfArea { .. } | Self::FaceMismatch { .. } => StatusCode::FORBIDDEN,
            Self::UserNotFound => StatusCode::NOT_FOUND,
            Self::AlreadyRegistered => StatusCode::CONFLICT,
            Self::Verification(VerificationError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
            Self::Verification(
                VerificationError::InvalidResponse(_)
                | VerificationError::Unavailable { .. }
                | VerificationError::Transport(_),
            ) => StatusCode::BAD_GATEWAY,
            Self::Storage(_) | Self::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable kind, returned as `code` in error bodies.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::OutOfArea { .. } => "out_of_area",
            Self::UserNotFound => "user_not_found",
            Self::FaceNotRegistered => "face_not_registered",
            Self::AlreadyRegistered => "already_registered",
            Self::FaceMismatch { .. } => "face_mismatch",
            Self::UnknownSubject => "unknown_subject",
            Self::Verification(VerificationError::Rejected { .. }) => "remote_rejected",
            Self::Verification(VerificationError::Timeout) => "remote_timeout",
            Self::Verification(VerificationError::InvalidResponse(_)) => "remote_invalid_response",
            Self::Verification(
                VerificationError::Unavailable { .. } | VerificationError::Transport(_),
            ) => "remote_unavailable",
            Self::Storage(_) => "storage_error",
            Self::Persistence(_) => "persistence_error",
        }
    }

    /// Message safe to show a client.
    ///
    /// Server-side failures get a generic message; the detail stays in logs.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Verification(VerificationError::Timeout) => {
                "Face verification service timed out".to_string()
            }
            Self::Verification(
                VerificationError::InvalidResponse(_)
                | VerificationError::Unavailable { .. }
                | VerificationError::Transport(_),
            ) => "Face verification service unavailable".to_string(),
            Self::Storage(_) | Self::Persistence(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}
