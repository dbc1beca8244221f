//! Writes attendance logs.

use std::sync::Arc;

use tracing::{error, info, instrument};

use attendance_core::AttendanceStatus;

use crate::db::{RecordStore, RepositoryError};
use crate::models::{AttendanceLog, NewAttendanceLog, VerificationAttempt};

use super::error::AttendanceError;

/// What the pipeline established about an attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptOutcome {
    /// Whether the location was inside an active geofence.
    pub in_geofence: bool,
    /// Face match distance, if verification ran.
    pub face_distance: Option<f64>,
    /// Locator of the stored image.
    pub image_url: Option<String>,
    /// How the attempt ended.
    pub status: AttendanceStatus,
}

impl AttemptOutcome {
    /// A verified check-in.
    #[must_use]
    pub const fn accepted(face_distance: f64, image_url: Option<String>) -> Self {
        Self {
            in_geofence: true,
            face_distance: Some(face_distance),
            image_url,
            status: AttendanceStatus::Accepted,
        }
    }

    /// An attempt outside every geofence.
    #[must_use]
    pub const fn out_of_area() -> Self {
        Self {
            in_geofence: false,
            face_distance: None,
            image_url: None,
            status: AttendanceStatus::OutOfArea,
        }
    }

    /// An attempt whose face did not match.
    #[must_use]
    pub const fn face_mismatch(face_distance: f64) -> Self {
        Self {
            in_geofence: true,
            face_distance: Some(face_distance),
            image_url: None,
            status: AttendanceStatus::FaceMismatch,
        }
    }
}

/// Appends one attendance log per call.
pub struct AttendanceRecorder<R> {
    store: Arc<R>,
}

impl<R> Clone for AttendanceRecorder<R> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<R: RecordStore> AttendanceRecorder<R> {
    /// Create a recorder over a record store.
    #[must_use]
    pub const fn new(store: Arc<R>) -> Self {
        Self { store }
    }

    /// Write the log row for an attempt.
    ///
    /// # Errors
    ///
    /// Returns `UnknownSubject` if the attempt references a subject (or user)
    /// that does not exist, and `Persistence` for any other storage failure.
    #[instrument(
        skip(self, attempt, outcome),
        fields(user_id = %attempt.user_id, subject_id = %attempt.subject_id, status = %outcome.status)
    )]
    pub async fn record(
        &self,
        attempt: &VerificationAttempt,
        outcome: AttemptOutcome,
    ) -> Result<AttendanceLog, AttendanceError> {
        let new_log = NewAttendanceLog {
            user_id: attempt.user_id,
            subject_id: attempt.subject_id,
            location: attempt.location,
            in_geofence: outcome.in_geofence,
            face_distance: outcome.face_distance,
            image_url: outcome.image_url,
            status: outcome.status,
            created_at: attempt.received_at,
        };

        match self.store.insert_attendance_log(new_log).await {
            Ok(log) => {
                info!(log_id = %log.id, "Attendance recorded");
                Ok(log)
            }
            Err(RepositoryError::InvalidReference(detail)) => {
                info!(%detail, "Attendance references an unknown subject");
                Err(AttendanceError::UnknownSubject)
            }
            Err(e) => {
                error!(
                    user_id = %attempt.user_id,
                    subject_id = %attempt.subject_id,
                    error = %e,
                    "CRITICAL: verified attendance could not be recorded"
                );
                Err(AttendanceError::Persistence(e))
            }
        }
    }
}
