//! Check-in pipeline.
//!
//! An attempt moves through the stages of [`CheckInStage`] strictly in order
//! and stops at the first failure:
//!
//! | Stage | Failure |
//! |---|---|
//! | input validation | `InvalidInput` |
//! | geofence check | `OutOfArea`, no biometric call is made |
//! | identity load | `UserNotFound`, `FaceNotRegistered` |
//! | face verification | `FaceMismatch`, `Verification(..)` |
//! | image save | logged only, the log gets no image |
//! | record write | `UnknownSubject`, `Persistence` |
//!
//! Only a completed attempt writes an accepted attendance log. Rejected
//! attempts are written as audit rows when enabled.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use attendance_core::{GeoPoint, GeofenceEvaluation, SubjectId, UserId, evaluate};

use crate::biometric::FaceVerifier;
use crate::db::RecordStore;
use crate::models::{AttendanceLog, SubmittedImage, VerificationAttempt};

use super::artifacts::{ArtifactPurpose, ArtifactStore};
use super::error::AttendanceError;
use super::recorder::{AttemptOutcome, AttendanceRecorder};

/// Pipeline stages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckInStage {
    /// Input validated.
    Received,
    /// Location is inside an active geofence.
    GeofenceChecked,
    /// The user exists and has a registered face.
    IdentityLoaded,
    /// The biometric service confirmed the face.
    FaceVerified,
    /// The attendance log is stored.
    Recorded,
    /// The receipt is ready.
    Completed,
}

impl fmt::Display for CheckInStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Received => "received",
            Self::GeofenceChecked => "geofence_checked",
            Self::IdentityLoaded => "identity_loaded",
            Self::FaceVerified => "face_verified",
            Self::Recorded => "recorded",
            Self::Completed => "completed",
        })
    }
}

/// Check-in form fields as submitted, before validation.
#[derive(Debug, Clone, Default)]
pub struct RawCheckIn {
    /// Face image.
    pub image: Option<SubmittedImage>,
    /// Latitude text.
    pub latitude: Option<String>,
    /// Longitude text.
    pub longitude: Option<String>,
    /// Subject id text.
    pub subject_id: Option<String>,
}

impl RawCheckIn {
    /// Validate the form into an attempt by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the image is missing or empty, or any other
    /// field is missing or not numeric.
    pub fn validate(
        self,
        user_id: UserId,
        received_at: DateTime<Utc>,
    ) -> Result<VerificationAttempt, AttendanceError> {
        let image = self
            .image
            .filter(|image| !image.bytes.is_empty())
            .ok_or_else(|| AttendanceError::InvalidInput("Face image is required".to_string()))?;

        let location = parse_location(self.latitude.as_deref(), self.longitude.as_deref())?;

        let subject_id = self
            .subject_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AttendanceError::InvalidInput("subject_id is required".to_string()))?
            .parse::<i32>()
            .map(SubjectId::new)
            .map_err(|_| AttendanceError::InvalidInput("subject_id must be an integer".to_string()))?;

        Ok(VerificationAttempt {
            user_id,
            subject_id,
            image,
            location,
            received_at,
        })
    }
}

/// Parse latitude and longitude text into a point.
///
/// # Errors
///
/// Returns `InvalidInput` if either value is missing, not a finite number,
/// or outside the WGS-84 range.
pub fn parse_location(
    latitude: Option<&str>,
    longitude: Option<&str>,
) -> Result<GeoPoint, AttendanceError> {
    let latitude = parse_coordinate("latitude", latitude)?;
    let longitude = parse_coordinate("longitude", longitude)?;
    let point = GeoPoint::new(latitude, longitude);

    if !point.is_in_range() {
        return Err(AttendanceError::InvalidInput(
            "latitude/longitude out of range".to_string(),
        ));
    }

    Ok(point)
}

fn parse_coordinate(name: &str, raw: Option<&str>) -> Result<f64, AttendanceError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AttendanceError::InvalidInput(format!("{name} is required")))?;

    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| AttendanceError::InvalidInput(format!("{name} must be a number")))
}

/// Result of a completed check-in.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckInReceipt {
    /// The stored log.
    pub log: AttendanceLog,
    /// Face match distance reported by the biometric service.
    pub distance: f64,
}

/// Runs the check-in pipeline.
pub struct CheckInService<R, V, A> {
    store: Arc<R>,
    verifier: Arc<V>,
    artifacts: Arc<A>,
    recorder: AttendanceRecorder<R>,
    record_rejected: bool,
}

impl<R, V, A> Clone for CheckInService<R, V, A> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            verifier: Arc::clone(&self.verifier),
            artifacts: Arc::clone(&self.artifacts),
            recorder: self.recorder.clone(),
            record_rejected: self.record_rejected,
        }
    }
}

impl<R, V, A> CheckInService<R, V, A>
where
    R: RecordStore,
    V: FaceVerifier,
    A: ArtifactStore,
{
    /// Create a pipeline over its collaborators.
    #[must_use]
    pub fn new(store: Arc<R>, verifier: Arc<V>, artifacts: Arc<A>) -> Self {
        Self {
            recorder: AttendanceRecorder::new(Arc::clone(&store)),
            store,
            verifier,
            artifacts,
            record_rejected: false,
        }
    }

    /// Also write audit rows for out-of-area and face-mismatch rejections.
    #[must_use]
    pub const fn with_rejected_attempts(mut self, enabled: bool) -> Self {
        self.record_rejected = enabled;
        self
    }

    /// Test a location against the active geofences.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the geofences cannot be loaded.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn check_geofence(
        &self,
        user_id: UserId,
        point: GeoPoint,
    ) -> Result<GeofenceEvaluation, AttendanceError> {
        let zones = self
            .store
            .active_geofences()
            .await
            .map_err(AttendanceError::Storage)?;

        let evaluation = evaluate(point, &zones);
        if evaluation.skipped > 0 {
            warn!(
                skipped = evaluation.skipped,
                "Active geofences with unusable centers were skipped"
            );
        }

        info!(
            latitude = point.latitude,
            longitude = point.longitude,
            zones = zones.len(),
            inside = evaluation.inside_any,
            nearest = %evaluation.nearest_distance_display(),
            "Geofence evaluated"
        );

        Ok(evaluation)
    }

    /// Run a validated attempt through the pipeline.
    ///
    /// # Errors
    ///
    /// Returns the error of the first stage that fails.
    #[instrument(
        skip(self, attempt),
        fields(user_id = %attempt.user_id, subject_id = %attempt.subject_id)
    )]
    pub async fn check_in(
        &self,
        attempt: VerificationAttempt,
    ) -> Result<CheckInReceipt, AttendanceError> {
        info!(stage = %CheckInStage::Received, bytes = attempt.image.bytes.len(), "Check-in received");

        let evaluation = self.check_geofence(attempt.user_id, attempt.location).await?;
        if !evaluation.inside_any {
            info!(
                nearest = %evaluation.nearest_distance_display(),
                "Check-in rejected: outside allowed area"
            );
            self.audit(&attempt, AttemptOutcome::out_of_area()).await;
            return Err(AttendanceError::OutOfArea {
                nearest_distance_m: evaluation.nearest_distance_meters,
            });
        }
        info!(stage = %CheckInStage::GeofenceChecked, "Location accepted");

        let identity = self
            .store
            .find_identity(attempt.user_id)
            .await
            .map_err(AttendanceError::Storage)?
            .ok_or(AttendanceError::UserNotFound)?;
        let Some(embedding) = identity.embedding else {
            info!("Check-in rejected: face not registered");
            return Err(AttendanceError::FaceNotRegistered);
        };
        info!(stage = %CheckInStage::IdentityLoaded, dims = embedding.len(), "Identity loaded");

        let face = self
            .verifier
            .match_face(&attempt.image, &embedding)
            .await
            .inspect_err(|e| warn!(error = %e, "Face verification call failed"))?;
        if !face.is_match {
            info!(distance = face.distance, "Check-in rejected: face mismatch");
            self.audit(&attempt, AttemptOutcome::face_mismatch(face.distance))
                .await;
            return Err(AttendanceError::FaceMismatch {
                distance: face.distance,
            });
        }
        info!(stage = %CheckInStage::FaceVerified, distance = face.distance, "Face verified");

        let image_url = self
            .artifacts
            .save(attempt.user_id, ArtifactPurpose::CheckIn, &attempt.image)
            .await;
        if image_url.is_none() {
            warn!("Check-in image not saved; recording without image");
        }

        let log = self
            .recorder
            .record(&attempt, AttemptOutcome::accepted(face.distance, image_url))
            .await?;
        info!(stage = %CheckInStage::Recorded, log_id = %log.id, "Attendance log written");

        info!(stage = %CheckInStage::Completed, "Check-in completed");
        Ok(CheckInReceipt {
            log,
            distance: face.distance,
        })
    }

    /// Write an audit row for a rejected attempt, if enabled.
    ///
    /// Failures are logged; the caller still gets the rejection.
    async fn audit(&self, attempt: &VerificationAttempt, outcome: AttemptOutcome) {
        if !self.record_rejected {
            return;
        }

        let status = outcome.status;
        if let Err(e) = self.recorder.record(attempt, outcome).await {
            warn!(%status, error = %e, "Failed to write audit row for rejected check-in");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn raw(lat: &str, lon: &str, subject: &str) -> RawCheckIn {
        RawCheckIn {
            image: Some(SubmittedImage::from_bytes(vec![1_u8, 2, 3])),
            latitude: Some(lat.to_string()),
            longitude: Some(lon.to_string()),
            subject_id: Some(subject.to_string()),
        }
    }

    fn invalid(result: Result<VerificationAttempt, AttendanceError>) -> bool {
        matches!(result, Err(AttendanceError::InvalidInput(_)))
    }

    #[test]
    fn test_validate_accepts_well_formed_form() {
        let attempt = raw("13.736717", " 100.523186 ", "5")
            .validate(UserId::new(3), Utc::now())
            .unwrap();
        assert_eq!(attempt.subject_id, SubjectId::new(5));
        assert!((attempt.location.latitude - 13.736_717).abs() < 1e-9);
        assert!((attempt.location.longitude - 100.523_186).abs() < 1e-9);
    }

    #[test]
    fn test_validate_requires_image() {
        let mut form = raw("1", "1", "1");
        form.image = None;
        assert!(invalid(form.validate(UserId::new(1), Utc::now())));

        let mut form = raw("1", "1", "1");
        form.image = Some(SubmittedImage::from_bytes(Vec::<u8>::new()));
        assert!(invalid(form.validate(UserId::new(1), Utc::now())));
    }

    #[test]
    fn test_validate_rejects_non_numeric_fields() {
        let now = Utc::now();
        assert!(invalid(raw("abc", "1", "1").validate(UserId::new(1), now)));
        assert!(invalid(raw("1", "", "1").validate(UserId::new(1), now)));
        assert!(invalid(raw("1", "1", "math").validate(UserId::new(1), now)));
        assert!(invalid(raw("NaN", "1", "1").validate(UserId::new(1), now)));
        assert!(invalid(raw("inf", "1", "1").validate(UserId::new(1), now)));
    }

    #[test]
    fn test_validate_rejects_out_of_range_coordinates() {
        let now = Utc::now();
        assert!(invalid(raw("91", "0", "1").validate(UserId::new(1), now)));
        assert!(invalid(raw("0", "-180.5", "1").validate(UserId::new(1), now)));
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(CheckInStage::GeofenceChecked.to_string(), "geofence_checked");
        assert_eq!(CheckInStage::Completed.to_string(), "completed");
    }
}
