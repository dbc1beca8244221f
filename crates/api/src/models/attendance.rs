//! Check-in attempt and attendance log types.

use axum::body::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;

use attendance_core::{AttendanceLogId, AttendanceStatus, GeoPoint, SubjectId, UserId};

/// An uploaded face image, kept in memory for the duration of one request.
#[derive(Debug, Clone)]
pub struct SubmittedImage {
    /// Raw image bytes as uploaded.
    pub bytes: Bytes,
    /// Client-supplied file name, if any.
    pub file_name: Option<String>,
    /// Client-supplied content type, if any.
    pub content_type: Option<String>,
}

impl SubmittedImage {
    /// Wrap raw bytes without file metadata.
    #[must_use]
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            file_name: None,
            content_type: None,
        }
    }

    /// Content type to forward, restricted to `image/*` values.
    #[must_use]
    pub fn image_content_type(&self) -> &str {
        self.content_type
            .as_deref()
            .filter(|ct| {
                ct.starts_with("image/")
                    && ct.len() > "image/".len()
                    && ct.bytes().all(|b| b.is_ascii_graphic())
            })
            .unwrap_or("image/jpeg")
    }

    /// Lower-case file extension from the uploaded file name.
    ///
    /// Only short alphanumeric extensions are returned so the value is safe
    /// to embed in a generated file name.
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name.as_deref()?;
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() || ext.len() > 5 {
            return None;
        }
        ext.bytes()
            .all(|b| b.is_ascii_alphanumeric())
            .then(|| ext.to_ascii_lowercase())
    }
}

/// A validated check-in request. Never persisted.
#[derive(Debug, Clone)]
pub struct VerificationAttempt {
    /// Caller.
    pub user_id: UserId,
    /// Subject being checked in to.
    pub subject_id: SubjectId,
    /// Face image to verify.
    pub image: SubmittedImage,
    /// Location the client reported.
    pub location: GeoPoint,
    /// When the attempt was received.
    pub received_at: DateTime<Utc>,
}

/// An attendance record. Append-only; never updated after insert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceLog {
    /// Log ID.
    pub id: AttendanceLogId,
    /// User who checked in.
    pub user_id: UserId,
    /// Subject checked in to.
    pub subject_id: SubjectId,
    /// Reported location.
    pub location: GeoPoint,
    /// Whether the location was inside an active geofence.
    pub in_geofence: bool,
    /// Distance reported by the face matcher, if verification ran.
    pub face_distance: Option<f64>,
    /// Locator of the stored image; `None` means no image is available.
    pub image_url: Option<String>,
    /// Outcome of the attempt.
    pub status: AttendanceStatus,
    /// When the attempt was received.
    pub created_at: DateTime<Utc>,
}

/// Values for a new attendance row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAttendanceLog {
    /// User who checked in.
    pub user_id: UserId,
    /// Subject checked in to.
    pub subject_id: SubjectId,
    /// Reported location.
    pub location: GeoPoint,
    /// Whether the location was inside an active geofence.
    pub in_geofence: bool,
    /// Distance reported by the face matcher, if verification ran.
    pub face_distance: Option<f64>,
    /// Locator of the stored image.
    pub image_url: Option<String>,
    /// Outcome of the attempt.
    pub status: AttendanceStatus,
    /// When the attempt was received.
    pub created_at: DateTime<Utc>,
}

impl NewAttendanceLog {
    /// Attach the id assigned by the store.
    #[must_use]
    pub fn into_log(self, id: AttendanceLogId) -> AttendanceLog {
        AttendanceLog {
            id,
            user_id: self.user_id,
            subject_id: self.subject_id,
            location: self.location,
            in_geofence: self.in_geofence,
            face_distance: self.face_distance,
            image_url: self.image_url,
            status: self.status,
            created_at: self.created_at,
        }
    }
}
