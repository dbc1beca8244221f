//! Integration tests for the attendance service.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p attendance-integration-tests
//! ```
//!
//! No database or biometric service is needed: the pipeline runs against
//! [`MemoryRecordStore`], the fakes in this crate, and stub collaborators
//! served by an in-process axum listener.
//!
//! # Test Categories
//!
//! - `check_in_pipeline` - Stage ordering, rejections, artifact and record failures
//! - `enrollment` - Once-only face registration
//! - `http_api` - The full router through `tower::ServiceExt::oneshot`
//! - `biometric_client` - `BiometricClient` against stub services

#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;
use secrecy::SecretString;
use url::Url;
use uuid::Uuid;

use attendance_api::biometric::{FaceMatch, FaceVerifier, VerificationError};
use attendance_api::config::{UploadConfig, parse_base_url};
use attendance_api::db::MemoryRecordStore;
use attendance_api::models::{Subject, SubmittedImage};
use attendance_api::services::{ArtifactPurpose, ArtifactStore, Claims, TokenVerifier};
use attendance_core::{Embedding, GeoPoint, Geofence, GeofenceId, SubjectId, UserId};

/// Secret used to sign test tokens.
pub const TEST_JWT_SECRET: &str = "integration-k3y-9f8e7d6c5b4a3210-attendance";

/// A user with a registered face.
pub const REGISTERED_USER: UserId = UserId::new(1);
/// A user without a registered face.
pub const UNREGISTERED_USER: UserId = UserId::new(2);
/// A subject both users are enrolled in.
pub const SUBJECT: SubjectId = SubjectId::new(10);

/// Campus zone used throughout: 50 m around the main building.
pub const CAMPUS_CENTER: GeoPoint = GeoPoint::new(13.736_700, 100.523_200);
/// A point about 2 m from [`CAMPUS_CENTER`].
pub const INSIDE_CAMPUS: GeoPoint = GeoPoint::new(13.736_717, 100.523_186);
/// A point about 500 m north of [`CAMPUS_CENTER`].
pub const FAR_FROM_CAMPUS: GeoPoint = GeoPoint::new(13.741_200, 100.523_200);

/// Embedding stored for [`REGISTERED_USER`].
#[must_use]
pub fn stored_embedding() -> Embedding {
    Embedding::new(vec![0.12, -0.5, 0.33, 0.9]).unwrap()
}

/// The campus geofence.
#[must_use]
pub fn campus_zone() -> Geofence {
    Geofence {
        id: GeofenceId::new(1),
        name: "Main campus".to_string(),
        center: CAMPUS_CENTER,
        radius_meters: 50.0,
        active: true,
    }
}

/// A memory store with both test users, the subject, and the campus zone.
pub async fn seeded_store() -> MemoryRecordStore {
    let store = MemoryRecordStore::new();
    store.add_user(REGISTERED_USER, Some(stored_embedding())).await;
    store.add_user(UNREGISTERED_USER, None).await;
    store
        .add_subject(Subject {
            subject_id: SUBJECT,
            code: "CS101".to_string(),
            name: "Introduction to Programming".to_string(),
            description: None,
        })
        .await;
    store.enroll(REGISTERED_USER, SUBJECT).await;
    store.enroll(UNREGISTERED_USER, SUBJECT).await;
    store.add_geofence(campus_zone()).await;
    store
}

/// A small JPEG-looking payload.
#[must_use]
pub fn face_image() -> SubmittedImage {
    SubmittedImage {
        bytes: vec![0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10].into(),
        file_name: Some("selfie.jpg".to_string()),
        content_type: Some("image/jpeg".to_string()),
    }
}

// ============================================================================
// Fake biometric service
// ============================================================================

/// Failure a fake verifier reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeFailure {
    /// `VerificationError::Timeout`
    Timeout,
    /// `VerificationError::InvalidResponse`
    InvalidResponse,
    /// `VerificationError::Rejected` with this reason
    Rejected(String),
    /// `VerificationError::Unavailable` with a 500 status and this reason
    Unavailable(String),
    /// `VerificationError::Transport`
    Transport,
}

impl FakeFailure {
    fn to_error(&self) -> VerificationError {
        match self {
            Self::Timeout => VerificationError::Timeout,
            Self::InvalidResponse => VerificationError::InvalidResponse("fake".to_string()),
            Self::Rejected(reason) => VerificationError::Rejected {
                status: 400,
                reason: reason.clone(),
            },
            Self::Unavailable(reason) => VerificationError::Unavailable {
                status: 500,
                reason: reason.clone(),
            },
            Self::Transport => VerificationError::Transport("fake".to_string()),
        }
    }
}

struct FakeVerifierInner {
    match_result: Result<FaceMatch, FakeFailure>,
    enroll_result: Result<Vec<f64>, FakeFailure>,
    match_calls: AtomicUsize,
    enroll_calls: AtomicUsize,
}

/// A [`FaceVerifier`] with scripted answers that counts its calls.
///
/// Clones share the counters.
#[derive(Clone)]
pub struct FakeVerifier {
    inner: Arc<FakeVerifierInner>,
}

impl FakeVerifier {
    fn new(match_result: Result<FaceMatch, FakeFailure>) -> Self {
        Self {
            inner: Arc::new(FakeVerifierInner {
                match_result,
                enroll_result: Ok(vec![0.7, 0.1, -0.2]),
                match_calls: AtomicUsize::new(0),
                enroll_calls: AtomicUsize::new(0),
            }),
        }
    }

    /// Every face matches at `distance`.
    #[must_use]
    pub fn matching(distance: f64) -> Self {
        Self::new(Ok(FaceMatch {
            is_match: true,
            distance,
        }))
    }

    /// No face matches; `distance` is reported.
    #[must_use]
    pub fn mismatching(distance: f64) -> Self {
        Self::new(Ok(FaceMatch {
            is_match: false,
            distance,
        }))
    }

    /// Every call fails.
    #[must_use]
    pub fn failing(failure: FakeFailure) -> Self {
        let mut verifier = Self::new(Err(failure.clone()));
        if let Some(inner) = Arc::get_mut(&mut verifier.inner) {
            inner.enroll_result = Err(failure);
        }
        verifier
    }

    /// Enrollment returns this embedding.
    #[must_use]
    pub fn with_enrollment(mut self, values: Vec<f64>) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.enroll_result = Ok(values);
        }
        self
    }

    /// Number of `match_face` calls so far.
    #[must_use]
    pub fn match_calls(&self) -> usize {
        self.inner.match_calls.load(Ordering::SeqCst)
    }

    /// Number of `enroll_face` calls so far.
    #[must_use]
    pub fn enroll_calls(&self) -> usize {
        self.inner.enroll_calls.load(Ordering::SeqCst)
    }
}

impl FaceVerifier for FakeVerifier {
    async fn enroll_face(
        &self,
        _user_id: UserId,
        _image: &SubmittedImage,
    ) -> Result<Embedding, VerificationError> {
        self.inner.enroll_calls.fetch_add(1, Ordering::SeqCst);
        // Let concurrent registrations interleave.
        tokio::task::yield_now().await;
        match &self.inner.enroll_result {
            Ok(values) => Embedding::new(values.clone())
                .map_err(|e| VerificationError::InvalidResponse(e.to_string())),
            Err(failure) => Err(failure.to_error()),
        }
    }

    async fn match_face(
        &self,
        _image: &SubmittedImage,
        _stored: &Embedding,
    ) -> Result<FaceMatch, VerificationError> {
        self.inner.match_calls.fetch_add(1, Ordering::SeqCst);
        match &self.inner.match_result {
            Ok(result) => Ok(*result),
            Err(failure) => Err(failure.to_error()),
        }
    }
}

// ============================================================================
// Artifact stores
// ============================================================================

/// Artifact store that records saves and hands out fixed locators.
#[derive(Clone, Default)]
pub struct RecordingArtifacts {
    saves: Arc<AtomicUsize>,
}

impl RecordingArtifacts {
    /// Number of images saved.
    #[must_use]
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl ArtifactStore for RecordingArtifacts {
    async fn save(
        &self,
        user_id: UserId,
        purpose: ArtifactPurpose,
        _image: &SubmittedImage,
    ) -> Option<String> {
        let n = self.saves.fetch_add(1, Ordering::SeqCst) + 1;
        Some(format!("/uploads/user_{user_id}_{purpose}_{n}.jpg"))
    }
}

/// Artifact store whose saves always fail.
#[derive(Clone, Default)]
pub struct FailingArtifacts {
    attempts: Arc<AtomicUsize>,
}

impl FailingArtifacts {
    /// Number of save attempts.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl ArtifactStore for FailingArtifacts {
    async fn save(
        &self,
        _user_id: UserId,
        _purpose: ArtifactPurpose,
        _image: &SubmittedImage,
    ) -> Option<String> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        None
    }
}

// ============================================================================
// HTTP helpers
// ============================================================================

/// Token verifier using [`TEST_JWT_SECRET`].
#[must_use]
pub fn test_tokens() -> TokenVerifier {
    TokenVerifier::new(SecretString::from(TEST_JWT_SECRET.to_string()))
}

/// A valid bearer token for `user_id`.
#[must_use]
pub fn token_for(user_id: UserId) -> String {
    test_tokens()
        .sign(&Claims {
            user_id,
            username: format!("student{user_id}"),
            token_type: "user".to_string(),
            exp: Utc::now().timestamp() + 3600,
        })
        .unwrap()
}

/// Upload config pointing at a fresh temporary directory.
#[must_use]
pub fn temp_uploads() -> UploadConfig {
    UploadConfig {
        dir: temp_dir("uploads"),
        ..UploadConfig::default()
    }
}

/// A unique path under the system temp directory. Not created.
#[must_use]
pub fn temp_dir(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("attendance-{tag}-{}", Uuid::new_v4()))
}

/// Builds `multipart/form-data` bodies.
pub struct MultipartBody {
    boundary: String,
    body: Vec<u8>,
}

impl Default for MultipartBody {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartBody {
    /// Start an empty body.
    #[must_use]
    pub fn new() -> Self {
        Self {
            boundary: format!("----attendance-{}", Uuid::new_v4().simple()),
            body: Vec::new(),
        }
    }

    /// Add a text field.
    #[must_use]
    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self
    }

    /// Add a file field.
    #[must_use]
    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    /// Finish the body, returning `(content_type, bytes)`.
    #[must_use]
    pub fn finish(mut self) -> (String, Vec<u8>) {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        (
            format!("multipart/form-data; boundary={}", self.boundary),
            self.body,
        )
    }
}

// ============================================================================
// Stub collaborators
// ============================================================================

/// Serve `router` on an ephemeral loopback port and return its base URL.
pub async fn spawn_stub(router: axum::Router) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    parse_base_url(&format!("http://{addr}")).unwrap()
}

/// A loopback URL nothing is listening on.
pub async fn closed_port_url() -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    parse_base_url(&format!("http://{addr}")).unwrap()
}
