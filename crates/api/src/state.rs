//! Application state shared across handlers.

use std::sync::Arc;

use axum::extract::FromRef;

use crate::biometric::{BiometricClient, FaceVerifier};
use crate::config::UploadConfig;
use crate::db::{PgRecordStore, RecordStore};
use crate::services::{
    ArtifactStore, CheckInService, DiskArtifactStore, EnrollmentService, TokenVerifier,
};

/// State used by the production binary.
pub type ProductionState = AppState<PgRecordStore, BiometricClient, DiskArtifactStore>;

/// Application state shared across all handlers.
///
/// Generic over the record store, face verifier, and artifact store so the
/// full router can run against in-memory collaborators in tests. Cloning is
/// cheap (`Arc`).
pub struct AppState<R, V, A> {
    inner: Arc<AppStateInner<R, V, A>>,
}

struct AppStateInner<R, V, A> {
    store: Arc<R>,
    check_in: CheckInService<R, V, A>,
    enrollment: EnrollmentService<R, V>,
    tokens: TokenVerifier,
    uploads: UploadConfig,
}

impl<R, V, A> Clone for AppState<R, V, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R, V, A> AppState<R, V, A>
where
    R: RecordStore,
    V: FaceVerifier,
    A: ArtifactStore,
{
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `store` - Record store for geofences, identities, and logs
    /// * `verifier` - Biometric service
    /// * `artifacts` - Check-in image storage
    /// * `tokens` - Bearer token verifier
    /// * `uploads` - Upload limits and the public image prefix
    /// * `record_rejected` - Also log rejected check-ins
    #[must_use]
    pub fn new(
        store: R,
        verifier: V,
        artifacts: A,
        tokens: TokenVerifier,
        uploads: UploadConfig,
        record_rejected: bool,
    ) -> Self {
        let store = Arc::new(store);
        let verifier = Arc::new(verifier);

        let check_in =
            CheckInService::new(Arc::clone(&store), Arc::clone(&verifier), Arc::new(artifacts))
                .with_rejected_attempts(record_rejected);
        let enrollment = EnrollmentService::new(Arc::clone(&store), verifier);

        Self {
            inner: Arc::new(AppStateInner {
                store,
                check_in,
                enrollment,
                tokens,
                uploads,
            }),
        }
    }

    /// Get a reference to the record store.
    #[must_use]
    pub fn store(&self) -> &R {
        &self.inner.store
    }

    /// Get a reference to the check-in pipeline.
    #[must_use]
    pub fn check_in(&self) -> &CheckInService<R, V, A> {
        &self.inner.check_in
    }

    /// Get a reference to the enrollment service.
    #[must_use]
    pub fn enrollment(&self) -> &EnrollmentService<R, V> {
        &self.inner.enrollment
    }

    /// Get a reference to the token verifier.
    #[must_use]
    pub fn tokens(&self) -> &TokenVerifier {
        &self.inner.tokens
    }

    /// Get a reference to the upload configuration.
    #[must_use]
    pub fn uploads(&self) -> &UploadConfig {
        &self.inner.uploads
    }
}

impl<R, V, A> FromRef<AppState<R, V, A>> for TokenVerifier {
    fn from_ref(state: &AppState<R, V, A>) -> Self {
        state.inner.tokens.clone()
    }
}
