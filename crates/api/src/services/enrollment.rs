//! Face registration.
//!
//! A user registers exactly once. A second attempt is rejected with
//! `AlreadyRegistered` and never overwrites the stored embedding, even when
//! two attempts race.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use attendance_core::UserId;

use crate::biometric::FaceVerifier;
use crate::db::RecordStore;
use crate::models::SubmittedImage;

use super::error::AttendanceError;

/// Registers a user's face embedding.
pub struct EnrollmentService<R, V> {
    store: Arc<R>,
    verifier: Arc<V>,
}

impl<R, V> Clone for EnrollmentService<R, V> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            verifier: Arc::clone(&self.verifier),
        }
    }
}

impl<R: RecordStore, V: FaceVerifier> EnrollmentService<R, V> {
    /// Create an enrollment service.
    #[must_use]
    pub const fn new(store: Arc<R>, verifier: Arc<V>) -> Self {
        Self { store, verifier }
    }

    /// Register the face in `image` for `user_id`.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the image is empty
    /// - `UserNotFound` if the user does not exist
    /// - `AlreadyRegistered` if an embedding is already stored
    /// - `Verification(..)` if the biometric service fails
    #[instrument(skip(self, image), fields(user_id = %user_id, bytes = image.bytes.len()))]
    pub async fn register_face(
        &self,
        user_id: UserId,
        image: &SubmittedImage,
    ) -> Result<(), AttendanceError> {
        if image.bytes.is_empty() {
            return Err(AttendanceError::InvalidInput(
                "Face image is required".to_string(),
            ));
        }

        let identity = self
            .store
            .find_identity(user_id)
            .await
            .map_err(AttendanceError::Storage)?
            .ok_or(AttendanceError::UserNotFound)?;

        if identity.is_registered() {
            info!("Face registration rejected: already registered");
            return Err(AttendanceError::AlreadyRegistered);
        }

        let embedding = self
            .verifier
            .enroll_face(user_id, image)
            .await
            .inspect_err(|e| warn!(error = %e, "Face enrollment call failed"))?;

        let stored = self
            .store
            .set_embedding_once(user_id, &embedding)
            .await
            .map_err(AttendanceError::Persistence)?;

        if !stored {
            // Another registration won between the check and the write.
            info!("Face registration lost a concurrent race");
            return Err(AttendanceError::AlreadyRegistered);
        }

        info!(dims = embedding.len(), "Face registered");
        Ok(())
    }
}
