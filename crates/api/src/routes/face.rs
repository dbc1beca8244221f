//! Face registration route handler.

use axum::{
    Json,
    extract::{Multipart, State},
};
use serde::Serialize;
use tracing::instrument;

use crate::biometric::FaceVerifier;
use crate::db::RecordStore;
use crate::error::{AppError, Result};
use crate::middleware::RequireUser;
use crate::services::ArtifactStore;
use crate::state::AppState;

use super::form::UploadForm;

/// Response for a successful `POST /register-my-face`.
#[derive(Debug, Serialize)]
pub struct RegisterFaceResponse {
    /// Confirmation message.
    pub message: &'static str,
}

/// POST /register-my-face - Register the caller's face once.
///
/// Multipart field: `image`. Returns 409 if a face is already registered.
#[instrument(skip(state, user, multipart), fields(user_id = %user.user_id))]
pub async fn register_my_face<R, V, A>(
    State(state): State<AppState<R, V, A>>,
    RequireUser(user): RequireUser,
    multipart: Multipart,
) -> Result<Json<RegisterFaceResponse>>
where
    R: RecordStore,
    V: FaceVerifier,
    A: ArtifactStore,
{
    let form = UploadForm::read(multipart).await?;
    let image = form
        .image
        .ok_or_else(|| AppError::BadRequest("Face image is required".to_string()))?;

    state
        .enrollment()
        .register_face(user.user_id, &image)
        .await?;

    Ok(Json(RegisterFaceResponse {
        message: "Face registered successfully",
    }))
}
