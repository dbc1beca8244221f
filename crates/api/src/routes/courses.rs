//! Course listing for the check-in client.

use axum::{Json, extract::State};
use tracing::instrument;

use crate::biometric::FaceVerifier;
use crate::db::RecordStore;
use crate::error::Result;
use crate::middleware::RequireUser;
use crate::models::Subject;
use crate::services::{ArtifactStore, AttendanceError};
use crate::state::AppState;

/// GET /courses - Active subjects the caller is enrolled in, by name.
#[instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn my_courses<R, V, A>(
    State(state): State<AppState<R, V, A>>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<Subject>>>
where
    R: RecordStore,
    V: FaceVerifier,
    A: ArtifactStore,
{
    let subjects = state
        .store()
        .subjects_for_user(user.user_id)
        .await?
        .ok_or(AttendanceError::UserNotFound)?;

    Ok(Json(subjects))
}
