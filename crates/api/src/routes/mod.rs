//! HTTP route handlers for the attendance API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (record store reachable)
//!
//! # Pipeline (requires user bearer token)
//! GET  /check-geofence         - Is (latitude, longitude) inside an active zone?
//! POST /check-in               - Multipart check-in: image, latitude, longitude, subject_id
//! POST /register-my-face       - Multipart face registration: image
//! GET  /courses                - Subjects the caller is enrolled in
//!
//! # Artifacts
//! GET  {UPLOAD_URL_PREFIX}/*   - Stored check-in images
//! ```

pub mod check_in;
pub mod courses;
pub mod face;
pub mod form;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use tracing::warn;

use crate::biometric::FaceVerifier;
use crate::db::RecordStore;
use crate::services::ArtifactStore;
use crate::state::AppState;

/// Create the pipeline routes.
pub fn routes<R, V, A>() -> Router<AppState<R, V, A>>
where
    R: RecordStore,
    V: FaceVerifier,
    A: ArtifactStore,
{
    Router::new()
        .route("/check-geofence", get(check_in::check_geofence::<R, V, A>))
        .route("/check-in", post(check_in::check_in::<R, V, A>))
        .route("/register-my-face", post(face::register_my_face::<R, V, A>))
        .route("/courses", get(courses::my_courses::<R, V, A>))
}

/// Create the health check routes.
pub fn health_routes<R, V, A>() -> Router<AppState<R, V, A>>
where
    R: RecordStore,
    V: FaceVerifier,
    A: ArtifactStore,
{
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness::<R, V, A>))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the record store is not reachable.
async fn readiness<R, V, A>(State(state): State<AppState<R, V, A>>) -> StatusCode
where
    R: RecordStore,
    V: FaceVerifier,
    A: ArtifactStore,
{
    match state.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
