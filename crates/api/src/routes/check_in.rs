//! Check-in route handlers.

use axum::{
    Json,
    extract::{Multipart, Query, State},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::biometric::FaceVerifier;
use crate::db::RecordStore;
use crate::error::Result;
use crate::middleware::RequireUser;
use crate::services::{ArtifactStore, RawCheckIn, parse_location};
use crate::state::AppState;

use super::form::UploadForm;

/// Query parameters for `GET /check-geofence`.
///
/// Kept as text so a missing or non-numeric value is a 400 with the
/// pipeline's message rather than an extractor rejection.
#[derive(Debug, Deserialize)]
pub struct GeofenceQuery {
    latitude: Option<String>,
    longitude: Option<String>,
}

/// Response for `GET /check-geofence`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceResponse {
    /// Whether the location is inside any active geofence.
    pub is_in_geofence: bool,
}

/// Response for a successful `POST /check-in`.
#[derive(Debug, Serialize)]
pub struct CheckInResponse {
    /// Confirmation message.
    pub message: &'static str,
    /// Face match distance.
    pub distance: f64,
}

/// GET /check-geofence - Test a location against the active geofences.
#[instrument(skip(state, user, query), fields(user_id = %user.user_id))]
pub async fn check_geofence<R, V, A>(
    State(state): State<AppState<R, V, A>>,
    RequireUser(user): RequireUser,
    Query(query): Query<GeofenceQuery>,
) -> Result<Json<GeofenceResponse>>
where
    R: RecordStore,
    V: FaceVerifier,
    A: ArtifactStore,
{
    let point = parse_location(query.latitude.as_deref(), query.longitude.as_deref())?;
    let evaluation = state.check_in().check_geofence(user.user_id, point).await?;

    Ok(Json(GeofenceResponse {
        is_in_geofence: evaluation.inside_any,
    }))
}

/// POST /check-in - Run the check-in pipeline for the caller.
///
/// Multipart fields: `image`, `latitude`, `longitude`, `subject_id`.
#[instrument(skip(state, user, multipart), fields(user_id = %user.user_id))]
pub async fn check_in<R, V, A>(
    State(state): State<AppState<R, V, A>>,
    RequireUser(user): RequireUser,
    multipart: Multipart,
) -> Result<Json<CheckInResponse>>
where
    R: RecordStore,
    V: FaceVerifier,
    A: ArtifactStore,
{
    let received_at = Utc::now();
    let mut form = UploadForm::read(multipart).await?;

    let raw = RawCheckIn {
        image: form.image.take(),
        latitude: form.take("latitude"),
        longitude: form.take("longitude"),
        subject_id: form.take("subject_id"),
    };
    let attempt = raw.validate(user.user_id, received_at)?;

    let receipt = state.check_in().check_in(attempt).await?;

    Ok(Json(CheckInResponse {
        message: "Check-in successful!",
        distance: receipt.distance,
    }))
}
