//! Attendance verification API.
//!
//! A check-in bundles a face image, a location, and a subject. It is accepted
//! only if the location is inside an active geofence and the biometric
//! service matches the face against the user's registered embedding; every
//! accepted check-in produces exactly one attendance log.
//!
//! The router is built by [`app`] from an [`AppState`] that is generic over
//! its collaborators, so the same routes run against `PostgreSQL` and the
//! HTTP biometric service in production and against in-memory doubles in
//! tests.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod biometric;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use std::time::Duration;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{Request, Response},
};
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::biometric::FaceVerifier;
use crate::db::RecordStore;
use crate::middleware::request_id_middleware;
use crate::services::ArtifactStore;
use crate::state::AppState;

/// Build the full application router.
///
/// Sentry layers are added by the binary so tests run without a hub.
pub fn app<R, V, A>(state: AppState<R, V, A>) -> Router
where
    R: RecordStore,
    V: FaceVerifier,
    A: ArtifactStore,
{
    let uploads = state.uploads().clone();

    Router::new()
        .merge(routes::health_routes::<R, V, A>())
        .merge(routes::routes::<R, V, A>())
        .nest_service(&uploads.url_prefix, ServeDir::new(&uploads.dir))
        .layer(DefaultBodyLimit::max(uploads.max_bytes))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(|response: &Response<_>, latency: Duration, span: &Span| {
                    span.record("status", response.status().as_u16());
                    span.record(
                        "latency_ms",
                        u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                    );
                    DefaultOnResponse::default().on_response(response, latency, span);
                }),
        )
        .with_state(state)
}
