//! End-to-end tests of the HTTP surface.
//!
//! The full router from `attendance_api::app` is driven in-process with
//! `tower::ServiceExt::oneshot`; no listener or database is involved.
//!
//! Run with: `cargo test -p attendance-integration-tests --test http_api`

#![allow(clippy::unwrap_used)]

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;

use attendance_api::app;
use attendance_api::config::UploadConfig;
use attendance_api::db::MemoryRecordStore;
use attendance_api::services::{ArtifactStore, DiskArtifactStore};
use attendance_api::state::AppState;
use attendance_core::{AttendanceStatus, GeoPoint, UserId};
use attendance_integration_tests::{
    CAMPUS_CENTER, FAR_FROM_CAMPUS, FakeVerifier, INSIDE_CAMPUS, MultipartBody, REGISTERED_USER,
    RecordingArtifacts, SUBJECT, UNREGISTERED_USER, seeded_store, temp_uploads, test_tokens,
    token_for,
};

const JPEG: &[u8] = &[0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10, 0x4a, 0x46];

fn router<A: ArtifactStore>(
    store: &MemoryRecordStore,
    verifier: &FakeVerifier,
    artifacts: A,
    uploads: UploadConfig,
) -> Router {
    app(AppState::new(
        store.clone(),
        verifier.clone(),
        artifacts,
        test_tokens(),
        uploads,
        false,
    ))
}

fn default_router(store: &MemoryRecordStore, verifier: &FakeVerifier) -> Router {
    router(store, verifier, RecordingArtifacts::default(), temp_uploads())
}

fn get(uri: &str, user: Option<UserId>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(user) = user {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token_for(user)));
    }
    builder.body(Body::empty()).unwrap()
}

fn post_form(uri: &str, user: UserId, form: MultipartBody) -> Request<Body> {
    let (content_type, body) = form.finish();
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token_for(user)))
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap()
}

fn check_in_form(location: GeoPoint) -> MultipartBody {
    MultipartBody::new()
        .file("image", "selfie.jpg", "image/jpeg", JPEG)
        .text("latitude", &location.latitude.to_string())
        .text("longitude", &location.longitude.to_string())
        .text("subject_id", &SUBJECT.to_string())
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn geofence_uri(point: GeoPoint) -> String {
    format!(
        "/check-geofence?latitude={}&longitude={}",
        point.latitude, point.longitude
    )
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_needs_no_token() {
    let store = seeded_store().await;
    let app = default_router(&store, &FakeVerifier::matching(0.1));

    let response = app.oneshot(get("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn test_readiness_follows_store() {
    let store = seeded_store().await;
    let app = default_router(&store, &FakeVerifier::matching(0.1));

    let response = app.clone().oneshot(get("/health/ready", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    store.set_unavailable(true).await;
    let response = app.oneshot(get("/health/ready", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_request_id_is_echoed_or_generated() {
    let store = seeded_store().await;
    let app = default_router(&store, &FakeVerifier::matching(0.1));

    let response = app.clone().oneshot(get("/health", None)).await.unwrap();
    let generated = response.headers().get("x-request-id").unwrap();
    assert!(!generated.is_empty());

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "mobile-7f3a")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.headers().get("x-request-id").unwrap(), "mobile-7f3a");
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn test_pipeline_routes_require_token() {
    let store = seeded_store().await;
    let app = default_router(&store, &FakeVerifier::matching(0.1));

    for uri in ["/courses", geofence_uri(INSIDE_CAMPUS).as_str()] {
        let response = app.clone().oneshot(get(uri, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        let body = json_body(response).await;
        assert_eq!(body["code"], "unauthorized");
    }
}

#[tokio::test]
async fn test_bad_signature_is_unauthorized() {
    let store = seeded_store().await;
    let app = default_router(&store, &FakeVerifier::matching(0.1));

    let mut token = token_for(REGISTERED_USER);
    token.push('x');
    let request = Request::builder()
        .uri("/courses")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Geofence check
// ============================================================================

#[tokio::test]
async fn test_check_geofence_inside_and_outside() {
    let store = seeded_store().await;
    let app = default_router(&store, &FakeVerifier::matching(0.1));

    let response = app
        .clone()
        .oneshot(get(&geofence_uri(CAMPUS_CENTER), Some(REGISTERED_USER)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["isInGeofence"], true);

    let response = app
        .oneshot(get(&geofence_uri(FAR_FROM_CAMPUS), Some(REGISTERED_USER)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["isInGeofence"], false);
}

#[tokio::test]
async fn test_check_geofence_rejects_bad_coordinates() {
    let store = seeded_store().await;
    let app = default_router(&store, &FakeVerifier::matching(0.1));

    for uri in [
        "/check-geofence?latitude=abc&longitude=100.5",
        "/check-geofence?longitude=100.5",
        "/check-geofence?latitude=91&longitude=100.5",
    ] {
        let response = app
            .clone()
            .oneshot(get(uri, Some(REGISTERED_USER)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(json_body(response).await["code"], "invalid_input");
    }
}

// ============================================================================
// Check-in
// ============================================================================

#[tokio::test]
async fn test_check_in_success() {
    let store = seeded_store().await;
    let verifier = FakeVerifier::matching(0.3);
    let app = default_router(&store, &verifier);

    let response = app
        .oneshot(post_form(
            "/check-in",
            REGISTERED_USER,
            check_in_form(INSIDE_CAMPUS),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["message"], "Check-in successful!");
    assert_eq!(body["distance"], 0.3);

    let logs = store.logs().await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, AttendanceStatus::Accepted);
}

#[tokio::test]
async fn test_check_in_out_of_area_is_forbidden() {
    let store = seeded_store().await;
    let verifier = FakeVerifier::matching(0.3);
    let app = default_router(&store, &verifier);

    let response = app
        .oneshot(post_form(
            "/check-in",
            REGISTERED_USER,
            check_in_form(FAR_FROM_CAMPUS),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(body["code"], "out_of_area");
    assert_eq!(
        body["error"],
        "You are not within the allowed area for attendance"
    );
    assert_eq!(verifier.match_calls(), 0);
    assert!(store.logs().await.is_empty());
}

#[tokio::test]
async fn test_check_in_without_image_is_bad_request() {
    let store = seeded_store().await;
    let verifier = FakeVerifier::matching(0.3);
    let app = default_router(&store, &verifier);

    let form = MultipartBody::new()
        .text("latitude", &INSIDE_CAMPUS.latitude.to_string())
        .text("longitude", &INSIDE_CAMPUS.longitude.to_string())
        .text("subject_id", &SUBJECT.to_string());
    let response = app
        .oneshot(post_form("/check-in", REGISTERED_USER, form))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], "invalid_input");
    assert_eq!(verifier.match_calls(), 0);
}

#[tokio::test]
async fn test_check_in_oversized_body_is_payload_too_large() {
    let store = seeded_store().await;
    let verifier = FakeVerifier::matching(0.3);
    let uploads = UploadConfig {
        max_bytes: 1024,
        ..temp_uploads()
    };
    let app = router(&store, &verifier, RecordingArtifacts::default(), uploads);

    let image = vec![0xab_u8; 8 * 1024];
    let form = MultipartBody::new()
        .file("image", "selfie.jpg", "image/jpeg", &image)
        .text("latitude", &INSIDE_CAMPUS.latitude.to_string())
        .text("longitude", &INSIDE_CAMPUS.longitude.to_string())
        .text("subject_id", &SUBJECT.to_string());
    let response = app
        .oneshot(post_form("/check-in", REGISTERED_USER, form))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json_body(response).await["code"], "payload_too_large");
    assert_eq!(verifier.match_calls(), 0);
    assert!(store.logs().await.is_empty());
}

#[tokio::test]
async fn test_check_in_unregistered_face() {
    let store = seeded_store().await;
    let app = default_router(&store, &FakeVerifier::matching(0.3));

    let response = app
        .oneshot(post_form(
            "/check-in",
            UNREGISTERED_USER,
            check_in_form(INSIDE_CAMPUS),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], "face_not_registered");
}

#[tokio::test]
async fn test_check_in_face_mismatch_is_forbidden() {
    let store = seeded_store().await;
    let app = default_router(&store, &FakeVerifier::mismatching(0.91));

    let response = app
        .oneshot(post_form(
            "/check-in",
            REGISTERED_USER,
            check_in_form(INSIDE_CAMPUS),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await["code"], "face_mismatch");
}

#[tokio::test]
async fn test_stored_check_in_image_is_served() {
    let store = seeded_store().await;
    let uploads = temp_uploads();
    let artifacts = DiskArtifactStore::from_config(&uploads);
    let app = router(&store, &FakeVerifier::matching(0.2), artifacts, uploads);

    let response = app
        .clone()
        .oneshot(post_form(
            "/check-in",
            REGISTERED_USER,
            check_in_form(INSIDE_CAMPUS),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let logs = store.logs().await;
    let locator = logs[0].image_url.clone().unwrap();
    assert!(locator.starts_with("/uploads/user_1_checkin_"), "{locator}");

    let response = app.oneshot(get(&locator, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], JPEG);
}

// ============================================================================
// Face registration
// ============================================================================

#[tokio::test]
async fn test_register_face_once() {
    let store = seeded_store().await;
    let verifier = FakeVerifier::matching(0.1).with_enrollment(vec![0.1, 0.2, 0.3]);
    let app = default_router(&store, &verifier);

    let form = || MultipartBody::new().file("image", "me.jpg", "image/jpeg", JPEG);

    let response = app
        .clone()
        .oneshot(post_form("/register-my-face", UNREGISTERED_USER, form()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await["message"],
        "Face registered successfully"
    );

    let response = app
        .oneshot(post_form("/register-my-face", UNREGISTERED_USER, form()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(response).await["code"], "already_registered");
    assert_eq!(verifier.enroll_calls(), 1);
}

#[tokio::test]
async fn test_register_face_without_image() {
    let store = seeded_store().await;
    let app = default_router(&store, &FakeVerifier::matching(0.1));

    let response = app
        .oneshot(post_form(
            "/register-my-face",
            UNREGISTERED_USER,
            MultipartBody::new().text("note", "no image"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Courses
// ============================================================================

#[tokio::test]
async fn test_courses_lists_enrolled_subjects() {
    let store = seeded_store().await;
    let app = default_router(&store, &FakeVerifier::matching(0.1));

    let response = app
        .oneshot(get("/courses", Some(REGISTERED_USER)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let courses = body.as_array().unwrap();
    assert_eq!(courses.len(), 1);
    assert_eq!(courses[0]["subject_id"], SUBJECT.as_i32());
    assert_eq!(courses[0]["code"], "CS101");
}

#[tokio::test]
async fn test_courses_for_deleted_user_is_not_found() {
    let store = seeded_store().await;
    let app = default_router(&store, &FakeVerifier::matching(0.1));

    let response = app
        .oneshot(get("/courses", Some(UserId::new(404))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["code"], "user_not_found");
}
