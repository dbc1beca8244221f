//! Check-in pipeline tests against in-memory collaborators.
//!
//! Run with: `cargo test -p attendance-integration-tests --test check_in_pipeline`

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use chrono::Utc;

use attendance_api::biometric::VerificationError;
use attendance_api::db::MemoryRecordStore;
use attendance_api::models::VerificationAttempt;
use attendance_api::services::{ArtifactStore, AttendanceError, CheckInService};
use attendance_core::{AttendanceStatus, GeoPoint, Geofence, GeofenceId, SubjectId, UserId};
use attendance_integration_tests::{
    CAMPUS_CENTER, FAR_FROM_CAMPUS, FailingArtifacts, FakeFailure, FakeVerifier, INSIDE_CAMPUS,
    REGISTERED_USER, RecordingArtifacts, SUBJECT, UNREGISTERED_USER, campus_zone, face_image,
    seeded_store, stored_embedding,
};

fn pipeline<A: ArtifactStore>(
    store: &MemoryRecordStore,
    verifier: &FakeVerifier,
    artifacts: A,
) -> CheckInService<MemoryRecordStore, FakeVerifier, A> {
    CheckInService::new(
        Arc::new(store.clone()),
        Arc::new(verifier.clone()),
        Arc::new(artifacts),
    )
}

fn attempt(user_id: UserId, location: GeoPoint) -> VerificationAttempt {
    VerificationAttempt {
        user_id,
        subject_id: SUBJECT,
        image: face_image(),
        location,
        received_at: Utc::now(),
    }
}

// ============================================================================
// Accepted check-ins
// ============================================================================

#[tokio::test]
async fn test_check_in_inside_zone_with_matching_face_is_recorded() {
    let store = seeded_store().await;
    let verifier = FakeVerifier::matching(0.31);
    let artifacts = RecordingArtifacts::default();
    let service = pipeline(&store, &verifier, artifacts.clone());

    let receipt = service
        .check_in(attempt(REGISTERED_USER, INSIDE_CAMPUS))
        .await
        .unwrap();

    assert!((receipt.distance - 0.31).abs() < f64::EPSILON);
    assert_eq!(receipt.log.user_id, REGISTERED_USER);
    assert_eq!(receipt.log.subject_id, SUBJECT);
    assert_eq!(receipt.log.status, AttendanceStatus::Accepted);
    assert!(receipt.log.in_geofence);
    assert_eq!(receipt.log.face_distance, Some(0.31));
    assert!(receipt.log.image_url.as_deref().unwrap().starts_with("/uploads/"));
    assert_eq!(receipt.log.location, INSIDE_CAMPUS);

    assert_eq!(verifier.match_calls(), 1);
    assert_eq!(artifacts.saves(), 1);

    let logs = store.logs().await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0], receipt.log);
}

#[tokio::test]
async fn test_artifact_failure_does_not_block_check_in() {
    let store = seeded_store().await;
    let verifier = FakeVerifier::matching(0.2);
    let artifacts = FailingArtifacts::default();
    let service = pipeline(&store, &verifier, artifacts.clone());

    let receipt = service
        .check_in(attempt(REGISTERED_USER, INSIDE_CAMPUS))
        .await
        .unwrap();

    assert_eq!(artifacts.attempts(), 1);
    assert_eq!(receipt.log.image_url, None);
    assert_eq!(receipt.log.status, AttendanceStatus::Accepted);
    assert_eq!(store.logs().await.len(), 1);
}

#[tokio::test]
async fn test_repeated_check_ins_each_produce_a_log() {
    let store = seeded_store().await;
    let verifier = FakeVerifier::matching(0.25);
    let service = pipeline(&store, &verifier, RecordingArtifacts::default());

    let first = service
        .check_in(attempt(REGISTERED_USER, INSIDE_CAMPUS))
        .await
        .unwrap();
    let second = service
        .check_in(attempt(REGISTERED_USER, INSIDE_CAMPUS))
        .await
        .unwrap();

    assert_ne!(first.log.id, second.log.id);
    assert_eq!(store.logs().await.len(), 2);
}

#[tokio::test]
async fn test_any_active_zone_accepts() {
    let store = seeded_store().await;
    let annex = GeoPoint::new(13.745_700, 100.523_200);
    store
        .add_geofence(Geofence {
            id: GeofenceId::new(2),
            name: "Annex".to_string(),
            center: annex,
            radius_meters: 100.0,
            active: true,
        })
        .await;
    let verifier = FakeVerifier::matching(0.2);
    let service = pipeline(&store, &verifier, RecordingArtifacts::default());

    // 10 m from the annex, about 1 km from the campus center.
    let near_annex = GeoPoint::new(13.745_790, 100.523_200);
    assert!(service.check_in(attempt(REGISTERED_USER, near_annex)).await.is_ok());
}

// ============================================================================
// Geofence rejections
// ============================================================================

#[tokio::test]
async fn test_out_of_area_rejects_before_any_remote_call() {
    let store = seeded_store().await;
    store
        .add_geofence(Geofence {
            id: GeofenceId::new(2),
            name: "Annex".to_string(),
            center: GeoPoint::new(13.745_700, 100.523_200),
            radius_meters: 50.0,
            active: true,
        })
        .await;
    let verifier = FakeVerifier::matching(0.1);
    let artifacts = RecordingArtifacts::default();
    let service = pipeline(&store, &verifier, artifacts.clone());

    let err = service
        .check_in(attempt(REGISTERED_USER, FAR_FROM_CAMPUS))
        .await
        .unwrap_err();

    let AttendanceError::OutOfArea { nearest_distance_m } = err else {
        panic!("expected OutOfArea, got {err:?}");
    };
    // Both zone centers are about 500 m away.
    assert!((nearest_distance_m - 500.4).abs() < 2.0, "{nearest_distance_m}");

    assert_eq!(verifier.match_calls(), 0);
    assert_eq!(artifacts.saves(), 0);
    assert!(store.logs().await.is_empty());
}

#[tokio::test]
async fn test_no_active_zones_rejects_everything() {
    let store = MemoryRecordStore::new();
    store
        .add_user(REGISTERED_USER, Some(stored_embedding()))
        .await;
    let verifier = FakeVerifier::matching(0.1);
    let service = pipeline(&store, &verifier, RecordingArtifacts::default());

    let err = service
        .check_in(attempt(REGISTERED_USER, CAMPUS_CENTER))
        .await
        .unwrap_err();

    let AttendanceError::OutOfArea { nearest_distance_m } = err else {
        panic!("expected OutOfArea, got {err:?}");
    };
    assert!(nearest_distance_m.is_infinite());
    assert_eq!(verifier.match_calls(), 0);
}

#[tokio::test]
async fn test_inactive_zone_is_ignored() {
    let store = MemoryRecordStore::new();
    store
        .add_user(REGISTERED_USER, Some(stored_embedding()))
        .await;
    store
        .add_geofence(Geofence {
            active: false,
            ..campus_zone()
        })
        .await;
    let verifier = FakeVerifier::matching(0.1);
    let service = pipeline(&store, &verifier, RecordingArtifacts::default());

    let err = service
        .check_in(attempt(REGISTERED_USER, CAMPUS_CENTER))
        .await
        .unwrap_err();
    assert!(matches!(err, AttendanceError::OutOfArea { .. }));
}

#[tokio::test]
async fn test_zone_with_missing_center_is_skipped() {
    let store = seeded_store().await;
    store
        .add_geofence(Geofence {
            id: GeofenceId::new(3),
            name: "Unmapped".to_string(),
            center: GeoPoint::new(f64::NAN, f64::NAN),
            radius_meters: 1_000_000.0,
            active: true,
        })
        .await;
    let verifier = FakeVerifier::matching(0.1);
    let service = pipeline(&store, &verifier, RecordingArtifacts::default());

    let evaluation = service
        .check_geofence(REGISTERED_USER, FAR_FROM_CAMPUS)
        .await
        .unwrap();
    assert!(!evaluation.inside_any);
    assert_eq!(evaluation.skipped, 1);
    assert!(evaluation.nearest_distance_meters.is_finite());

    let evaluation = service
        .check_geofence(REGISTERED_USER, INSIDE_CAMPUS)
        .await
        .unwrap();
    assert!(evaluation.inside_any);
}

// ============================================================================
// Identity and face rejections
// ============================================================================

#[tokio::test]
async fn test_unregistered_face_is_rejected_without_remote_call() {
    let store = seeded_store().await;
    let verifier = FakeVerifier::matching(0.1);
    let service = pipeline(&store, &verifier, RecordingArtifacts::default());

    let err = service
        .check_in(attempt(UNREGISTERED_USER, INSIDE_CAMPUS))
        .await
        .unwrap_err();

    assert!(matches!(err, AttendanceError::FaceNotRegistered));
    assert_eq!(verifier.match_calls(), 0);
    assert!(store.logs().await.is_empty());
}

#[tokio::test]
async fn test_missing_user_is_rejected() {
    let store = seeded_store().await;
    let verifier = FakeVerifier::matching(0.1);
    let service = pipeline(&store, &verifier, RecordingArtifacts::default());

    let err = service
        .check_in(attempt(UserId::new(404), INSIDE_CAMPUS))
        .await
        .unwrap_err();

    assert!(matches!(err, AttendanceError::UserNotFound));
    assert_eq!(verifier.match_calls(), 0);
}

#[tokio::test]
async fn test_face_mismatch_is_rejected_and_not_recorded() {
    let store = seeded_store().await;
    let verifier = FakeVerifier::mismatching(0.82);
    let artifacts = RecordingArtifacts::default();
    let service = pipeline(&store, &verifier, artifacts.clone());

    let err = service
        .check_in(attempt(REGISTERED_USER, INSIDE_CAMPUS))
        .await
        .unwrap_err();

    let AttendanceError::FaceMismatch { distance } = err else {
        panic!("expected FaceMismatch, got {err:?}");
    };
    assert!((distance - 0.82).abs() < f64::EPSILON);
    assert_eq!(verifier.match_calls(), 1);
    assert_eq!(artifacts.saves(), 0);
    assert!(store.logs().await.is_empty());
}

#[tokio::test]
async fn test_remote_timeout_surfaces_and_records_nothing() {
    let store = seeded_store().await;
    let verifier = FakeVerifier::failing(FakeFailure::Timeout);
    let artifacts = RecordingArtifacts::default();
    let service = pipeline(&store, &verifier, artifacts.clone());

    let err = service
        .check_in(attempt(REGISTERED_USER, INSIDE_CAMPUS))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AttendanceError::Verification(VerificationError::Timeout)
    ));
    assert_eq!(err.code(), "remote_timeout");
    assert_eq!(artifacts.saves(), 0);
    assert!(store.logs().await.is_empty());
}

#[tokio::test]
async fn test_remote_server_fault_is_unavailable_and_records_nothing() {
    let store = seeded_store().await;
    let verifier = FakeVerifier::failing(FakeFailure::Unavailable("model not loaded".to_string()));
    let service = pipeline(&store, &verifier, RecordingArtifacts::default());

    let err = service
        .check_in(attempt(REGISTERED_USER, INSIDE_CAMPUS))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AttendanceError::Verification(VerificationError::Unavailable { status: 500, .. })
    ));
    assert_eq!(err.code(), "remote_unavailable");
    assert_eq!(err.status_code().as_u16(), 502);
    assert!(store.logs().await.is_empty());
}

#[tokio::test]
async fn test_remote_rejection_keeps_reason() {
    let store = seeded_store().await;
    let verifier = FakeVerifier::failing(FakeFailure::Rejected("No face detected".to_string()));
    let service = pipeline(&store, &verifier, RecordingArtifacts::default());

    let err = service
        .check_in(attempt(REGISTERED_USER, INSIDE_CAMPUS))
        .await
        .unwrap_err();

    assert_eq!(err.public_message(), "AI Error: No face detected");
    assert_eq!(err.status_code().as_u16(), 400);
}

// ============================================================================
// Recording
// ============================================================================

#[tokio::test]
async fn test_unknown_subject_fails_after_verification() {
    let store = seeded_store().await;
    let verifier = FakeVerifier::matching(0.2);
    let service = pipeline(&store, &verifier, RecordingArtifacts::default());

    let mut unknown = attempt(REGISTERED_USER, INSIDE_CAMPUS);
    unknown.subject_id = SubjectId::new(999);
    let err = service.check_in(unknown).await.unwrap_err();

    assert!(matches!(err, AttendanceError::UnknownSubject));
    assert!(store.logs().await.is_empty());
}

#[tokio::test]
async fn test_record_failure_is_reported_not_swallowed() {
    let store = seeded_store().await;
    store.fail_writes(true).await;
    let verifier = FakeVerifier::matching(0.2);
    let service = pipeline(&store, &verifier, RecordingArtifacts::default());

    let err = service
        .check_in(attempt(REGISTERED_USER, INSIDE_CAMPUS))
        .await
        .unwrap_err();

    assert!(matches!(err, AttendanceError::Persistence(_)));
    assert_eq!(err.status_code().as_u16(), 500);
    assert_eq!(err.public_message(), "Internal server error");
    assert_eq!(verifier.match_calls(), 1);
}

// ============================================================================
// Rejected-attempt auditing
// ============================================================================

#[tokio::test]
async fn test_audit_records_face_mismatch() {
    let store = seeded_store().await;
    let verifier = FakeVerifier::mismatching(0.77);
    let service =
        pipeline(&store, &verifier, RecordingArtifacts::default()).with_rejected_attempts(true);

    let err = service
        .check_in(attempt(REGISTERED_USER, INSIDE_CAMPUS))
        .await
        .unwrap_err();
    assert!(matches!(err, AttendanceError::FaceMismatch { .. }));

    let logs = store.logs().await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, AttendanceStatus::FaceMismatch);
    assert!(logs[0].in_geofence);
    assert_eq!(logs[0].face_distance, Some(0.77));
    assert_eq!(logs[0].image_url, None);
}

#[tokio::test]
async fn test_audit_records_out_of_area() {
    let store = seeded_store().await;
    let verifier = FakeVerifier::matching(0.1);
    let service =
        pipeline(&store, &verifier, RecordingArtifacts::default()).with_rejected_attempts(true);

    let err = service
        .check_in(attempt(REGISTERED_USER, FAR_FROM_CAMPUS))
        .await
        .unwrap_err();
    assert!(matches!(err, AttendanceError::OutOfArea { .. }));
    assert_eq!(verifier.match_calls(), 0);

    let logs = store.logs().await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, AttendanceStatus::OutOfArea);
    assert!(!logs[0].in_geofence);
    assert_eq!(logs[0].face_distance, None);
}

#[tokio::test]
async fn test_audit_write_failure_keeps_original_rejection() {
    let store = seeded_store().await;
    store.fail_writes(true).await;
    let verifier = FakeVerifier::mismatching(0.9);
    let service =
        pipeline(&store, &verifier, RecordingArtifacts::default()).with_rejected_attempts(true);

    let err = service
        .check_in(attempt(REGISTERED_USER, INSIDE_CAMPUS))
        .await
        .unwrap_err();
    assert!(matches!(err, AttendanceError::FaceMismatch { .. }));
}
