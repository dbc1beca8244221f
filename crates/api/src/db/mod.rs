//! Record store access for the attendance pipeline.
//!
//! # Database: `attendance`
//!
//! ## Tables
//!
//! - `users` - Accounts; `face_embedding` holds the registered embedding as JSON text
//! - `geofences` - Circular authorized zones
//! - `subjects` - Courses users check in to
//! - `user_subjects` - Enrollment of users in subjects
//! - `attendance_logs` - Append-only check-in records
//!
//! Users, geofences, and subjects are administered elsewhere; the pipeline
//! only reads them, writes `users.face_embedding` once, and appends logs.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p attendance-cli -- migrate
//! ```

pub mod memory;
pub mod postgres;

use std::future::Future;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use attendance_core::{Embedding, Geofence, UserId};

use crate::models::{AttendanceLog, EnrolledIdentity, NewAttendanceLog, Subject};

pub use memory::MemoryRecordStore;
pub use postgres::PgRecordStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// A referenced row does not exist (foreign key violation).
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// The store is unreachable or refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// The record-store interface the pipeline depends on.
///
/// Each method is a single read or a single-row write; the pipeline relies on
/// no other atomicity.
pub trait RecordStore: Send + Sync + 'static {
    /// All geofences with `active = true`.
    fn active_geofences(
        &self,
    ) -> impl Future<Output = Result<Vec<Geofence>, RepositoryError>> + Send;

    /// Load a user's identity. `None` if the user does not exist.
    ///
    /// A missing or empty stored embedding yields an identity with
    /// `embedding: None`. A stored value that does not parse is
    /// `DataCorruption`.
    fn find_identity(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<EnrolledIdentity>, RepositoryError>> + Send;

    /// Store an embedding only if none is stored yet.
    ///
    /// Returns `false` when the user already has an embedding (or does not
    /// exist), in which case nothing is written.
    fn set_embedding_once(
        &self,
        user_id: UserId,
        embedding: &Embedding,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    /// Append one attendance log.
    fn insert_attendance_log(
        &self,
        log: NewAttendanceLog,
    ) -> impl Future<Output = Result<AttendanceLog, RepositoryError>> + Send;

    /// Active subjects the user is enrolled in, ordered by name.
    ///
    /// `None` if the user does not exist.
    fn subjects_for_user(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<Vec<Subject>>, RepositoryError>> + Send;

    /// Cheap connectivity check for readiness probes.
    fn ping(&self) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

/// Stored `face_embedding` texts (after trimming spaces) that mean "no face registered".
///
/// Used by both the read path and the conditional registration update.
pub(crate) const UNREGISTERED_EMBEDDING_TEXT: [&str; 2] = ["", "[]"];

/// Whether a non-null stored `face_embedding` text means "no face registered".
pub(crate) fn is_unregistered_text(raw: &str) -> bool {
    UNREGISTERED_EMBEDDING_TEXT.contains(&raw.trim_matches(' '))
}

/// Parse a stored embedding column.
///
/// `NULL` and the [`UNREGISTERED_EMBEDDING_TEXT`] values are unregistered.
/// Anything else must parse, otherwise it is `DataCorruption`.
pub(crate) fn stored_embedding(
    user_id: UserId,
    raw: Option<&str>,
) -> Result<Option<Embedding>, RepositoryError> {
    let Some(raw) = raw.filter(|raw| !is_unregistered_text(raw)) else {
        return Ok(None);
    };

    Embedding::from_json(raw.trim_matches(' ')).map(Some).map_err(|e| {
        tracing::error!(
            user_id = %user_id,
            error = %e,
            "Stored face embedding is corrupt"
        );
        RepositoryError::DataCorruption(format!("face embedding of user {user_id}: {e}"))
    })
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_embedding_absent_or_empty() {
        let id = UserId::new(1);
        assert!(stored_embedding(id, None).unwrap().is_none());
        assert!(stored_embedding(id, Some("")).unwrap().is_none());
        assert!(stored_embedding(id, Some("[]")).unwrap().is_none());
        assert!(stored_embedding(id, Some(" [] ")).unwrap().is_none());
    }

    #[test]
    fn test_stored_embedding_present() {
        let embedding = stored_embedding(UserId::new(1), Some("[0.1,0.2]")).unwrap();
        assert_eq!(embedding.map(|e| e.len()), Some(2));
    }

    #[test]
    fn test_unparsable_stored_embedding_is_corruption() {
        // A non-empty value is never overwritten by the once-only update,
        // so it must not read back as "unregistered" either.
        for raw in ["{broken", "[1, \"a\"]", "[ ]"] {
            let err = stored_embedding(UserId::new(7), Some(raw)).unwrap_err();
            assert!(
                matches!(err, RepositoryError::DataCorruption(ref msg) if msg.contains("user 7")),
                "{raw}: {err}"
            );
        }
    }
}
