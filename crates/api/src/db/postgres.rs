//! `PostgreSQL` implementation of [`RecordStore`].
//!
//! Queries are checked at runtime (`query_as`) so the crate builds without a
//! live database.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, instrument};

use attendance_core::{
    AttendanceLogId, Embedding, GeoPoint, Geofence, GeofenceId, SubjectId, UserId,
};

use super::{RecordStore, RepositoryError, UNREGISTERED_EMBEDDING_TEXT, stored_embedding};
use crate::models::{AttendanceLog, EnrolledIdentity, NewAttendanceLog, Subject};

/// Record store backed by a `PostgreSQL` pool.
#[derive(Debug, Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

}

/// Internal row type for geofence queries.
#[derive(sqlx::FromRow)]
struct GeofenceRow {
    geofence_id: i32,
    name: String,
    center_latitude: Option<f64>,
    center_longitude: Option<f64>,
    radius_meters: f64,
    is_active: bool,
}

impl From<GeofenceRow> for Geofence {
    fn from(row: GeofenceRow) -> Self {
        // NULL centers become NaN so the evaluator skips the zone.
        Self {
            id: GeofenceId::new(row.geofence_id),
            name: row.name,
            center: GeoPoint::new(
                row.center_latitude.unwrap_or(f64::NAN),
                row.center_longitude.unwrap_or(f64::NAN),
            ),
            radius_meters: row.radius_meters,
            active: row.is_active,
        }
    }
}

/// Internal row type for identity queries.
#[derive(sqlx::FromRow)]
struct IdentityRow {
    user_id: i32,
    face_embedding: Option<String>,
}

/// Internal row type for subject queries.
#[derive(sqlx::FromRow)]
struct SubjectRow {
    subject_id: i32,
    code: String,
    name: String,
    description: Option<String>,
}

/// Internal row type for inserted log ids.
#[derive(sqlx::FromRow)]
struct InsertedLogRow {
    log_id: i32,
    check_in_time: DateTime<Utc>,
}

impl RecordStore for PgRecordStore {
    #[instrument(skip(self))]
    async fn active_geofences(&self) -> Result<Vec<Geofence>, RepositoryError> {
        let rows = sqlx::query_as::<_, GeofenceRow>(
            r"
            SELECT geofence_id, name, center_latitude, center_longitude,
                   radius_meters, is_active
            FROM geofences
            WHERE is_active = TRUE
            ORDER BY geofence_id
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        debug!(count = rows.len(), "Loaded active geofences");
        Ok(rows.into_iter().map(Geofence::from).collect())
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn find_identity(
        &self,
        user_id: UserId,
    ) -> Result<Option<EnrolledIdentity>, RepositoryError> {
        let row = sqlx::query_as::<_, IdentityRow>(
            r"
            SELECT user_id, face_embedding
            FROM users
            WHERE user_id = $1
            ",
        )
        .bind(user_id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            let user_id = UserId::new(r.user_id);
            Ok(EnrolledIdentity {
                user_id,
                embedding: stored_embedding(user_id, r.face_embedding.as_deref())?,
            })
        })
        .transpose()
    }

    #[instrument(skip(self, embedding), fields(user_id = %user_id, dims = embedding.len()))]
    async fn set_embedding_once(
        &self,
        user_id: UserId,
        embedding: &Embedding,
    ) -> Result<bool, RepositoryError> {
        let encoded = embedding
            .to_json()
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;

        // Same notion of "unregistered" as `stored_embedding`.
        let result = sqlx::query(
            r"
            UPDATE users
            SET face_embedding = $2
            WHERE user_id = $1
              AND (face_embedding IS NULL OR btrim(face_embedding) = ANY($3))
            ",
        )
        .bind(user_id.as_i32())
        .bind(encoded)
        .bind(UNREGISTERED_EMBEDDING_TEXT.as_slice())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(
        skip(self, log),
        fields(user_id = %log.user_id, subject_id = %log.subject_id, status = %log.status)
    )]
    async fn insert_attendance_log(
        &self,
        log: NewAttendanceLog,
    ) -> Result<AttendanceLog, RepositoryError> {
        let row = sqlx::query_as::<_, InsertedLogRow>(
            r"
            INSERT INTO attendance_logs (
                user_id, subject_id, latitude, longitude, is_in_geofence,
                face_match_distance, image_url, status, check_in_time
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING log_id, check_in_time
            ",
        )
        .bind(log.user_id.as_i32())
        .bind(log.subject_id.as_i32())
        .bind(log.location.latitude)
        .bind(log.location.longitude)
        .bind(log.in_geofence)
        .bind(log.face_distance)
        .bind(log.image_url.as_deref())
        .bind(log.status.as_str())
        .bind(log.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return RepositoryError::InvalidReference(format!(
                    "user {} or subject {} does not exist",
                    log.user_id, log.subject_id
                ));
            }
            RepositoryError::Database(e)
        })?;

        let mut stored = log.into_log(AttendanceLogId::new(row.log_id));
        stored.created_at = row.check_in_time;
        Ok(stored)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn subjects_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<Vec<Subject>>, RepositoryError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE user_id = $1)")
                .bind(user_id.as_i32())
                .fetch_one(&self.pool)
                .await?;

        if !exists {
            return Ok(None);
        }

        let rows = sqlx::query_as::<_, SubjectRow>(
            r"
            SELECT s.subject_id, s.code, s.name, s.description
            FROM subjects s
            JOIN user_subjects us ON us.subject_id = s.subject_id
            WHERE us.user_id = $1 AND s.is_active = TRUE
            ORDER BY s.name ASC
            ",
        )
        .bind(user_id.as_i32())
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(
            rows.into_iter()
                .map(|r| Subject {
                    subject_id: SubjectId::new(r.subject_id),
                    code: r.code,
                    name: r.name,
                    description: r.description,
                })
                .collect(),
        ))
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
