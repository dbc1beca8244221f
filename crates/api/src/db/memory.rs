//! In-memory implementation of [`RecordStore`].
//!
//! Used by tests and local demos. Enforces the same referential rules as the
//! `PostgreSQL` schema: logs must reference an existing user and subject.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use attendance_core::{AttendanceLogId, Embedding, Geofence, SubjectId, UserId};

use super::{RecordStore, RepositoryError, is_unregistered_text, stored_embedding};
use crate::models::{AttendanceLog, EnrolledIdentity, NewAttendanceLog, Subject};

#[derive(Debug, Default)]
struct Inner {
    users: BTreeMap<UserId, Option<Embedding>>,
    // Raw column text that takes precedence over `users` until overwritten.
    stored_text: BTreeMap<UserId, String>,
    geofences: Vec<Geofence>,
    subjects: BTreeMap<SubjectId, Subject>,
    enrollments: BTreeSet<(UserId, SubjectId)>,
    logs: Vec<AttendanceLog>,
    next_log_id: i32,
    fail_writes: bool,
    unavailable: bool,
}

/// Record store held in process memory.
///
/// Cloning shares the underlying data.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryRecordStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user, optionally with a registered embedding.
    pub async fn add_user(&self, user_id: UserId, embedding: Option<Embedding>) {
        self.inner.lock().await.users.insert(user_id, embedding);
    }

    /// Add a user whose `face_embedding` column holds `raw` verbatim.
    ///
    /// Reads and the once-only registration apply the same rules as the
    /// `PostgreSQL` store, so unparsable text surfaces as
    /// [`RepositoryError::DataCorruption`].
    pub async fn add_user_with_stored_text(&self, user_id: UserId, raw: &str) {
        let mut inner = self.inner.lock().await;
        inner.users.insert(user_id, None);
        inner.stored_text.insert(user_id, raw.to_string());
    }

    /// Add a geofence. Zones are returned in insertion order.
    pub async fn add_geofence(&self, geofence: Geofence) {
        self.inner.lock().await.geofences.push(geofence);
    }

    /// Add a subject.
    pub async fn add_subject(&self, subject: Subject) {
        self.inner
            .lock()
            .await
            .subjects
            .insert(subject.subject_id, subject);
    }

    /// Enroll a user in a subject.
    pub async fn enroll(&self, user_id: UserId, subject_id: SubjectId) {
        self.inner
            .lock()
            .await
            .enrollments
            .insert((user_id, subject_id));
    }

    /// Make every write fail with [`RepositoryError::Unavailable`].
    pub async fn fail_writes(&self, fail: bool) {
        self.inner.lock().await.fail_writes = fail;
    }

    /// Make every operation fail with [`RepositoryError::Unavailable`].
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.inner.lock().await.unavailable = unavailable;
    }

    /// Snapshot of all stored attendance logs in insertion order.
    pub async fn logs(&self) -> Vec<AttendanceLog> {
        self.inner.lock().await.logs.clone()
    }

    /// The stored embedding for a user, if any.
    pub async fn embedding_of(&self, user_id: UserId) -> Option<Embedding> {
        self.inner.lock().await.users.get(&user_id).cloned().flatten()
    }
}

impl Inner {
    fn check_available(&self) -> Result<(), RepositoryError> {
        if self.unavailable {
            return Err(RepositoryError::Unavailable(
                "memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    fn check_writable(&self) -> Result<(), RepositoryError> {
        self.check_available()?;
        if self.fail_writes {
            return Err(RepositoryError::Unavailable(
                "memory store rejects writes".to_string(),
            ));
        }
        Ok(())
    }
}

impl RecordStore for MemoryRecordStore {
    async fn active_geofences(&self) -> Result<Vec<Geofence>, RepositoryError> {
        let inner = self.inner.lock().await;
        inner.check_available()?;
        Ok(inner
            .geofences
            .iter()
            .filter(|g| g.active)
            .cloned()
            .collect())
    }

    async fn find_identity(
        &self,
        user_id: UserId,
    ) -> Result<Option<EnrolledIdentity>, RepositoryError> {
        let inner = self.inner.lock().await;
        inner.check_available()?;
        let Some(embedding) = inner.users.get(&user_id) else {
            return Ok(None);
        };
        let embedding = match inner.stored_text.get(&user_id) {
            Some(raw) => stored_embedding(user_id, Some(raw.as_str()))?,
            None => embedding.clone(),
        };
        Ok(Some(EnrolledIdentity { user_id, embedding }))
    }

    async fn set_embedding_once(
        &self,
        user_id: UserId,
        embedding: &Embedding,
    ) -> Result<bool, RepositoryError> {
        let mut inner = self.inner.lock().await;
        inner.check_writable()?;
        let unregistered = match inner.stored_text.get(&user_id) {
            Some(raw) => is_unregistered_text(raw),
            None => matches!(inner.users.get(&user_id), Some(None)),
        };
        if !unregistered {
            return Ok(false);
        }

        inner.stored_text.remove(&user_id);
        inner.users.insert(user_id, Some(embedding.clone()));
        Ok(true)
    }

    async fn insert_attendance_log(
        &self,
        log: NewAttendanceLog,
    ) -> Result<AttendanceLog, RepositoryError> {
        let mut inner = self.inner.lock().await;
        inner.check_writable()?;

        if !inner.users.contains_key(&log.user_id) || !inner.subjects.contains_key(&log.subject_id)
        {
            return Err(RepositoryError::InvalidReference(format!(
                "user {} or subject {} does not exist",
                log.user_id, log.subject_id
            )));
        }

        inner.next_log_id += 1;
        let stored = log.into_log(AttendanceLogId::new(inner.next_log_id));
        inner.logs.push(stored.clone());
        tracing::debug!(log_id = %stored.id, at = %Utc::now(), "Stored attendance log in memory");
        Ok(stored)
    }

    async fn subjects_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<Vec<Subject>>, RepositoryError> {
        let inner = self.inner.lock().await;
        inner.check_available()?;

        if !inner.users.contains_key(&user_id) {
            return Ok(None);
        }

        let mut subjects: Vec<Subject> = inner
            .enrollments
            .iter()
            .filter(|(u, _)| *u == user_id)
            .filter_map(|(_, s)| inner.subjects.get(s).cloned())
            .collect();
        subjects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Some(subjects))
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        self.inner.lock().await.check_available()
    }
}
