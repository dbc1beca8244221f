//! Subject (course) types.

use serde::Serialize;

use attendance_core::SubjectId;

/// A subject a user can check in to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subject {
    /// Subject ID.
    pub subject_id: SubjectId,
    /// Short course code, e.g. `CS101`.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
}
