//! User identity types.

use serde::{Deserialize, Serialize};

use attendance_core::{Embedding, UserId};

/// A user as seen by the pipeline: an id and, once registered, a face embedding.
///
/// An identity without an embedding is "unregistered" and cannot check in.
/// The embedding is written exactly once by face registration.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrolledIdentity {
    /// User ID.
    pub user_id: UserId,
    /// Stored face embedding, if registered.
    pub embedding: Option<Embedding>,
}

impl EnrolledIdentity {
    /// Whether a face embedding has been stored.
    #[must_use]
    pub const fn is_registered(&self) -> bool {
        self.embedding.is_some()
    }
}

/// The authenticated caller, taken from a verified bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User ID.
    pub user_id: UserId,
    /// Login name, used in logs only.
    pub username: String,
}
