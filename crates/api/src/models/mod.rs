//! Domain models for the attendance API.
//!
//! These types represent validated domain objects separate from database row
//! types and wire formats.

pub mod attendance;
pub mod identity;
pub mod subject;

pub use attendance::{AttendanceLog, NewAttendanceLog, SubmittedImage, VerificationAttempt};
pub use identity::{CurrentUser, EnrolledIdentity};
pub use subject::Subject;
