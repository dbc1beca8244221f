//! Business logic services for the attendance pipeline.
//!
//! # Services
//!
//! - `check_in` - Geofence, identity, and face checks ending in an attendance log
//! - `enrollment` - One-time face registration
//! - `recorder` - Attendance log writes
//! - `artifacts` - Check-in image storage
//! - `auth` - Bearer token verification

pub mod artifacts;
pub mod auth;
pub mod check_in;
pub mod enrollment;
pub mod error;
pub mod recorder;

pub use artifacts::{ArtifactPurpose, ArtifactStore, DiskArtifactStore};
pub use auth::{AuthError, Claims, TokenVerifier};
pub use check_in::{CheckInReceipt, CheckInService, CheckInStage, RawCheckIn, parse_location};
pub use enrollment::EnrollmentService;
pub use error::AttendanceError;
pub use recorder::{AttemptOutcome, AttendanceRecorder};
