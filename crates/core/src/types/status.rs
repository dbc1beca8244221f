//! Status enums for attendance records.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// How a recorded check-in attempt ended.
///
/// Only `Accepted` rows exist unless rejected-attempt auditing is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    /// Inside a geofence and the face matched.
    #[default]
    Accepted,
    /// Outside every active geofence.
    OutOfArea,
    /// Inside a geofence but the face did not match.
    FaceMismatch,
}

impl AttendanceStatus {
    /// The value stored in the `status` column.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::OutOfArea => "out_of_area",
            Self::FaceMismatch => "face_mismatch",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown attendance status text.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown attendance status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for AttendanceStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accepted" => Ok(Self::Accepted),
            "out_of_area" => Ok(Self::OutOfArea),
            "face_mismatch" => Ok(Self::FaceMismatch),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}
