//! Core types for the attendance service.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod embedding;
pub mod geo;
pub mod id;
pub mod status;

pub use embedding::{Embedding, EmbeddingError};
pub use geo::{
    EARTH_RADIUS_METERS, GeoPoint, Geofence, GeofenceEvaluation, evaluate, haversine_distance,
};
pub use id::*;
pub use status::{AttendanceStatus, ParseStatusError};
