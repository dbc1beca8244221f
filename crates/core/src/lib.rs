//! Attendance Core - Shared types library.
//!
//! This crate provides the domain types used across the attendance workspace:
//! - `api` - HTTP service running the check-in pipeline
//! - `cli` - Command-line tools for migrations
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. The geofence test lives here because it is a
//! deterministic computation over plain values.
//!
//! # Modules
//!
//! - [`types`] - Typed ids, coordinates, geofences, face embeddings, statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
