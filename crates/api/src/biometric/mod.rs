//! Biometric service integration.
//!
//! The face matcher runs as a separate HTTP service. This module exposes it
//! through the narrow [`FaceVerifier`] contract so the check-in pipeline only
//! ever sees an embedding, a match decision, and a distance.
//!
//! # Endpoints
//!
//! - `POST {base}/register-face` - multipart `image` → `{ "embedding": [..] }`
//! - `POST {base}/verify-face` - multipart `image`, `embedding` → `{ "match": bool, "distance": f64 }`

pub mod client;
pub mod error;
pub mod types;

use std::future::Future;

use attendance_core::{Embedding, UserId};

use crate::models::SubmittedImage;

pub use client::BiometricClient;
pub use error::VerificationError;

/// Result of comparing a submitted face against a stored embedding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceMatch {
    /// Whether the service considers the faces the same person.
    pub is_match: bool,
    /// Distance reported by the service, always finite.
    pub distance: f64,
}

/// Face enrollment and matching.
pub trait FaceVerifier: Send + Sync + 'static {
    /// Extract an embedding from a face image.
    fn enroll_face(
        &self,
        user_id: UserId,
        image: &SubmittedImage,
    ) -> impl Future<Output = Result<Embedding, VerificationError>> + Send;

    /// Compare a face image with a stored embedding.
    fn match_face(
        &self,
        image: &SubmittedImage,
        stored: &Embedding,
    ) -> impl Future<Output = Result<FaceMatch, VerificationError>> + Send;
}
