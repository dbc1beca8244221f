//! Wire types for the biometric service.

use serde::Deserialize;

use attendance_core::Embedding;

use super::FaceMatch;
use super::error::VerificationError;

/// Response body of `POST /register-face`.
#[derive(Debug, Deserialize)]
pub struct RegisterFaceResponse {
    /// Embedding extracted from the submitted face.
    pub embedding: Vec<f64>,
}

impl TryFrom<RegisterFaceResponse> for Embedding {
    type Error = VerificationError;

    fn try_from(response: RegisterFaceResponse) -> Result<Self, Self::Error> {
        Self::new(response.embedding)
            .map_err(|e| VerificationError::InvalidResponse(format!("embedding: {e}")))
    }
}

/// Response body of `POST /verify-face`.
#[derive(Debug, Deserialize)]
pub struct VerifyFaceResponse {
    /// Whether the faces match.
    #[serde(rename = "match")]
    pub is_match: bool,
    /// Distance between the submitted face and the stored embedding.
    pub distance: f64,
}

impl TryFrom<VerifyFaceResponse> for FaceMatch {
    type Error = VerificationError;

    fn try_from(response: VerifyFaceResponse) -> Result<Self, Self::Error> {
        if !response.distance.is_finite() {
            return Err(VerificationError::InvalidResponse(
                "distance is not a finite number".to_string(),
            ));
        }

        Ok(Self {
            is_match: response.is_match,
            distance: response.distance,
        })
    }
}
