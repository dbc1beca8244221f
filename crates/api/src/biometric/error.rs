//! Error types for the biometric service client.

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when calling the biometric service.
///
/// Timeouts are retryable by the caller; malformed responses are not.
#[derive(Debug, Error)]
pub enum VerificationError {
    /// The call did not complete within the configured timeout.
    #[error("biometric service timed out")]
    Timeout,

    /// The service answered, but not with a well-formed payload.
    #[error("invalid response from biometric service: {0}")]
    InvalidResponse(String),

    /// The service refused the request with a 4xx, e.g. no face detected.
    #[error("AI Error: {reason}")]
    Rejected {
        /// HTTP status returned by the service.
        status: u16,
        /// Reason reported by the service.
        reason: String,
    },

    /// The service failed with a 5xx. Retryable by the caller.
    #[error("biometric service error {status}: {reason}")]
    Unavailable {
        /// HTTP status returned by the service.
        status: u16,
        /// Reason reported by the service, if any.
        reason: String,
    },

    /// The request never got a response (connection refused, reset, DNS).
    #[error("biometric service unreachable: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for VerificationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Error body returned by the service on non-2xx responses.
///
/// `detail` may be a string or structured validation output.
#[derive(Debug, Deserialize)]
pub struct ServiceErrorBody {
    /// Primary error description.
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
    /// Alternate error description used by some endpoints.
    #[serde(default)]
    pub error: Option<String>,
}

impl ServiceErrorBody {
    /// The reason to report, if the body carries one.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        let detail = self.detail.as_ref().and_then(|detail| match detail {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) if s.trim().is_empty() => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        });

        detail.or_else(|| self.error.clone().filter(|e| !e.trim().is_empty()))
    }
}
