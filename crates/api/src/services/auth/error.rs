//! Token verification error types.

use thiserror::Error;

/// Reasons a bearer token is refused.
///
/// All variants surface to clients as a plain 401; the detail is for logs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No `Authorization: Bearer` header.
    #[error("missing bearer token")]
    MissingToken,

    /// Token is not three base64url segments of valid JSON.
    #[error("malformed token: {0}")]
    Malformed(String),

    /// Header names an algorithm other than HS256.
    #[error("unsupported token algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Signature does not match the configured secret.
    #[error("invalid token signature")]
    BadSignature,

    /// `exp` is in the past.
    #[error("token expired")]
    Expired,

    /// Token was not issued to an end user.
    #[error("token type {0:?} is not a user token")]
    WrongType(String),
}
