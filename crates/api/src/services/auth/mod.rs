//! Bearer token verification.
//!
//! Tokens are issued by the account service; this crate only verifies them.
//! The format is a compact HS256 JWT whose claims carry the caller:
//!
//! ```json
//! { "user_id": 42, "username": "somchai", "type": "user", "exp": 1767225600 }
//! ```

mod error;

pub use error::AuthError;

use std::fmt;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use attendance_core::UserId;

use crate::models::CurrentUser;

type HmacSha256 = Hmac<Sha256>;

/// Token type accepted by the pipeline endpoints.
pub const USER_TOKEN_TYPE: &str = "user";

/// JOSE header of a compact token.
#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

/// Claims carried by a user token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Authenticated user.
    pub user_id: UserId,
    /// Login name.
    pub username: String,
    /// Token audience type; must be `user`.
    #[serde(rename = "type")]
    pub token_type: String,
    /// Expiry as Unix seconds.
    pub exp: i64,
}

/// Verifies HS256 bearer tokens against the configured secret.
#[derive(Clone)]
pub struct TokenVerifier {
    secret: Arc<SecretString>,
}

impl fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl TokenVerifier {
    /// Create a verifier for the given secret.
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret: Arc::new(secret),
        }
    }

    fn mac(&self) -> Result<HmacSha256, AuthError> {
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|e| AuthError::Malformed(e.to_string()))
    }

    /// Verify a compact token and return the caller it identifies.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is malformed, signed with another key
    /// or algorithm, expired, or not a user token.
    pub fn verify(&self, token: &str) -> Result<CurrentUser, AuthError> {
        let mut segments = token.trim().split('.');
        let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(AuthError::Malformed("expected three segments".to_string()));
        };

        let header: Header = decode_segment(header_b64)?;
        if header.alg != "HS256" {
            return Err(AuthError::UnsupportedAlgorithm(header.alg));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|e| AuthError::Malformed(format!("signature: {e}")))?;

        // verify_slice compares in constant time.
        let mut mac = self.mac()?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(claims_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AuthError::BadSignature)?;

        let claims: Claims = decode_segment(claims_b64)?;

        if claims.exp <= Utc::now().timestamp() {
            return Err(AuthError::Expired);
        }

        if claims.token_type != USER_TOKEN_TYPE {
            return Err(AuthError::WrongType(claims.token_type));
        }

        Ok(CurrentUser {
            user_id: claims.user_id,
            username: claims.username,
        })
    }

    /// Sign claims into a compact token.
    ///
    /// Used by tests and local tooling; production tokens come from the
    /// account service.
    ///
    /// # Errors
    ///
    /// Returns an error if the claims cannot be serialized.
    pub fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        let header = Header {
            alg: "HS256".to_string(),
            typ: Some("JWT".to_string()),
        };
        let header_b64 = encode_segment(&header)?;
        let claims_b64 = encode_segment(claims)?;

        let mut mac = self.mac()?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(claims_b64.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{header_b64}.{claims_b64}.{signature}"))
    }
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str) -> Result<T, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| AuthError::Malformed(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| AuthError::Malformed(e.to_string()))
}

fn encode_segment<T: Serialize>(value: &T) -> Result<String, AuthError> {
    let json = serde_json::to_vec(value).map_err(|e| AuthError::Malformed(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}
