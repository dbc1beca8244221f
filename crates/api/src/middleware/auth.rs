//! Authentication extractor.
//!
//! Provides an extractor for requiring an authenticated user in route handlers.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use tracing::debug;

use crate::error::{AppError, set_sentry_user};
use crate::models::CurrentUser;
use crate::services::{AuthError, TokenVerifier};

/// Extractor that requires a valid user bearer token.
///
/// Missing or invalid tokens are rejected with 401.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireUser(user): RequireUser,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.username)
/// }
/// ```
pub struct RequireUser(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
    TokenVerifier: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let verifier = TokenVerifier::from_ref(state);

        let user = bearer_token(&parts.headers)
            .ok_or(AuthError::MissingToken)
            .and_then(|token| verifier.verify(token))
            .map_err(|e| {
                debug!(error = %e, path = %parts.uri.path(), "Rejected bearer token");
                AppError::Unauthorized(e.to_string())
            })?;

        set_sentry_user(&user.user_id, &user.username);
        Ok(Self(user))
    }
}

/// The token from an `Authorization: Bearer <token>` header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
