use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use jsonwebtoken::errors::ErrorKind;
use tracing::warn;
use uuid::Uuid;

use crate::auth::jwt::JwtKeys;
use crate::error::ApiError;

/// Extracts and validates the Bearer token, returning the user ID.
///
/// Missing or expired tokens are 401s; a token that fails verification for
/// any other reason is a 403, matching the service's historical behavior.
#[derive(Debug)]
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| ApiError::Unauthorized("No token provided".into()))?;

        match keys.verify(token) {
            Ok(claims) => Ok(AuthUser(claims.sub)),
            Err(e) if matches!(e.kind(), ErrorKind::ExpiredSignature) => {
                warn!("expired token");
                Err(ApiError::Unauthorized("Token expired".into()))
            }
            Err(e) => {
                warn!(error = %e, "invalid token");
                Err(ApiError::Forbidden("Invalid token".into()))
            }
        }
    }
}

pub(crate) fn bearer_token(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
}
