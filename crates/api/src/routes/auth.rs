//! Caller identity extraction.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use store::UserId;

use crate::error::ApiError;

/// Header carrying the authenticated user id, set by the upstream authorizer.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller. Rejects the request with 401 when the identity
/// header is missing or blank.
#[derive(Debug, Clone)]
pub struct Caller(pub UserId);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| Caller(UserId::new(value)))
            .ok_or(ApiError::Unauthorized)
    }
}
