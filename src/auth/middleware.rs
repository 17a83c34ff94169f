//! Axum extractors for authenticated routes.
//!
//! `CurrentUser` validates the bearer token against the session store;
//! `RequireAdmin` additionally checks the role. Handlers take these as
//! parameters and never see unauthenticated requests.

use crate::api::ApiError;
use crate::auth::sessions::Session;
use crate::server::state::AppState;
use crate::types::{UserId, UserRole};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

/// Bearer token extracted from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| {
                ApiError::unauthorized("Invalid authorization format. Expected 'Bearer <token>'")
            })?
            .to_string();

        if token.is_empty() {
            return Err(ApiError::unauthorized("Empty bearer token"));
        }

        Ok(Self(token))
    }
}

/// Authenticated caller. Use as a handler parameter to require a valid
/// session.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    /// The authenticated user ID.
    pub user_id: UserId,
    /// The validated session.
    pub session: Session,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let bearer = BearerToken::from_request_parts(parts, state).await?;

        let token = Uuid::parse_str(&bearer.0)
            .map_err(|_| ApiError::unauthorized("Invalid access token format"))?;

        let session = state.sessions.validate(token).await.map_err(ApiError::from)?;

        Ok(Self {
            user_id: session.user_id,
            session,
        })
    }
}

/// Authenticated caller with the admin role. Rejects with 403 otherwise.
#[derive(Debug, Clone)]
pub struct RequireAdmin {
    /// The authenticated admin's user ID.
    pub user_id: UserId,
    /// The validated session.
    pub session: Session,
}

#[async_trait]
impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let current = CurrentUser::from_request_parts(parts, state).await?;

        if current.session.role != UserRole::Admin {
            tracing::warn!(user_id = %current.user_id, "Admin route rejected non-admin caller");
            return Err(ApiError::forbidden("Admin role required"));
        }

        Ok(Self {
            user_id: current.user_id,
            session: current.session,
        })
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn bearer_prefix_parsing() {
        let header = "Bearer 550e8400-e29b-41d4-a716-446655440000";
        let token = header.strip_prefix("Bearer ").unwrap();
        assert_eq!(token, "550e8400-e29b-41d4-a716-446655440000");

        assert!("Basic dXNlcjpwYXNz".strip_prefix("Bearer ").is_none());
    }
}
