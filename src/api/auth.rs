//! Login endpoint.

use crate::api::ApiError;
use crate::auth::password;
use crate::server::state::AppState;
use crate::store::UserRepository;
use crate::types::UserRole;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `POST /auth/login` request.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Login email.
    pub email: String,
    /// Plaintext password, verified against the stored digest.
    pub password: String,
}

/// `POST /auth/login` response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// Opaque bearer token.
    pub access_token: String,
    /// The authenticated account.
    pub user: UserBody,
}

/// User summary on the wire.
#[derive(Debug, Serialize)]
pub struct UserBody {
    /// User ID.
    pub id: Uuid,
    /// Login email.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Role.
    pub role: UserRole,
}

/// Authenticate and mint an access token.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    if request.email.is_empty() || request.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let user = state
        .users
        .by_email(&request.email)
        .await
        .map_err(ApiError::from)?
        // Same response for unknown email and wrong password.
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    if !password::verify(&request.password, &user.salt, &user.password_digest) {
        tracing::warn!(email = %request.email, "Failed login attempt");
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let token = state
        .sessions
        .issue(user.user_id, &user.email, user.role)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(LoginResponse {
        access_token: token.to_string(),
        user: UserBody {
            id: *user.user_id.as_uuid(),
            email: user.email,
            name: user.name,
            role: user.role,
        },
    }))
}
