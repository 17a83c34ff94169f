//! Redis-backed session store.
//!
//! Access tokens are opaque UUIDs; the token maps to a JSON session record
//! at `auth:session:{token}` with a TTL. Redis expiry is the primary
//! mechanism; the stored `expires_at` is checked again on read to guard
//! against clock skew and manual TTL manipulation.

use crate::error::{QueueError, Result};
use crate::types::{UserId, UserRole};
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// An authenticated session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// The authenticated user.
    pub user_id: UserId,
    /// Login email.
    pub email: String,
    /// Role for route authorization.
    pub role: UserRole,
    /// Issue timestamp.
    pub created_at: DateTime<Utc>,
    /// Expiry instant, mirrored by the Redis TTL.
    pub expires_at: DateTime<Utc>,
}

/// Redis-backed session store issuing opaque UUID access tokens.
#[derive(Clone)]
pub struct SessionStore {
    conn_manager: ConnectionManager,
    ttl: Duration,
}

impl SessionStore {
    /// Create a session store.
    ///
    /// # Errors
    ///
    /// Returns error if connection to Redis fails.
    pub async fn new(redis_url: &str, ttl: Duration) -> Result<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| QueueError::Coordinator(format!("Failed to create Redis client: {e}")))?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            QueueError::Coordinator(format!("Failed to create Redis connection manager: {e}"))
        })?;

        Ok(Self { conn_manager, ttl })
    }

    fn session_key(token: Uuid) -> String {
        format!("auth:session:{token}")
    }

    /// Issue a new access token for a user.
    ///
    /// # Errors
    ///
    /// Returns error if the coordinator is unreachable.
    pub async fn issue(&self, user_id: UserId, email: &str, role: UserRole) -> Result<Uuid> {
        let mut conn = self.conn_manager.clone();
        let token = Uuid::new_v4();
        let now = Utc::now();

        let session = Session {
            user_id,
            email: email.to_string(),
            role,
            created_at: now,
            expires_at: now
                + chrono::Duration::from_std(self.ttl)
                    .unwrap_or_else(|_| chrono::Duration::hours(24)),
        };

        let payload = serde_json::to_vec(&session)
            .map_err(|e| QueueError::Serialization(e.to_string()))?;

        let _: () = conn
            .set_ex(Self::session_key(token), payload, self.ttl.as_secs().max(1))
            .await
            .map_err(|e| QueueError::Coordinator(format!("Failed to store session: {e}")))?;

        tracing::info!(user_id = %user_id, expires_at = %session.expires_at, "Issued session");
        Ok(token)
    }

    /// Validate an access token.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Unauthenticated`] for an unknown or expired
    /// token; coordinator errors propagate.
    pub async fn validate(&self, token: Uuid) -> Result<Session> {
        let mut conn = self.conn_manager.clone();

        let payload: Option<Vec<u8>> = conn
            .get(Self::session_key(token))
            .await
            .map_err(|e| QueueError::Coordinator(format!("Failed to load session: {e}")))?;

        let Some(payload) = payload else {
            return Err(QueueError::Unauthenticated);
        };

        let session: Session = serde_json::from_slice(&payload)
            .map_err(|e| QueueError::Serialization(e.to_string()))?;

        // Redis TTL should have removed an expired session already; this
        // read-side check covers clock skew and TTL manipulation.
        if session.expires_at < Utc::now() {
            tracing::warn!(user_id = %session.user_id, "Session past expiry survived its TTL");
            return Err(QueueError::Unauthenticated);
        }

        Ok(session)
    }
}
