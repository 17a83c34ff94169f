//! Queue-join and standing endpoints.

use crate::api::ApiError;
use crate::auth::CurrentUser;
use crate::server::state::AppState;
use crate::store::MirrorStore;
use crate::types::{EventId, QueueStatus};
use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// `POST /events/:id/queue/join` response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    /// 1-based position while waiting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    /// Entry status.
    pub status: QueueStatus,
    /// Event joined.
    pub event_id: Uuid,
    /// Human-readable summary.
    pub message: String,
}

/// `POST /events/:id/queue/join`
///
/// Idempotent: a repeat join returns the caller's current standing as a
/// success, never a duplicate-entry error.
pub async fn join_queue(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<JoinResponse>, ApiError> {
    let event_id = EventId::from_uuid(id);

    let placement = state
        .queue
        .join(event_id, user.user_id)
        .await
        .map_err(ApiError::from)?;

    let message = match placement.status {
        QueueStatus::Waiting => match placement.position {
            Some(position) => format!("You are number {position} in the queue"),
            None => "You are in the queue".to_string(),
        },
        QueueStatus::Active => "You have a pending reservation; complete payment".to_string(),
        QueueStatus::Done => "Your ticket is already paid".to_string(),
        QueueStatus::Expired => "Your turn has passed; the queue has moved on".to_string(),
    };

    Ok(Json(JoinResponse {
        position: placement.position,
        status: placement.status,
        event_id: id,
        message,
    }))
}

/// `GET /events/:id/queue/me` response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StandingResponse {
    /// 1-based position while waiting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    /// Entry status.
    pub status: QueueStatus,
    /// Event queried.
    pub event_id: Uuid,
    /// Payment deadline when a reservation is pending.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Attached reservation, if promoted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reservation_id: Option<Uuid>,
}

/// `GET /events/:id/queue/me`
///
/// The authoritative view clients poll; notifications are only hints.
pub async fn my_standing(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<StandingResponse>, ApiError> {
    let event_id = EventId::from_uuid(id);

    let placement = state
        .queue
        .standing(event_id, user.user_id)
        .await
        .map_err(ApiError::from)?;

    let expires_at = match (placement.status, placement.reservation_id) {
        (QueueStatus::Active, Some(reservation_id)) => state
            .mirror
            .reservation(reservation_id)
            .await
            .map_err(ApiError::from)?
            .map(|r| r.expires_at)
            .filter(|deadline| *deadline > Utc::now()),
        _ => None,
    };

    Ok(Json(StandingResponse {
        position: placement.position,
        status: placement.status,
        event_id: id,
        expires_at,
        reservation_id: placement.reservation_id.map(|r| *r.as_uuid()),
    }))
}
