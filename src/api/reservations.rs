//! Payment endpoint.

use crate::api::ApiError;
use crate::auth::CurrentUser;
use crate::server::state::AppState;
use crate::types::{Reservation, ReservationId, ReservationStatus};
use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Reservation on the wire.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationBody {
    /// Reservation ID.
    pub id: Uuid,
    /// Event the seat belongs to.
    pub event_id: Uuid,
    /// Holder.
    pub user_id: Uuid,
    /// Status.
    pub status: ReservationStatus,
    /// Payment deadline.
    pub expires_at: DateTime<Utc>,
    /// Payment instant, once paid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<Reservation> for ReservationBody {
    fn from(reservation: Reservation) -> Self {
        Self {
            id: *reservation.reservation_id.as_uuid(),
            event_id: *reservation.event_id.as_uuid(),
            user_id: *reservation.user_id.as_uuid(),
            status: reservation.status,
            expires_at: reservation.expires_at,
            paid_at: reservation.paid_at,
            created_at: reservation.created_at,
        }
    }
}

/// `POST /reservations/:id/pay`
pub async fn pay(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ReservationBody>, ApiError> {
    let reservation_id = ReservationId::from_uuid(id);

    let reservation = state
        .payments
        .pay(reservation_id, user.user_id)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(ReservationBody::from(reservation)))
}
