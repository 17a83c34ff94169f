//! Event catalog and admin endpoints.

use crate::api::ApiError;
use crate::auth::RequireAdmin;
use crate::ledger::SeatLedger;
use crate::server::state::AppState;
use crate::store::{EventRepository, MirrorStore};
use crate::types::{Event, EventId, ReservationCounts};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event on the wire, including the live remaining-seat count.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBody {
    /// Event ID.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Declared seat pool size.
    pub total_seats: u32,
    /// Sales window open.
    pub sales_start_at: DateTime<Utc>,
    /// Sales window close.
    pub sales_end_at: DateTime<Utc>,
    /// Remaining seats from the ledger.
    pub remaining_seats: u32,
}

impl EventBody {
    fn from_event(event: Event, remaining_seats: u32) -> Self {
        Self {
            id: *event.event_id.as_uuid(),
            name: event.name,
            total_seats: event.total_seats,
            sales_start_at: event.sales_start_at,
            sales_end_at: event.sales_end_at,
            remaining_seats,
        }
    }
}

/// `GET /events`
pub async fn list_events(
    State(state): State<AppState>,
) -> Result<Json<Vec<EventBody>>, ApiError> {
    let events = state.events.list().await.map_err(ApiError::from)?;

    let mut bodies = Vec::with_capacity(events.len());
    for event in events {
        let remaining = state
            .ledger
            .remaining_seats(event.event_id)
            .await
            .map_err(ApiError::from)?;
        bodies.push(EventBody::from_event(event, remaining));
    }

    Ok(Json(bodies))
}

/// `GET /events/:id`
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EventBody>, ApiError> {
    let event_id = EventId::from_uuid(id);
    let event = state
        .events
        .by_id(event_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("Event not found"))?;

    let remaining = state
        .ledger
        .remaining_seats(event_id)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(EventBody::from_event(event, remaining)))
}

/// `POST /admin/events` request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    /// Display name.
    pub name: String,
    /// Seat pool size.
    pub total_seats: u32,
    /// Sales window open.
    pub sales_start_at: DateTime<Utc>,
    /// Sales window close.
    pub sales_end_at: DateTime<Utc>,
}

/// `POST /admin/events`
pub async fn create_event(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Json(request): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<EventBody>), ApiError> {
    if request.name.trim().is_empty() {
        return Err(ApiError::bad_request("Event name is required"));
    }
    if request.total_seats == 0 {
        return Err(ApiError::bad_request("totalSeats must be at least 1"));
    }
    if request.sales_start_at > request.sales_end_at {
        return Err(ApiError::bad_request(
            "salesStartAt must not be after salesEndAt",
        ));
    }

    let event = Event {
        event_id: EventId::new(),
        name: request.name,
        total_seats: request.total_seats,
        sales_start_at: request.sales_start_at,
        sales_end_at: request.sales_end_at,
        created_at: Utc::now(),
    };

    // Catalog row first, then the ledger counter. An event is not sellable
    // until both exist; a failure in between leaves a row with no counter,
    // which reads as zero remaining seats rather than overselling.
    state.events.insert(&event).await.map_err(ApiError::from)?;
    state
        .ledger
        .initialize_seats(event.event_id, event.total_seats)
        .await
        .map_err(ApiError::from)?;

    tracing::info!(
        event_id = %event.event_id,
        total_seats = event.total_seats,
        created_by = %admin.user_id,
        "Event created"
    );

    let remaining = event.total_seats;
    Ok((
        StatusCode::CREATED,
        Json(EventBody::from_event(event, remaining)),
    ))
}

/// `GET /admin/events/:id/stats` response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStatsBody {
    /// Event ID.
    pub event_id: Uuid,
    /// Remaining seats from the ledger.
    pub remaining_seats: u32,
    /// Users currently waiting.
    pub queue_length: u64,
    /// Reservation counts by status.
    pub reservation_counts: ReservationCounts,
}

/// `GET /admin/events/:id/stats`
pub async fn event_stats(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<Json<EventStatsBody>, ApiError> {
    let event_id = EventId::from_uuid(id);

    if state
        .events
        .by_id(event_id)
        .await
        .map_err(ApiError::from)?
        .is_none()
    {
        return Err(ApiError::not_found("Event not found"));
    }

    let remaining_seats = state
        .ledger
        .remaining_seats(event_id)
        .await
        .map_err(ApiError::from)?;
    let queue_length = state
        .ledger
        .queue_len(event_id)
        .await
        .map_err(ApiError::from)?;
    let reservation_counts = state
        .mirror
        .reservation_counts(event_id)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(EventStatsBody {
        event_id: id,
        remaining_seats,
        queue_length,
        reservation_counts,
    }))
}
