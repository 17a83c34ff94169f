//! Router configuration.
//!
//! The path table is part of the external contract:
//!
//! | Method | Path |
//! |---|---|
//! | POST | `/auth/login` |
//! | GET | `/events` |
//! | GET | `/events/:id` |
//! | POST | `/admin/events` |
//! | GET | `/admin/events/:id/stats` |
//! | POST | `/events/:id/queue/join` |
//! | GET | `/events/:id/queue/me` |
//! | POST | `/reservations/:id/pay` |
//! | GET | `/ws` (notification channel) |

use super::health::{health_check, readiness_check};
use super::middleware::fill_error_path;
use super::state::AppState;
use crate::api::{auth, events, queue, reservations, websocket};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the complete router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/auth/login", post(auth::login))
        .route("/events", get(events::list_events))
        .route("/events/:id", get(events::get_event))
        .route("/admin/events", post(events::create_event))
        .route("/admin/events/:id/stats", get(events::event_stats))
        .route("/events/:id/queue/join", post(queue::join_queue))
        .route("/events/:id/queue/me", get(queue::my_standing))
        .route("/reservations/:id/pay", post(reservations::pay))
        .route("/ws", get(websocket::notifications))
        .layer(axum::middleware::from_fn(fill_error_path))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
