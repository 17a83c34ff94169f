//! HTTP surface: handlers, wire DTOs, and the error envelope.
//!
//! Paths, payload shapes, and the error body are part of the external
//! contract and must not drift (see `server::routes` for the full table).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::error::QueueError;

pub mod auth;
pub mod events;
pub mod queue;
pub mod reservations;
pub mod websocket;

/// HTTP error carrying the status and a user-facing message.
///
/// Renders as `{statusCode, message, error, timestamp, path}`; the `path`
/// field is filled by the response middleware, which is the only place the
/// request URI is in scope.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// Create an error with an explicit status.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// 400 Bad Request.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// 401 Unauthorized.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    /// 403 Forbidden.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    /// 404 Not Found.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// The HTTP status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

/// Error body, NestJS-shaped for client compatibility.
#[derive(Debug, Serialize)]
struct ErrorBody {
    #[serde(rename = "statusCode")]
    status_code: u16,
    message: String,
    error: String,
    timestamp: String,
    path: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, message = %self.message, "Request failed");
        }

        let body = ErrorBody {
            status_code: self.status.as_u16(),
            message: self.message,
            error: self
                .status
                .canonical_reason()
                .unwrap_or("Unknown")
                .to_string(),
            timestamp: Utc::now().to_rfc3339(),
            // Filled by the response middleware.
            path: String::new(),
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        let status = match &err {
            QueueError::SalesNotStarted
            | QueueError::SalesEnded
            | QueueError::NotPayable
            | QueueError::ReservationExpired
            | QueueError::Validation(_) => StatusCode::BAD_REQUEST,
            QueueError::InvalidCredentials | QueueError::Unauthenticated => {
                StatusCode::UNAUTHORIZED
            }
            QueueError::Forbidden => StatusCode::FORBIDDEN,
            QueueError::EventNotFound
            | QueueError::ReservationNotFound
            | QueueError::EntryNotFound
            | QueueError::UserNotFound => StatusCode::NOT_FOUND,
            QueueError::SoldOut => StatusCode::CONFLICT,
            QueueError::Coordinator(_)
            | QueueError::Store(_)
            | QueueError::Serialization(_)
            | QueueError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Infrastructure detail stays in the logs, not on the wire.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %err, "Internal error surfaced to HTTP");
            "Internal server error".to_string()
        } else {
            err.to_string()
        };

        Self::new(status, message)
    }
}
