//! Error types for queue, promotion, and payment operations.

use thiserror::Error;

/// Result type alias for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;

/// Error taxonomy for the ticketing queue.
///
/// Variants map onto the HTTP surface in one place (`api::ApiError`); the
/// core returns these directly.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    // ═══════════════════════════════════════════════════════════
    // Validation
    // ═══════════════════════════════════════════════════════════

    /// Queue join attempted before the sales window opened.
    #[error("Sales have not started for this event")]
    SalesNotStarted,

    /// Queue join attempted after the sales window closed.
    #[error("Sales have ended for this event")]
    SalesEnded,

    /// Payment attempted on a reservation that is no longer pending.
    #[error("Reservation is no longer payable")]
    NotPayable,

    /// Payment attempted after the payment window lapsed.
    #[error("Reservation has expired")]
    ReservationExpired,

    /// Malformed request input.
    #[error("Invalid input: {0}")]
    Validation(String),

    // ═══════════════════════════════════════════════════════════
    // Authentication / authorization
    // ═══════════════════════════════════════════════════════════

    /// Missing or invalid credential.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Access token missing, malformed, or expired.
    #[error("Unauthenticated")]
    Unauthenticated,

    /// Acting on a resource owned by someone else, or without the
    /// required role.
    #[error("Forbidden")]
    Forbidden,

    // ═══════════════════════════════════════════════════════════
    // Not found
    // ═══════════════════════════════════════════════════════════

    /// Unknown event.
    #[error("Event not found")]
    EventNotFound,

    /// Unknown reservation.
    #[error("Reservation not found")]
    ReservationNotFound,

    /// Unknown queue entry.
    #[error("Queue entry not found")]
    EntryNotFound,

    /// Unknown user.
    #[error("User not found")]
    UserNotFound,

    // ═══════════════════════════════════════════════════════════
    // Conflict
    // ═══════════════════════════════════════════════════════════

    /// The seat pool is exhausted.
    #[error("Event is sold out")]
    SoldOut,

    // ═══════════════════════════════════════════════════════════
    // Infrastructure
    // ═══════════════════════════════════════════════════════════

    /// Coordinator (Redis) operation failed.
    #[error("Coordinator error: {0}")]
    Coordinator(String),

    /// Durable store operation failed.
    #[error("Store error: {0}")]
    Store(String),

    /// Serialization failure at a storage or wire boundary.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Anything else that should surface as a 500.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl QueueError {
    /// Whether the error is caused by the caller rather than the system.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::SalesNotStarted
                | Self::SalesEnded
                | Self::NotPayable
                | Self::ReservationExpired
                | Self::Validation(_)
                | Self::InvalidCredentials
                | Self::Unauthenticated
                | Self::Forbidden
                | Self::SoldOut
        )
    }

    /// Whether a retry of the same call may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Coordinator(_) | Self::Store(_) | Self::Internal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_errors_are_not_transient() {
        assert!(QueueError::SoldOut.is_user_error());
        assert!(!QueueError::SoldOut.is_transient());
        assert!(QueueError::Coordinator("down".into()).is_transient());
        assert!(!QueueError::Coordinator("down".into()).is_user_error());
    }
}
