//! Best-effort notification fan-out.
//!
//! Notifications are hints: correctness lives in the ledger and the mirror,
//! and clients poll `queue/me` as the authoritative view. Sends never block
//! a ledger or store transition; an unreachable or slow client loses
//! messages, nothing else.

use crate::types::{EventId, QueueStatus, ReservationId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod hub;

pub use hub::NotificationHub;

/// Server-push message to a single user.
///
/// Wire form is `{"event": "<name>", "data": {...}}` with camelCase payload
/// fields and RFC 3339 timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum Notification {
    /// Position update after joining the queue.
    #[serde(rename = "queue:position", rename_all = "camelCase")]
    QueuePosition {
        /// Event whose queue this refers to.
        event_id: EventId,
        /// 1-based position.
        position: u32,
        /// Current entry status.
        status: QueueStatus,
    },
    /// The user was admitted to the payment window.
    #[serde(rename = "queue:active", rename_all = "camelCase")]
    QueueActive {
        /// Event whose queue this refers to.
        event_id: EventId,
        /// The minted reservation.
        reservation_id: ReservationId,
        /// Payment deadline.
        expires_at: DateTime<Utc>,
    },
    /// The event sold out before the user's turn.
    #[serde(rename = "queue:soldout", rename_all = "camelCase")]
    QueueSoldOut {
        /// Event whose queue this refers to.
        event_id: EventId,
    },
    /// The payment window lapsed.
    #[serde(rename = "reservation:expired", rename_all = "camelCase")]
    ReservationExpired {
        /// The expired reservation.
        reservation_id: ReservationId,
        /// Event the seat belonged to.
        event_id: EventId,
    },
    /// Payment succeeded.
    #[serde(rename = "reservation:paid", rename_all = "camelCase")]
    ReservationPaid {
        /// The paid reservation.
        reservation_id: ReservationId,
        /// Event the seat belongs to.
        event_id: EventId,
        /// Payment instant.
        paid_at: DateTime<Utc>,
    },
}

/// Sink for user-directed notifications.
///
/// Implementations must not block: delivery is fire-and-forget from the
/// caller's perspective.
pub trait Notifier: Send + Sync {
    /// Push a notification toward a user's connected clients.
    fn notify(&self, user_id: UserId, notification: Notification);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_wire_names_match_the_channel_contract() {
        let n = Notification::QueueActive {
            event_id: EventId::new(),
            reservation_id: ReservationId::new(),
            expires_at: Utc::now(),
        };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["event"], "queue:active");
        assert!(json["data"]["reservationId"].is_string());
        assert!(json["data"]["expiresAt"].is_string());

        let back: Notification = serde_json::from_value(json).unwrap();
        assert_eq!(back, n);
    }

    #[test]
    fn sold_out_payload_carries_only_the_event() {
        let event_id = EventId::new();
        let json = serde_json::to_value(Notification::QueueSoldOut { event_id }).unwrap();
        assert_eq!(json["event"], "queue:soldout");
        assert_eq!(json["data"]["eventId"], event_id.to_string());
        assert_eq!(json["data"].as_object().unwrap().len(), 1);
    }

    #[test]
    fn paid_round_trips() {
        let n = Notification::ReservationPaid {
            reservation_id: ReservationId::new(),
            event_id: EventId::new(),
            paid_at: Utc::now(),
        };
        let json = serde_json::to_string(&n).unwrap();
        let back: Notification = serde_json::from_str(&json).unwrap();
        assert_eq!(back, n);
    }
}
