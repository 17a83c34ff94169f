//! Domain types for the ticketing queue.
//!
//! Identifiers are opaque UUIDs behind newtypes. Status enums model the
//! queue-entry and reservation state machines; terminal states are never
//! left once entered.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random `EventId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `EventId` from a `Uuid`.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a new random `UserId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `UserId` from a `Uuid`.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a reservation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReservationId(Uuid);

impl ReservationId {
    /// Creates a new random `ReservationId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `ReservationId` from a `Uuid`.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ReservationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a queue entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueEntryId(Uuid);

impl QueueEntryId {
    /// Creates a new random `QueueEntryId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `QueueEntryId` from a `Uuid`.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for QueueEntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QueueEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Status enums
// ============================================================================

/// Lifecycle of a queue entry.
///
/// `Waiting → Active → Done` is the happy path. `Expired` is reached either
/// from `Waiting` (sold out before the user's turn) or from `Active` (the
/// payment window lapsed). `Done` and `Expired` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueStatus {
    /// In the queue, not yet admitted.
    Waiting,
    /// Admitted; a pending reservation holds a seat.
    Active,
    /// Paid; the seat is sold.
    Done,
    /// Out of the running (sold out or window lapsed).
    Expired,
}

impl QueueStatus {
    /// Terminal entries are never mutated again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Expired)
    }

    /// Database/wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "WAITING",
            Self::Active => "ACTIVE",
            Self::Done => "DONE",
            Self::Expired => "EXPIRED",
        }
    }

    /// Parse the database/wire representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "WAITING" => Some(Self::Waiting),
            "ACTIVE" => Some(Self::Active),
            "DONE" => Some(Self::Done),
            "EXPIRED" => Some(Self::Expired),
            _ => None,
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a reservation.
///
/// `PendingPayment` is the only non-terminal state. Exactly one of the two
/// conditional updates (`→ Paid` by the payment path, `→ Expired` by the
/// expiration pipeline) ever affects a row. `Canceled` is modeled and
/// matched as terminal but is never produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    /// Seat held; waiting for payment inside the active window.
    PendingPayment,
    /// Paid. Terminal.
    Paid,
    /// The window lapsed and the seat was returned. Terminal.
    Expired,
    /// Reserved for a future cancellation path. Terminal, never produced.
    Canceled,
}

impl ReservationStatus {
    /// Terminal reservations are immutable.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::PendingPayment)
    }

    /// Database/wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PendingPayment => "PENDING_PAYMENT",
            Self::Paid => "PAID",
            Self::Expired => "EXPIRED",
            Self::Canceled => "CANCELED",
        }
    }

    /// Parse the database/wire representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING_PAYMENT" => Some(Self::PendingPayment),
            "PAID" => Some(Self::Paid),
            "EXPIRED" => Some(Self::Expired),
            "CANCELED" => Some(Self::Canceled),
            _ => None,
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User role for route authorization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Regular ticket buyer.
    User,
    /// May create events and read admin statistics.
    Admin,
}

impl UserRole {
    /// Database/wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    /// Parse the database/wire representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

// ============================================================================
// Entities
// ============================================================================

/// A ticketed event with a fixed seat pool and a sales window.
///
/// Immutable to the queue core; created through the admin surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event ID.
    pub event_id: EventId,
    /// Display name.
    pub name: String,
    /// Declared seat pool size.
    pub total_seats: u32,
    /// Queue joins are accepted from this instant.
    pub sales_start_at: DateTime<Utc>,
    /// Queue joins are rejected after this instant.
    pub sales_end_at: DateTime<Utc>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Whether `now` falls inside the sales window (inclusive on both ends).
    #[must_use]
    pub fn sales_open(&self, now: DateTime<Utc>) -> bool {
        self.sales_start_at <= now && now <= self.sales_end_at
    }
}

/// A user's place in an event's queue. Unique on `(event, user)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Entry ID.
    pub entry_id: QueueEntryId,
    /// Event the entry belongs to.
    pub event_id: EventId,
    /// The queued user.
    pub user_id: UserId,
    /// Current lifecycle state.
    pub status: QueueStatus,
    /// Reservation minted on promotion, if any.
    pub reservation_id: Option<ReservationId>,
    /// 1-based rank at join time.
    pub joined_position: u32,
    /// Join timestamp.
    pub joined_at: DateTime<Utc>,
    /// Last transition timestamp.
    pub updated_at: DateTime<Utc>,
}

/// A held seat with a payment deadline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    /// Reservation ID.
    pub reservation_id: ReservationId,
    /// Event the seat belongs to.
    pub event_id: EventId,
    /// Holder of the seat.
    pub user_id: UserId,
    /// Current lifecycle state.
    pub status: ReservationStatus,
    /// Instant at which the payment window closes.
    pub expires_at: DateTime<Utc>,
    /// Set when the reservation transitions to `Paid`.
    pub paid_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// An account able to authenticate and join queues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// User ID.
    pub user_id: UserId,
    /// Login email, unique.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Role for route authorization.
    pub role: UserRole,
    /// Per-account random salt mixed into the credential digest, never
    /// serialized to the wire.
    #[serde(skip_serializing, default)]
    pub salt: String,
    /// Salted credential digest, never serialized to the wire.
    #[serde(skip_serializing, default)]
    pub password_digest: String,
    /// Account created timestamp.
    pub created_at: DateTime<Utc>,
}

/// Per-event reservation counts for the admin statistics view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationCounts {
    /// Reservations currently holding a seat.
    #[serde(rename = "PENDING_PAYMENT")]
    pub pending_payment: u64,
    /// Sold seats.
    #[serde(rename = "PAID")]
    pub paid: u64,
    /// Returned seats.
    #[serde(rename = "EXPIRED")]
    pub expired: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn queue_status_round_trips_through_wire_form() {
        for status in [
            QueueStatus::Waiting,
            QueueStatus::Active,
            QueueStatus::Done,
            QueueStatus::Expired,
        ] {
            assert_eq!(QueueStatus::parse(status.as_str()), Some(status));
            let json = serde_json::to_string(&status).unwrap();
            let back: QueueStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(back, status);
        }
        assert_eq!(QueueStatus::parse("PENDING"), None);
    }

    #[test]
    fn reservation_status_terminality() {
        assert!(!ReservationStatus::PendingPayment.is_terminal());
        assert!(ReservationStatus::Paid.is_terminal());
        assert!(ReservationStatus::Expired.is_terminal());
        assert!(ReservationStatus::Canceled.is_terminal());
    }

    #[test]
    fn sales_window_is_inclusive() {
        let start = Utc::now();
        let end = start + Duration::hours(2);
        let event = Event {
            event_id: EventId::new(),
            name: "Test".to_string(),
            total_seats: 10,
            sales_start_at: start,
            sales_end_at: end,
            created_at: start,
        };

        assert!(event.sales_open(start));
        assert!(event.sales_open(end));
        assert!(event.sales_open(start + Duration::hours(1)));
        assert!(!event.sales_open(start - Duration::seconds(1)));
        assert!(!event.sales_open(end + Duration::seconds(1)));
    }

    #[test]
    fn reservation_serializes_with_rfc3339_timestamps() {
        let reservation = Reservation {
            reservation_id: ReservationId::new(),
            event_id: EventId::new(),
            user_id: UserId::new(),
            status: ReservationStatus::PendingPayment,
            expires_at: Utc::now() + Duration::minutes(5),
            paid_at: None,
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&reservation).unwrap();
        assert_eq!(json["status"], "PENDING_PAYMENT");
        // chrono's serde emits RFC 3339 strings
        assert!(json["expires_at"].is_string());

        let back: Reservation = serde_json::from_value(json).unwrap();
        assert_eq!(back, reservation);
    }

    #[test]
    fn password_digest_never_reaches_the_wire() {
        let user = User {
            user_id: UserId::new(),
            email: "a@example.com".to_string(),
            name: "A".to_string(),
            role: UserRole::User,
            salt: "secret-salt".to_string(),
            password_digest: "secret-digest".to_string(),
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-digest"));
        assert!(!json.contains("secret-salt"));
    }
}
