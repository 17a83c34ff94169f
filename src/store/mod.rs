//! The durable mirror: persistent record of queue entries and reservations.
//!
//! The mirror is the authority for recovery and reporting; the ledger is the
//! authority for admission ordering and the seat count. Writes here follow
//! successful ledger mutations and never gate a seat decrement.
//!
//! Status transitions are conditional updates: the `WHERE` clause carries the
//! expected current status, and exactly one of two racing updaters affects a
//! row. Implementations report the outcome as a `bool` so callers can take
//! the loser's path without a second read.

use crate::error::Result;
use crate::types::{
    Event, EventId, QueueEntry, Reservation, ReservationCounts, ReservationId, User, UserId,
};
use chrono::{DateTime, Utc};
use std::future::Future;

pub mod postgres;

pub use postgres::{PostgresEventRepository, PostgresMirror, PostgresUserRepository};

/// Durable mirror of queue entries and reservations.
pub trait MirrorStore: Send + Sync {
    /// Insert a WAITING entry for a first-time join.
    ///
    /// # Errors
    ///
    /// Returns error on store failure, including a duplicate `(event, user)`
    /// pair (callers check for an existing entry first; the unique index is
    /// the backstop).
    fn insert_waiting_entry(
        &self,
        entry: &QueueEntry,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Load the entry for `(event, user)`, if any.
    ///
    /// # Errors
    ///
    /// Returns error on store failure.
    fn entry_for_user(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<QueueEntry>>> + Send;

    /// Transition an entry WAITING → ACTIVE, attaching the reservation.
    ///
    /// Conditional update; `false` means the entry was no longer WAITING and
    /// the caller lost the promotion race.
    ///
    /// # Errors
    ///
    /// Returns error on store failure.
    fn mark_entry_active(
        &self,
        event_id: EventId,
        user_id: UserId,
        reservation_id: ReservationId,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Transition an entry to DONE (seat paid).
    ///
    /// # Errors
    ///
    /// Returns error on store failure.
    fn mark_entry_done(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Transition an entry to EXPIRED (window lapsed). Terminal entries are
    /// left untouched.
    ///
    /// # Errors
    ///
    /// Returns error on store failure.
    fn mark_entry_expired(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Transition an entry WAITING → EXPIRED (sold out before the user's
    /// turn). Conditional update; `false` means the entry left WAITING
    /// concurrently (a racing promoter admitted it) and the caller must not
    /// treat the user as retired.
    ///
    /// # Errors
    ///
    /// Returns error on store failure.
    fn expire_waiting_entry(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Insert a PENDING_PAYMENT reservation minted by promotion.
    ///
    /// # Errors
    ///
    /// Returns error on store failure.
    fn insert_reservation(
        &self,
        reservation: &Reservation,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Load a reservation by id, if any.
    ///
    /// # Errors
    ///
    /// Returns error on store failure.
    fn reservation(
        &self,
        reservation_id: ReservationId,
    ) -> impl Future<Output = Result<Option<Reservation>>> + Send;

    /// Transition a reservation PENDING_PAYMENT → PAID, setting the paid
    /// instant. Conditional update; `false` means the reservation was
    /// already terminal and the caller lost the payment/expiration race.
    ///
    /// # Errors
    ///
    /// Returns error on store failure.
    fn mark_reservation_paid(
        &self,
        reservation_id: ReservationId,
        paid_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Transition a reservation PENDING_PAYMENT → EXPIRED. Conditional
    /// update; `false` means the reservation was already terminal.
    ///
    /// # Errors
    ///
    /// Returns error on store failure.
    fn mark_reservation_expired(
        &self,
        reservation_id: ReservationId,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// PENDING_PAYMENT reservations whose deadline has elapsed, oldest
    /// first. Feeds the overdue sweep.
    ///
    /// # Errors
    ///
    /// Returns error on store failure.
    fn overdue_reservations(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<Reservation>>> + Send;

    /// Reservation counts by status for one event (admin statistics).
    ///
    /// # Errors
    ///
    /// Returns error on store failure.
    fn reservation_counts(
        &self,
        event_id: EventId,
    ) -> impl Future<Output = Result<ReservationCounts>> + Send;
}

/// Event catalog.
pub trait EventRepository: Send + Sync {
    /// Insert a new event.
    ///
    /// # Errors
    ///
    /// Returns error on store failure.
    fn insert(&self, event: &Event) -> impl Future<Output = Result<()>> + Send;

    /// Load an event by id, if any.
    ///
    /// # Errors
    ///
    /// Returns error on store failure.
    fn by_id(&self, event_id: EventId) -> impl Future<Output = Result<Option<Event>>> + Send;

    /// All events, newest first.
    ///
    /// # Errors
    ///
    /// Returns error on store failure.
    fn list(&self) -> impl Future<Output = Result<Vec<Event>>> + Send;

    /// Events whose sales window contains `now`. Feeds the promotion tick.
    ///
    /// # Errors
    ///
    /// Returns error on store failure.
    fn list_open(&self, now: DateTime<Utc>) -> impl Future<Output = Result<Vec<Event>>> + Send;
}

/// User accounts.
pub trait UserRepository: Send + Sync {
    /// Load a user by email, if any.
    ///
    /// # Errors
    ///
    /// Returns error on store failure.
    fn by_email(&self, email: &str) -> impl Future<Output = Result<Option<User>>> + Send;

    /// Load a user by id, if any.
    ///
    /// # Errors
    ///
    /// Returns error on store failure.
    fn by_id(&self, user_id: UserId) -> impl Future<Output = Result<Option<User>>> + Send;

    /// Insert a user, or leave an existing account with the same email
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns error on store failure.
    fn upsert(&self, user: &User) -> impl Future<Output = Result<()>> + Send;
}

