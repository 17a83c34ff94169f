//! The seat ledger: authoritative concurrency state in the shared coordinator.
//!
//! Every piece of cross-process mutual exclusion and ordering in the system
//! derives from the atomicity of these operations. Coordinator keys are
//! confined to this module; no other module talks to Redis directly (the
//! session store keeps its own namespace).
//!
//! # Guarantees
//!
//! - `decrement_seats`/`increment_seats` are linearizable counters.
//! - `claim_expiration` returns `true` to at most one caller per reservation.
//! - Queue rank is deterministic given the total order of join scores.

use crate::error::Result;
use crate::types::{EventId, ReservationId, UserId};
use std::future::Future;
use std::time::Duration;

mod redis;

pub use self::redis::RedisLedger;

/// Operations permitted against the shared coordinator.
///
/// All callers are in-process; the coordinator itself is shared across
/// processes. Implementations must make each method atomic with respect to
/// concurrent callers on any process.
pub trait SeatLedger: Send + Sync {
    /// Write the declared seat total for an event.
    ///
    /// Called once per event at creation. Repeated calls overwrite; callers
    /// must not reinitialize after first use.
    ///
    /// # Errors
    ///
    /// Returns error if the coordinator is unreachable.
    fn initialize_seats(
        &self,
        event_id: EventId,
        total: u32,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Atomically subtract one seat and return the new value.
    ///
    /// The result may be negative; the caller owns the compensating
    /// increment in that case. No rollback happens inside this call.
    ///
    /// # Errors
    ///
    /// Returns error if the coordinator is unreachable.
    fn decrement_seats(&self, event_id: EventId) -> impl Future<Output = Result<i64>> + Send;

    /// Atomically add one seat and return the new value.
    ///
    /// # Errors
    ///
    /// Returns error if the coordinator is unreachable.
    fn increment_seats(&self, event_id: EventId) -> impl Future<Output = Result<i64>> + Send;

    /// Current remaining seats, 0 if absent or negative.
    ///
    /// # Errors
    ///
    /// Returns error if the coordinator is unreachable.
    fn remaining_seats(&self, event_id: EventId) -> impl Future<Output = Result<u32>> + Send;

    /// Add a user to the event queue and return their 1-based rank.
    ///
    /// Set-if-absent: a user already in the queue keeps their original
    /// score, so repeated joins return the same position.
    ///
    /// # Errors
    ///
    /// Returns error if the coordinator is unreachable.
    fn add_to_queue(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> impl Future<Output = Result<u32>> + Send;

    /// 1-based rank of a user in the queue, if present.
    ///
    /// # Errors
    ///
    /// Returns error if the coordinator is unreachable.
    fn queue_position(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<u32>>> + Send;

    /// Number of users currently waiting.
    ///
    /// # Errors
    ///
    /// Returns error if the coordinator is unreachable.
    fn queue_len(&self, event_id: EventId) -> impl Future<Output = Result<u64>> + Send;

    /// The user at the head of the queue, if any.
    ///
    /// # Errors
    ///
    /// Returns error if the coordinator is unreachable.
    fn peek_queue_head(
        &self,
        event_id: EventId,
    ) -> impl Future<Output = Result<Option<UserId>>> + Send;

    /// Remove a user from the queue. Removing an absent member is a no-op.
    ///
    /// # Errors
    ///
    /// Returns error if the coordinator is unreachable.
    fn remove_from_queue(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Mark a user as inside the payment window and bump the active count.
    ///
    /// The marker's TTL matches the reservation deadline.
    ///
    /// # Errors
    ///
    /// Returns error if the coordinator is unreachable.
    fn set_active(
        &self,
        event_id: EventId,
        user_id: UserId,
        ttl: Duration,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Whether a user is currently inside the payment window.
    ///
    /// # Errors
    ///
    /// Returns error if the coordinator is unreachable.
    fn is_active(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Delete the active marker; decrements the active count only when the
    /// marker still existed.
    ///
    /// # Errors
    ///
    /// Returns error if the coordinator is unreachable.
    fn clear_active(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Advisory count of users inside the payment window.
    ///
    /// Used for admission control only; never a correctness input.
    ///
    /// # Errors
    ///
    /// Returns error if the coordinator is unreachable.
    fn active_count(&self, event_id: EventId) -> impl Future<Output = Result<u32>> + Send;

    /// Claim the expiration of a reservation.
    ///
    /// Set-if-absent fence: returns `true` to exactly one caller across all
    /// processes and deliveries. The fence carries a TTL so storage is
    /// eventually released even for permanently lost reservations.
    ///
    /// # Errors
    ///
    /// Returns error if the coordinator is unreachable.
    fn claim_expiration(
        &self,
        reservation_id: ReservationId,
        ttl: Duration,
    ) -> impl Future<Output = Result<bool>> + Send;
}
