//! Mock seat ledger.

use crate::error::{QueueError, Result};
use crate::ledger::SeatLedger;
use crate::types::{EventId, ReservationId, UserId};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct CoordinatorState {
    seats: HashMap<EventId, i64>,
    /// Queue per event, ordered by a monotonic join sequence.
    queues: HashMap<EventId, Vec<(u64, UserId)>>,
    /// Active markers with their expiry instant.
    active: HashMap<(EventId, UserId), DateTime<Utc>>,
    active_counts: HashMap<EventId, i64>,
    fences: HashSet<ReservationId>,
    join_seq: u64,
}

impl CoordinatorState {
    fn queue(&mut self, event_id: EventId) -> &mut Vec<(u64, UserId)> {
        self.queues.entry(event_id).or_default()
    }

    fn marker_live(&self, event_id: EventId, user_id: UserId, now: DateTime<Utc>) -> bool {
        self.active
            .get(&(event_id, user_id))
            .is_some_and(|expiry| *expiry > now)
    }
}

/// In-memory [`SeatLedger`]. One mutex over the whole coordinator state
/// makes every operation atomic, matching the Redis command guarantees.
#[derive(Clone, Default)]
pub struct MockLedger {
    state: Arc<Mutex<CoordinatorState>>,
}

impl MockLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, CoordinatorState>> {
        self.state
            .lock()
            .map_err(|_| QueueError::Coordinator("Mutex lock failed".to_string()))
    }

    /// Raw counter value, including transient negatives (test assertions).
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn raw_seats(&self, event_id: EventId) -> Result<i64> {
        Ok(*self.lock()?.seats.get(&event_id).unwrap_or(&0))
    }

    /// Whether the fence for a reservation has been claimed.
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn fence_claimed(&self, reservation_id: ReservationId) -> Result<bool> {
        Ok(self.lock()?.fences.contains(&reservation_id))
    }
}

impl SeatLedger for MockLedger {
    async fn initialize_seats(&self, event_id: EventId, total: u32) -> Result<()> {
        self.lock()?.seats.insert(event_id, i64::from(total));
        Ok(())
    }

    async fn decrement_seats(&self, event_id: EventId) -> Result<i64> {
        let mut state = self.lock()?;
        let seats = state.seats.entry(event_id).or_insert(0);
        *seats -= 1;
        Ok(*seats)
    }

    async fn increment_seats(&self, event_id: EventId) -> Result<i64> {
        let mut state = self.lock()?;
        let seats = state.seats.entry(event_id).or_insert(0);
        *seats += 1;
        Ok(*seats)
    }

    async fn remaining_seats(&self, event_id: EventId) -> Result<u32> {
        let state = self.lock()?;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Ok(state.seats.get(&event_id).copied().unwrap_or(0).max(0) as u32)
    }

    async fn add_to_queue(&self, event_id: EventId, user_id: UserId) -> Result<u32> {
        let mut state = self.lock()?;
        state.join_seq += 1;
        let seq = state.join_seq;

        let queue = state.queue(event_id);
        let rank = match queue.iter().position(|(_, member)| *member == user_id) {
            // Set-if-absent: an existing member keeps its original order.
            Some(existing) => existing,
            None => {
                queue.push((seq, user_id));
                queue.len() - 1
            }
        };

        #[allow(clippy::cast_possible_truncation)]
        Ok((rank + 1) as u32)
    }

    async fn queue_position(&self, event_id: EventId, user_id: UserId) -> Result<Option<u32>> {
        let mut state = self.lock()?;
        let queue = state.queue(event_id);
        #[allow(clippy::cast_possible_truncation)]
        Ok(queue
            .iter()
            .position(|(_, member)| *member == user_id)
            .map(|rank| (rank + 1) as u32))
    }

    async fn queue_len(&self, event_id: EventId) -> Result<u64> {
        let mut state = self.lock()?;
        Ok(state.queue(event_id).len() as u64)
    }

    async fn peek_queue_head(&self, event_id: EventId) -> Result<Option<UserId>> {
        let mut state = self.lock()?;
        Ok(state.queue(event_id).first().map(|(_, member)| *member))
    }

    async fn remove_from_queue(&self, event_id: EventId, user_id: UserId) -> Result<()> {
        let mut state = self.lock()?;
        state.queue(event_id).retain(|(_, member)| *member != user_id);
        Ok(())
    }

    async fn set_active(&self, event_id: EventId, user_id: UserId, ttl: Duration) -> Result<()> {
        let mut state = self.lock()?;
        let expiry = Utc::now()
            + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::minutes(5));
        state.active.insert((event_id, user_id), expiry);
        *state.active_counts.entry(event_id).or_insert(0) += 1;
        Ok(())
    }

    async fn is_active(&self, event_id: EventId, user_id: UserId) -> Result<bool> {
        let state = self.lock()?;
        Ok(state.marker_live(event_id, user_id, Utc::now()))
    }

    async fn clear_active(&self, event_id: EventId, user_id: UserId) -> Result<()> {
        let mut state = self.lock()?;
        if state.active.remove(&(event_id, user_id)).is_some() {
            let count = state.active_counts.entry(event_id).or_insert(0);
            *count = (*count - 1).max(0);
        }
        Ok(())
    }

    async fn active_count(&self, event_id: EventId) -> Result<u32> {
        let state = self.lock()?;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Ok(state
            .active_counts
            .get(&event_id)
            .copied()
            .unwrap_or(0)
            .max(0) as u32)
    }

    async fn claim_expiration(
        &self,
        reservation_id: ReservationId,
        _ttl: Duration,
    ) -> Result<bool> {
        let mut state = self.lock()?;
        Ok(state.fences.insert(reservation_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counter_reaches_negative_and_restores() {
        let ledger = MockLedger::new();
        let event_id = EventId::new();

        ledger.initialize_seats(event_id, 1).await.unwrap();
        assert_eq!(ledger.decrement_seats(event_id).await.unwrap(), 0);
        assert_eq!(ledger.decrement_seats(event_id).await.unwrap(), -1);
        assert_eq!(ledger.remaining_seats(event_id).await.unwrap(), 0);
        assert_eq!(ledger.increment_seats(event_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn queue_preserves_join_order_and_idempotence() {
        let ledger = MockLedger::new();
        let event_id = EventId::new();
        let alice = UserId::new();
        let bob = UserId::new();

        assert_eq!(ledger.add_to_queue(event_id, alice).await.unwrap(), 1);
        assert_eq!(ledger.add_to_queue(event_id, bob).await.unwrap(), 2);
        assert_eq!(ledger.add_to_queue(event_id, alice).await.unwrap(), 1);
        assert_eq!(ledger.queue_len(event_id).await.unwrap(), 2);
        assert_eq!(ledger.peek_queue_head(event_id).await.unwrap(), Some(alice));
    }

    #[tokio::test]
    async fn fence_claims_exactly_once() {
        let ledger = MockLedger::new();
        let reservation_id = ReservationId::new();
        let ttl = Duration::from_secs(60);

        assert!(ledger.claim_expiration(reservation_id, ttl).await.unwrap());
        assert!(!ledger.claim_expiration(reservation_id, ttl).await.unwrap());
    }
}
