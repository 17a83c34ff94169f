//! Mock durable mirror.

use crate::error::{QueueError, Result};
use crate::store::MirrorStore;
use crate::types::{
    EventId, QueueEntry, QueueStatus, Reservation, ReservationCounts, ReservationId,
    ReservationStatus, UserId,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct MirrorState {
    entries: HashMap<(EventId, UserId), QueueEntry>,
    reservations: HashMap<ReservationId, Reservation>,
}

/// In-memory [`MirrorStore`]. Conditional updates run under one mutex, so
/// the compare-and-set semantics match the database's row-level updates.
#[derive(Clone, Default)]
pub struct MockMirror {
    state: Arc<Mutex<MirrorState>>,
}

impl MockMirror {
    /// Create an empty mirror.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MirrorState>> {
        self.state
            .lock()
            .map_err(|_| QueueError::Store("Mutex lock failed".to_string()))
    }

    /// All entries for an event (test assertions).
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn entries_for_event(&self, event_id: EventId) -> Result<Vec<QueueEntry>> {
        Ok(self
            .lock()?
            .entries
            .values()
            .filter(|entry| entry.event_id == event_id)
            .cloned()
            .collect())
    }
}

impl MirrorStore for MockMirror {
    async fn insert_waiting_entry(&self, entry: &QueueEntry) -> Result<()> {
        let mut state = self.lock()?;
        let key = (entry.event_id, entry.user_id);
        if state.entries.contains_key(&key) {
            return Err(QueueError::Store(
                "Entry already exists for (event, user)".to_string(),
            ));
        }
        state.entries.insert(key, entry.clone());
        Ok(())
    }

    async fn entry_for_user(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<Option<QueueEntry>> {
        Ok(self.lock()?.entries.get(&(event_id, user_id)).cloned())
    }

    async fn mark_entry_active(
        &self,
        event_id: EventId,
        user_id: UserId,
        reservation_id: ReservationId,
    ) -> Result<bool> {
        let mut state = self.lock()?;
        match state.entries.get_mut(&(event_id, user_id)) {
            Some(entry) if entry.status == QueueStatus::Waiting => {
                entry.status = QueueStatus::Active;
                entry.reservation_id = Some(reservation_id);
                entry.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_entry_done(&self, event_id: EventId, user_id: UserId) -> Result<()> {
        let mut state = self.lock()?;
        if let Some(entry) = state.entries.get_mut(&(event_id, user_id)) {
            if !entry.status.is_terminal() {
                entry.status = QueueStatus::Done;
                entry.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn mark_entry_expired(&self, event_id: EventId, user_id: UserId) -> Result<()> {
        let mut state = self.lock()?;
        if let Some(entry) = state.entries.get_mut(&(event_id, user_id)) {
            if !entry.status.is_terminal() {
                entry.status = QueueStatus::Expired;
                entry.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn expire_waiting_entry(&self, event_id: EventId, user_id: UserId) -> Result<bool> {
        let mut state = self.lock()?;
        match state.entries.get_mut(&(event_id, user_id)) {
            Some(entry) if entry.status == QueueStatus::Waiting => {
                entry.status = QueueStatus::Expired;
                entry.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_reservation(&self, reservation: &Reservation) -> Result<()> {
        let mut state = self.lock()?;
        state
            .reservations
            .insert(reservation.reservation_id, reservation.clone());
        Ok(())
    }

    async fn reservation(&self, reservation_id: ReservationId) -> Result<Option<Reservation>> {
        Ok(self.lock()?.reservations.get(&reservation_id).cloned())
    }

    async fn mark_reservation_paid(
        &self,
        reservation_id: ReservationId,
        paid_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut state = self.lock()?;
        match state.reservations.get_mut(&reservation_id) {
            Some(reservation) if reservation.status == ReservationStatus::PendingPayment => {
                reservation.status = ReservationStatus::Paid;
                reservation.paid_at = Some(paid_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_reservation_expired(&self, reservation_id: ReservationId) -> Result<bool> {
        let mut state = self.lock()?;
        match state.reservations.get_mut(&reservation_id) {
            Some(reservation) if reservation.status == ReservationStatus::PendingPayment => {
                reservation.status = ReservationStatus::Expired;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn overdue_reservations(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Reservation>> {
        let state = self.lock()?;
        let mut overdue: Vec<Reservation> = state
            .reservations
            .values()
            .filter(|r| r.status == ReservationStatus::PendingPayment && r.expires_at <= now)
            .cloned()
            .collect();
        overdue.sort_by_key(|r| r.expires_at);
        overdue.truncate(limit as usize);
        Ok(overdue)
    }

    async fn reservation_counts(&self, event_id: EventId) -> Result<ReservationCounts> {
        let state = self.lock()?;
        let mut counts = ReservationCounts::default();
        for reservation in state.reservations.values() {
            if reservation.event_id != event_id {
                continue;
            }
            match reservation.status {
                ReservationStatus::PendingPayment => counts.pending_payment += 1,
                ReservationStatus::Paid => counts.paid += 1,
                ReservationStatus::Expired => counts.expired += 1,
                ReservationStatus::Canceled => {}
            }
        }
        Ok(counts)
    }
}
