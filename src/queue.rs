//! The queue-join protocol and the caller's status view.
//!
//! Join is idempotent on `(event, user)`: a repeat call returns the current
//! position and status without touching the ledger's queue order. The
//! durable entry is written only after the ledger has assigned a position.

use crate::error::{QueueError, Result};
use crate::ledger::SeatLedger;
use crate::notify::{Notification, Notifier};
use crate::store::{EventRepository, MirrorStore};
use crate::types::{EventId, QueueEntry, QueueEntryId, QueueStatus, UserId};
use chrono::Utc;
use std::sync::Arc;

/// Result of a join or status call.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuePlacement {
    /// The event joined.
    pub event_id: EventId,
    /// Current entry status.
    pub status: QueueStatus,
    /// Live 1-based position while waiting; `None` once out of the queue.
    pub position: Option<u32>,
    /// The reservation attached on promotion, if any.
    pub reservation_id: Option<crate::types::ReservationId>,
}

/// Joins users to event queues and reports their standing.
pub struct QueueService<L, M, E, N> {
    ledger: Arc<L>,
    mirror: Arc<M>,
    events: Arc<E>,
    notifier: Arc<N>,
}

impl<L, M, E, N> QueueService<L, M, E, N>
where
    L: SeatLedger,
    M: MirrorStore,
    E: EventRepository,
    N: Notifier,
{
    /// Create a service.
    pub const fn new(ledger: Arc<L>, mirror: Arc<M>, events: Arc<E>, notifier: Arc<N>) -> Self {
        Self {
            ledger,
            mirror,
            events,
            notifier,
        }
    }

    /// Join an event queue, or return the caller's existing standing.
    ///
    /// # Errors
    ///
    /// - [`QueueError::EventNotFound`] for an unknown event.
    /// - [`QueueError::SalesNotStarted`] / [`QueueError::SalesEnded`] outside
    ///   the sales window.
    /// - Coordinator/store errors propagate; the call is safe to retry.
    pub async fn join(&self, event_id: EventId, user_id: UserId) -> Result<QueuePlacement> {
        let event = self
            .events
            .by_id(event_id)
            .await?
            .ok_or(QueueError::EventNotFound)?;

        let now = Utc::now();
        if now < event.sales_start_at {
            return Err(QueueError::SalesNotStarted);
        }
        if now > event.sales_end_at {
            return Err(QueueError::SalesEnded);
        }

        // Repeat joins return the existing standing without touching the
        // ledger's queue order.
        if let Some(entry) = self.mirror.entry_for_user(event_id, user_id).await? {
            let position = match entry.status {
                QueueStatus::Waiting => self.ledger.queue_position(event_id, user_id).await?,
                _ => None,
            };
            tracing::debug!(
                event_id = %event_id,
                user_id = %user_id,
                status = %entry.status,
                "Repeat join; returning existing standing"
            );
            return Ok(QueuePlacement {
                event_id,
                status: entry.status,
                position,
                reservation_id: entry.reservation_id,
            });
        }

        let position = self.ledger.add_to_queue(event_id, user_id).await?;

        let entry = QueueEntry {
            entry_id: QueueEntryId::new(),
            event_id,
            user_id,
            status: QueueStatus::Waiting,
            reservation_id: None,
            joined_position: position,
            joined_at: now,
            updated_at: now,
        };
        self.mirror.insert_waiting_entry(&entry).await?;

        self.notifier.notify(
            user_id,
            Notification::QueuePosition {
                event_id,
                position,
                status: QueueStatus::Waiting,
            },
        );

        tracing::info!(
            event_id = %event_id,
            user_id = %user_id,
            position,
            "Joined queue"
        );

        Ok(QueuePlacement {
            event_id,
            status: QueueStatus::Waiting,
            position: Some(position),
            reservation_id: None,
        })
    }

    /// The caller's current standing in an event queue.
    ///
    /// # Errors
    ///
    /// - [`QueueError::EventNotFound`] for an unknown event.
    /// - [`QueueError::EntryNotFound`] when the caller never joined.
    pub async fn standing(&self, event_id: EventId, user_id: UserId) -> Result<QueuePlacement> {
        if self.events.by_id(event_id).await?.is_none() {
            return Err(QueueError::EventNotFound);
        }

        let entry = self
            .mirror
            .entry_for_user(event_id, user_id)
            .await?
            .ok_or(QueueError::EntryNotFound)?;

        let position = match entry.status {
            QueueStatus::Waiting => self.ledger.queue_position(event_id, user_id).await?,
            _ => None,
        };

        Ok(QueuePlacement {
            event_id,
            status: entry.status,
            position,
            reservation_id: entry.reservation_id,
        })
    }
}
