//! The promotion engine: decrement-first admission of queue heads.
//!
//! # Protocol
//!
//! The atomic seat decrement is the single moment of truth. A promoter never
//! checks availability first: it decrements, and a negative result is the
//! safe signal to restore the counter and retire the head. Peek-then-check
//! would let two promoters both observe one seat and both commit.
//!
//! Two promoters may race on the same head. The WAITING → ACTIVE conditional
//! update runs observably at most once; the loser sees zero rows affected,
//! treats its decrement as surplus, and retires its just-minted reservation
//! without notifying anyone.

use crate::error::Result;
use crate::ledger::SeatLedger;
use crate::notify::{Notification, Notifier};
use crate::store::MirrorStore;
use crate::types::{EventId, Reservation, ReservationId, ReservationStatus, UserId};
use chrono::{Duration, Utc};
use std::sync::Arc;

use super::trigger::ExpirationScheduler;

/// Result of a single promotion attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum PromotionOutcome {
    /// The head was admitted and holds a pending reservation.
    Promoted {
        /// The admitted user.
        user_id: UserId,
        /// The minted reservation.
        reservation: Reservation,
    },
    /// The seat pool is exhausted; the head was retired.
    SoldOut {
        /// The retired user.
        user_id: UserId,
    },
    /// The queue is empty.
    Empty,
    /// The concurrent-active cap left no slot for this attempt.
    Throttled,
}

/// Admits queue heads into the payment window.
///
/// Promoters for the same event may run concurrently across processes; the
/// protocol tolerates this (see module docs).
pub struct PromotionEngine<L, M, N, X> {
    ledger: Arc<L>,
    mirror: Arc<M>,
    notifier: Arc<N>,
    scheduler: Arc<X>,
    /// Payment window granted on admission.
    payment_window: Duration,
    /// Cap on concurrently active users per event.
    max_active: u32,
}

impl<L, M, N, X> PromotionEngine<L, M, N, X>
where
    L: SeatLedger,
    M: MirrorStore,
    N: Notifier,
    X: ExpirationScheduler,
{
    /// Create an engine.
    pub fn new(
        ledger: Arc<L>,
        mirror: Arc<M>,
        notifier: Arc<N>,
        scheduler: Arc<X>,
        payment_window: std::time::Duration,
        max_active: u32,
    ) -> Self {
        Self {
            ledger,
            mirror,
            notifier,
            scheduler,
            payment_window: Duration::from_std(payment_window)
                .unwrap_or_else(|_| Duration::minutes(5)),
            max_active,
        }
    }

    /// Attempt to promote the queue head of an event.
    ///
    /// Loops internally when it loses the head race to another promoter;
    /// each iteration restores the surplus decrement before retrying on the
    /// new head.
    ///
    /// # Errors
    ///
    /// Returns error when the coordinator or store fails mid-protocol.
    /// Compensation (restoring a committed decrement) is attempted before
    /// the error propagates.
    pub async fn promote_one(&self, event_id: EventId) -> Result<PromotionOutcome> {
        loop {
            let Some(user_id) = self.ledger.peek_queue_head(event_id).await? else {
                return Ok(PromotionOutcome::Empty);
            };

            let remaining = self.ledger.decrement_seats(event_id).await?;

            if remaining >= 0 {
                match self.admit(event_id, user_id).await? {
                    Some(outcome) => return Ok(outcome),
                    // Lost the head race; counter already restored.
                    None => continue,
                }
            }

            return self.retire_sold_out(event_id, user_id).await;
        }
    }

    /// Promote repeatedly until the queue drains, the pool sells out, or
    /// the concurrent-active cap is reached.
    ///
    /// # Errors
    ///
    /// Returns error when the coordinator or store fails; outcomes already
    /// produced are lost to the caller but remain committed.
    pub async fn promote_batch(&self, event_id: EventId) -> Result<Vec<PromotionOutcome>> {
        let active = self.ledger.active_count(event_id).await?;
        let mut slots = self.max_active.saturating_sub(active);

        tracing::debug!(event_id = %event_id, active, slots, "Promotion batch start");

        let mut outcomes = Vec::new();
        while slots > 0 {
            let outcome = self.promote_one(event_id).await?;
            let stop = matches!(
                outcome,
                PromotionOutcome::Empty | PromotionOutcome::SoldOut { .. }
            );
            if matches!(outcome, PromotionOutcome::Promoted { .. }) {
                slots -= 1;
            }
            outcomes.push(outcome);
            if stop {
                return Ok(outcomes);
            }
        }

        outcomes.push(PromotionOutcome::Throttled);
        Ok(outcomes)
    }

    /// Admit path: seat secured, materialize the reservation and activate
    /// the entry. Returns `None` when another promoter won the head.
    async fn admit(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<Option<PromotionOutcome>> {
        let now = Utc::now();
        let reservation = Reservation {
            reservation_id: ReservationId::new(),
            event_id,
            user_id,
            status: ReservationStatus::PendingPayment,
            expires_at: now + self.payment_window,
            paid_at: None,
            created_at: now,
        };

        if let Err(e) = self.mirror.insert_reservation(&reservation).await {
            // Seat secured but no durable reservation: restore and surface.
            let _ = self.ledger.increment_seats(event_id).await;
            return Err(e);
        }

        let won = self
            .mirror
            .mark_entry_active(event_id, user_id, reservation.reservation_id)
            .await?;

        if !won {
            // Another promoter activated (or already retired) this head.
            // The orphan reservation and the surplus decrement are ours to
            // unwind; the queue removal is redundant but not incorrect.
            let _ = self
                .mirror
                .mark_reservation_expired(reservation.reservation_id)
                .await;
            let _ = self.ledger.increment_seats(event_id).await;
            self.ledger.remove_from_queue(event_id, user_id).await?;
            tracing::debug!(
                event_id = %event_id,
                user_id = %user_id,
                "Lost promotion race; retired surplus decrement"
            );
            return Ok(None);
        }

        self.ledger.remove_from_queue(event_id, user_id).await?;
        self.ledger
            .set_active(event_id, user_id, self.payment_window())
            .await?;
        self.scheduler
            .schedule(reservation.reservation_id, reservation.expires_at)
            .await?;

        self.notifier.notify(
            user_id,
            Notification::QueueActive {
                event_id,
                reservation_id: reservation.reservation_id,
                expires_at: reservation.expires_at,
            },
        );

        tracing::info!(
            event_id = %event_id,
            user_id = %user_id,
            reservation_id = %reservation.reservation_id,
            expires_at = %reservation.expires_at,
            "Promoted queue head"
        );

        Ok(Some(PromotionOutcome::Promoted {
            user_id,
            reservation,
        }))
    }

    /// Sold-out path: restore the counter and retire the head.
    async fn retire_sold_out(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<PromotionOutcome> {
        self.ledger.increment_seats(event_id).await?;

        // Conditional: a racing promoter may have admitted this head
        // between our peek and our decrement. Only a still-WAITING entry
        // is retired.
        let retired = self.mirror.expire_waiting_entry(event_id, user_id).await?;
        if retired {
            self.ledger.remove_from_queue(event_id, user_id).await?;
            self.notifier
                .notify(user_id, Notification::QueueSoldOut { event_id });
            tracing::info!(event_id = %event_id, user_id = %user_id, "Retired head: sold out");
        } else {
            // A head whose entry is gone or already terminal would block
            // the queue forever; drop it. An ACTIVE head is a racing
            // winner and its promoter owns the removal.
            let stale = self
                .mirror
                .entry_for_user(event_id, user_id)
                .await?
                .map_or(true, |entry| entry.status.is_terminal());
            if stale {
                self.ledger.remove_from_queue(event_id, user_id).await?;
            }
            tracing::debug!(
                event_id = %event_id,
                user_id = %user_id,
                stale,
                "Head left WAITING concurrently; sold-out retire skipped"
            );
        }

        Ok(PromotionOutcome::SoldOut { user_id })
    }

    /// The configured payment window.
    #[must_use]
    pub fn payment_window(&self) -> std::time::Duration {
        self.payment_window
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(300))
    }
}
