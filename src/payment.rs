//! The payment protocol.
//!
//! Payment races the expiration pipeline on the same reservation. Both sides
//! run a conditional update from PENDING_PAYMENT; exactly one affects a row.
//! The winner owns the ledger move: payment leaves the seat counter alone,
//! expiration increments it.

use crate::error::{QueueError, Result};
use crate::ledger::SeatLedger;
use crate::notify::{Notification, Notifier};
use crate::store::MirrorStore;
use crate::types::{Reservation, ReservationId, ReservationStatus, UserId};
use chrono::Utc;
use std::sync::Arc;

/// Settles reservations.
pub struct PaymentService<L, M, N> {
    ledger: Arc<L>,
    mirror: Arc<M>,
    notifier: Arc<N>,
}

impl<L, M, N> PaymentService<L, M, N>
where
    L: SeatLedger,
    M: MirrorStore,
    N: Notifier,
{
    /// Create a service.
    pub const fn new(ledger: Arc<L>, mirror: Arc<M>, notifier: Arc<N>) -> Self {
        Self {
            ledger,
            mirror,
            notifier,
        }
    }

    /// Pay a reservation on behalf of `claimant`.
    ///
    /// # Errors
    ///
    /// - [`QueueError::ReservationNotFound`] for an unknown id.
    /// - [`QueueError::Forbidden`] when the claimant does not own it.
    /// - [`QueueError::NotPayable`] when it is already terminal, or when the
    ///   expiration pipeline wins the conditional-update race.
    /// - [`QueueError::ReservationExpired`] when the deadline has elapsed;
    ///   the entry is left for the expiration pipeline to settle.
    pub async fn pay(
        &self,
        reservation_id: ReservationId,
        claimant: UserId,
    ) -> Result<Reservation> {
        let reservation = self
            .mirror
            .reservation(reservation_id)
            .await?
            .ok_or(QueueError::ReservationNotFound)?;

        if reservation.user_id != claimant {
            tracing::warn!(
                reservation_id = %reservation_id,
                owner = %reservation.user_id,
                claimant = %claimant,
                "Payment attempt by non-owner"
            );
            return Err(QueueError::Forbidden);
        }

        if reservation.status != ReservationStatus::PendingPayment {
            return Err(QueueError::NotPayable);
        }

        let now = Utc::now();
        if now > reservation.expires_at {
            // The deadline has passed; expiring is the pipeline's job, not
            // the payment path's.
            return Err(QueueError::ReservationExpired);
        }

        let won = self.mirror.mark_reservation_paid(reservation_id, now).await?;
        if !won {
            // The expiration pipeline transitioned first.
            return Err(QueueError::NotPayable);
        }

        self.mirror
            .mark_entry_done(reservation.event_id, reservation.user_id)
            .await?;

        // The payment window is over; free the admission slot now rather
        // than waiting out the marker TTL.
        self.ledger
            .clear_active(reservation.event_id, reservation.user_id)
            .await?;

        self.notifier.notify(
            reservation.user_id,
            Notification::ReservationPaid {
                reservation_id,
                event_id: reservation.event_id,
                paid_at: now,
            },
        );

        tracing::info!(
            reservation_id = %reservation_id,
            event_id = %reservation.event_id,
            user_id = %reservation.user_id,
            "Reservation paid"
        );

        Ok(Reservation {
            status: ReservationStatus::Paid,
            paid_at: Some(now),
            ..reservation
        })
    }
}
