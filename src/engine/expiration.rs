//! The expiration pipeline: returns abandoned seats exactly once.
//!
//! Deliveries are at-least-once (delayed job retries plus the overdue
//! sweep), so every step is idempotent. Two mechanisms compose:
//!
//! - the `expired:{reservation}` fence collapses a storm of concurrent
//!   deliveries to one owner without touching the store;
//! - the conditional PENDING_PAYMENT → EXPIRED update gates the seat
//!   increment, so the seat is returned exactly when that update affects a
//!   row, including on the crash-recovery path where the fence is already
//!   held by a run that died before the terminal transition.

use crate::error::Result;
use crate::ledger::SeatLedger;
use crate::notify::{Notification, Notifier};
use crate::store::MirrorStore;
use crate::types::{Reservation, ReservationId, ReservationStatus};
use std::sync::Arc;
use std::time::Duration;

use super::promotion::PromotionEngine;
use super::trigger::ExpirationScheduler;

/// Drives a reservation past its deadline and returns the seat.
pub struct ExpirationPipeline<L, M, N, X> {
    ledger: Arc<L>,
    mirror: Arc<M>,
    notifier: Arc<N>,
    engine: Arc<PromotionEngine<L, M, N, X>>,
    /// TTL of the expiration fence; must comfortably outlive any plausible
    /// retry horizon so a lost reservation eventually releases its key.
    fence_ttl: Duration,
}

impl<L, M, N, X> ExpirationPipeline<L, M, N, X>
where
    L: SeatLedger,
    M: MirrorStore,
    N: Notifier,
    X: ExpirationScheduler,
{
    /// Create a pipeline.
    pub const fn new(
        ledger: Arc<L>,
        mirror: Arc<M>,
        notifier: Arc<N>,
        engine: Arc<PromotionEngine<L, M, N, X>>,
        fence_ttl: Duration,
    ) -> Self {
        Self {
            ledger,
            mirror,
            notifier,
            engine,
            fence_ttl,
        }
    }

    /// Handle one delivery of a reservation-deadline job.
    ///
    /// Safe to call any number of times, concurrently, for the same
    /// reservation: the seat counter moves at most once and the reservation
    /// reaches EXPIRED at most once.
    ///
    /// # Errors
    ///
    /// Returns error when the coordinator or store fails; callers retry
    /// with backoff and the idempotency above makes retries safe.
    pub async fn handle(&self, reservation_id: ReservationId) -> Result<()> {
        let Some(reservation) = self.mirror.reservation(reservation_id).await? else {
            // The job outlived its reservation.
            tracing::warn!(reservation_id = %reservation_id, "Expiration job for unknown reservation");
            return Ok(());
        };

        if reservation.status != ReservationStatus::PendingPayment {
            tracing::debug!(
                reservation_id = %reservation_id,
                status = %reservation.status,
                "Reservation already terminal; expiration is a no-op"
            );
            return Ok(());
        }

        let claimed = self
            .ledger
            .claim_expiration(reservation_id, self.fence_ttl)
            .await?;

        if !claimed {
            // Another caller owns this expiration. If the reservation is
            // still pending, that owner crashed between the fence and the
            // terminal transition; completing the sequence is safe because
            // the conditional update below still runs at most once.
            let still_pending = self
                .mirror
                .reservation(reservation_id)
                .await?
                .is_some_and(|r| r.status == ReservationStatus::PendingPayment);

            if !still_pending {
                return Ok(());
            }

            tracing::warn!(
                reservation_id = %reservation_id,
                "Fence held but reservation still pending; completing interrupted expiration"
            );
        }

        self.complete(&reservation).await
    }

    /// The post-fence sequence. The conditional terminal transition is the
    /// gate: everything after it runs only for the single caller whose
    /// update affected a row.
    async fn complete(&self, reservation: &Reservation) -> Result<()> {
        let won = self
            .mirror
            .mark_reservation_expired(reservation.reservation_id)
            .await?;

        if !won {
            // Paid in the meantime, or a parallel recovery finished first.
            tracing::debug!(
                reservation_id = %reservation.reservation_id,
                "Lost the terminal-transition race; no seat movement"
            );
            return Ok(());
        }

        let remaining = self.ledger.increment_seats(reservation.event_id).await?;
        self.mirror
            .mark_entry_expired(reservation.event_id, reservation.user_id)
            .await?;
        self.ledger
            .clear_active(reservation.event_id, reservation.user_id)
            .await?;

        self.notifier.notify(
            reservation.user_id,
            Notification::ReservationExpired {
                reservation_id: reservation.reservation_id,
                event_id: reservation.event_id,
            },
        );

        tracing::info!(
            reservation_id = %reservation.reservation_id,
            event_id = %reservation.event_id,
            user_id = %reservation.user_id,
            remaining,
            "Reservation expired; seat returned"
        );

        // Offer the returned seat to the next waiter immediately. Failures
        // here are not fatal: the periodic tick will promote on its next
        // pass.
        if let Err(e) = self.engine.promote_batch(reservation.event_id).await {
            tracing::warn!(
                event_id = %reservation.event_id,
                error = %e,
                "Post-expiration promotion failed; periodic trigger will retry"
            );
        }

        Ok(())
    }
}
