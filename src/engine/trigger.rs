//! Time-based glue: delayed expiration jobs, the overdue sweep, and the
//! periodic promotion tick.
//!
//! The delayed job gives low-latency expiration; the sweep survives process
//! restarts (a rebooted worker has no in-memory timers, but overdue
//! reservations are durable). Either alone satisfies the expiration
//! contract; both run.

use crate::error::{QueueError, Result};
use crate::ledger::SeatLedger;
use crate::notify::Notifier;
use crate::store::{EventRepository, MirrorStore};
use crate::types::ReservationId;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use super::expiration::ExpirationPipeline;
use super::promotion::PromotionEngine;

/// Maximum overdue reservations fed to the pipeline per sweep pass.
const SWEEP_BATCH: u32 = 100;

/// Accepts deadline jobs for later delivery to the expiration pipeline.
pub trait ExpirationScheduler: Send + Sync {
    /// Enqueue a job that fires at `deadline`.
    ///
    /// # Errors
    ///
    /// Returns error if the job cannot be enqueued.
    fn schedule(
        &self,
        reservation_id: ReservationId,
        deadline: DateTime<Utc>,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// A deadline job in flight.
#[derive(Debug, Clone, Copy)]
pub struct ExpirationJob {
    /// The reservation to expire.
    pub reservation_id: ReservationId,
    /// When to fire.
    pub deadline: DateTime<Utc>,
}

/// Channel-backed scheduler; a worker task owns the receiving end.
///
/// The channel is unbounded: producers are promotion calls, which must not
/// block on a slow consumer, and each job is a few dozen bytes.
#[derive(Clone)]
pub struct TokioExpirationScheduler {
    tx: mpsc::UnboundedSender<ExpirationJob>,
}

impl TokioExpirationScheduler {
    /// Create a scheduler and the receiver its worker will drain.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ExpirationJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ExpirationScheduler for TokioExpirationScheduler {
    async fn schedule(
        &self,
        reservation_id: ReservationId,
        deadline: DateTime<Utc>,
    ) -> Result<()> {
        self.tx
            .send(ExpirationJob {
                reservation_id,
                deadline,
            })
            .map_err(|_| {
                QueueError::Internal("Expiration worker is gone; job not enqueued".to_string())
            })?;

        tracing::debug!(reservation_id = %reservation_id, deadline = %deadline, "Scheduled expiration job");
        Ok(())
    }
}

/// Retry policy for expiration-job execution.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts after the first try.
    pub max_retries: usize,
    /// Initial delay before the first retry.
    pub initial_delay: Duration,
    /// Cap for the exponential backoff.
    pub max_delay: Duration,
    /// Multiplier applied per attempt.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based), capped at `max_delay`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let delay_ms =
            (self.initial_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32)) as u64;
        Duration::from_millis(delay_ms).min(self.max_delay)
    }
}

/// Spawn the worker that sleeps until each job's deadline and runs the
/// expiration pipeline, retrying transient failures with backoff.
///
/// Each job gets its own task so a long sleep never delays other jobs.
pub fn spawn_expiration_worker<L, M, N, X>(
    mut rx: mpsc::UnboundedReceiver<ExpirationJob>,
    pipeline: Arc<ExpirationPipeline<L, M, N, X>>,
    retry: RetryPolicy,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()>
where
    L: SeatLedger + 'static,
    M: MirrorStore + 'static,
    N: Notifier + 'static,
    X: ExpirationScheduler + 'static,
{
    tokio::spawn(async move {
        loop {
            tokio::select! {
                job = rx.recv() => {
                    let Some(job) = job else { break };
                    let pipeline = Arc::clone(&pipeline);
                    let retry = retry.clone();
                    tokio::spawn(async move {
                        let wait = (job.deadline - Utc::now())
                            .to_std()
                            .unwrap_or(Duration::ZERO);
                        tokio::time::sleep(wait).await;
                        run_with_retries(&pipeline, job.reservation_id, &retry).await;
                    });
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Expiration worker shutting down");
                        break;
                    }
                }
            }
        }
    })
}

/// Execute one expiration with exponential-backoff retries. The pipeline is
/// idempotent, so re-running a partially applied attempt is safe.
async fn run_with_retries<L, M, N, X>(
    pipeline: &ExpirationPipeline<L, M, N, X>,
    reservation_id: ReservationId,
    retry: &RetryPolicy,
) where
    L: SeatLedger,
    M: MirrorStore,
    N: Notifier,
    X: ExpirationScheduler,
{
    let mut attempt = 0;
    loop {
        match pipeline.handle(reservation_id).await {
            Ok(()) => return,
            Err(e) if attempt < retry.max_retries => {
                let delay = retry.delay_for_attempt(attempt);
                tracing::warn!(
                    reservation_id = %reservation_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Expiration attempt failed; retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                // Give up; the overdue sweep owns this reservation now.
                tracing::error!(
                    reservation_id = %reservation_id,
                    error = %e,
                    "Expiration retries exhausted; deferring to sweep"
                );
                return;
            }
        }
    }
}

/// Spawn the periodic sweep feeding overdue PENDING reservations to the
/// pipeline. Catches reservations whose delayed job was lost to a restart.
pub fn spawn_overdue_sweep<L, M, N, X>(
    mirror: Arc<M>,
    pipeline: Arc<ExpirationPipeline<L, M, N, X>>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()>
where
    L: SeatLedger + 'static,
    M: MirrorStore + 'static,
    N: Notifier + 'static,
    X: ExpirationScheduler + 'static,
{
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    match mirror.overdue_reservations(Utc::now(), SWEEP_BATCH).await {
                        Ok(overdue) => {
                            if !overdue.is_empty() {
                                tracing::info!(count = overdue.len(), "Sweep found overdue reservations");
                            }
                            for reservation in overdue {
                                if let Err(e) = pipeline.handle(reservation.reservation_id).await {
                                    tracing::warn!(
                                        reservation_id = %reservation.reservation_id,
                                        error = %e,
                                        "Sweep expiration failed; will retry next pass"
                                    );
                                }
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Overdue sweep query failed");
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Overdue sweep shutting down");
                        break;
                    }
                }
            }
        }
    })
}

/// Spawn the periodic promotion trigger: every `interval`, run a promotion
/// batch for each event currently inside its sales window.
pub fn spawn_promotion_tick<L, M, N, X, E>(
    events: Arc<E>,
    engine: Arc<PromotionEngine<L, M, N, X>>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()>
where
    L: SeatLedger + 'static,
    M: MirrorStore + 'static,
    N: Notifier + 'static,
    X: ExpirationScheduler + 'static,
    E: EventRepository + 'static,
{
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let open = match events.list_open(Utc::now()).await {
                        Ok(open) => open,
                        Err(e) => {
                            tracing::warn!(error = %e, "Promotion tick could not list open events");
                            continue;
                        }
                    };

                    for event in open {
                        if let Err(e) = engine.promote_batch(event.event_id).await {
                            tracing::warn!(
                                event_id = %event.event_id,
                                error = %e,
                                "Promotion batch failed; will retry next tick"
                            );
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Promotion tick shutting down");
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        let retry = RetryPolicy {
            max_retries: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            multiplier: 2.0,
        };

        assert_eq!(retry.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(retry.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(retry.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(retry.delay_for_attempt(10), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn scheduler_hands_jobs_to_the_worker_channel() {
        let (scheduler, mut rx) = TokioExpirationScheduler::new();
        let reservation_id = ReservationId::new();
        let deadline = Utc::now();

        scheduler.schedule(reservation_id, deadline).await.unwrap();

        let job = rx.recv().await.unwrap();
        assert_eq!(job.reservation_id, reservation_id);
        assert_eq!(job.deadline, deadline);
    }

    #[tokio::test]
    async fn scheduling_fails_when_worker_is_gone() {
        let (scheduler, rx) = TokioExpirationScheduler::new();
        drop(rx);

        let result = scheduler.schedule(ReservationId::new(), Utc::now()).await;
        assert!(matches!(result, Err(QueueError::Internal(_))));
    }
}
