//! The promotion engine and expiration pipeline.
//!
//! `promotion` converts queue heads into held reservations without ever
//! overselling; `expiration` returns abandoned seats exactly once;
//! `trigger` wires both to wall-clock time (periodic promotion tick,
//! per-reservation delayed jobs, overdue sweep).

pub mod expiration;
pub mod promotion;
pub mod trigger;

pub use expiration::ExpirationPipeline;
pub use promotion::{PromotionEngine, PromotionOutcome};
pub use trigger::{
    spawn_expiration_worker, spawn_overdue_sweep, spawn_promotion_tick, ExpirationScheduler,
    RetryPolicy, TokioExpirationScheduler,
};
