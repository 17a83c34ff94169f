//! Recording expiration scheduler.

use crate::engine::trigger::{ExpirationJob, ExpirationScheduler};
use crate::error::Result;
use crate::types::ReservationId;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

/// Captures scheduled deadline jobs; tests fire them by hand through the
/// expiration pipeline.
#[derive(Clone, Default)]
pub struct RecordingScheduler {
    jobs: Arc<Mutex<Vec<ExpirationJob>>>,
}

impl RecordingScheduler {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs scheduled so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the lock is poisoned.
    #[must_use]
    pub fn scheduled(&self) -> Vec<ExpirationJob> {
        #[allow(clippy::unwrap_used)]
        self.jobs.lock().unwrap().clone()
    }
}

impl ExpirationScheduler for RecordingScheduler {
    async fn schedule(
        &self,
        reservation_id: ReservationId,
        deadline: DateTime<Utc>,
    ) -> Result<()> {
        #[allow(clippy::unwrap_used)]
        self.jobs.lock().unwrap().push(ExpirationJob {
            reservation_id,
            deadline,
        });
        Ok(())
    }
}
