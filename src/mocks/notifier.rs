//! Recording notifier.

use crate::notify::{Notification, Notifier};
use crate::types::UserId;
use std::sync::{Arc, Mutex};

/// Captures notifications for test assertions instead of delivering them.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<(UserId, Notification)>>>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything sent so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the lock is poisoned.
    #[must_use]
    pub fn sent(&self) -> Vec<(UserId, Notification)> {
        #[allow(clippy::unwrap_used)]
        self.sent.lock().unwrap().clone()
    }

    /// Notifications sent to one user, in order.
    ///
    /// # Panics
    ///
    /// Panics if the lock is poisoned.
    #[must_use]
    pub fn sent_to(&self, user_id: UserId) -> Vec<Notification> {
        #[allow(clippy::unwrap_used)]
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(recipient, _)| *recipient == user_id)
            .map(|(_, notification)| notification.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, user_id: UserId, notification: Notification) {
        #[allow(clippy::unwrap_used)]
        self.sent.lock().unwrap().push((user_id, notification));
    }
}
