//! In-process notification rooms, one per user.
//!
//! Each connected WebSocket subscribes to its user's broadcast channel.
//! Rooms are created lazily on first subscribe and pruned when a send finds
//! no receivers left. Lagging receivers drop old messages (broadcast
//! semantics) rather than applying backpressure to the caller.

use crate::notify::{Notification, Notifier};
use crate::types::UserId;
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::broadcast;

/// Per-room buffer. Notifications are small and clients poll the
/// authoritative view anyway, so a short buffer suffices.
const ROOM_CAPACITY: usize = 32;

/// Fan-out hub holding one broadcast room per user.
pub struct NotificationHub {
    rooms: RwLock<HashMap<UserId, broadcast::Sender<Notification>>>,
}

impl NotificationHub {
    /// Create an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe to a user's room, creating it if needed.
    ///
    /// # Panics
    ///
    /// Panics if the room lock is poisoned.
    #[must_use]
    pub fn subscribe(&self, user_id: UserId) -> broadcast::Receiver<Notification> {
        #[allow(clippy::unwrap_used)] // lock poisoning is unrecoverable here
        let mut rooms = self.rooms.write().unwrap();
        rooms
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(ROOM_CAPACITY).0)
            .subscribe()
    }

    /// Number of live rooms (diagnostics).
    ///
    /// # Panics
    ///
    /// Panics if the room lock is poisoned.
    #[must_use]
    pub fn room_count(&self) -> usize {
        #[allow(clippy::unwrap_used)]
        self.rooms.read().unwrap().len()
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for NotificationHub {
    fn notify(&self, user_id: UserId, notification: Notification) {
        let stale = {
            #[allow(clippy::unwrap_used)]
            let rooms = self.rooms.read().unwrap();
            match rooms.get(&user_id) {
                // send only fails when no receiver is listening
                Some(sender) => sender.send(notification).is_err(),
                None => {
                    tracing::debug!(user_id = %user_id, "No notification room; dropping");
                    return;
                }
            }
        };

        if stale {
            #[allow(clippy::unwrap_used)]
            let mut rooms = self.rooms.write().unwrap();
            if rooms
                .get(&user_id)
                .is_some_and(|sender| sender.receiver_count() == 0)
            {
                rooms.remove(&user_id);
                tracing::debug!(user_id = %user_id, "Pruned empty notification room");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EventId;

    #[tokio::test]
    async fn subscriber_receives_notifications() {
        let hub = NotificationHub::new();
        let user_id = UserId::new();
        let event_id = EventId::new();

        let mut rx = hub.subscribe(user_id);
        hub.notify(user_id, Notification::QueueSoldOut { event_id });

        let received = rx.recv().await.unwrap();
        assert_eq!(received, Notification::QueueSoldOut { event_id });
    }

    #[tokio::test]
    async fn notifications_are_scoped_to_the_user() {
        let hub = NotificationHub::new();
        let alice = UserId::new();
        let bob = UserId::new();

        let mut alice_rx = hub.subscribe(alice);
        let _bob_rx = hub.subscribe(bob);

        hub.notify(bob, Notification::QueueSoldOut { event_id: EventId::new() });

        assert!(matches!(
            alice_rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn empty_rooms_are_pruned_after_send() {
        let hub = NotificationHub::new();
        let user_id = UserId::new();

        let rx = hub.subscribe(user_id);
        assert_eq!(hub.room_count(), 1);
        drop(rx);

        hub.notify(user_id, Notification::QueueSoldOut { event_id: EventId::new() });
        assert_eq!(hub.room_count(), 0);

        // Notifying a user with no room is a quiet no-op.
        hub.notify(user_id, Notification::QueueSoldOut { event_id: EventId::new() });
    }
}
