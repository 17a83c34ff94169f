//! Mock event and user repositories.

use crate::error::{QueueError, Result};
use crate::store::{EventRepository, UserRepository};
use crate::types::{Event, EventId, User, UserId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-memory [`EventRepository`].
#[derive(Clone, Default)]
pub struct MockEventRepository {
    events: Arc<Mutex<HashMap<EventId, Event>>>,
}

impl MockEventRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<EventId, Event>>> {
        self.events
            .lock()
            .map_err(|_| QueueError::Store("Mutex lock failed".to_string()))
    }
}

impl EventRepository for MockEventRepository {
    async fn insert(&self, event: &Event) -> Result<()> {
        self.lock()?.insert(event.event_id, event.clone());
        Ok(())
    }

    async fn by_id(&self, event_id: EventId) -> Result<Option<Event>> {
        Ok(self.lock()?.get(&event_id).cloned())
    }

    async fn list(&self) -> Result<Vec<Event>> {
        let mut events: Vec<Event> = self.lock()?.values().cloned().collect();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(events)
    }

    async fn list_open(&self, now: DateTime<Utc>) -> Result<Vec<Event>> {
        let mut events: Vec<Event> = self
            .lock()?
            .values()
            .filter(|event| event.sales_open(now))
            .cloned()
            .collect();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(events)
    }
}

/// In-memory [`UserRepository`].
#[derive(Clone, Default)]
pub struct MockUserRepository {
    users: Arc<Mutex<HashMap<UserId, User>>>,
}

impl MockUserRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<UserId, User>>> {
        self.users
            .lock()
            .map_err(|_| QueueError::Store("Mutex lock failed".to_string()))
    }
}

impl UserRepository for MockUserRepository {
    async fn by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .lock()?
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn by_id(&self, user_id: UserId) -> Result<Option<User>> {
        Ok(self.lock()?.get(&user_id).cloned())
    }

    async fn upsert(&self, user: &User) -> Result<()> {
        let mut users = self.lock()?;
        let exists = users.values().any(|existing| existing.email == user.email);
        if !exists {
            users.insert(user.user_id, user.clone());
        }
        Ok(())
    }
}
