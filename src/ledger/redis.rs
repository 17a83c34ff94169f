//! Redis-backed seat ledger.
//!
//! # Key layout
//!
//! | Key | Shape | Semantics |
//! |---|---|---|
//! | `seats:{event}` | integer | remaining seats, atomic INCR/DECR |
//! | `queue:{event}` | sorted set | member = user, score = join instant (ms) |
//! | `active:{event}:{user}` | string + TTL | existence = inside payment window |
//! | `active_count:{event}` | integer | advisory count of active users |
//! | `expired:{reservation}` | string + TTL | set-if-absent expiration fence |
//!
//! Multi-key steps that must move together use an atomic pipeline or a Lua
//! script; single-key steps rely on Redis command atomicity.

use crate::error::{QueueError, Result};
use crate::ledger::SeatLedger;
use crate::types::{EventId, ReservationId, UserId};
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::Duration;

/// Clears the active marker and decrements the count only when the marker
/// still existed, flooring the count at zero. DEL and DECR must be one
/// atomic unit or a marker that lapsed by TTL would be decremented twice.
const CLEAR_ACTIVE_SCRIPT: &str = r"
    if redis.call('DEL', KEYS[1]) == 1 then
        local count = redis.call('DECR', KEYS[2])
        if count < 0 then
            redis.call('SET', KEYS[2], 0)
        end
        return 1
    end
    return 0
";

/// Redis-backed [`SeatLedger`].
///
/// Holds a [`ConnectionManager`]; clones share the same connection pool.
#[derive(Clone)]
pub struct RedisLedger {
    conn_manager: ConnectionManager,
}

impl RedisLedger {
    /// Create a new Redis ledger.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://127.0.0.1:6379")
    ///
    /// # Errors
    ///
    /// Returns error if connection to Redis fails.
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| QueueError::Coordinator(format!("Failed to create Redis client: {e}")))?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            QueueError::Coordinator(format!("Failed to create Redis connection manager: {e}"))
        })?;

        Ok(Self { conn_manager })
    }

    /// Ping the coordinator (readiness probe).
    ///
    /// # Errors
    ///
    /// Returns error if the coordinator is unreachable.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::Coordinator(format!("Redis ping failed: {e}")))?;
        Ok(())
    }

    fn seats_key(event_id: EventId) -> String {
        format!("seats:{event_id}")
    }

    fn queue_key(event_id: EventId) -> String {
        format!("queue:{event_id}")
    }

    fn active_key(event_id: EventId, user_id: UserId) -> String {
        format!("active:{event_id}:{user_id}")
    }

    fn active_count_key(event_id: EventId) -> String {
        format!("active_count:{event_id}")
    }

    fn fence_key(reservation_id: ReservationId) -> String {
        format!("expired:{reservation_id}")
    }
}

impl SeatLedger for RedisLedger {
    async fn initialize_seats(&self, event_id: EventId, total: u32) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let key = Self::seats_key(event_id);

        let _: () = conn
            .set(&key, i64::from(total))
            .await
            .map_err(|e| QueueError::Coordinator(format!("Failed to initialize seats: {e}")))?;

        tracing::info!(event_id = %event_id, total_seats = total, "Initialized seat counter");
        Ok(())
    }

    async fn decrement_seats(&self, event_id: EventId) -> Result<i64> {
        let mut conn = self.conn_manager.clone();
        let key = Self::seats_key(event_id);

        let remaining: i64 = conn
            .decr(&key, 1)
            .await
            .map_err(|e| QueueError::Coordinator(format!("Failed to decrement seats: {e}")))?;

        tracing::debug!(event_id = %event_id, remaining, "Decremented seat counter");
        Ok(remaining)
    }

    async fn increment_seats(&self, event_id: EventId) -> Result<i64> {
        let mut conn = self.conn_manager.clone();
        let key = Self::seats_key(event_id);

        let remaining: i64 = conn
            .incr(&key, 1)
            .await
            .map_err(|e| QueueError::Coordinator(format!("Failed to increment seats: {e}")))?;

        tracing::debug!(event_id = %event_id, remaining, "Incremented seat counter");
        Ok(remaining)
    }

    async fn remaining_seats(&self, event_id: EventId) -> Result<u32> {
        let mut conn = self.conn_manager.clone();
        let key = Self::seats_key(event_id);

        let remaining: Option<i64> = conn
            .get(&key)
            .await
            .map_err(|e| QueueError::Coordinator(format!("Failed to read seats: {e}")))?;

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Ok(remaining.unwrap_or(0).max(0) as u32)
    }

    async fn add_to_queue(&self, event_id: EventId, user_id: UserId) -> Result<u32> {
        let mut conn = self.conn_manager.clone();
        let key = Self::queue_key(event_id);
        let member = user_id.to_string();
        let score = Utc::now().timestamp_millis();

        // ZADD NX keeps the original score for an existing member, so a
        // repeated join cannot move a user within the order. The rank read
        // rides the same atomic pipeline.
        let (rank,): (Option<u64>,) = redis::pipe()
            .atomic()
            .cmd("ZADD")
            .arg(&key)
            .arg("NX")
            .arg(score)
            .arg(&member)
            .ignore()
            .cmd("ZRANK")
            .arg(&key)
            .arg(&member)
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::Coordinator(format!("Failed to add to queue: {e}")))?;

        let rank = rank
            .ok_or_else(|| QueueError::Coordinator("Member missing after ZADD".to_string()))?;

        #[allow(clippy::cast_possible_truncation)]
        let position = (rank + 1) as u32;

        tracing::debug!(event_id = %event_id, user_id = %user_id, position, "Added to queue");
        Ok(position)
    }

    async fn queue_position(&self, event_id: EventId, user_id: UserId) -> Result<Option<u32>> {
        let mut conn = self.conn_manager.clone();
        let key = Self::queue_key(event_id);

        let rank: Option<u64> = conn
            .zrank(&key, user_id.to_string())
            .await
            .map_err(|e| QueueError::Coordinator(format!("Failed to read queue rank: {e}")))?;

        #[allow(clippy::cast_possible_truncation)]
        Ok(rank.map(|r| (r + 1) as u32))
    }

    async fn queue_len(&self, event_id: EventId) -> Result<u64> {
        let mut conn = self.conn_manager.clone();
        let key = Self::queue_key(event_id);

        let len: u64 = conn
            .zcard(&key)
            .await
            .map_err(|e| QueueError::Coordinator(format!("Failed to read queue length: {e}")))?;

        Ok(len)
    }

    async fn peek_queue_head(&self, event_id: EventId) -> Result<Option<UserId>> {
        let mut conn = self.conn_manager.clone();
        let key = Self::queue_key(event_id);

        let head: Vec<String> = conn
            .zrange(&key, 0, 0)
            .await
            .map_err(|e| QueueError::Coordinator(format!("Failed to peek queue head: {e}")))?;

        match head.first() {
            Some(member) => {
                let uuid = uuid::Uuid::parse_str(member).map_err(|e| {
                    QueueError::Coordinator(format!("Malformed queue member {member:?}: {e}"))
                })?;
                Ok(Some(UserId::from_uuid(uuid)))
            }
            None => Ok(None),
        }
    }

    async fn remove_from_queue(&self, event_id: EventId, user_id: UserId) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let key = Self::queue_key(event_id);

        let _: u64 = conn
            .zrem(&key, user_id.to_string())
            .await
            .map_err(|e| QueueError::Coordinator(format!("Failed to remove from queue: {e}")))?;

        tracing::debug!(event_id = %event_id, user_id = %user_id, "Removed from queue");
        Ok(())
    }

    async fn set_active(&self, event_id: EventId, user_id: UserId, ttl: Duration) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let active_key = Self::active_key(event_id, user_id);
        let count_key = Self::active_count_key(event_id);
        let ttl_seconds = ttl.as_secs().max(1);

        let _: () = redis::pipe()
            .atomic()
            .set_ex(&active_key, "1", ttl_seconds)
            .ignore()
            .incr(&count_key, 1)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::Coordinator(format!("Failed to set active marker: {e}")))?;

        tracing::debug!(
            event_id = %event_id,
            user_id = %user_id,
            ttl_seconds,
            "Set active marker"
        );
        Ok(())
    }

    async fn is_active(&self, event_id: EventId, user_id: UserId) -> Result<bool> {
        let mut conn = self.conn_manager.clone();
        let key = Self::active_key(event_id, user_id);

        let exists: bool = conn
            .exists(&key)
            .await
            .map_err(|e| QueueError::Coordinator(format!("Failed to check active marker: {e}")))?;

        Ok(exists)
    }

    async fn clear_active(&self, event_id: EventId, user_id: UserId) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let active_key = Self::active_key(event_id, user_id);
        let count_key = Self::active_count_key(event_id);

        let script = redis::Script::new(CLEAR_ACTIVE_SCRIPT);
        let cleared: i64 = script
            .key(&active_key)
            .key(&count_key)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| QueueError::Coordinator(format!("Failed to clear active marker: {e}")))?;

        tracing::debug!(
            event_id = %event_id,
            user_id = %user_id,
            existed = cleared == 1,
            "Cleared active marker"
        );
        Ok(())
    }

    async fn active_count(&self, event_id: EventId) -> Result<u32> {
        let mut conn = self.conn_manager.clone();
        let key = Self::active_count_key(event_id);

        let count: Option<i64> = conn
            .get(&key)
            .await
            .map_err(|e| QueueError::Coordinator(format!("Failed to read active count: {e}")))?;

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Ok(count.unwrap_or(0).max(0) as u32)
    }

    async fn claim_expiration(
        &self,
        reservation_id: ReservationId,
        ttl: Duration,
    ) -> Result<bool> {
        let mut conn = self.conn_manager.clone();
        let key = Self::fence_key(reservation_id);

        // SET NX EX is a single command: at most one caller across all
        // processes observes OK for a given reservation.
        let outcome: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::Coordinator(format!("Failed to claim expiration: {e}")))?;

        let claimed = outcome.is_some();
        tracing::debug!(reservation_id = %reservation_id, claimed, "Expiration fence claim");
        Ok(claimed)
    }
}
