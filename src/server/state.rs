//! Shared application state for HTTP handlers.

use crate::auth::SessionStore;
use crate::config::Config;
use crate::engine::{ExpirationPipeline, PromotionEngine, TokioExpirationScheduler};
use crate::ledger::RedisLedger;
use crate::notify::NotificationHub;
use crate::payment::PaymentService;
use crate::queue::QueueService;
use crate::store::{PostgresEventRepository, PostgresMirror, PostgresUserRepository};
use std::sync::Arc;

/// Production promotion engine over the Redis ledger and Postgres mirror.
pub type Engine =
    PromotionEngine<RedisLedger, PostgresMirror, NotificationHub, TokioExpirationScheduler>;

/// Production expiration pipeline.
pub type Pipeline =
    ExpirationPipeline<RedisLedger, PostgresMirror, NotificationHub, TokioExpirationScheduler>;

/// Production queue service.
pub type Queue =
    QueueService<RedisLedger, PostgresMirror, PostgresEventRepository, NotificationHub>;

/// Production payment service.
pub type Payments = PaymentService<RedisLedger, PostgresMirror, NotificationHub>;

/// State shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration.
    pub config: Arc<Config>,
    /// Seat ledger (Redis).
    pub ledger: Arc<RedisLedger>,
    /// Durable mirror (Postgres).
    pub mirror: Arc<PostgresMirror>,
    /// Event catalog.
    pub events: Arc<PostgresEventRepository>,
    /// User accounts.
    pub users: Arc<PostgresUserRepository>,
    /// Session store for access tokens.
    pub sessions: Arc<SessionStore>,
    /// Notification rooms feeding WebSockets.
    pub hub: Arc<NotificationHub>,
    /// Promotion engine.
    pub engine: Arc<Engine>,
    /// Queue-join service.
    pub queue: Arc<Queue>,
    /// Payment service.
    pub payments: Arc<Payments>,
}
