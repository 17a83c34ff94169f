//! Turnstile HTTP server.

use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use turnstile::auth::{password, SessionStore};
use turnstile::config::Config;
use turnstile::engine::{
    spawn_expiration_worker, spawn_overdue_sweep, spawn_promotion_tick, ExpirationPipeline,
    PromotionEngine, RetryPolicy, TokioExpirationScheduler,
};
use turnstile::ledger::RedisLedger;
use turnstile::notify::NotificationHub;
use turnstile::payment::PaymentService;
use turnstile::queue::QueueService;
use turnstile::server::{build_router, AppState};
use turnstile::store::{
    PostgresEventRepository, PostgresMirror, PostgresUserRepository, UserRepository,
};
use turnstile::types::{User, UserId, UserRole};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "turnstile=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Turnstile");

    let config = Arc::new(Config::from_env());
    info!(
        redis_url = %config.redis.url,
        postgres_url = %config.postgres.url,
        "Configuration loaded"
    );

    // Durable store
    let pool = PgPoolOptions::new()
        .max_connections(config.postgres.max_connections)
        .acquire_timeout(Duration::from_secs(config.postgres.connect_timeout))
        .connect(&config.postgres.url)
        .await?;
    let mirror = Arc::new(PostgresMirror::new(pool.clone()));
    mirror.migrate().await?;
    info!("Store connected and migrated");

    let events = Arc::new(PostgresEventRepository::new(pool.clone()));
    let users = Arc::new(PostgresUserRepository::new(pool));

    // Coordinator
    let ledger = Arc::new(RedisLedger::new(&config.redis.url).await?);
    let sessions = Arc::new(
        SessionStore::new(
            &config.redis.url,
            Duration::from_secs(config.auth.session_ttl_secs),
        )
        .await?,
    );
    info!("Coordinator connected");

    if config.auth.seed_demo_users {
        seed_demo_users(&users).await?;
    }

    // Core components
    let hub = Arc::new(NotificationHub::new());
    let (scheduler, job_rx) = TokioExpirationScheduler::new();
    let scheduler = Arc::new(scheduler);

    let engine = Arc::new(PromotionEngine::new(
        Arc::clone(&ledger),
        Arc::clone(&mirror),
        Arc::clone(&hub),
        Arc::clone(&scheduler),
        config.queue.payment_window(),
        config.queue.max_active_users,
    ));

    let pipeline = Arc::new(ExpirationPipeline::new(
        Arc::clone(&ledger),
        Arc::clone(&mirror),
        Arc::clone(&hub),
        Arc::clone(&engine),
        Duration::from_secs(config.queue.expiration_fence_ttl_secs),
    ));

    let queue = Arc::new(QueueService::new(
        Arc::clone(&ledger),
        Arc::clone(&mirror),
        Arc::clone(&events),
        Arc::clone(&hub),
    ));
    let payments = Arc::new(PaymentService::new(
        Arc::clone(&ledger),
        Arc::clone(&mirror),
        Arc::clone(&hub),
    ));

    // Background workers
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = spawn_expiration_worker(
        job_rx,
        Arc::clone(&pipeline),
        RetryPolicy::default(),
        shutdown_rx.clone(),
    );
    let sweep = spawn_overdue_sweep(
        Arc::clone(&mirror),
        Arc::clone(&pipeline),
        Duration::from_secs(config.queue.sweep_interval_secs),
        shutdown_rx.clone(),
    );
    let tick = spawn_promotion_tick(
        Arc::clone(&events),
        Arc::clone(&engine),
        Duration::from_secs(config.queue.promotion_interval_secs),
        shutdown_rx,
    );
    info!("Background workers started");

    let state = AppState {
        config: Arc::clone(&config),
        ledger,
        mirror,
        events,
        users,
        sessions,
        hub,
        engine,
        queue,
        payments,
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped; draining workers");
    let _ = shutdown_tx.send(true);
    let _ = tokio::time::timeout(
        Duration::from_secs(config.server.shutdown_timeout),
        async move {
            let _ = worker.await;
            let _ = sweep.await;
            let _ = tick.await;
        },
    )
    .await;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C"),
        () = terminate => info!("Received SIGTERM"),
    }
}

/// Upsert two demo accounts (one admin) so a fresh deployment is drivable.
async fn seed_demo_users(
    users: &PostgresUserRepository,
) -> Result<(), Box<dyn std::error::Error>> {
    let now = chrono::Utc::now();

    let demo = [
        ("admin@example.com", "Demo Admin", UserRole::Admin, "admin1234"),
        ("user@example.com", "Demo User", UserRole::User, "user1234"),
    ];

    for (email, name, role, secret) in demo {
        let salt = password::generate_salt();
        let user = User {
            user_id: UserId::new(),
            email: email.to_string(),
            name: name.to_string(),
            role,
            password_digest: password::digest(secret, &salt),
            salt,
            created_at: now,
        };
        users.upsert(&user).await?;
    }

    info!("Seeded demo accounts");
    Ok(())
}
