//! PostgreSQL implementations of the durable mirror and repositories.
//!
//! Statuses are stored as text with check constraints (see `migrations/`).
//! The runtime query API is used throughout; row structs map columns and
//! convert into the domain types, failing loudly on unknown status text.

use crate::error::{QueueError, Result};
use crate::store::{EventRepository, MirrorStore, UserRepository};
use crate::types::{
    Event, EventId, QueueEntry, QueueEntryId, QueueStatus, Reservation, ReservationCounts,
    ReservationId, ReservationStatus, User, UserId, UserRole,
};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::Row;
use uuid::Uuid;

fn store_err(context: &str, e: &dyn std::fmt::Display) -> QueueError {
    QueueError::Store(format!("{context}: {e}"))
}

// ============================================================================
// Row types
// ============================================================================

#[derive(sqlx::FromRow)]
struct EntryRow {
    entry_id: Uuid,
    event_id: Uuid,
    user_id: Uuid,
    status: String,
    reservation_id: Option<Uuid>,
    joined_position: i32,
    joined_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl EntryRow {
    fn into_entry(self) -> Result<QueueEntry> {
        let status = QueueStatus::parse(&self.status)
            .ok_or_else(|| QueueError::Store(format!("Unknown entry status {:?}", self.status)))?;

        #[allow(clippy::cast_sign_loss)]
        Ok(QueueEntry {
            entry_id: QueueEntryId::from_uuid(self.entry_id),
            event_id: EventId::from_uuid(self.event_id),
            user_id: UserId::from_uuid(self.user_id),
            status,
            reservation_id: self.reservation_id.map(ReservationId::from_uuid),
            joined_position: self.joined_position.max(0) as u32,
            joined_at: self.joined_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ReservationRow {
    reservation_id: Uuid,
    event_id: Uuid,
    user_id: Uuid,
    status: String,
    expires_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl ReservationRow {
    fn into_reservation(self) -> Result<Reservation> {
        let status = ReservationStatus::parse(&self.status).ok_or_else(|| {
            QueueError::Store(format!("Unknown reservation status {:?}", self.status))
        })?;

        Ok(Reservation {
            reservation_id: ReservationId::from_uuid(self.reservation_id),
            event_id: EventId::from_uuid(self.event_id),
            user_id: UserId::from_uuid(self.user_id),
            status,
            expires_at: self.expires_at,
            paid_at: self.paid_at,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EventRow {
    event_id: Uuid,
    name: String,
    total_seats: i32,
    sales_start_at: DateTime<Utc>,
    sales_end_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl EventRow {
    fn into_event(self) -> Event {
        #[allow(clippy::cast_sign_loss)]
        Event {
            event_id: EventId::from_uuid(self.event_id),
            name: self.name,
            total_seats: self.total_seats.max(0) as u32,
            sales_start_at: self.sales_start_at,
            sales_end_at: self.sales_end_at,
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: Uuid,
    email: String,
    name: String,
    role: String,
    salt: String,
    password_digest: String,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> Result<User> {
        let role = UserRole::parse(&self.role)
            .ok_or_else(|| QueueError::Store(format!("Unknown user role {:?}", self.role)))?;

        Ok(User {
            user_id: UserId::from_uuid(self.user_id),
            email: self.email,
            name: self.name,
            role,
            salt: self.salt,
            password_digest: self.password_digest,
            created_at: self.created_at,
        })
    }
}

// ============================================================================
// Mirror
// ============================================================================

/// PostgreSQL-backed [`MirrorStore`].
#[derive(Clone)]
pub struct PostgresMirror {
    pool: PgPool,
}

impl PostgresMirror {
    /// Create a mirror over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run embedded database migrations.
    ///
    /// # Errors
    ///
    /// Returns error if migrations fail.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| store_err("Migration failed", &e))?;
        Ok(())
    }

    /// Ping the store (readiness probe).
    ///
    /// # Errors
    ///
    /// Returns error if the store is unreachable.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| store_err("Store ping failed", &e))?;
        Ok(())
    }
}

impl MirrorStore for PostgresMirror {
    async fn insert_waiting_entry(&self, entry: &QueueEntry) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO queue_entries
                (entry_id, event_id, user_id, status, reservation_id,
                 joined_position, joined_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(entry.entry_id.as_uuid())
        .bind(entry.event_id.as_uuid())
        .bind(entry.user_id.as_uuid())
        .bind(entry.status.as_str())
        .bind(entry.reservation_id.map(|r| *r.as_uuid()))
        .bind(i32::try_from(entry.joined_position).unwrap_or(i32::MAX))
        .bind(entry.joined_at)
        .bind(entry.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return QueueError::Store("Entry already exists for (event, user)".to_string());
                }
            }
            store_err("Failed to insert queue entry", &e)
        })?;

        Ok(())
    }

    async fn entry_for_user(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<Option<QueueEntry>> {
        let row: Option<EntryRow> = sqlx::query_as(
            r"
            SELECT entry_id, event_id, user_id, status, reservation_id,
                   joined_position, joined_at, updated_at
            FROM queue_entries
            WHERE event_id = $1 AND user_id = $2
            ",
        )
        .bind(event_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_err("Failed to load queue entry", &e))?;

        row.map(EntryRow::into_entry).transpose()
    }

    async fn mark_entry_active(
        &self,
        event_id: EventId,
        user_id: UserId,
        reservation_id: ReservationId,
    ) -> Result<bool> {
        // Observably-once: two promoters racing on the same head resolve
        // here, on rows_affected.
        let result = sqlx::query(
            r"
            UPDATE queue_entries
            SET status = 'ACTIVE', reservation_id = $3, updated_at = NOW()
            WHERE event_id = $1 AND user_id = $2 AND status = 'WAITING'
            ",
        )
        .bind(event_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(reservation_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("Failed to activate queue entry", &e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn mark_entry_done(&self, event_id: EventId, user_id: UserId) -> Result<()> {
        sqlx::query(
            r"
            UPDATE queue_entries
            SET status = 'DONE', updated_at = NOW()
            WHERE event_id = $1 AND user_id = $2
              AND status NOT IN ('DONE', 'EXPIRED')
            ",
        )
        .bind(event_id.as_uuid())
        .bind(user_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("Failed to complete queue entry", &e))?;

        Ok(())
    }

    async fn mark_entry_expired(&self, event_id: EventId, user_id: UserId) -> Result<()> {
        sqlx::query(
            r"
            UPDATE queue_entries
            SET status = 'EXPIRED', updated_at = NOW()
            WHERE event_id = $1 AND user_id = $2
              AND status NOT IN ('DONE', 'EXPIRED')
            ",
        )
        .bind(event_id.as_uuid())
        .bind(user_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("Failed to expire queue entry", &e))?;

        Ok(())
    }

    async fn expire_waiting_entry(&self, event_id: EventId, user_id: UserId) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE queue_entries
            SET status = 'EXPIRED', updated_at = NOW()
            WHERE event_id = $1 AND user_id = $2 AND status = 'WAITING'
            ",
        )
        .bind(event_id.as_uuid())
        .bind(user_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("Failed to expire waiting entry", &e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn insert_reservation(&self, reservation: &Reservation) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO reservations
                (reservation_id, event_id, user_id, status, expires_at, paid_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(reservation.reservation_id.as_uuid())
        .bind(reservation.event_id.as_uuid())
        .bind(reservation.user_id.as_uuid())
        .bind(reservation.status.as_str())
        .bind(reservation.expires_at)
        .bind(reservation.paid_at)
        .bind(reservation.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("Failed to insert reservation", &e))?;

        Ok(())
    }

    async fn reservation(&self, reservation_id: ReservationId) -> Result<Option<Reservation>> {
        let row: Option<ReservationRow> = sqlx::query_as(
            r"
            SELECT reservation_id, event_id, user_id, status, expires_at, paid_at, created_at
            FROM reservations
            WHERE reservation_id = $1
            ",
        )
        .bind(reservation_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_err("Failed to load reservation", &e))?;

        row.map(ReservationRow::into_reservation).transpose()
    }

    async fn mark_reservation_paid(
        &self,
        reservation_id: ReservationId,
        paid_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE reservations
            SET status = 'PAID', paid_at = $2
            WHERE reservation_id = $1 AND status = 'PENDING_PAYMENT'
            ",
        )
        .bind(reservation_id.as_uuid())
        .bind(paid_at)
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("Failed to mark reservation paid", &e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn mark_reservation_expired(&self, reservation_id: ReservationId) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE reservations
            SET status = 'EXPIRED'
            WHERE reservation_id = $1 AND status = 'PENDING_PAYMENT'
            ",
        )
        .bind(reservation_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("Failed to mark reservation expired", &e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn overdue_reservations(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Reservation>> {
        let rows: Vec<ReservationRow> = sqlx::query_as(
            r"
            SELECT reservation_id, event_id, user_id, status, expires_at, paid_at, created_at
            FROM reservations
            WHERE status = 'PENDING_PAYMENT' AND expires_at <= $1
            ORDER BY expires_at ASC
            LIMIT $2
            ",
        )
        .bind(now)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_err("Failed to list overdue reservations", &e))?;

        rows.into_iter()
            .map(ReservationRow::into_reservation)
            .collect()
    }

    async fn reservation_counts(&self, event_id: EventId) -> Result<ReservationCounts> {
        let rows = sqlx::query(
            r"
            SELECT status, COUNT(*) AS count
            FROM reservations
            WHERE event_id = $1
            GROUP BY status
            ",
        )
        .bind(event_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_err("Failed to count reservations", &e))?;

        let mut counts = ReservationCounts::default();
        for row in rows {
            let status: String = row
                .try_get("status")
                .map_err(|e| store_err("Failed to read status column", &e))?;
            let count: i64 = row
                .try_get("count")
                .map_err(|e| store_err("Failed to read count column", &e))?;

            #[allow(clippy::cast_sign_loss)]
            let count = count.max(0) as u64;
            match ReservationStatus::parse(&status) {
                Some(ReservationStatus::PendingPayment) => counts.pending_payment = count,
                Some(ReservationStatus::Paid) => counts.paid = count,
                Some(ReservationStatus::Expired) => counts.expired = count,
                // CANCELED is never produced; absent from the stats view.
                Some(ReservationStatus::Canceled) | None => {}
            }
        }

        Ok(counts)
    }
}

// ============================================================================
// Events
// ============================================================================

/// PostgreSQL-backed [`EventRepository`].
#[derive(Clone)]
pub struct PostgresEventRepository {
    pool: PgPool,
}

impl PostgresEventRepository {
    /// Create a repository over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl EventRepository for PostgresEventRepository {
    async fn insert(&self, event: &Event) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO events
                (event_id, name, total_seats, sales_start_at, sales_end_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(event.event_id.as_uuid())
        .bind(&event.name)
        .bind(i32::try_from(event.total_seats).unwrap_or(i32::MAX))
        .bind(event.sales_start_at)
        .bind(event.sales_end_at)
        .bind(event.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("Failed to insert event", &e))?;

        Ok(())
    }

    async fn by_id(&self, event_id: EventId) -> Result<Option<Event>> {
        let row: Option<EventRow> = sqlx::query_as(
            r"
            SELECT event_id, name, total_seats, sales_start_at, sales_end_at, created_at
            FROM events
            WHERE event_id = $1
            ",
        )
        .bind(event_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_err("Failed to load event", &e))?;

        Ok(row.map(EventRow::into_event))
    }

    async fn list(&self) -> Result<Vec<Event>> {
        let rows: Vec<EventRow> = sqlx::query_as(
            r"
            SELECT event_id, name, total_seats, sales_start_at, sales_end_at, created_at
            FROM events
            ORDER BY created_at DESC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_err("Failed to list events", &e))?;

        Ok(rows.into_iter().map(EventRow::into_event).collect())
    }

    async fn list_open(&self, now: DateTime<Utc>) -> Result<Vec<Event>> {
        let rows: Vec<EventRow> = sqlx::query_as(
            r"
            SELECT event_id, name, total_seats, sales_start_at, sales_end_at, created_at
            FROM events
            WHERE sales_start_at <= $1 AND sales_end_at >= $1
            ORDER BY created_at DESC
            ",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_err("Failed to list open events", &e))?;

        Ok(rows.into_iter().map(EventRow::into_event).collect())
    }
}

// ============================================================================
// Users
// ============================================================================

/// PostgreSQL-backed [`UserRepository`].
#[derive(Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    /// Create a repository over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl UserRepository for PostgresUserRepository {
    async fn by_email(&self, email: &str) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            r"
            SELECT user_id, email, name, role, salt, password_digest, created_at
            FROM users
            WHERE email = $1
            ",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_err("Failed to load user by email", &e))?;

        row.map(UserRow::into_user).transpose()
    }

    async fn by_id(&self, user_id: UserId) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            r"
            SELECT user_id, email, name, role, salt, password_digest, created_at
            FROM users
            WHERE user_id = $1
            ",
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_err("Failed to load user by id", &e))?;

        row.map(UserRow::into_user).transpose()
    }

    async fn upsert(&self, user: &User) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO users
                (user_id, email, name, role, salt, password_digest, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (email) DO NOTHING
            ",
        )
        .bind(user.user_id.as_uuid())
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.role.as_str())
        .bind(&user.salt)
        .bind(&user.password_digest)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("Failed to upsert user", &e))?;

        Ok(())
    }
}
