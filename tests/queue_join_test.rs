//! Queue-join protocol integration tests.

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(dead_code)]

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use turnstile::engine::{PromotionEngine, PromotionOutcome};
use turnstile::error::QueueError;
use turnstile::ledger::SeatLedger;
use turnstile::mocks::{
    MockEventRepository, MockLedger, MockMirror, RecordingNotifier, RecordingScheduler,
};
use turnstile::queue::QueueService;
use turnstile::store::EventRepository;
use turnstile::types::{Event, EventId, QueueStatus, UserId};

type TestEngine = PromotionEngine<MockLedger, MockMirror, RecordingNotifier, RecordingScheduler>;
type TestQueue = QueueService<MockLedger, MockMirror, MockEventRepository, RecordingNotifier>;

struct Harness {
    ledger: Arc<MockLedger>,
    mirror: Arc<MockMirror>,
    events: Arc<MockEventRepository>,
    engine: Arc<TestEngine>,
    queue: TestQueue,
}

fn harness() -> Harness {
    let ledger = Arc::new(MockLedger::new());
    let mirror = Arc::new(MockMirror::new());
    let events = Arc::new(MockEventRepository::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let scheduler = Arc::new(RecordingScheduler::new());

    let engine = Arc::new(PromotionEngine::new(
        Arc::clone(&ledger),
        Arc::clone(&mirror),
        Arc::clone(&notifier),
        Arc::clone(&scheduler),
        Duration::from_secs(300),
        100,
    ));

    let queue = QueueService::new(
        Arc::clone(&ledger),
        Arc::clone(&mirror),
        Arc::clone(&events),
        notifier,
    );

    Harness {
        ledger,
        mirror,
        events,
        engine,
        queue,
    }
}

async fn insert_event(
    h: &Harness,
    start_offset: ChronoDuration,
    end_offset: ChronoDuration,
    total_seats: u32,
) -> EventId {
    let now = Utc::now();
    let event = Event {
        event_id: EventId::new(),
        name: "Launch Night".to_string(),
        total_seats,
        sales_start_at: now + start_offset,
        sales_end_at: now + end_offset,
        created_at: now,
    };
    h.events.insert(&event).await.unwrap();
    h.ledger
        .initialize_seats(event.event_id, total_seats)
        .await
        .unwrap();
    event.event_id
}

async fn open_event(h: &Harness, total_seats: u32) -> EventId {
    insert_event(
        h,
        ChronoDuration::hours(-1),
        ChronoDuration::hours(1),
        total_seats,
    )
    .await
}

#[tokio::test]
async fn repeated_joins_are_idempotent() {
    let h = harness();
    let event_id = open_event(&h, 5).await;
    let alice = UserId::new();

    for _ in 0..10 {
        let placement = h.queue.join(event_id, alice).await.unwrap();
        assert_eq!(placement.position, Some(1));
        assert_eq!(placement.status, QueueStatus::Waiting);
    }

    // Ten calls, one entry, one queue member.
    assert_eq!(h.ledger.queue_len(event_id).await.unwrap(), 1);
    let entries = h.mirror.entries_for_event(event_id).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, QueueStatus::Waiting);
}

#[tokio::test]
async fn positions_reflect_join_order() {
    let h = harness();
    let event_id = open_event(&h, 5).await;

    for expected in 1..=3u32 {
        let placement = h.queue.join(event_id, UserId::new()).await.unwrap();
        assert_eq!(placement.position, Some(expected));
    }
    assert_eq!(h.ledger.queue_len(event_id).await.unwrap(), 3);
}

#[tokio::test]
async fn join_is_rejected_outside_the_sales_window() {
    let h = harness();
    let alice = UserId::new();

    // Sales open tomorrow.
    let not_started = insert_event(
        &h,
        ChronoDuration::hours(24),
        ChronoDuration::hours(48),
        5,
    )
    .await;
    assert_eq!(
        h.queue.join(not_started, alice).await,
        Err(QueueError::SalesNotStarted)
    );

    // Sales closed yesterday.
    let ended = insert_event(
        &h,
        ChronoDuration::hours(-48),
        ChronoDuration::hours(-24),
        5,
    )
    .await;
    assert_eq!(h.queue.join(ended, alice).await, Err(QueueError::SalesEnded));

    // Neither rejection touched the ledger.
    assert_eq!(h.ledger.queue_len(not_started).await.unwrap(), 0);
    assert_eq!(h.ledger.queue_len(ended).await.unwrap(), 0);
}

#[tokio::test]
async fn join_unknown_event_is_not_found() {
    let h = harness();
    assert_eq!(
        h.queue.join(EventId::new(), UserId::new()).await,
        Err(QueueError::EventNotFound)
    );
}

#[tokio::test]
async fn rejoin_after_promotion_reports_the_reservation() {
    let h = harness();
    let event_id = open_event(&h, 1).await;
    let alice = UserId::new();

    h.queue.join(event_id, alice).await.unwrap();
    let outcomes = h.engine.promote_batch(event_id).await.unwrap();
    let reservation = match outcomes.first() {
        Some(PromotionOutcome::Promoted { reservation, .. }) => reservation.clone(),
        other => panic!("Expected promotion, got {other:?}"),
    };

    // A repeat join after promotion reports the active standing instead of
    // re-queueing.
    let placement = h.queue.join(event_id, alice).await.unwrap();
    assert_eq!(placement.status, QueueStatus::Active);
    assert_eq!(placement.position, None);
    assert_eq!(placement.reservation_id, Some(reservation.reservation_id));
    assert_eq!(h.ledger.queue_len(event_id).await.unwrap(), 0);
}

#[tokio::test]
async fn standing_for_waiting_user_shows_live_position() {
    let h = harness();
    let event_id = open_event(&h, 5).await;
    let alice = UserId::new();
    let bob = UserId::new();

    h.queue.join(event_id, alice).await.unwrap();
    h.queue.join(event_id, bob).await.unwrap();

    let standing = h.queue.standing(event_id, bob).await.unwrap();
    assert_eq!(standing.status, QueueStatus::Waiting);
    assert_eq!(standing.position, Some(2));

    // Never joined → no standing.
    assert_eq!(
        h.queue.standing(event_id, UserId::new()).await,
        Err(QueueError::EntryNotFound)
    );
}
