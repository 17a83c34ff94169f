//! Expiration pipeline integration tests.
//!
//! Deliveries are at-least-once and may be concurrent; the pipeline must
//! return each seat exactly once no matter how it is driven.

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(dead_code)]

use chrono::{Duration as ChronoDuration, Utc};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use turnstile::engine::{ExpirationPipeline, PromotionEngine, PromotionOutcome};
use turnstile::ledger::SeatLedger;
use turnstile::mocks::{
    MockEventRepository, MockLedger, MockMirror, RecordingNotifier, RecordingScheduler,
};
use turnstile::payment::PaymentService;
use turnstile::queue::QueueService;
use turnstile::store::{EventRepository, MirrorStore};
use turnstile::types::{
    Event, EventId, QueueStatus, Reservation, ReservationId, ReservationStatus, UserId,
};

type TestEngine = PromotionEngine<MockLedger, MockMirror, RecordingNotifier, RecordingScheduler>;
type TestPipeline =
    ExpirationPipeline<MockLedger, MockMirror, RecordingNotifier, RecordingScheduler>;
type TestQueue = QueueService<MockLedger, MockMirror, MockEventRepository, RecordingNotifier>;
type TestPayments = PaymentService<MockLedger, MockMirror, RecordingNotifier>;

struct Harness {
    ledger: Arc<MockLedger>,
    mirror: Arc<MockMirror>,
    events: Arc<MockEventRepository>,
    notifier: Arc<RecordingNotifier>,
    engine: Arc<TestEngine>,
    pipeline: Arc<TestPipeline>,
    queue: TestQueue,
    payments: TestPayments,
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

    let pipeline = Arc::new(ExpirationPipeline::new(
        Arc::clone(&ledger),
        Arc::clone(&mirror),
        Arc::clone(&notifier),
        Arc::clone(&engine),
        Duration::from_secs(3600),
    ));

    let queue = QueueService::new(
        Arc::clone(&ledger),
        Arc::clone(&mirror),
        Arc::clone(&events),
        Arc::clone(&notifier),
    );
    let payments = PaymentService::new(
        Arc::clone(&ledger),
        Arc::clone(&mirror),
        Arc::clone(&notifier),
    );

    Harness {
        ledger,
        mirror,
        events,
        notifier,
        engine,
        pipeline,
        queue,
        payments,
    }
}

async fn open_event(h: &Harness, total_seats: u32) -> EventId {
    let now = Utc::now();
    let event = Event {
        event_id: EventId::new(),
        name: "Launch Night".to_string(),
        total_seats,
        sales_start_at: now - ChronoDuration::hours(1),
        sales_end_at: now + ChronoDuration::hours(1),
        created_at: now,
    };
    h.events.insert(&event).await.unwrap();
    h.ledger
        .initialize_seats(event.event_id, total_seats)
        .await
        .unwrap();
    event.event_id
}

async fn join_and_promote(h: &Harness, event_id: EventId, user_id: UserId) -> Reservation {
    h.queue.join(event_id, user_id).await.unwrap();
    let outcomes = h.engine.promote_batch(event_id).await.unwrap();
    match outcomes.first() {
        Some(PromotionOutcome::Promoted { reservation, .. }) => reservation.clone(),
        other => panic!("Expected promotion, got {other:?}"),
    }
}

#[tokio::test]
async fn return_and_readmit() {
    let h = harness();
    let event_id = open_event(&h, 1).await;
    let alice = UserId::new();
    let bob = UserId::new();

    let reservation = join_and_promote(&h, event_id, alice).await;
    h.queue.join(event_id, bob).await.unwrap();
    assert_eq!(h.ledger.raw_seats(event_id).unwrap(), 0);

    // Alice never pays; the deadline job fires.
    h.pipeline.handle(reservation.reservation_id).await.unwrap();

    // Alice's reservation is terminal and her seat went straight to Bob.
    let expired = h
        .mirror
        .reservation(reservation.reservation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(expired.status, ReservationStatus::Expired);

    let alice_entry = h
        .mirror
        .entry_for_user(event_id, alice)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(alice_entry.status, QueueStatus::Expired);
    assert!(!h.ledger.is_active(event_id, alice).await.unwrap());

    let bob_entry = h
        .mirror
        .entry_for_user(event_id, bob)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bob_entry.status, QueueStatus::Active);
    let bob_reservation = h
        .mirror
        .reservation(bob_entry.reservation_id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bob_reservation.status, ReservationStatus::PendingPayment);

    // The seat moved from Alice to Bob without ever being double-counted.
    assert_eq!(h.ledger.raw_seats(event_id).unwrap(), 0);
}

#[tokio::test]
async fn expiration_storm_returns_the_seat_once() {
    let h = harness();
    let event_id = open_event(&h, 1).await;
    let alice = UserId::new();

    let reservation = join_and_promote(&h, event_id, alice).await;
    assert_eq!(h.ledger.raw_seats(event_id).unwrap(), 0);

    // The same job delivered five times concurrently.
    let deliveries = (0..5).map(|_| {
        let pipeline = Arc::clone(&h.pipeline);
        let reservation_id = reservation.reservation_id;
        async move { pipeline.handle(reservation_id).await }
    });
    for result in join_all(deliveries).await {
        result.unwrap();
    }

    // Exactly one increment, one terminal transition.
    assert_eq!(h.ledger.raw_seats(event_id).unwrap(), 1);
    let expired = h
        .mirror
        .reservation(reservation.reservation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(expired.status, ReservationStatus::Expired);
}

#[tokio::test]
async fn repeated_sequential_deliveries_are_benign() {
    let h = harness();
    let event_id = open_event(&h, 1).await;
    let alice = UserId::new();

    let reservation = join_and_promote(&h, event_id, alice).await;

    for _ in 0..3 {
        h.pipeline.handle(reservation.reservation_id).await.unwrap();
    }

    assert_eq!(h.ledger.raw_seats(event_id).unwrap(), 1);
}

#[tokio::test]
async fn interrupted_expiration_is_completed_by_a_retry() {
    let h = harness();
    let event_id = open_event(&h, 1).await;
    let alice = UserId::new();

    let reservation = join_and_promote(&h, event_id, alice).await;

    // A previous run claimed the fence and died before the terminal
    // transition.
    assert!(h
        .ledger
        .claim_expiration(reservation.reservation_id, Duration::from_secs(3600))
        .await
        .unwrap());

    // The retry finds the fence held but the reservation still pending,
    // and completes the sequence.
    h.pipeline.handle(reservation.reservation_id).await.unwrap();

    assert_eq!(h.ledger.raw_seats(event_id).unwrap(), 1);
    let expired = h
        .mirror
        .reservation(reservation.reservation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(expired.status, ReservationStatus::Expired);
}

#[tokio::test]
async fn paid_reservation_is_left_alone() {
    let h = harness();
    let event_id = open_event(&h, 1).await;
    let alice = UserId::new();

    let reservation = join_and_promote(&h, event_id, alice).await;
    h.payments
        .pay(reservation.reservation_id, alice)
        .await
        .unwrap();

    // A late job delivery must not disturb the sale.
    h.pipeline.handle(reservation.reservation_id).await.unwrap();

    assert_eq!(h.ledger.raw_seats(event_id).unwrap(), 0);
    let paid = h
        .mirror
        .reservation(reservation.reservation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(paid.status, ReservationStatus::Paid);

    let entry = h
        .mirror
        .entry_for_user(event_id, alice)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.status, QueueStatus::Done);
}

#[tokio::test]
async fn job_for_unknown_reservation_is_benign() {
    let h = harness();
    open_event(&h, 1).await;

    h.pipeline.handle(ReservationId::new()).await.unwrap();
}

#[tokio::test]
async fn overdue_sweep_finds_lapsed_reservations() {
    let h = harness();
    let event_id = open_event(&h, 1).await;
    let alice = UserId::new();

    let reservation = join_and_promote(&h, event_id, alice).await;

    // Not overdue yet.
    let overdue = h
        .mirror
        .overdue_reservations(Utc::now(), 100)
        .await
        .unwrap();
    assert!(overdue.is_empty());

    // Past the deadline it shows up, and feeding it through the pipeline
    // settles it.
    let later = reservation.expires_at + ChronoDuration::seconds(1);
    let overdue = h.mirror.overdue_reservations(later, 100).await.unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].reservation_id, reservation.reservation_id);

    h.pipeline.handle(reservation.reservation_id).await.unwrap();
    let overdue = h.mirror.overdue_reservations(later, 100).await.unwrap();
    assert!(overdue.is_empty());
}
