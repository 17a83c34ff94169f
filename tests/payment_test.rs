//! Payment protocol integration tests, including the payment/expiration
//! race.

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(dead_code)]

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use turnstile::engine::{ExpirationPipeline, PromotionEngine, PromotionOutcome};
use turnstile::error::QueueError;
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
    engine: Arc<TestEngine>,
    pipeline: Arc<TestPipeline>,
    queue: TestQueue,
    payments: Arc<TestPayments>,
}

fn harness_with_window(payment_window: Duration) -> Harness {
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
        payment_window,
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
    let payments = Arc::new(PaymentService::new(
        Arc::clone(&ledger),
        Arc::clone(&mirror),
        Arc::clone(&notifier),
    ));

    Harness {
        ledger,
        mirror,
        events,
        engine,
        pipeline,
        queue,
        payments,
    }
}

fn harness() -> Harness {
    harness_with_window(Duration::from_secs(300))
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
async fn wrong_owner_is_forbidden() {
    let h = harness();
    let event_id = open_event(&h, 1).await;
    let alice = UserId::new();
    let bob = UserId::new();

    let reservation = join_and_promote(&h, event_id, alice).await;

    assert_eq!(
        h.payments.pay(reservation.reservation_id, bob).await,
        Err(QueueError::Forbidden)
    );

    // Alice's hold is untouched.
    let pending = h
        .mirror
        .reservation(reservation.reservation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pending.status, ReservationStatus::PendingPayment);
}

#[tokio::test]
async fn unknown_reservation_is_not_found() {
    let h = harness();
    assert_eq!(
        h.payments.pay(ReservationId::new(), UserId::new()).await,
        Err(QueueError::ReservationNotFound)
    );
}

#[tokio::test]
async fn elapsed_deadline_rejects_payment_without_expiring() {
    let h = harness_with_window(Duration::from_millis(1));
    let event_id = open_event(&h, 1).await;
    let alice = UserId::new();

    let reservation = join_and_promote(&h, event_id, alice).await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    // The payment path reports the lapse but leaves expiring to the
    // pipeline.
    assert_eq!(
        h.payments.pay(reservation.reservation_id, alice).await,
        Err(QueueError::ReservationExpired)
    );
    let still_pending = h
        .mirror
        .reservation(reservation.reservation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(still_pending.status, ReservationStatus::PendingPayment);
    assert_eq!(h.ledger.raw_seats(event_id).unwrap(), 0);
}

#[tokio::test]
async fn paying_twice_fails_the_second_time() {
    let h = harness();
    let event_id = open_event(&h, 1).await;
    let alice = UserId::new();

    let reservation = join_and_promote(&h, event_id, alice).await;

    h.payments
        .pay(reservation.reservation_id, alice)
        .await
        .unwrap();
    assert_eq!(
        h.payments.pay(reservation.reservation_id, alice).await,
        Err(QueueError::NotPayable)
    );
}

#[tokio::test]
async fn payment_after_expiration_is_not_payable() {
    let h = harness();
    let event_id = open_event(&h, 1).await;
    let alice = UserId::new();

    let reservation = join_and_promote(&h, event_id, alice).await;
    h.pipeline.handle(reservation.reservation_id).await.unwrap();

    assert_eq!(
        h.payments.pay(reservation.reservation_id, alice).await,
        Err(QueueError::NotPayable)
    );
    assert_eq!(h.ledger.raw_seats(event_id).unwrap(), 1);
}

#[tokio::test]
async fn payment_and_expiration_are_mutually_exclusive() {
    // Run the race many times; exactly one side must win each round, and
    // the ledger must agree with the winner.
    for _ in 0..20 {
        let h = harness();
        let event_id = open_event(&h, 1).await;
        let alice = UserId::new();

        let reservation = join_and_promote(&h, event_id, alice).await;
        let reservation_id = reservation.reservation_id;

        let payments = Arc::clone(&h.payments);
        let pipeline = Arc::clone(&h.pipeline);

        let pay_task = tokio::spawn(async move { payments.pay(reservation_id, alice).await });
        let expire_task = tokio::spawn(async move { pipeline.handle(reservation_id).await });

        let pay_result = pay_task.await.unwrap();
        expire_task.await.unwrap().unwrap();

        let settled = h
            .mirror
            .reservation(reservation_id)
            .await
            .unwrap()
            .unwrap();

        match settled.status {
            ReservationStatus::Paid => {
                // Payment won: seat stays consumed, entry is DONE.
                assert!(pay_result.is_ok());
                assert_eq!(h.ledger.raw_seats(event_id).unwrap(), 0);
                let entry = h
                    .mirror
                    .entry_for_user(event_id, alice)
                    .await
                    .unwrap()
                    .unwrap();
                assert_eq!(entry.status, QueueStatus::Done);
            }
            ReservationStatus::Expired => {
                // Expiration won: seat returned once, payment refused.
                assert_eq!(pay_result, Err(QueueError::NotPayable));
                assert_eq!(h.ledger.raw_seats(event_id).unwrap(), 1);
                let entry = h
                    .mirror
                    .entry_for_user(event_id, alice)
                    .await
                    .unwrap()
                    .unwrap();
                assert_eq!(entry.status, QueueStatus::Expired);
            }
            other => panic!("Reservation settled in impossible state {other:?}"),
        }
    }
}
