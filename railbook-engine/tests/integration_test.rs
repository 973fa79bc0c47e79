use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use railbook_domain::booking::{Actor, BookingStatus, CreateBookingRequest, PassengerDetails};
use railbook_domain::error::BookingError;
use railbook_domain::inventory::SlotStatus;
use railbook_domain::payment::{CheckoutSession, LineItem, PaymentProvider, PaymentStatus};
use railbook_engine::notification::signature;
use railbook_engine::provider::{MockPaymentProvider, MockTicketArtifacts};
use railbook_engine::{
    BookingOrchestrator, ExpirySweeper, NotificationOutcome, PaymentReconciler, ReservationManager,
};
use railbook_store::{BookingStore, InventoryStore, PaymentStore, TicketStore};

const SERVER_KEY: &str = "test-server-key";

struct Engine {
    inventory: Arc<InventoryStore>,
    bookings: Arc<BookingStore>,
    tickets: Arc<TicketStore>,
    payments: Arc<PaymentStore>,
    orchestrator: Arc<BookingOrchestrator>,
    reconciler: PaymentReconciler,
    sweeper: ExpirySweeper,
}

fn engine_with_hold(hold_seconds: u64) -> Engine {
    let inventory = Arc::new(InventoryStore::new());
    let bookings = Arc::new(BookingStore::new());
    let tickets = Arc::new(TicketStore::new());
    let payments = Arc::new(PaymentStore::new());

    let reservations = Arc::new(ReservationManager::new(inventory.clone(), hold_seconds));
    let orchestrator = Arc::new(BookingOrchestrator::new(
        inventory.clone(),
        reservations,
        bookings.clone(),
        tickets.clone(),
        Arc::new(MockTicketArtifacts),
    ));
    let reconciler = PaymentReconciler::new(
        payments.clone(),
        orchestrator.clone(),
        Arc::new(MockPaymentProvider),
        "midtrans",
        SERVER_KEY,
    );
    let sweeper = ExpirySweeper::new(inventory.clone(), bookings.clone(), 1);

    Engine {
        inventory,
        bookings,
        tickets,
        payments,
        orchestrator,
        reconciler,
        sweeper,
    }
}

fn two_seat_request() -> CreateBookingRequest {
    CreateBookingRequest {
        schedule_id: 5,
        seat_ids: vec![101, 102],
        passengers: vec![
            PassengerDetails {
                name: "Ayu Lestari".into(),
                identity_number: "3201010101010001".into(),
            },
            PassengerDetails {
                name: "Budi Santoso".into(),
                identity_number: "3201010101010002".into(),
            },
        ],
        total_price: 150_000,
    }
}

fn signed_notification(order_id: &str, transaction_status: &str) -> serde_json::Value {
    let sig = signature(order_id, "200", "150000", SERVER_KEY);
    json!({
        "order_id": order_id,
        "status_code": "200",
        "gross_amount": "150000",
        "signature_key": sig,
        "transaction_status": transaction_status,
    })
}

#[tokio::test]
async fn create_booking_reserves_both_slots_with_deadline() {
    let engine = engine_with_hold(60);
    engine.inventory.publish_schedule(5, &[101, 102]).await;

    let before = chrono::Utc::now();
    let resp = engine
        .orchestrator
        .create_booking(two_seat_request(), Actor::User(Uuid::new_v4()))
        .await
        .unwrap();

    assert_eq!(resp.status, BookingStatus::Pending);
    assert_eq!(resp.reserved_seats.len(), 2);
    for seat in &resp.reserved_seats {
        let slot = engine.inventory.get_slot(5, seat.seat_id).await.unwrap();
        assert_eq!(slot.status, SlotStatus::Reserved);
        assert_eq!(slot.held_by, Some(resp.booking_id));
        let secs = (seat.hold_expires_at - before).num_seconds();
        assert!((59..=61).contains(&secs), "hold deadline ~now+60s, got {}", secs);
    }
}

#[tokio::test]
async fn seat_passenger_count_mismatch_rejected_before_claiming() {
    let engine = engine_with_hold(60);
    let mut req = two_seat_request();
    req.passengers.pop();

    let err = engine
        .orchestrator
        .create_booking(req, Actor::Anonymous)
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Validation(_)));
    // no slot was lazily created by the rejected request
    assert!(engine.inventory.get_slot(5, 101).await.is_none());
}

#[tokio::test]
async fn simultaneous_claims_on_same_seat_admit_one_booking() {
    let engine = engine_with_hold(60);
    engine.inventory.publish_schedule(5, &[101, 102]).await;
    let orchestrator = engine.orchestrator.clone();

    let mut handles = Vec::new();
    for _ in 0..2 {
        let orchestrator = orchestrator.clone();
        handles.push(tokio::spawn(async move {
            orchestrator
                .create_booking(two_seat_request(), Actor::Anonymous)
                .await
        }));
    }

    let mut winners = Vec::new();
    let mut conflicts = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(resp) => winners.push(resp.booking_id),
            Err(BookingError::SeatUnavailable { .. }) => conflicts += 1,
            Err(other) => panic!("unexpected error: {}", other),
        }
    }
    assert_eq!(winners.len(), 1);
    assert_eq!(conflicts, 1);

    // the loser left no orphan booking and both seats belong to the winner
    for seat in [101, 102] {
        let slot = engine.inventory.get_slot(5, seat).await.unwrap();
        assert_eq!(slot.held_by, Some(winners[0]));
    }
}

#[tokio::test]
async fn expired_holds_are_reclaimed_and_booking_expires() {
    let engine = engine_with_hold(0);
    engine.inventory.publish_schedule(5, &[101, 102]).await;

    let resp = engine
        .orchestrator
        .create_booking(two_seat_request(), Actor::Anonymous)
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let stats = engine.sweeper.sweep_once().await;
    assert_eq!(stats.slots_reclaimed, 2);
    assert_eq!(stats.bookings_expired, 1);

    for seat in [101, 102] {
        let slot = engine.inventory.get_slot(5, seat).await.unwrap();
        assert!(slot.is_available());
        assert!(slot.held_by.is_none());
    }
    let booking = engine.bookings.get(resp.booking_id).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Expired);

    // a second sweep finds nothing left to do
    let stats = engine.sweeper.sweep_once().await;
    assert_eq!(stats.slots_reclaimed, 0);
    assert_eq!(stats.bookings_expired, 0);
}

#[tokio::test]
async fn booking_with_live_seat_stays_pending() {
    let engine = engine_with_hold(600);
    engine.inventory.publish_schedule(5, &[101, 102]).await;

    let resp = engine
        .orchestrator
        .create_booking(two_seat_request(), Actor::Anonymous)
        .await
        .unwrap();

    let stats = engine.sweeper.sweep_once().await;
    assert_eq!(stats.slots_reclaimed, 0);
    assert_eq!(
        engine.bookings.get(resp.booking_id).await.unwrap().status,
        BookingStatus::Pending
    );
}

#[tokio::test]
async fn finalize_is_idempotent_and_issues_tickets_once() {
    let engine = engine_with_hold(600);
    engine.inventory.publish_schedule(5, &[101, 102]).await;

    let resp = engine
        .orchestrator
        .create_booking(two_seat_request(), Actor::Anonymous)
        .await
        .unwrap();

    engine.orchestrator.finalize(resp.booking_id).await.unwrap();
    engine.orchestrator.finalize(resp.booking_id).await.unwrap();

    let booking = engine.bookings.get(resp.booking_id).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Paid);
    for (i, p) in booking.passengers.iter().enumerate() {
        let expected = format!("T-{}-{}", resp.booking_id.simple(), i + 1);
        assert_eq!(p.ticket_no.as_deref(), Some(expected.as_str()));
    }

    let tickets = engine.tickets.for_booking(resp.booking_id).await;
    assert_eq!(tickets.len(), 2);
    assert!(tickets.iter().all(|t| t.qr_ref.starts_with("qr://")));

    for seat in [101, 102] {
        let slot = engine.inventory.get_slot(5, seat).await.unwrap();
        assert_eq!(slot.status, SlotStatus::Booked);
        // held_by preserved for audit
        assert_eq!(slot.held_by, Some(resp.booking_id));
    }
}

#[tokio::test]
async fn cancel_checks_ownership_and_is_idempotent() {
    let engine = engine_with_hold(600);
    engine.inventory.publish_schedule(5, &[101, 102]).await;
    let owner = Uuid::new_v4();

    let resp = engine
        .orchestrator
        .create_booking(two_seat_request(), Actor::User(owner))
        .await
        .unwrap();

    let err = engine
        .orchestrator
        .cancel(resp.booking_id, Actor::User(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Unauthorized(_)));
    let err = engine
        .orchestrator
        .cancel(resp.booking_id, Actor::Anonymous)
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Unauthorized(_)));

    engine
        .orchestrator
        .cancel(resp.booking_id, Actor::User(owner))
        .await
        .unwrap();
    assert_eq!(
        engine.bookings.get(resp.booking_id).await.unwrap().status,
        BookingStatus::Cancelled
    );
    assert!(engine.inventory.get_slot(5, 101).await.unwrap().is_available());

    // repeat cancel is a no-op, including from the internal caller
    engine
        .orchestrator
        .cancel(resp.booking_id, Actor::User(owner))
        .await
        .unwrap();
    engine
        .orchestrator
        .cancel(resp.booking_id, Actor::System)
        .await
        .unwrap();
}

#[tokio::test]
async fn settlement_notification_finalizes_exactly_once() {
    let engine = engine_with_hold(600);
    engine.inventory.publish_schedule(5, &[101, 102]).await;
    let owner = Uuid::new_v4();

    let resp = engine
        .orchestrator
        .create_booking(two_seat_request(), Actor::User(owner))
        .await
        .unwrap();
    let intent = engine
        .reconciler
        .create_payment_intent(resp.booking_id, 150_000, Actor::User(owner))
        .await
        .unwrap();
    assert!(intent.token.starts_with("mock_snap_"));

    let payload = signed_notification(&intent.order_id, "settlement");
    let outcome = engine.reconciler.handle_notification(&payload).await.unwrap();
    assert_eq!(outcome, NotificationOutcome::Finalized);

    // duplicate delivery: acknowledged, no second transition, no new tickets
    let outcome = engine.reconciler.handle_notification(&payload).await.unwrap();
    assert_eq!(outcome, NotificationOutcome::AlreadyProcessed);

    let record = engine
        .payments
        .find_by_provider_id(&intent.order_id)
        .await
        .unwrap();
    assert_eq!(record.status, PaymentStatus::Paid);
    assert_eq!(
        engine.bookings.get(resp.booking_id).await.unwrap().status,
        BookingStatus::Paid
    );
    assert_eq!(engine.tickets.for_booking(resp.booking_id).await.len(), 2);
}

#[tokio::test]
async fn tampered_signature_rejected_without_state_change() {
    let engine = engine_with_hold(600);
    engine.inventory.publish_schedule(5, &[101, 102]).await;

    let resp = engine
        .orchestrator
        .create_booking(two_seat_request(), Actor::Anonymous)
        .await
        .unwrap();
    let intent = engine
        .reconciler
        .create_payment_intent(resp.booking_id, 150_000, Actor::Anonymous)
        .await
        .unwrap();

    let mut payload = signed_notification(&intent.order_id, "settlement");
    payload["signature_key"] = json!("deadbeef");

    let err = engine.reconciler.handle_notification(&payload).await.unwrap_err();
    assert!(matches!(err, BookingError::InvalidSignature));

    let record = engine
        .payments
        .find_by_provider_id(&intent.order_id)
        .await
        .unwrap();
    assert_eq!(record.status, PaymentStatus::Created);
    assert_eq!(
        engine.bookings.get(resp.booking_id).await.unwrap().status,
        BookingStatus::Pending
    );
}

#[tokio::test]
async fn failure_notification_releases_hold_via_internal_cancel() {
    let engine = engine_with_hold(600);
    engine.inventory.publish_schedule(5, &[101, 102]).await;
    let owner = Uuid::new_v4();

    let resp = engine
        .orchestrator
        .create_booking(two_seat_request(), Actor::User(owner))
        .await
        .unwrap();
    let intent = engine
        .reconciler
        .create_payment_intent(resp.booking_id, 150_000, Actor::User(owner))
        .await
        .unwrap();

    let payload = signed_notification(&intent.order_id, "expire");
    let outcome = engine.reconciler.handle_notification(&payload).await.unwrap();
    assert_eq!(outcome, NotificationOutcome::HoldReleased);

    let record = engine
        .payments
        .find_by_provider_id(&intent.order_id)
        .await
        .unwrap();
    assert_eq!(record.status, PaymentStatus::Failed);
    assert_eq!(
        engine.bookings.get(resp.booking_id).await.unwrap().status,
        BookingStatus::Cancelled
    );
    assert!(engine.inventory.get_slot(5, 101).await.unwrap().is_available());
    assert!(engine.inventory.get_slot(5, 102).await.unwrap().is_available());
}

#[tokio::test]
async fn intermediate_status_is_acknowledged_and_ignored() {
    let engine = engine_with_hold(600);
    engine.inventory.publish_schedule(5, &[101, 102]).await;

    let resp = engine
        .orchestrator
        .create_booking(two_seat_request(), Actor::Anonymous)
        .await
        .unwrap();
    let intent = engine
        .reconciler
        .create_payment_intent(resp.booking_id, 150_000, Actor::Anonymous)
        .await
        .unwrap();

    let payload = signed_notification(&intent.order_id, "pending");
    let outcome = engine.reconciler.handle_notification(&payload).await.unwrap();
    assert_eq!(outcome, NotificationOutcome::Ignored);
    assert_eq!(
        engine.bookings.get(resp.booking_id).await.unwrap().status,
        BookingStatus::Pending
    );
}

#[tokio::test]
async fn unknown_order_id_reports_not_found() {
    let engine = engine_with_hold(600);
    let payload = signed_notification("booking-doesnotexist-1", "settlement");
    let err = engine.reconciler.handle_notification(&payload).await.unwrap_err();
    assert!(matches!(err, BookingError::NotFound(_)));
}

#[tokio::test]
async fn sweeper_task_runs_until_cancelled() {
    let engine = engine_with_hold(0);
    engine.inventory.publish_schedule(5, &[101, 102]).await;

    let resp = engine
        .orchestrator
        .create_booking(two_seat_request(), Actor::Anonymous)
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let token = tokio_util::sync::CancellationToken::new();
    let handle = engine.sweeper.spawn(token.clone());

    // first tick fires immediately; give it a moment to land
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    token.cancel();
    handle.await.unwrap();

    assert_eq!(
        engine.bookings.get(resp.booking_id).await.unwrap().status,
        BookingStatus::Expired
    );
    assert!(engine.inventory.get_slot(5, 101).await.unwrap().is_available());
}

struct FailingProvider;

#[async_trait]
impl PaymentProvider for FailingProvider {
    async fn create_transaction(
        &self,
        _order_id: &str,
        _gross_amount: i64,
        _items: &[LineItem],
    ) -> Result<CheckoutSession, Box<dyn std::error::Error + Send + Sync>> {
        Err("gateway unreachable".into())
    }
}

#[tokio::test]
async fn provider_outage_leaves_created_record_inert() {
    let engine = engine_with_hold(600);
    engine.inventory.publish_schedule(5, &[101, 102]).await;

    let resp = engine
        .orchestrator
        .create_booking(two_seat_request(), Actor::Anonymous)
        .await
        .unwrap();

    let reconciler = PaymentReconciler::new(
        engine.payments.clone(),
        engine.orchestrator.clone(),
        Arc::new(FailingProvider),
        "midtrans",
        SERVER_KEY,
    );
    let err = reconciler
        .create_payment_intent(resp.booking_id, 150_000, Actor::Anonymous)
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Internal(_)));

    // the booking itself is untouched and can retry with a fresh intent
    assert_eq!(
        engine.bookings.get(resp.booking_id).await.unwrap().status,
        BookingStatus::Pending
    );
    let intent = engine
        .reconciler
        .create_payment_intent(resp.booking_id, 150_000, Actor::Anonymous)
        .await
        .unwrap();
    assert!(!intent.token.is_empty());
}

#[tokio::test]
async fn finalize_fails_once_hold_was_reclaimed() {
    let engine = engine_with_hold(0);
    engine.inventory.publish_schedule(5, &[101, 102]).await;

    let resp = engine
        .orchestrator
        .create_booking(two_seat_request(), Actor::Anonymous)
        .await
        .unwrap();

    // holds lapse and get reclaimed before any settlement arrives; the
    // booking itself is still pending at this point
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert_eq!(engine.inventory.reclaim_expired(chrono::Utc::now()).await, 2);

    let err = engine.orchestrator.finalize(resp.booking_id).await.unwrap_err();
    assert!(matches!(err, BookingError::Internal(_)));

    // nothing was mutated: no paid booking, no tickets, seats stay free
    assert_eq!(
        engine.bookings.get(resp.booking_id).await.unwrap().status,
        BookingStatus::Pending
    );
    assert!(engine.tickets.for_booking(resp.booking_id).await.is_empty());
    for seat in [101, 102] {
        assert!(engine.inventory.get_slot(5, seat).await.unwrap().is_available());
    }

    // the sweeper then expires the stranded booking as usual
    let stats = engine.sweeper.sweep_once().await;
    assert_eq!(stats.bookings_expired, 1);
    assert_eq!(
        engine.bookings.get(resp.booking_id).await.unwrap().status,
        BookingStatus::Expired
    );
}

#[tokio::test]
async fn sweep_never_demotes_a_paid_booking() {
    let engine = engine_with_hold(0);
    engine.inventory.publish_schedule(5, &[101, 102]).await;

    let resp = engine
        .orchestrator
        .create_booking(two_seat_request(), Actor::Anonymous)
        .await
        .unwrap();

    // settle before the (already lapsed) hold is reclaimed
    engine.orchestrator.finalize(resp.booking_id).await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let stats = engine.sweeper.sweep_once().await;
    assert_eq!(stats.slots_reclaimed, 0);
    assert_eq!(stats.bookings_expired, 0);

    assert_eq!(
        engine.bookings.get(resp.booking_id).await.unwrap().status,
        BookingStatus::Paid
    );
    for seat in [101, 102] {
        let slot = engine.inventory.get_slot(5, seat).await.unwrap();
        assert_eq!(slot.status, SlotStatus::Booked);
    }
}

#[tokio::test]
async fn cancel_after_finalize_leaves_paid_booking_intact() {
    let engine = engine_with_hold(600);
    engine.inventory.publish_schedule(5, &[101, 102]).await;
    let owner = Uuid::new_v4();

    let resp = engine
        .orchestrator
        .create_booking(two_seat_request(), Actor::User(owner))
        .await
        .unwrap();
    engine.orchestrator.finalize(resp.booking_id).await.unwrap();

    let err = engine
        .orchestrator
        .cancel(resp.booking_id, Actor::User(owner))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Validation(_)));

    assert_eq!(
        engine.bookings.get(resp.booking_id).await.unwrap().status,
        BookingStatus::Paid
    );
    assert_eq!(engine.tickets.for_booking(resp.booking_id).await.len(), 2);
    for seat in [101, 102] {
        let slot = engine.inventory.get_slot(5, seat).await.unwrap();
        assert_eq!(slot.status, SlotStatus::Booked);
        assert_eq!(slot.held_by, Some(resp.booking_id));
    }
}

#[tokio::test]
async fn listing_returns_only_the_users_bookings_in_creation_order() {
    let engine = engine_with_hold(600);
    engine.inventory.publish_schedule(5, &[101, 102]).await;
    engine.inventory.publish_schedule(6, &[1, 2]).await;
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    let first = engine
        .orchestrator
        .create_booking(two_seat_request(), Actor::User(alice))
        .await
        .unwrap();
    let second = engine
        .orchestrator
        .create_booking(
            CreateBookingRequest {
                schedule_id: 6,
                seat_ids: vec![1],
                passengers: vec![PassengerDetails {
                    name: "Ayu Lestari".into(),
                    identity_number: "3201010101010001".into(),
                }],
                total_price: 75_000,
            },
            Actor::User(alice),
        )
        .await
        .unwrap();
    engine
        .orchestrator
        .create_booking(
            CreateBookingRequest {
                schedule_id: 6,
                seat_ids: vec![2],
                passengers: vec![PassengerDetails {
                    name: "Budi Santoso".into(),
                    identity_number: "3201010101010002".into(),
                }],
                total_price: 75_000,
            },
            Actor::User(bob),
        )
        .await
        .unwrap();

    let listed = engine.orchestrator.list_bookings_for_user(alice).await;
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, first.booking_id);
    assert_eq!(listed[1].id, second.booking_id);

    assert!(
        engine
            .orchestrator
            .list_bookings_for_user(Uuid::new_v4())
            .await
            .is_empty()
    );
}
