//! Service-level tests for claims, scans and the payment lifecycle.
//!
//! Every service is built through [`AppState::new`] over the in-memory store,
//! so these run without a database. Concurrency tests use the multi-threaded
//! runtime so claims genuinely race on the store.
//!
//! Run with: `cargo test -p gatepass-server --test issuance_test`

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use chrono::Duration;
use futures::future::join_all;
use gatepass_core::claim::ClaimRequest;
use gatepass_core::environment::Clock;
use gatepass_core::error::ClaimError;
use gatepass_core::payment::PaymentStatus;
use gatepass_core::scan::ScanOutcome;
use gatepass_core::store::TicketStore;
use gatepass_core::ticket_code::{CodeSource, RandomCodes};
use gatepass_core::types::{AccountId, EventId, Money, TicketRecord, TierId};
use gatepass_server::notify::NotificationDispatcher;
use gatepass_server::payments::MockPaymentGateway;
use gatepass_server::retry::RetryPolicy;
use gatepass_server::{AppState, Config, Dependencies};
use gatepass_testing::{
    InMemoryClaimLog, InMemoryTicketStore, ManualClock, RecordingNotifier, ScriptedCodes,
    StaticSessions, fixtures, test_epoch,
};
use std::sync::Arc;
use tokio::task::JoinHandle;

struct Harness {
    store: InMemoryTicketStore,
    clock: ManualClock,
    state: AppState,
    notifier: RecordingNotifier,
    _dispatcher: JoinHandle<()>,
}

fn harness() -> Harness {
    harness_with(RecordingNotifier::new(), Arc::new(RandomCodes))
}

fn harness_with(notifier: RecordingNotifier, codes: Arc<dyn CodeSource>) -> Harness {
    let store = InMemoryTicketStore::new();
    let clock = ManualClock::new(test_epoch());
    let policy = RetryPolicy::builder()
        .max_retries(1)
        .initial_delay(std::time::Duration::from_millis(1))
        .build();
    let (queue, dispatcher) =
        NotificationDispatcher::new(Arc::new(notifier.clone()), policy, 64).spawn();
    let deps = Dependencies {
        store: Arc::new(store.clone()),
        claims: Arc::new(InMemoryClaimLog::new()),
        sessions: Arc::new(StaticSessions::new()),
        gateway: Arc::new(MockPaymentGateway::default()),
        codes,
        clock: Arc::new(clock.clone()),
    };
    let state = AppState::new(deps, &Config::default(), queue);
    Harness {
        store,
        clock,
        state,
        notifier,
        _dispatcher: dispatcher,
    }
}

/// A distinct client address per request so the rate limiter stays out of the way.
fn origin(n: u32) -> String {
    format!("198.51.{}.{}", n / 250, n % 250 + 1)
}

async fn claim_many(
    state: &AppState,
    requests: Vec<ClaimRequest>,
) -> Vec<Result<TicketRecord, ClaimError>> {
    let handles = requests.into_iter().enumerate().map(|(n, request)| {
        let issuer = state.issuer.clone();
        tokio::spawn(async move {
            let n = u32::try_from(n).unwrap();
            issuer.claim(&request, &origin(n)).await
        })
    });
    join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect()
}

async fn free_event(
    store: &InMemoryTicketStore,
    owner: AccountId,
    capacity: Option<u32>,
) -> EventId {
    store
        .create_event(fixtures::free_event(owner, capacity))
        .await
        .unwrap()
        .id
}

async fn paid_event_with_tier(store: &InMemoryTicketStore, owner: AccountId) -> (EventId, TierId) {
    let event = store
        .create_event(fixtures::paid_event(owner, None))
        .await
        .unwrap();
    let tier = store
        .create_tier(fixtures::tier(event.id, Money::from_minor(50_000), None))
        .await
        .unwrap();
    (event.id, tier.id)
}

fn paid_claim(event_id: EventId, tier_id: TierId, phone: &str, method: &str) -> ClaimRequest {
    let mut request = fixtures::claim_request(event_id, phone);
    request.tier_id = Some(tier_id.to_string());
    request.payment_method = Some(method.to_string());
    request
}

async fn wait_until(mut done: impl FnMut() -> bool) {
    for _ in 0..400 {
        if done() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
}

// ═══════════════════════════════════════════════════════════
// Capacity and identity under contention
// ═══════════════════════════════════════════════════════════

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_never_exceed_event_capacity() {
    let h = harness();
    let event_id = free_event(&h.store, AccountId::new(), Some(5)).await;

    let requests = (0..40)
        .map(|n| fixtures::claim_request(event_id, &fixtures::phone(n)))
        .collect();
    let results = claim_many(&h.state, requests).await;

    let issued = results.iter().filter(|r| r.is_ok()).count();
    let sold_out = results
        .iter()
        .filter(|r| matches!(r, Err(ClaimError::SoldOut)))
        .count();
    assert_eq!(issued, 5);
    assert_eq!(sold_out, 35);
    assert_eq!(h.store.live_ticket_count(event_id), 5);

    let event = h.store.get_event(event_id).await.unwrap().unwrap();
    assert_eq!(event.tickets_issued, 5);
    assert_eq!(event.remaining(), Some(0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_never_exceed_tier_capacity() {
    let h = harness();
    let event = h
        .store
        .create_event(fixtures::free_event(AccountId::new(), Some(100)))
        .await
        .unwrap();
    let tier = h
        .store
        .create_tier(fixtures::tier(event.id, Money::from_minor(0), Some(3)))
        .await
        .unwrap();

    let requests = (0..20)
        .map(|n| {
            let mut request = fixtures::claim_request(event.id, &fixtures::phone(n));
            request.tier_id = Some(tier.id.to_string());
            request
        })
        .collect();
    let results = claim_many(&h.state, requests).await;

    let issued = results.iter().filter(|r| r.is_ok()).count();
    let tier_sold_out = results
        .iter()
        .filter(|r| matches!(r, Err(ClaimError::TierSoldOut)))
        .count();
    assert_eq!(issued, 3);
    assert_eq!(tier_sold_out, 17);

    // The event still has room; only the tier is exhausted.
    let event = h.store.get_event(event.id).await.unwrap().unwrap();
    assert_eq!(event.tickets_issued, 3);
    assert_eq!(event.remaining(), Some(97));
    let tier = h.store.get_tier(tier.id).await.unwrap().unwrap();
    assert_eq!(tier.tickets_sold, 3);

    let untiered = fixtures::claim_request(event.id, &fixtures::phone(500));
    assert!(h.state.issuer.claim(&untiered, "203.0.113.9").await.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_for_one_phone_issue_exactly_one_ticket() {
    let h = harness();
    for round in 0..20 {
        let event_id = free_event(&h.store, AccountId::new(), None).await;
        let phone = fixtures::phone(round);
        let requests = vec![
            fixtures::claim_request(event_id, &phone),
            fixtures::claim_request(event_id, &phone),
        ];
        let results = claim_many(&h.state, requests).await;

        let issued = results.iter().filter(|r| r.is_ok()).count();
        let duplicates = results
            .iter()
            .filter(|r| matches!(r, Err(ClaimError::DuplicateIdentity)))
            .count();
        assert_eq!((issued, duplicates), (1, 1), "round {round}");
        assert_eq!(h.store.live_ticket_count(event_id), 1);
    }
}

#[tokio::test]
async fn duplicate_phone_is_terminal_and_survives_formatting() {
    let h = harness();
    let event_id = free_event(&h.store, AccountId::new(), None).await;

    h.state
        .issuer
        .claim(&fixtures::claim_request(event_id, "+91 98765-43210"), "203.0.113.1")
        .await
        .unwrap();
    let err = h
        .state
        .issuer
        .claim(&fixtures::claim_request(event_id, "+919876543210"), "203.0.113.2")
        .await
        .unwrap_err();

    assert_eq!(err, ClaimError::DuplicateIdentity);
    assert_eq!(err.code(), "duplicate_phone");
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn forced_code_collision_ends_in_a_unique_code() {
    let taken = "ZZZZZZZZ-00000000";
    let codes = ScriptedCodes::new([taken, taken, taken, "YYYYYYYY-11111111"]);
    let h = harness_with(RecordingNotifier::new(), Arc::new(codes.clone()));
    let event_id = free_event(&h.store, AccountId::new(), None).await;

    let first = h
        .state
        .issuer
        .claim(&fixtures::claim_request(event_id, &fixtures::phone(1)), "203.0.113.1")
        .await
        .unwrap();
    let second = h
        .state
        .issuer
        .claim(&fixtures::claim_request(event_id, &fixtures::phone(2)), "203.0.113.2")
        .await
        .unwrap();

    assert_eq!(first.ticket.ticket_code.as_str(), taken);
    assert_eq!(second.ticket.ticket_code.as_str(), "YYYYYYYY-11111111");
    assert_eq!(codes.drawn(), 4);
    assert_eq!(h.store.live_ticket_count(event_id), 2);
}

#[tokio::test]
async fn same_origin_is_rate_limited_per_event() {
    let h = harness();
    let first_event = free_event(&h.store, AccountId::new(), None).await;
    let second_event = free_event(&h.store, AccountId::new(), None).await;

    h.state
        .issuer
        .claim(&fixtures::claim_request(first_event, &fixtures::phone(1)), "203.0.113.7")
        .await
        .unwrap();
    let err = h
        .state
        .issuer
        .claim(&fixtures::claim_request(first_event, &fixtures::phone(2)), "203.0.113.7")
        .await
        .unwrap_err();
    assert!(matches!(err, ClaimError::RateLimited { .. }));
    assert!(err.is_retryable());

    // A different event has its own window.
    h.state
        .issuer
        .claim(&fixtures::claim_request(second_event, &fixtures::phone(2)), "203.0.113.7")
        .await
        .unwrap();

    h.clock.advance(Duration::seconds(31));
    h.state
        .issuer
        .claim(&fixtures::claim_request(first_event, &fixtures::phone(3)), "203.0.113.7")
        .await
        .unwrap();
}

// ═══════════════════════════════════════════════════════════
// Scans
// ═══════════════════════════════════════════════════════════

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_scans_admit_exactly_once() {
    let h = harness();
    let owner = AccountId::new();
    let event_id = free_event(&h.store, owner, None).await;

    for n in 0..10 {
        let record = h
            .state
            .issuer
            .claim(&fixtures::claim_request(event_id, &fixtures::phone(n)), &origin(n))
            .await
            .unwrap();
        let code = record.ticket.ticket_code.to_string();

        let scans = (0..2).map(|_| {
            let engine = h.state.validation.clone();
            let code = code.clone();
            tokio::spawn(async move { engine.validate(&code, owner).await })
        });
        let mut outcomes: Vec<ScanOutcome> = join_all(scans)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap().outcome)
            .collect();
        outcomes.sort_by_key(ScanOutcome::code);

        assert_eq!(
            outcomes,
            vec![ScanOutcome::AlreadyValidated, ScanOutcome::Valid],
            "ticket {code}"
        );
    }
}

#[tokio::test]
async fn rescan_reports_the_original_validation_time() {
    let h = harness();
    let owner = AccountId::new();
    let event_id = free_event(&h.store, owner, None).await;
    let record = h
        .state
        .issuer
        .claim(&fixtures::claim_request(event_id, &fixtures::phone(1)), "203.0.113.1")
        .await
        .unwrap();
    let code = record.ticket.ticket_code.to_string();

    h.clock.advance(Duration::milliseconds(1_234));
    let first = h.state.validation.validate(&code, owner).await.unwrap();
    assert_eq!(first.outcome, ScanOutcome::Valid);
    let admitted_at = first.ticket.as_ref().unwrap().validated_at.unwrap();

    h.clock.advance(Duration::minutes(45));
    let second = h.state.validation.validate(&code, owner).await.unwrap();
    assert_eq!(second.outcome, ScanOutcome::AlreadyValidated);
    let reported = second.ticket.as_ref().unwrap().validated_at.unwrap();
    assert_eq!(reported.timestamp_millis(), admitted_at.timestamp_millis());
}

#[tokio::test]
async fn foreign_scanner_cannot_admit() {
    let h = harness();
    let owner_a = AccountId::new();
    let owner_b = AccountId::new();
    free_event(&h.store, owner_a, None).await;
    let event_b = free_event(&h.store, owner_b, None).await;
    let record = h
        .state
        .issuer
        .claim(&fixtures::claim_request(event_b, &fixtures::phone(1)), "203.0.113.1")
        .await
        .unwrap();

    let report = h
        .state
        .validation
        .validate(record.ticket.ticket_code.as_str(), owner_a)
        .await
        .unwrap();
    assert_eq!(report.outcome, ScanOutcome::Unauthorized);
    assert!(report.ticket.is_none());

    let stored = h.store.find_by_id(record.ticket.id).await.unwrap().unwrap();
    assert!(!stored.ticket.is_validated);
    assert!(stored.ticket.validated_at.is_none());
}

#[tokio::test]
async fn stale_pending_ticket_reads_expired_without_a_sweep() {
    let h = harness();
    let (event_id, tier_id) = paid_event_with_tier(&h.store, AccountId::new()).await;
    let record = h
        .state
        .issuer
        .claim(&paid_claim(event_id, tier_id, &fixtures::phone(1), "upi"), "203.0.113.1")
        .await
        .unwrap();
    assert_eq!(record.ticket.payment_status, PaymentStatus::Pending);

    h.store
        .backdate_ticket(record.ticket.id, h.clock.now() - Duration::hours(25));

    let viewed = h
        .state
        .lifecycle
        .view_by_code(&record.ticket.ticket_code)
        .await
        .unwrap();
    assert_eq!(viewed.ticket.payment_status, PaymentStatus::Expired);
}

// ═══════════════════════════════════════════════════════════
// End-to-end scenarios
// ═══════════════════════════════════════════════════════════

#[tokio::test]
async fn free_event_sells_out_after_capacity() {
    let h = harness();
    let event_id = free_event(&h.store, AccountId::new(), Some(2)).await;

    for n in 0..2 {
        let record = h
            .state
            .issuer
            .claim(&fixtures::claim_request(event_id, &fixtures::phone(n)), &origin(n))
            .await
            .unwrap();
        assert_eq!(record.ticket.payment_status, PaymentStatus::Paid);
        assert!(record.ticket.payment_method.is_none());
    }

    let err = h
        .state
        .issuer
        .claim(&fixtures::claim_request(event_id, &fixtures::phone(2)), &origin(2))
        .await
        .unwrap_err();
    assert_eq!(err, ClaimError::SoldOut);
    assert_eq!(err.code(), "sold_out");
}

#[tokio::test]
async fn cash_ticket_is_collected_and_admitted_once() {
    let h = harness();
    let owner = AccountId::new();
    let (event_id, tier_id) = paid_event_with_tier(&h.store, owner).await;
    let record = h
        .state
        .issuer
        .claim(&paid_claim(event_id, tier_id, &fixtures::phone(1), "cash"), "203.0.113.1")
        .await
        .unwrap();
    assert_eq!(record.ticket.payment_status, PaymentStatus::PayAtVenue);

    // A plain scan asks staff to collect first.
    let scan = h
        .state
        .validation
        .validate(record.ticket.ticket_code.as_str(), owner)
        .await
        .unwrap();
    assert_eq!(scan.outcome, ScanOutcome::PaymentRequired);

    h.clock.advance(Duration::hours(23));
    let admitted = h
        .state
        .validation
        .confirm_payment_and_validate(record.ticket.id, owner)
        .await
        .unwrap();
    assert_eq!(admitted.outcome, ScanOutcome::Valid);
    let ticket = admitted.ticket.unwrap();
    assert_eq!(ticket.payment_status, PaymentStatus::Paid);
    assert!(ticket.validated_at.is_some());

    let again = h
        .state
        .validation
        .confirm_payment_and_validate(record.ticket.id, owner)
        .await
        .unwrap();
    assert_eq!(again.outcome, ScanOutcome::AlreadyValidated);

    let stored = h.store.find_by_id(record.ticket.id).await.unwrap().unwrap();
    assert!(stored.ticket.is_validated);
    assert_eq!(stored.ticket.payment_status, PaymentStatus::Paid);
}

#[tokio::test]
async fn unpaid_ticket_past_the_window_cannot_be_admitted() {
    let h = harness();
    let owner = AccountId::new();
    let (event_id, tier_id) = paid_event_with_tier(&h.store, owner).await;
    let record = h
        .state
        .issuer
        .claim(&paid_claim(event_id, tier_id, &fixtures::phone(1), "upi"), "203.0.113.1")
        .await
        .unwrap();
    assert_eq!(record.ticket.payment_status, PaymentStatus::Pending);

    h.store
        .backdate_ticket(record.ticket.id, h.clock.now() - Duration::hours(25));

    let scan = h
        .state
        .validation
        .validate(record.ticket.ticket_code.as_str(), owner)
        .await
        .unwrap();
    assert_eq!(scan.outcome, ScanOutcome::Expired);

    let collect = h
        .state
        .validation
        .confirm_payment_and_validate(record.ticket.id, owner)
        .await
        .unwrap();
    assert_eq!(collect.outcome, ScanOutcome::Expired);

    let stored = h.store.find_by_id(record.ticket.id).await.unwrap().unwrap();
    assert!(!stored.ticket.is_validated);
    assert_eq!(stored.ticket.payment_status, PaymentStatus::Expired);
}

#[tokio::test]
async fn cancelled_ticket_frees_its_slot() {
    let h = harness();
    let owner = AccountId::new();
    let event = h
        .store
        .create_event(fixtures::paid_event(owner, Some(1)))
        .await
        .unwrap();
    let tier = h
        .store
        .create_tier(fixtures::tier(event.id, Money::from_minor(20_000), None))
        .await
        .unwrap();
    let phone = fixtures::phone(1);
    let record = h
        .state
        .issuer
        .claim(&paid_claim(event.id, tier.id, &phone, "upi"), "203.0.113.1")
        .await
        .unwrap();

    let cancelled = h.state.lifecycle.cancel(owner, record.ticket.id).await.unwrap();
    assert_eq!(cancelled.payment_status, PaymentStatus::Cancelled);

    // Both the slot and the phone are released.
    h.state
        .issuer
        .claim(&paid_claim(event.id, tier.id, &phone, "upi"), "203.0.113.2")
        .await
        .unwrap();
    let audit = h.store.audit_counters(event.id).await.unwrap().unwrap();
    assert!(audit.is_consistent());
    assert_eq!(audit.recorded_issued, 1);
}

// ═══════════════════════════════════════════════════════════
// Notifications
// ═══════════════════════════════════════════════════════════

#[tokio::test]
async fn failed_notification_does_not_fail_the_claim() {
    let h = harness_with(RecordingNotifier::always_failing(), Arc::new(RandomCodes));
    let event_id = free_event(&h.store, AccountId::new(), None).await;

    let record = h
        .state
        .issuer
        .claim(&fixtures::claim_request(event_id, &fixtures::phone(1)), "203.0.113.1")
        .await
        .unwrap();
    assert_eq!(record.ticket.payment_status, PaymentStatus::Paid);

    // First attempt plus one retry, then the worker gives up.
    wait_until(|| h.notifier.attempts() >= 2).await;
    assert_eq!(h.notifier.attempts(), 2);
    assert!(h.notifier.delivered().is_empty());
}

#[tokio::test]
async fn confirmation_is_delivered_after_claim() {
    let h = harness();
    let event_id = free_event(&h.store, AccountId::new(), None).await;
    let record = h
        .state
        .issuer
        .claim(&fixtures::claim_request(event_id, &fixtures::phone(1)), "203.0.113.1")
        .await
        .unwrap();

    wait_until(|| !h.notifier.delivered().is_empty()).await;
    let delivered = h.notifier.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].ticket_id, record.ticket.id);
    assert_eq!(delivered[0].ticket_code, record.ticket.ticket_code.as_str());
    assert_eq!(delivered[0].attendee_email, None);
    assert!(delivered[0].ticket_url.contains(record.ticket.ticket_code.as_str()));
}
