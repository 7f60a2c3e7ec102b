//! HTTP API tests.
//!
//! Requests go through the full router (middleware included) with
//! `tower::ServiceExt::oneshot`, backed by the in-memory store. Forwarded
//! headers are trusted so each claim can pick its own client address.
//!
//! Run with: `cargo test -p gatepass-server --test http_api_test`

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use gatepass_core::ticket_code::RandomCodes;
use gatepass_core::types::AccountId;
use gatepass_server::notify::NotificationDispatcher;
use gatepass_server::payments::MockPaymentGateway;
use gatepass_server::retry::RetryPolicy;
use gatepass_server::{AppState, Config, Dependencies, build_router};
use gatepass_testing::{
    InMemoryClaimLog, InMemoryTicketStore, ManualClock, RecordingNotifier, StaticSessions,
    test_epoch,
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const OWNER_TOKEN: &str = "owner-token";
const OTHER_TOKEN: &str = "other-token";

struct TestApp {
    router: Router,
    store: InMemoryTicketStore,
}

fn app() -> TestApp {
    let store = InMemoryTicketStore::new();
    let sessions = StaticSessions::new()
        .with(OWNER_TOKEN, AccountId::new())
        .with(OTHER_TOKEN, AccountId::new());
    let (queue, _worker) = NotificationDispatcher::new(
        Arc::new(RecordingNotifier::new()),
        RetryPolicy::default(),
        16,
    )
    .spawn();
    let deps = Dependencies {
        store: Arc::new(store.clone()),
        claims: Arc::new(InMemoryClaimLog::new()),
        sessions: Arc::new(sessions),
        gateway: Arc::new(MockPaymentGateway::default()),
        codes: Arc::new(RandomCodes),
        clock: Arc::new(ManualClock::new(test_epoch())),
    };
    let mut config = Config::default();
    config.server.trust_forwarded_headers = true;
    let state = AppState::new(deps, &config, queue);
    TestApp {
        router: build_router(state, Duration::from_secs(5)),
        store,
    }
}

async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, axum::http::HeaderMap, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, json)
}

/// Create a paid event with one ₹500 tier; returns `(event_id, tier_id)`.
async fn paid_event(router: &Router) -> (String, String) {
    let (status, _, event) = send(
        router,
        Method::POST,
        "/api/events",
        Some(OWNER_TOKEN),
        Some(json!({
            "title": "  Rooftop Jazz Night ",
            "venue": "Terrace",
            "eventDate": "2025-02-01T18:00:00Z",
            "capacity": 50
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(event["title"], "Rooftop Jazz Night");
    assert_eq!(event["currency"], "INR");
    let event_id = event["id"].as_str().unwrap().to_string();

    let (status, _, tier) = send(
        router,
        Method::POST,
        &format!("/api/events/{event_id}/tiers"),
        Some(OWNER_TOKEN),
        Some(json!({ "name": "General", "price": 50000, "capacity": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(tier["isActive"], true);
    (event_id, tier["id"].as_str().unwrap().to_string())
}

async fn claim(
    router: &Router,
    body: Value,
    forwarded_for: &str,
) -> (StatusCode, axum::http::HeaderMap, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/claims")
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-Forwarded-For", forwarded_for)
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn health_and_readiness() {
    let app = app();

    let (status, headers, body) = send(&app.router, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(headers.contains_key("x-request-id"));

    let (status, _, body) = send(&app.router, Method::GET, "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], true);

    app.store.set_unavailable(true);
    let (status, _, body) = send(&app.router, Method::GET, "/ready", None, None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["database"], false);
}

#[tokio::test]
async fn claim_then_view_ticket() {
    let app = app();
    let (event_id, tier_id) = paid_event(&app.router).await;

    let (status, _, ticket) = claim(
        &app.router,
        json!({
            "eventId": event_id,
            "tierId": tier_id,
            "name": "Asha Rao",
            "phone": "+91 98765 43210",
            "paymentMethod": "cash"
        }),
        "203.0.113.1",
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(ticket["paymentStatus"], "pay_at_venue");
    assert_eq!(ticket["tier"]["name"], "General");
    assert!(ticket.get("attendeePhone").is_none());

    let code = ticket["ticketCode"].as_str().unwrap();
    let (status, _, viewed) = send(
        &app.router,
        Method::GET,
        &format!("/api/tickets/by-code/{}", code.to_lowercase()),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(viewed["id"], ticket["id"]);

    let (status, _, body) = send(
        &app.router,
        Method::GET,
        "/api/tickets/by-code/not-a-code",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_ticket_code");
}

#[tokio::test]
async fn claim_errors_carry_stable_codes() {
    let app = app();
    let (event_id, _) = paid_event(&app.router).await;

    let (status, _, body) = claim(
        &app.router,
        json!({ "eventId": event_id, "phone": "+919800000001" }),
        "203.0.113.1",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "missing_fields");
    assert_eq!(body["retryable"], false);

    let (status, _, body) = claim(
        &app.router,
        json!({
            "eventId": uuid::Uuid::new_v4().to_string(),
            "name": "A",
            "phone": "+919800000001",
        }),
        "203.0.113.2",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "event_not_found");

    let first = json!({ "eventId": event_id, "name": "A", "phone": "+919800000001" });
    let (status, _, _) = claim(&app.router, first.clone(), "203.0.113.3").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _, body) = claim(&app.router, first, "203.0.113.4").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "duplicate_phone");
    assert_eq!(body["retryable"], false);
}

#[tokio::test]
async fn rate_limited_claim_sets_retry_after() {
    let app = app();
    let (event_id, _) = paid_event(&app.router).await;

    let (status, _, _) = claim(
        &app.router,
        json!({ "eventId": event_id, "name": "A", "phone": "+919800000001" }),
        "203.0.113.50",
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, headers, body) = claim(
        &app.router,
        json!({ "eventId": event_id, "name": "B", "phone": "+919800000002" }),
        "203.0.113.50",
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "rate_limited");
    assert_eq!(body["retryable"], true);
    let retry_after: u64 = headers[header::RETRY_AFTER].to_str().unwrap().parse().unwrap();
    assert!((1..=30).contains(&retry_after));
}

#[tokio::test]
async fn organizer_routes_require_a_session() {
    let app = app();

    let (status, _, body) = send(
        &app.router,
        Method::POST,
        "/api/scans",
        None,
        Some(json!({ "ticketCode": "AAAAAAAA-BBBBBBBB" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthenticated");

    let (status, _, _) = send(
        &app.router,
        Method::POST,
        "/api/events",
        Some("unknown-token"),
        Some(json!({ "title": "X", "eventDate": "2025-02-01T18:00:00Z" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn door_scan_flow() {
    let app = app();
    let (event_id, tier_id) = paid_event(&app.router).await;
    let (_, _, ticket) = claim(
        &app.router,
        json!({
            "eventId": event_id,
            "tierId": tier_id,
            "name": "Asha Rao",
            "phone": "+919800000001",
            "paymentMethod": "cash"
        }),
        "203.0.113.1",
    )
    .await;
    let code = ticket["ticketCode"].as_str().unwrap();

    let (status, _, body) = send(
        &app.router,
        Method::POST,
        "/api/scans",
        Some(OWNER_TOKEN),
        Some(json!({ "ticketCode": "short" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_ticket_code");

    let (status, _, body) = send(
        &app.router,
        Method::POST,
        "/api/scans",
        Some(OTHER_TOKEN),
        Some(json!({ "ticketCode": code })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["outcome"], "unauthorized");
    assert!(body["ticket"].is_null());

    let (status, _, body) = send(
        &app.router,
        Method::POST,
        "/api/scans",
        Some(OWNER_TOKEN),
        Some(json!({ "ticketCode": code })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "payment_required");
    assert_eq!(body["ticket"]["tierPrice"], 50000);

    let (status, _, body) = send(
        &app.router,
        Method::POST,
        "/api/scans/confirm-payment",
        Some(OWNER_TOKEN),
        Some(json!({ "ticketId": ticket["id"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "valid");
    assert_eq!(body["ticket"]["paymentStatus"], "paid");

    let (status, _, body) = send(
        &app.router,
        Method::POST,
        "/api/scans",
        Some(OWNER_TOKEN),
        Some(json!({ "ticketCode": code })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "already_validated");

    let (status, _, body) = send(
        &app.router,
        Method::POST,
        "/api/scans",
        Some(OWNER_TOKEN),
        Some(json!({ "ticketCode": "ZZZZZZZZ-ZZZZZZZZ" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["outcome"], "not_found");
}

#[tokio::test]
async fn organizer_payment_actions() {
    let app = app();
    let (event_id, tier_id) = paid_event(&app.router).await;
    let (_, _, ticket) = claim(
        &app.router,
        json!({
            "eventId": event_id,
            "tierId": tier_id,
            "name": "Asha Rao",
            "phone": "+919800000001",
            "paymentMethod": "upi"
        }),
        "203.0.113.1",
    )
    .await;
    assert_eq!(ticket["paymentStatus"], "pending");
    let ticket_id = ticket["id"].as_str().unwrap();

    let (status, _, body) = send(
        &app.router,
        Method::POST,
        &format!("/api/tickets/{ticket_id}/confirm-payment"),
        Some(OTHER_TOKEN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "unauthorized");

    let (status, _, body) = send(
        &app.router,
        Method::POST,
        &format!("/api/tickets/{ticket_id}/confirm-payment"),
        Some(OWNER_TOKEN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["paymentStatus"], "paid");

    // Paid is final.
    let (status, _, body) = send(
        &app.router,
        Method::POST,
        &format!("/api/tickets/{ticket_id}/cancel"),
        Some(OWNER_TOKEN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "invalid_transition");

    let (status, _, body) = send(
        &app.router,
        Method::GET,
        &format!("/api/events/{event_id}/audit"),
        Some(OWNER_TOKEN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["consistent"], true);
    assert_eq!(body["recordedIssued"], 1);
}

#[tokio::test]
async fn payment_order_for_pending_ticket() {
    let app = app();
    let (event_id, tier_id) = paid_event(&app.router).await;
    let (_, _, ticket) = claim(
        &app.router,
        json!({
            "eventId": event_id,
            "tierId": tier_id,
            "name": "Asha Rao",
            "phone": "+919800000001",
            "paymentMethod": "upi"
        }),
        "203.0.113.1",
    )
    .await;

    let order = |amount: i64| {
        json!({
            "amount": amount,
            "currency": "INR",
            "eventId": event_id,
            "ticketId": ticket["id"],
        })
    };

    let (status, _, body) = send(
        &app.router,
        Method::POST,
        "/api/payments/orders",
        Some(OWNER_TOKEN),
        Some(order(100)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "amount_mismatch");

    let (status, _, body) = send(
        &app.router,
        Method::POST,
        "/api/payments/orders",
        Some(OWNER_TOKEN),
        Some(order(50_000)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["orderId"].as_str().unwrap().starts_with("order_mock_"));
    assert_eq!(body["keyId"], "rzp_test_mock");
    assert!(body.get("keySecret").is_none());
}

#[tokio::test]
async fn malformed_json_is_a_client_error() {
    let app = app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/claims")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], "invalid_body");
}
