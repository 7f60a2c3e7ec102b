//! Router configuration.

use super::health::{health_check, readiness_check};
use super::state::AppState;
use crate::api::{claims, events, payments, scans, tickets};
use axum::Router;
use axum::routing::{get, post};
use std::time::Duration;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Build the complete router.
///
/// Every request gets an `x-request-id` (generated when absent and echoed back),
/// a trace span, and the `request_timeout` budget.
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    let api_routes = Router::new()
        // Public
        .route("/claims", post(claims::claim_ticket))
        .route("/tickets/by-code/:code", get(tickets::ticket_by_code))
        // Organizer ticket actions
        .route("/tickets/:id/confirm-payment", post(tickets::confirm_payment))
        .route("/tickets/:id/cancel", post(tickets::cancel_ticket))
        // Door
        .route("/scans", post(scans::scan_ticket))
        .route("/scans/confirm-payment", post(scans::confirm_and_admit))
        // Events and tiers
        .route("/events", post(events::create_event))
        .route("/events/:id", get(events::get_event))
        .route("/events/:id/tiers", post(events::create_tier))
        .route(
            "/events/:id/tiers/:tier_id/active",
            post(events::set_tier_active),
        )
        .route("/events/:id/audit", get(events::audit_counters))
        // Payments
        .route("/payments/orders", post(payments::create_order));

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .nest("/api", api_routes)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}
