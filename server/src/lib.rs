//! # Gatepass Server
//!
//! HTTP service issuing mobile event tickets.
//!
//! ```text
//! POST /api/claims ──► TicketIssuer ──► ClaimRateLimiter ──► EligibilityGuard
//!                                  ──► TicketStore::issue_ticket ──► NotificationQueue
//!
//! POST /api/scans ──► ValidationEngine ──► TicketStore::mark_validated
//!
//! organizer actions ──► PaymentLifecycle / EventAdmin / PaymentOrders
//! ```
//!
//! Background work (notification delivery, the optional expiry sweep) runs on
//! tasks spawned by [`app::run`] and never blocks a request.

pub mod api;
pub mod app;
pub mod config;
pub mod guard;
pub mod issuer;
pub mod lifecycle;
pub mod metrics;
pub mod notify;
pub mod organizer;
pub mod payments;
pub mod rate_limiter;
pub mod retry;
pub mod server;
pub mod sweep;
pub mod validation;

pub use config::Config;
pub use issuer::TicketIssuer;
pub use lifecycle::PaymentLifecycle;
pub use server::{build_router, AppState, Dependencies};
pub use validation::ValidationEngine;
