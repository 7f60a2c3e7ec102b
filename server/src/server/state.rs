//! Application state for the HTTP server.

use crate::config::Config;
use crate::issuer::TicketIssuer;
use crate::lifecycle::PaymentLifecycle;
use crate::notify::NotificationQueue;
use crate::organizer::EventAdmin;
use crate::payments::{PaymentGateway, PaymentOrders};
use crate::rate_limiter::ClaimRateLimiter;
use crate::validation::ValidationEngine;
use gatepass_core::environment::Clock;
use gatepass_core::store::{ClaimLog, SessionResolver, TicketStore};
use gatepass_core::ticket_code::CodeSource;
use std::sync::Arc;

/// Infrastructure the services are built from.
///
/// Production passes the Postgres stores; tests pass the in-memory doubles.
#[derive(Clone)]
pub struct Dependencies {
    /// Events, tiers and tickets
    pub store: Arc<dyn TicketStore>,
    /// Claim attempt log for the rate limiter
    pub claims: Arc<dyn ClaimLog>,
    /// Bearer token resolution
    pub sessions: Arc<dyn SessionResolver>,
    /// Payment processor
    pub gateway: Arc<dyn PaymentGateway>,
    /// Ticket code generator
    pub codes: Arc<dyn CodeSource>,
    /// Time source
    pub clock: Arc<dyn Clock>,
}

/// Application state shared across all HTTP handlers.
///
/// Cloned per request; every field is an `Arc` or wraps one.
#[derive(Clone)]
pub struct AppState {
    /// Public claim path
    pub issuer: TicketIssuer,
    /// Organizer payment actions and the public ticket view
    pub lifecycle: PaymentLifecycle,
    /// Door scans
    pub validation: ValidationEngine,
    /// Gateway orders
    pub orders: PaymentOrders,
    /// Event and tier management
    pub admin: EventAdmin,
    /// Bearer token resolution
    pub sessions: Arc<dyn SessionResolver>,
    /// Store handle for readiness probes
    pub store: Arc<dyn TicketStore>,
    /// Time source
    pub clock: Arc<dyn Clock>,
    /// Whether `X-Forwarded-For` / `X-Real-IP` identify the client
    pub trust_forwarded_headers: bool,
}

impl AppState {
    /// Build every service from `deps` and `config`.
    ///
    /// Confirmations from the issuer go to `notifications`.
    #[must_use]
    pub fn new(deps: Dependencies, config: &Config, notifications: NotificationQueue) -> Self {
        let Dependencies {
            store,
            claims,
            sessions,
            gateway,
            codes,
            clock,
        } = deps;

        let limiter =
            ClaimRateLimiter::new(claims, Arc::clone(&clock), config.claims.rate_window());
        let issuer = TicketIssuer::new(
            Arc::clone(&store),
            limiter,
            codes,
            Arc::clone(&clock),
            notifications,
            config.claims.code_attempts,
            config.server.public_base_url.clone(),
        );

        Self {
            issuer,
            lifecycle: PaymentLifecycle::new(Arc::clone(&store), Arc::clone(&clock)),
            validation: ValidationEngine::new(Arc::clone(&store), Arc::clone(&clock)),
            orders: PaymentOrders::new(
                Arc::clone(&store),
                gateway,
                Arc::clone(&clock),
                config.payments.max_amount_minor,
            ),
            admin: EventAdmin::new(Arc::clone(&store), Arc::clone(&clock)),
            sessions,
            store,
            clock,
            trust_forwarded_headers: config.server.trust_forwarded_headers,
        }
    }
}
