//! Ticket issuer: the public claim path.
//!
//! A claim runs validation, the per-origin rate limit, the eligibility
//! pre-check and finally the store's atomic capacity-checked insert. The only
//! retry loop on this path regenerates the ticket code after a uniqueness
//! violation; the insert decision itself is never retried. The confirmation is
//! queued after the insert commits and cannot fail the claim.

use crate::guard::{EligibilityGuard, claim_error};
use crate::metrics;
use crate::notify::NotificationQueue;
use crate::rate_limiter::ClaimRateLimiter;
use gatepass_core::claim::{ClaimRequest, ValidatedClaim};
use gatepass_core::environment::Clock;
use gatepass_core::error::{ClaimError, StoreError};
use gatepass_core::notify::TicketNotification;
use gatepass_core::payment::{PaymentStatus, payment_reference};
use gatepass_core::store::{IssueOutcome, TicketStore};
use gatepass_core::ticket_code::CodeSource;
use gatepass_core::types::{EventSummary, NewTicket, TicketRecord, TierSummary};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Issues tickets for public claims.
#[derive(Clone)]
pub struct TicketIssuer {
    store: Arc<dyn TicketStore>,
    guard: EligibilityGuard,
    limiter: ClaimRateLimiter,
    codes: Arc<dyn CodeSource>,
    clock: Arc<dyn Clock>,
    notifications: NotificationQueue,
    code_attempts: u32,
    base_url: String,
}

impl TicketIssuer {
    /// Wire an issuer.
    ///
    /// `code_attempts` bounds the regenerate-and-retry loop on code
    /// collisions; `base_url` is the public origin used for ticket links.
    #[must_use]
    pub fn new(
        store: Arc<dyn TicketStore>,
        limiter: ClaimRateLimiter,
        codes: Arc<dyn CodeSource>,
        clock: Arc<dyn Clock>,
        notifications: NotificationQueue,
        code_attempts: u32,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            guard: EligibilityGuard::new(Arc::clone(&store)),
            store,
            limiter,
            codes,
            clock,
            notifications,
            code_attempts: code_attempts.max(1),
            base_url: base_url.into(),
        }
    }

    /// Handle a public claim from `origin` (the caller's network address).
    ///
    /// Input is validated before the rate limiter is consulted, so malformed
    /// requests never consume the origin's window.
    ///
    /// # Errors
    ///
    /// Any [`ClaimError`]; see [`ClaimError::code`] for the stable codes.
    pub async fn claim(
        &self,
        request: &ClaimRequest,
        origin: &str,
    ) -> Result<TicketRecord, ClaimError> {
        let started = Instant::now();
        let result = self.claim_inner(request, origin).await;
        let outcome = match &result {
            Ok(_) => "issued",
            Err(e) => e.code(),
        };
        metrics::record_claim(outcome, started.elapsed());
        result
    }

    async fn claim_inner(
        &self,
        request: &ClaimRequest,
        origin: &str,
    ) -> Result<TicketRecord, ClaimError> {
        let claim = request.validate()?;
        self.limiter.admit(claim.event_id, origin).await?;
        self.issue(&claim).await
    }

    /// Issue a ticket for an already validated claim, skipping the rate limit.
    ///
    /// # Errors
    ///
    /// - [`ClaimError::EventNotFound`], [`ClaimError::TierUnavailable`]
    /// - [`ClaimError::SoldOut`], [`ClaimError::TierSoldOut`],
    ///   [`ClaimError::DuplicateIdentity`]
    /// - [`ClaimError::CodeGenerationExhausted`] when every candidate code collided
    /// - [`ClaimError::Storage`] on store failure
    pub async fn issue(&self, claim: &ValidatedClaim) -> Result<TicketRecord, ClaimError> {
        let event = self
            .store
            .get_event(claim.event_id)
            .await
            .map_err(claim_error)?
            .ok_or(ClaimError::EventNotFound)?;

        let tier = match claim.tier_id {
            Some(tier_id) => {
                let tier = self
                    .store
                    .get_tier(tier_id)
                    .await
                    .map_err(claim_error)?
                    .filter(|tier| tier.event_id == event.id)
                    .ok_or(ClaimError::TierUnavailable)?;
                Some(tier)
            }
            None => None,
        };

        if let Some(rejection) = self
            .guard
            .check(event.id, claim.tier_id, &claim.phone)
            .await?
            .rejection()
        {
            return Err(rejection);
        }

        let payment_method = if event.is_free {
            None
        } else {
            claim.payment_method
        };
        let payment_status = PaymentStatus::initial(event.is_free, payment_method);
        let attendee_email = claim.attendee_email();

        for attempt in 1..=self.code_attempts {
            let claimed_at = self.clock.now();
            let ticket_code = self.codes.next_code();
            let new = NewTicket {
                payment_ref_id: payment_reference(
                    event.is_free,
                    payment_method,
                    claimed_at,
                    &ticket_code,
                ),
                ticket_code,
                event_id: event.id,
                tier_id: claim.tier_id,
                attendee_name: claim.name.as_str().to_string(),
                attendee_email: attendee_email.clone(),
                attendee_phone: claim.phone.as_str().to_string(),
                payment_status,
                payment_method,
                created_at: claimed_at,
            };

            match self.store.issue_ticket(new).await {
                Ok(IssueOutcome::Issued(ticket)) => {
                    info!(
                        ticket_id = %ticket.id,
                        event_id = %event.id,
                        payment_status = %ticket.payment_status,
                        "Ticket issued"
                    );
                    let record = TicketRecord {
                        ticket,
                        event: EventSummary::from(&event),
                        tier: tier.as_ref().map(TierSummary::from),
                    };
                    self.notifications
                        .enqueue(TicketNotification::for_record(&record, &self.base_url));
                    return Ok(record);
                }
                Ok(IssueOutcome::Rejected(verdict)) => {
                    return Err(verdict.rejection().unwrap_or_else(|| {
                        ClaimError::Storage(StoreError::Corrupt(
                            "store rejected an eligible ticket".to_string(),
                        ))
                    }));
                }
                Err(StoreError::CodeCollision) => {
                    warn!(event_id = %event.id, attempt, "Ticket code collision, regenerating");
                    metrics::record_code_collision();
                }
                Err(other) => return Err(claim_error(other)),
            }
        }

        Err(ClaimError::CodeGenerationExhausted {
            attempts: self.code_attempts,
        })
    }
}

impl std::fmt::Debug for TicketIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketIssuer")
            .field("limiter", &self.limiter)
            .field("code_attempts", &self.code_attempts)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
