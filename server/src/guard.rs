//! Identity and uniqueness guard.
//!
//! A fast, non-locking pre-check run before the atomic insert so that most
//! doomed claims fail without burning a ticket code or a transaction. Its
//! answer can be stale; `TicketStore::issue_ticket` re-evaluates the same rules
//! under the store's own locking and has the final word.

use gatepass_core::eligibility::Eligibility;
use gatepass_core::error::{ClaimError, StoreError};
use gatepass_core::identity::AttendeePhone;
use gatepass_core::store::TicketStore;
use gatepass_core::types::{EventId, TierId};
use std::sync::Arc;

/// Eligibility pre-check over a [`TicketStore`].
#[derive(Clone)]
pub struct EligibilityGuard {
    store: Arc<dyn TicketStore>,
}

impl EligibilityGuard {
    /// Create a guard over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn TicketStore>) -> Self {
        Self { store }
    }

    /// Evaluate eligibility for `phone` on the event and optional tier.
    ///
    /// Rules short-circuit in order: event sold out, tier inactive, tier sold
    /// out, duplicate phone.
    ///
    /// # Errors
    ///
    /// - [`ClaimError::EventNotFound`] / [`ClaimError::TierUnavailable`] for unknown ids
    /// - [`ClaimError::Storage`] on store failure
    pub async fn check(
        &self,
        event_id: EventId,
        tier_id: Option<TierId>,
        phone: &AttendeePhone,
    ) -> Result<Eligibility, ClaimError> {
        let snapshot = self
            .store
            .eligibility_snapshot(event_id, tier_id, phone)
            .await
            .map_err(claim_error)?;
        Ok(snapshot.evaluate())
    }
}

/// Maps store errors seen on the claim path to claim errors.
pub(crate) fn claim_error(error: StoreError) -> ClaimError {
    match error {
        StoreError::NotFound { entity: "event", .. } => ClaimError::EventNotFound,
        StoreError::NotFound { entity: "tier", .. } => ClaimError::TierUnavailable,
        other => ClaimError::Storage(other),
    }
}
