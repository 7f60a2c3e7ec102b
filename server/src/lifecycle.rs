//! Organizer-driven payment transitions and the public ticket view.
//!
//! Transitions are pre-checked against the state machine for a precise error,
//! then applied with a guarded store write. When the guard fails because
//! another writer got there first, the error is re-derived from the row the
//! store returned.

use crate::metrics;
use chrono::{DateTime, Utc};
use gatepass_core::environment::Clock;
use gatepass_core::error::{LifecycleError, TransitionError};
use gatepass_core::payment::PaymentTransition;
use gatepass_core::store::{TicketStore, WriteOutcome};
use gatepass_core::ticket_code::TicketCode;
use gatepass_core::types::{AccountId, Ticket, TicketId, TicketRecord};
use std::sync::Arc;
use tracing::{info, warn};

/// Payment confirmation, cancellation and lazy expiry.
#[derive(Clone)]
pub struct PaymentLifecycle {
    store: Arc<dyn TicketStore>,
    clock: Arc<dyn Clock>,
}

impl PaymentLifecycle {
    /// Create the service.
    #[must_use]
    pub fn new(store: Arc<dyn TicketStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Confirm payment for an unpaid ticket inside its booking window.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::NotFound`] / [`LifecycleError::Unauthorized`]
    /// - [`LifecycleError::Transition`] with `expired` past the window, or
    ///   `invalid_transition` for paid and cancelled tickets
    /// - [`LifecycleError::Storage`] on store failure
    pub async fn confirm_payment(
        &self,
        actor: AccountId,
        ticket_id: TicketId,
    ) -> Result<Ticket, LifecycleError> {
        let now = self.clock.now();
        let record = self.owned_ticket(actor, ticket_id).await?;
        if let Err(e) = check(&record.ticket, PaymentTransition::Confirm, now) {
            if e == TransitionError::WindowElapsed {
                self.materialize_expiry(&record.ticket, now, "lifecycle").await;
            }
            return Err(e.into());
        }

        let ticket = applied(
            self.store.confirm_payment(ticket_id, now).await?,
            PaymentTransition::Confirm,
            now,
        )?;
        info!(%ticket_id, %actor, "Payment confirmed");
        Ok(ticket)
    }

    /// Cancel an unpaid or expired ticket, releasing its capacity slot and
    /// its phone number.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::NotFound`] / [`LifecycleError::Unauthorized`]
    /// - [`LifecycleError::Transition`] for paid or already cancelled tickets
    /// - [`LifecycleError::Storage`] on store failure
    pub async fn cancel(
        &self,
        actor: AccountId,
        ticket_id: TicketId,
    ) -> Result<Ticket, LifecycleError> {
        let now = self.clock.now();
        let record = self.owned_ticket(actor, ticket_id).await?;
        check(&record.ticket, PaymentTransition::Cancel, now)?;

        let ticket = applied(
            self.store.cancel_ticket(ticket_id, now).await?,
            PaymentTransition::Cancel,
            now,
        )?;
        info!(%ticket_id, %actor, event_id = %ticket.event_id, "Ticket cancelled");
        Ok(ticket)
    }

    /// Attendee-facing lookup by code.
    ///
    /// The returned status has lazy expiry applied; an unpaid ticket past its
    /// window is persisted as expired on the way out.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::NotFound`] for unknown codes, [`LifecycleError::Storage`]
    /// on store failure.
    pub async fn view_by_code(&self, code: &TicketCode) -> Result<TicketRecord, LifecycleError> {
        let now = self.clock.now();
        let mut record = self
            .store
            .find_by_code(code)
            .await?
            .ok_or(LifecycleError::NotFound)?;

        let effective = record.ticket.effective_status(now);
        if effective != record.ticket.payment_status {
            self.materialize_expiry(&record.ticket, now, "view").await;
            record.ticket.payment_status = effective;
        }
        Ok(record)
    }

    async fn owned_ticket(
        &self,
        actor: AccountId,
        ticket_id: TicketId,
    ) -> Result<TicketRecord, LifecycleError> {
        let record = self
            .store
            .find_by_id(ticket_id)
            .await?
            .ok_or(LifecycleError::NotFound)?;
        if record.event.owner_id != actor {
            warn!(%ticket_id, %actor, "Ticket action by an account that does not own the event");
            return Err(LifecycleError::Unauthorized);
        }
        Ok(record)
    }

    /// Best-effort persist of a lazily observed expiry.
    async fn materialize_expiry(&self, ticket: &Ticket, now: DateTime<Utc>, source: &'static str) {
        match self.store.expire_ticket(ticket.id, now).await {
            Ok(outcome) if outcome.is_applied() => metrics::record_expired(source, 1),
            Ok(_) => {}
            Err(e) => {
                warn!(ticket_id = %ticket.id, error = %e, "Could not persist ticket expiry");
            }
        }
    }
}

fn check(
    ticket: &Ticket,
    transition: PaymentTransition,
    now: DateTime<Utc>,
) -> Result<(), TransitionError> {
    ticket
        .payment_status
        .apply(transition, ticket.created_at, now)
        .map(|_| ())
}

fn applied(
    outcome: WriteOutcome,
    transition: PaymentTransition,
    now: DateTime<Utc>,
) -> Result<Ticket, LifecycleError> {
    match outcome {
        WriteOutcome::Applied(ticket) => Ok(ticket),
        WriteOutcome::Unchanged(ticket) => Err(check(&ticket, transition, now)
            .err()
            .unwrap_or(TransitionError::NotAllowed {
                from: ticket.payment_status,
                transition,
            })
            .into()),
        WriteOutcome::Missing => Err(LifecycleError::NotFound),
    }
}

impl std::fmt::Debug for PaymentLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentLifecycle").finish_non_exhaustive()
    }
}
