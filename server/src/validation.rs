//! Door validation engine.
//!
//! Scans are one-way: a ticket is admitted at most once, enforced by the
//! store's guarded `mark_validated` / `confirm_and_validate` writes. When the
//! guard fails (a concurrent scan won), the fresh row is re-assessed and the
//! loser reports what the winner left behind, normally `already_validated`.

use crate::metrics;
use chrono::{DateTime, Utc};
use gatepass_core::environment::Clock;
use gatepass_core::error::StoreError;
use gatepass_core::payment::PaymentStatus;
use gatepass_core::scan::{Admission, ScanOutcome, assess_admission, assess_confirm_and_admit};
use gatepass_core::store::{TicketStore, WriteOutcome};
use gatepass_core::ticket_code::{MalformedTicketCode, TicketCode};
use gatepass_core::types::{AccountId, Money, TicketId, TicketRecord};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Scan failures that are not scan outcomes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// The code does not have the two-group shape; the store was not queried.
    #[error("ticket code is malformed")]
    MalformedCode(#[from] MalformedTicketCode),

    /// Upstream storage fault.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl ScanError {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MalformedCode(_) => "invalid_ticket_code",
            Self::Storage(_) => "server_error",
        }
    }

    /// Whether the same request may succeed later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

/// What door staff see about a scanned ticket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannedTicket {
    /// Ticket
    pub ticket_id: TicketId,
    /// Scanned code
    pub ticket_code: String,
    /// Attendee display name
    pub attendee_name: String,
    /// Event title
    pub event_title: String,
    /// Tier name, if the ticket has one
    pub tier_name: Option<String>,
    /// Tier price in minor units
    pub tier_price: Option<Money>,
    /// Event currency
    pub currency: String,
    /// Payment status with lazy expiry applied
    pub payment_status: PaymentStatus,
    /// When the ticket was admitted, if it was
    pub validated_at: Option<DateTime<Utc>>,
}

impl ScannedTicket {
    fn from_record(record: &TicketRecord, now: DateTime<Utc>) -> Self {
        let ticket = &record.ticket;
        Self {
            ticket_id: ticket.id,
            ticket_code: ticket.ticket_code.to_string(),
            attendee_name: ticket.attendee_name.clone(),
            event_title: record.event.title.clone(),
            tier_name: record.tier.as_ref().map(|tier| tier.name.clone()),
            tier_price: record.tier.as_ref().map(|tier| tier.price),
            currency: record.event.currency.clone(),
            payment_status: ticket.effective_status(now),
            validated_at: ticket.validated_at,
        }
    }
}

/// Result of a scan: the outcome plus staff details when the scanner may see them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    /// Scan outcome
    pub outcome: ScanOutcome,
    /// Ticket details; `None` for `not_found` and `unauthorized`
    pub ticket: Option<ScannedTicket>,
}

impl ScanReport {
    const fn bare(outcome: ScanOutcome) -> Self {
        Self { outcome, ticket: None }
    }
}

#[derive(Clone, Copy)]
enum Mode {
    Validate,
    ConfirmAndValidate,
}

/// Validates tickets at the door for the owning organizer.
#[derive(Clone)]
pub struct ValidationEngine {
    store: Arc<dyn TicketStore>,
    clock: Arc<dyn Clock>,
}

impl ValidationEngine {
    /// Create the engine.
    #[must_use]
    pub fn new(store: Arc<dyn TicketStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Scan `raw_code` on behalf of `scanner`.
    ///
    /// # Errors
    ///
    /// [`ScanError::MalformedCode`] before any lookup, [`ScanError::Storage`]
    /// on store failure. Every other result is a [`ScanOutcome`].
    pub async fn validate(
        &self,
        raw_code: &str,
        scanner: AccountId,
    ) -> Result<ScanReport, ScanError> {
        let code = TicketCode::parse(raw_code)?;
        let record = self.store.find_by_code(&code).await?;
        self.settle(record, scanner, Mode::Validate).await
    }

    /// Collect payment and admit in one atomic step.
    ///
    /// Unpaid tickets inside the booking window become paid and validated
    /// together; a ticket that is already paid is simply validated.
    ///
    /// # Errors
    ///
    /// [`ScanError::Storage`] on store failure.
    pub async fn confirm_payment_and_validate(
        &self,
        ticket_id: TicketId,
        scanner: AccountId,
    ) -> Result<ScanReport, ScanError> {
        let record = self.store.find_by_id(ticket_id).await?;
        self.settle(record, scanner, Mode::ConfirmAndValidate).await
    }

    async fn settle(
        &self,
        record: Option<TicketRecord>,
        scanner: AccountId,
        mode: Mode,
    ) -> Result<ScanReport, ScanError> {
        let now = self.clock.now();
        let report = match record {
            None => ScanReport::bare(ScanOutcome::NotFound),
            Some(record) if record.event.owner_id != scanner => {
                warn!(
                    ticket_id = %record.ticket.id,
                    event_id = %record.event.id,
                    %scanner,
                    "Scan of a ticket for an event the scanner does not own"
                );
                ScanReport::bare(ScanOutcome::Unauthorized)
            }
            Some(mut record) => {
                let outcome = self.admit(&mut record, mode, now).await?;
                ScanReport {
                    outcome,
                    ticket: Some(ScannedTicket::from_record(&record, now)),
                }
            }
        };
        metrics::record_scan(report.outcome.code());
        Ok(report)
    }

    /// Apply the admission decision, updating `record` with what the store now holds.
    async fn admit(
        &self,
        record: &mut TicketRecord,
        mode: Mode,
        now: DateTime<Utc>,
    ) -> Result<ScanOutcome, ScanError> {
        let assess = match mode {
            Mode::Validate => assess_admission,
            Mode::ConfirmAndValidate => assess_confirm_and_admit,
        };

        match assess(&record.ticket, now) {
            Admission::Admit => {}
            Admission::Expired { materialize } => {
                if materialize {
                    self.materialize_expiry(record, now).await;
                }
                return Ok(ScanOutcome::Expired);
            }
            settled => {
                return Ok(settled.settled_outcome().unwrap_or(ScanOutcome::AlreadyValidated));
            }
        }

        let id = record.ticket.id;
        let outcome = match mode {
            Mode::Validate => self.store.mark_validated(id, now).await?,
            Mode::ConfirmAndValidate => self.store.confirm_and_validate(id, now).await?,
        };

        match outcome {
            WriteOutcome::Applied(ticket) => {
                info!(ticket_id = %id, event_id = %ticket.event_id, "Ticket validated");
                record.ticket = ticket;
                Ok(ScanOutcome::Valid)
            }
            WriteOutcome::Unchanged(ticket) => {
                record.ticket = ticket;
                Ok(assess(&record.ticket, now)
                    .settled_outcome()
                    .unwrap_or(ScanOutcome::AlreadyValidated))
            }
            WriteOutcome::Missing => Ok(ScanOutcome::NotFound),
        }
    }

    async fn materialize_expiry(&self, record: &mut TicketRecord, now: DateTime<Utc>) {
        match self.store.expire_ticket(record.ticket.id, now).await {
            Ok(WriteOutcome::Applied(ticket)) => {
                metrics::record_expired("scan", 1);
                record.ticket = ticket;
            }
            Ok(_) => {}
            Err(e) => warn!(
                ticket_id = %record.ticket.id,
                error = %e,
                "Could not persist ticket expiry"
            ),
        }
    }
}

impl std::fmt::Debug for ValidationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationEngine").finish_non_exhaustive()
    }
}
