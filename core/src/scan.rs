//! Door-scan rules.
//!
//! [`assess_admission`] decides what a scan of an existing, owned ticket
//! should do. It never mutates anything: the `Admit` and `ConfirmAndAdmit`
//! verdicts are carried out by the store with a conditional update, and the
//! store's answer (applied or not) is what the scanner finally reports.

use crate::payment::PaymentStatus;
use crate::types::Ticket;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of scanning a ticket code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOutcome {
    /// First-time validation just performed
    Valid,
    /// Validated earlier; the original timestamp is reported
    AlreadyValidated,
    /// No ticket with this code
    NotFound,
    /// The scanner does not own the ticket's event
    Unauthorized,
    /// Unpaid past the booking window
    Expired,
    /// Unpaid within the window; staff may collect payment and admit
    PaymentRequired,
    /// Withdrawn by the organizer; never admitted
    Cancelled,
}

impl ScanOutcome {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::AlreadyValidated => "already_validated",
            Self::NotFound => "not_found",
            Self::Unauthorized => "unauthorized",
            Self::Expired => "expired",
            Self::PaymentRequired => "payment_required",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// What a scan should do with a ticket the scanner is allowed to see.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// Already used at the door
    AlreadyValidated {
        /// Original validation time
        validated_at: DateTime<Utc>,
    },
    /// Cancelled tickets are never admitted
    Cancelled,
    /// Unpaid past the booking window
    Expired {
        /// Stored status is still unpaid; the reader should persist `expired`
        materialize: bool,
    },
    /// Unpaid within the window
    PaymentRequired {
        /// `pending` or `pay_at_venue`
        status: PaymentStatus,
    },
    /// Paid and unused: mark validated
    Admit,
}

impl Admission {
    /// Scan outcome reported when no write is needed.
    ///
    /// `Admit` has no outcome of its own: it becomes `Valid` or
    /// `AlreadyValidated` depending on whether the conditional update applies.
    #[must_use]
    pub const fn settled_outcome(&self) -> Option<ScanOutcome> {
        match self {
            Self::AlreadyValidated { .. } => Some(ScanOutcome::AlreadyValidated),
            Self::Cancelled => Some(ScanOutcome::Cancelled),
            Self::Expired { .. } => Some(ScanOutcome::Expired),
            Self::PaymentRequired { .. } => Some(ScanOutcome::PaymentRequired),
            Self::Admit => None,
        }
    }
}

/// Evaluates the scan rules for `ticket` at `now`.
///
/// Checked in order: already validated, cancelled, expired (stored or lazily
/// computed), unpaid within the window, admit.
#[must_use]
pub fn assess_admission(ticket: &Ticket, now: DateTime<Utc>) -> Admission {
    if ticket.is_validated {
        return Admission::AlreadyValidated {
            validated_at: ticket.validated_at.unwrap_or(ticket.created_at),
        };
    }
    match ticket.effective_status(now) {
        PaymentStatus::Cancelled => Admission::Cancelled,
        PaymentStatus::Expired => Admission::Expired {
            materialize: ticket.payment_status != PaymentStatus::Expired,
        },
        status @ (PaymentStatus::Pending | PaymentStatus::PayAtVenue) => {
            Admission::PaymentRequired { status }
        }
        PaymentStatus::Paid => Admission::Admit,
    }
}

/// Evaluates a staff "collect payment and admit" request.
///
/// Same precedence as [`assess_admission`], except that an unpaid ticket
/// inside the window (or an already paid one) may be admitted.
#[must_use]
pub fn assess_confirm_and_admit(ticket: &Ticket, now: DateTime<Utc>) -> Admission {
    match assess_admission(ticket, now) {
        Admission::PaymentRequired { .. } => Admission::Admit,
        other => other,
    }
}
