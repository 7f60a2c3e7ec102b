//! Payment status state machine.
//!
//! ```text
//!                 confirm
//!   pending ────────────────┐
//!      │  \                 ▼
//!      │   \ expire       paid  (terminal)
//!      │    ▼
//!      │   expired ──cancel──► cancelled (terminal)
//!      │    ▲                   ▲
//!      │   / expire             │ cancel
//!   pay_at_venue ───────────────┘
//! ```
//!
//! Expiry is a pure function of `(status, created_at, now)`: an unpaid ticket
//! older than the booking window *is* expired for every reader, whether or not
//! the `expired` status has been written back yet. Writing it back is an
//! optimization any reader may perform.

use crate::error::TransitionError;
use crate::ticket_code::TicketCode;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hours an unpaid reservation stays honorable.
pub const BOOKING_WINDOW_HOURS: i64 = 24;

/// The booking window as a duration.
#[must_use]
pub fn booking_window() -> Duration {
    Duration::hours(BOOKING_WINDOW_HOURS)
}

/// Tickets created strictly before this instant are past the window at `now`.
#[must_use]
pub fn expiry_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now - booking_window()
}

/// True when `now - created_at` exceeds the booking window.
#[must_use]
pub fn is_past_window(created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - created_at > booking_window()
}

/// Payment status of a ticket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Awaiting online payment confirmation
    Pending,
    /// Reserved, cash expected at the door
    PayAtVenue,
    /// Confirmed; valid for entry
    Paid,
    /// Unpaid beyond the booking window
    Expired,
    /// Withdrawn by the organizer; does not count toward capacity
    Cancelled,
}

impl PaymentStatus {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::PayAtVenue => "pay_at_venue",
            Self::Paid => "paid",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse the storage representation.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "pay_at_venue" => Some(Self::PayAtVenue),
            "paid" => Some(Self::Paid),
            "expired" => Some(Self::Expired),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Initial status for a new claim.
    ///
    /// Free events skip payment entirely. Paid events start `pay_at_venue` for an
    /// explicit cash reservation and `pending` otherwise.
    #[must_use]
    pub const fn initial(is_free: bool, method: Option<PaymentMethod>) -> Self {
        if is_free {
            Self::Paid
        } else {
            match method {
                Some(PaymentMethod::Cash) => Self::PayAtVenue,
                Some(PaymentMethod::Upi) | None => Self::Pending,
            }
        }
    }

    /// Awaiting money (`pending` or `pay_at_venue`).
    #[must_use]
    pub const fn is_unpaid(&self) -> bool {
        matches!(self, Self::Pending | Self::PayAtVenue)
    }

    /// Whether the ticket holds a slot against capacity and phone uniqueness.
    #[must_use]
    pub const fn holds_slot(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }

    /// Status as seen by a reader at `now`.
    #[must_use]
    pub fn effective(self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if self.is_unpaid() && is_past_window(created_at, now) {
            Self::Expired
        } else {
            self
        }
    }

    /// Applies a transition, returning the new status.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] when the transition is not defined from the
    /// current state or the booking window forbids it.
    pub fn apply(
        self,
        transition: PaymentTransition,
        created_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Self, TransitionError> {
        let not_allowed = TransitionError::NotAllowed {
            from: self,
            transition,
        };
        match transition {
            PaymentTransition::Confirm => match self.effective(created_at, now) {
                Self::Pending | Self::PayAtVenue => Ok(Self::Paid),
                Self::Expired => Err(TransitionError::WindowElapsed),
                Self::Paid | Self::Cancelled => Err(not_allowed),
            },
            PaymentTransition::Expire => {
                if !self.is_unpaid() {
                    Err(not_allowed)
                } else if is_past_window(created_at, now) {
                    Ok(Self::Expired)
                } else {
                    Err(TransitionError::WindowOpen)
                }
            }
            PaymentTransition::Cancel => match self {
                Self::Pending | Self::PayAtVenue | Self::Expired => Ok(Self::Cancelled),
                Self::Paid | Self::Cancelled => Err(not_allowed),
            },
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transitions of the payment state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentTransition {
    /// Organizer, staff or gateway confirms the money arrived
    Confirm,
    /// Booking window elapsed while unpaid
    Expire,
    /// Organizer withdraws the ticket
    Cancel,
}

impl fmt::Display for PaymentTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Confirm => "confirm payment for",
            Self::Expire => "expire",
            Self::Cancel => "cancel",
        })
    }
}

/// Payment path chosen at claim time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Online transfer with a transaction reference
    Upi,
    /// Cash collected at the venue
    Cash,
}

impl PaymentMethod {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Upi => "upi",
            Self::Cash => "cash",
        }
    }

    /// Parse the storage/request representation (case-insensitive).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "upi" => Some(Self::Upi),
            "cash" => Some(Self::Cash),
            _ => None,
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reconciliation reference for a paid-event claim.
///
/// `<METHOD>-<yyyymmddHHMMSS>-<first code group>`. Deterministic in its inputs;
/// not a secret. Free events carry no reference.
#[must_use]
pub fn payment_reference(
    is_free: bool,
    method: Option<PaymentMethod>,
    claimed_at: DateTime<Utc>,
    code: &TicketCode,
) -> Option<String> {
    if is_free {
        return None;
    }
    let prefix = match method {
        Some(PaymentMethod::Upi) => "UPI",
        Some(PaymentMethod::Cash) => "CASH",
        None => "ONLINE",
    };
    Some(format!(
        "{prefix}-{}-{}",
        claimed_at.format("%Y%m%d%H%M%S"),
        code.first_group()
    ))
}
