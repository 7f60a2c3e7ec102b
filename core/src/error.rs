//! Error taxonomy for claims, payment transitions and storage.
//!
//! Every error a caller can see carries a stable machine-readable `code()`
//! and says whether retrying the same request could ever succeed
//! (`is_retryable()`), so clients never invite pointless retries.

use crate::payment::{PaymentStatus, PaymentTransition};
use std::time::Duration;
use thiserror::Error;

/// Result type alias for storage operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// ═══════════════════════════════════════════════════════════
// Storage
// ═══════════════════════════════════════════════════════════

/// Errors raised by [`crate::store`] implementations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The candidate ticket code already exists. The insert was rolled back.
    #[error("ticket code collision")]
    CodeCollision,

    /// A referenced row does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind ("event", "tier", "ticket")
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// Stored data could not be mapped back to domain types.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// Opaque upstream failure (connection, timeout, constraint we do not map).
    #[error("database error: {0}")]
    Database(String),
}

// ═══════════════════════════════════════════════════════════
// Input validation
// ═══════════════════════════════════════════════════════════

/// Why a field failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationReason {
    /// Field absent or blank.
    Missing,
    /// Field present but malformed.
    Invalid(String),
}

impl std::fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => f.write_str("is required"),
            Self::Invalid(message) => f.write_str(message),
        }
    }
}

/// A request field failed validation before any store access.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{field}: {reason}")]
pub struct ValidationFailed {
    /// Request field name as the client sent it
    pub field: &'static str,
    /// What was wrong
    pub reason: ValidationReason,
}

impl ValidationFailed {
    /// Field is missing or blank.
    #[must_use]
    pub const fn missing(field: &'static str) -> Self {
        Self {
            field,
            reason: ValidationReason::Missing,
        }
    }

    /// Field is malformed.
    #[must_use]
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            reason: ValidationReason::Invalid(message.into()),
        }
    }

    /// Stable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self.reason {
            ValidationReason::Missing => "missing_fields",
            ValidationReason::Invalid(_) => "invalid_field",
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Claims
// ═══════════════════════════════════════════════════════════

/// Failure of a ticket claim.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClaimError {
    /// Malformed name/phone/email or other input.
    #[error(transparent)]
    Validation(#[from] ValidationFailed),

    /// The event does not exist.
    #[error("event not found")]
    EventNotFound,

    /// The tier does not exist, belongs to another event, or is inactive.
    #[error("this ticket type is not available")]
    TierUnavailable,

    /// Event capacity reached.
    #[error("this event is sold out")]
    SoldOut,

    /// Tier capacity reached.
    #[error("this ticket type is sold out")]
    TierSoldOut,

    /// A live ticket already exists for this phone number.
    #[error("a ticket has already been claimed with this phone number")]
    DuplicateIdentity,

    /// Too many claims from this origin.
    #[error("too many requests, retry in {}s", .retry_after.as_secs().max(1))]
    RateLimited {
        /// Time until the window frees up
        retry_after: Duration,
    },

    /// Every candidate code collided.
    #[error("could not allocate a unique ticket code after {attempts} attempts")]
    CodeGenerationExhausted {
        /// Attempts made
        attempts: u32,
    },

    /// Upstream storage fault.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl ClaimError {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(failed) => failed.code(),
            Self::EventNotFound => "event_not_found",
            Self::TierUnavailable => "tier_unavailable",
            Self::SoldOut => "sold_out",
            Self::TierSoldOut => "tier_sold_out",
            Self::DuplicateIdentity => "duplicate_phone",
            Self::RateLimited { .. } => "rate_limited",
            Self::CodeGenerationExhausted { .. } => "insert_failed",
            Self::Storage(_) => "server_error",
        }
    }

    /// Whether the same request may succeed later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::CodeGenerationExhausted { .. } | Self::Storage(_)
        )
    }
}

// ═══════════════════════════════════════════════════════════
// Payment state machine
// ═══════════════════════════════════════════════════════════

/// A payment transition that the state machine does not allow.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    /// The transition is not defined from this state.
    #[error("cannot {transition} a ticket that is {from}")]
    NotAllowed {
        /// State the ticket was in
        from: PaymentStatus,
        /// Requested transition
        transition: PaymentTransition,
    },

    /// The 24 hour booking window has elapsed; the ticket is expired.
    #[error("the booking window has elapsed")]
    WindowElapsed,

    /// The booking window is still open; the ticket cannot expire yet.
    #[error("the booking window is still open")]
    WindowOpen,
}

impl TransitionError {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotAllowed { .. } => "invalid_transition",
            Self::WindowElapsed => "expired",
            Self::WindowOpen => "window_open",
        }
    }
}

/// Failure of an organizer action on an existing ticket.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// No such ticket.
    #[error("ticket not found")]
    NotFound,

    /// The caller does not own the ticket's event.
    #[error("not authorized for this event")]
    Unauthorized,

    /// The transition is not allowed from the ticket's current state.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Upstream storage fault.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl LifecycleError {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "ticket_not_found",
            Self::Unauthorized => "unauthorized",
            Self::Transition(error) => error.code(),
            Self::Storage(_) => "server_error",
        }
    }

    /// Whether the same request may succeed later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}
