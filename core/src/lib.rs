//! # Gatepass Core
//!
//! Domain types and rules for issuing event tickets under contention.
//!
//! This crate is pure: it owns the ticket code format, attendee identity, the
//! claim request, eligibility rules, the payment state machine and the scan
//! rules, plus the storage traits that the `postgres` and `testing` crates
//! implement. It performs no I/O.
//!
//! ## Flow
//!
//! ```text
//! ClaimRequest ──validate──► ValidatedClaim ──► ClaimLog::admit
//!                                              ──► EligibilitySnapshot::evaluate
//!                                              ──► TicketStore::issue_ticket
//!
//! scan(code) ──TicketCode::parse──► TicketStore::find_by_code ──► assess_admission
//!                                              ──► TicketStore::mark_validated
//! ```
//!
//! ## Concurrency
//!
//! Stores enforce capacity, per-phone uniqueness and single-use validation with
//! guarded atomic writes. Services never hold in-process locks across I/O.

pub mod claim;
pub mod eligibility;
pub mod environment;
pub mod error;
pub mod identity;
pub mod notify;
pub mod payment;
pub mod scan;
pub mod store;
pub mod ticket_code;
pub mod types;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use claim::{ClaimChannel, ClaimRequest, ValidatedClaim};
pub use eligibility::{Eligibility, EligibilitySnapshot, TierCounters};
pub use environment::{Clock, SystemClock};
pub use error::{
    ClaimError, LifecycleError, StoreError, StoreResult, TransitionError, ValidationFailed,
    ValidationReason,
};
pub use identity::{AttendeeEmail, AttendeeName, AttendeePhone};
pub use notify::{NotificationError, NotificationSender, TicketNotification};
pub use payment::{PaymentMethod, PaymentStatus, PaymentTransition};
pub use scan::{Admission, ScanOutcome};
pub use store::{
    ClaimLog, IssueOutcome, RateDecision, SessionResolver, StoreFuture, TicketStore, WriteOutcome,
};
pub use ticket_code::{CodeSource, MalformedTicketCode, RandomCodes, TicketCode};
pub use types::{
    AccountId, ClaimAttempt, CounterAudit, Event, EventId, EventSummary, Money, NewEvent,
    NewTicket, NewTier, Ticket, TicketId, TicketRecord, TicketTier, TierCounterAudit, TierId,
    TierSummary,
};
