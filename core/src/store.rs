//! Storage traits.
//!
//! All coordination between concurrent claim and scan handlers happens in the
//! store. Each method that changes a ticket is a single atomic unit with a
//! guard condition, and reports whether the guard held.
//!
//! # Implementations
//!
//! - `PostgresTicketStore` (in `gatepass-postgres`): production
//! - `InMemoryTicketStore` (in `gatepass-testing`): deterministic tests
//!
//! # Dyn Compatibility
//!
//! Methods return boxed futures instead of using `async fn` so that services
//! can hold `Arc<dyn TicketStore>`.

use crate::eligibility::{Eligibility, EligibilitySnapshot};
use crate::error::StoreResult;
use crate::identity::AttendeePhone;
use crate::ticket_code::TicketCode;
use crate::types::{
    AccountId, CounterAudit, Event, EventId, NewEvent, NewTicket, NewTier, Ticket, TicketId,
    TicketRecord, TicketTier, TierId,
};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Boxed future returned by store methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = StoreResult<T>> + Send + 'a>>;

/// Result of an atomic issuance attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IssueOutcome {
    /// Ticket inserted and counters incremented together.
    Issued(Ticket),
    /// The rules rejected the claim at write time; nothing was written.
    Rejected(Eligibility),
}

/// Result of a guarded single-ticket update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The guard held; this is the updated ticket.
    Applied(Ticket),
    /// The guard did not hold; this is the ticket as it currently is.
    Unchanged(Ticket),
    /// No such ticket.
    Missing,
}

impl WriteOutcome {
    /// True when the update was applied.
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Decision of the claim rate limiter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateDecision {
    /// Attempt recorded; proceed.
    Allowed,
    /// A recent attempt exists for the same key.
    Denied {
        /// Time until the window frees up
        retry_after: Duration,
    },
}

/// Persistent store for events, tiers and tickets.
pub trait TicketStore: Send + Sync {
    /// Create an event with zero tickets issued.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` on upstream failure.
    fn create_event(&self, event: NewEvent) -> StoreFuture<'_, Event>;

    /// Load an event.
    fn get_event(&self, id: EventId) -> StoreFuture<'_, Option<Event>>;

    /// Create a tier with zero tickets sold.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the event does not exist.
    fn create_tier(&self, tier: NewTier) -> StoreFuture<'_, TicketTier>;

    /// Load a tier.
    fn get_tier(&self, id: TierId) -> StoreFuture<'_, Option<TicketTier>>;

    /// Tiers of an event, oldest first.
    fn list_tiers(&self, event_id: EventId) -> StoreFuture<'_, Vec<TicketTier>>;

    /// Activate or deactivate a tier. `None` if the tier does not exist.
    fn set_tier_active(&self, id: TierId, is_active: bool)
    -> StoreFuture<'_, Option<TicketTier>>;

    /// Non-locking snapshot used to fail fast before the atomic insert.
    ///
    /// The answer may be stale by the time the caller acts on it; only
    /// [`TicketStore::issue_ticket`] is authoritative.
    fn eligibility_snapshot<'a>(
        &'a self,
        event_id: EventId,
        tier_id: Option<TierId>,
        phone: &'a AttendeePhone,
    ) -> StoreFuture<'a, EligibilitySnapshot>;

    /// Atomically re-check eligibility, insert the ticket and bump counters.
    ///
    /// # Errors
    ///
    /// - `StoreError::CodeCollision`: the code already exists; nothing was written
    /// - `StoreError::NotFound`: the event or tier vanished
    /// - `StoreError::Database`: upstream failure
    fn issue_ticket(&self, ticket: NewTicket) -> StoreFuture<'_, IssueOutcome>;

    /// Look up a ticket by exact code, joined with its event and tier.
    fn find_by_code<'a>(&'a self, code: &'a TicketCode) -> StoreFuture<'a, Option<TicketRecord>>;

    /// Look up a ticket by id, joined with its event and tier.
    fn find_by_id(&self, id: TicketId) -> StoreFuture<'_, Option<TicketRecord>>;

    /// Set `is_validated` if it is false and the ticket is `paid`.
    fn mark_validated(&self, id: TicketId, now: DateTime<Utc>) -> StoreFuture<'_, WriteOutcome>;

    /// In one step, set `paid`, `is_validated` and `validated_at` if the ticket
    /// is not validated and is either paid or unpaid within the booking window.
    fn confirm_and_validate(
        &self,
        id: TicketId,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, WriteOutcome>;

    /// Set `paid` if the ticket is unpaid within the booking window.
    fn confirm_payment(&self, id: TicketId, now: DateTime<Utc>) -> StoreFuture<'_, WriteOutcome>;

    /// Set `cancelled` from `pending`, `pay_at_venue` or `expired`, releasing
    /// the event and tier slots in the same atomic unit.
    fn cancel_ticket(&self, id: TicketId, now: DateTime<Utc>) -> StoreFuture<'_, WriteOutcome>;

    /// Persist `expired` for an unpaid ticket past the booking window.
    fn expire_ticket(&self, id: TicketId, now: DateTime<Utc>) -> StoreFuture<'_, WriteOutcome>;

    /// Persist `expired` for up to `limit` stale unpaid tickets. Returns the count.
    fn expire_stale(&self, now: DateTime<Utc>, limit: u32) -> StoreFuture<'_, u64>;

    /// Record a gateway order reference on a `pending` ticket.
    fn record_payment_reference(
        &self,
        id: TicketId,
        reference: String,
    ) -> StoreFuture<'_, WriteOutcome>;

    /// Recount non-cancelled tickets and compare with the stored counters.
    fn audit_counters(&self, event_id: EventId) -> StoreFuture<'_, Option<CounterAudit>>;

    /// Connectivity check for readiness probes.
    fn ping(&self) -> StoreFuture<'_, ()>;
}

/// Append-only log of claim attempts backing the sliding-window limiter.
pub trait ClaimLog: Send + Sync {
    /// Deny if an attempt for `(event_id, origin)` exists within `window`
    /// before `now`; otherwise record one and allow.
    ///
    /// Check and record happen together so that two simultaneous attempts
    /// cannot both be admitted.
    fn admit<'a>(
        &'a self,
        event_id: EventId,
        origin: &'a str,
        now: DateTime<Utc>,
        window: Duration,
    ) -> StoreFuture<'a, RateDecision>;

    /// Drop attempts older than `before`. Returns the number removed.
    fn prune(&self, before: DateTime<Utc>) -> StoreFuture<'_, u64>;
}

/// Resolves bearer tokens to organizer/staff accounts.
pub trait SessionResolver: Send + Sync {
    /// `None` for unknown or expired tokens.
    fn resolve<'a>(&'a self, token: &'a str, now: DateTime<Utc>)
    -> StoreFuture<'a, Option<AccountId>>;
}

/// Remaining time before an attempt made at `last` stops blocking at `now`.
#[must_use]
pub fn retry_after(last: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> Duration {
    let elapsed = (now - last).to_std().unwrap_or_default();
    window.saturating_sub(elapsed).max(Duration::from_secs(1))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn retry_after_counts_down_the_window() {
        let last = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let window = Duration::from_secs(30);
        assert_eq!(
            retry_after(last, last + chrono::Duration::seconds(10), window),
            Duration::from_secs(20)
        );
        assert_eq!(retry_after(last, last, window), window);
        assert_eq!(
            retry_after(last, last + chrono::Duration::seconds(30), window),
            Duration::from_secs(1)
        );
    }
}
