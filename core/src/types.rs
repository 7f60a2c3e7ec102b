//! Domain types for ticket issuance.
//!
//! Identifiers are UUID newtypes so an `EventId` can never be passed where a
//! `TicketId` is expected. Records mirror the persisted layout: `Event`,
//! `TicketTier`, `Ticket` and the append-only `ClaimAttempt` log.

use crate::payment::{PaymentMethod, PaymentStatus};
use crate::ticket_code::TicketCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random `EventId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `EventId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a ticket tier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TierId(Uuid);

impl TierId {
    /// Creates a new random `TierId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `TierId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TierId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a ticket (internal; staff and attendees see the [`TicketCode`])
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TicketId(Uuid);

impl TicketId {
    /// Creates a new random `TicketId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `TicketId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TicketId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Authenticated organizer/staff account.
///
/// Kept distinct from attendee identity: attendees on the public claim path are
/// identified by their phone number and never carry an `AccountId`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(Uuid);

impl AccountId {
    /// Creates a new random `AccountId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `AccountId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Value Objects
// ============================================================================

/// Amount of money in minor currency units (paise, cents).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Zero amount
    pub const ZERO: Self = Self(0);

    /// Creates money from minor units
    #[must_use]
    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Minor units
    #[must_use]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// True when the amount is strictly positive
    #[must_use]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

// ============================================================================
// Records
// ============================================================================

/// An event that tickets are claimed for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event ID
    pub id: EventId,
    /// Organizer that owns the event (only they may scan its tickets)
    pub owner_id: AccountId,
    /// Display title
    pub title: String,
    /// Venue description
    pub venue: Option<String>,
    /// When the event takes place
    pub event_date: DateTime<Utc>,
    /// Free events issue tickets straight into `paid`
    pub is_free: bool,
    /// Overall capacity (`None` = unlimited)
    pub capacity: Option<u32>,
    /// Non-cancelled tickets issued so far
    pub tickets_issued: u32,
    /// ISO 4217 currency code
    pub currency: String,
    /// When the event was created
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Remaining capacity, `None` when unlimited.
    #[must_use]
    pub fn remaining(&self) -> Option<u32> {
        self.capacity
            .map(|capacity| capacity.saturating_sub(self.tickets_issued))
    }
}

/// Fields needed to create an event.
#[derive(Clone, Debug)]
pub struct NewEvent {
    /// Owning organizer
    pub owner_id: AccountId,
    /// Display title
    pub title: String,
    /// Venue description
    pub venue: Option<String>,
    /// When the event takes place
    pub event_date: DateTime<Utc>,
    /// Free event flag
    pub is_free: bool,
    /// Overall capacity
    pub capacity: Option<u32>,
    /// Currency code
    pub currency: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// A named ticket category within an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketTier {
    /// Tier ID
    pub id: TierId,
    /// Parent event
    pub event_id: EventId,
    /// Display name ("General", "VIP")
    pub name: String,
    /// Price per ticket
    pub price: Money,
    /// Currency code
    pub currency: String,
    /// Tier capacity (`None` = bounded only by the event)
    pub capacity: Option<u32>,
    /// Non-cancelled tickets sold in this tier
    pub tickets_sold: u32,
    /// Inactive tiers reject new claims
    pub is_active: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Fields needed to create a tier.
#[derive(Clone, Debug)]
pub struct NewTier {
    /// Parent event
    pub event_id: EventId,
    /// Display name
    pub name: String,
    /// Price per ticket
    pub price: Money,
    /// Currency code
    pub currency: String,
    /// Tier capacity
    pub capacity: Option<u32>,
    /// Whether the tier accepts claims
    pub is_active: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// A persisted ticket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Ticket ID
    pub id: TicketId,
    /// Globally unique, scannable code
    pub ticket_code: TicketCode,
    /// Event the ticket admits to
    pub event_id: EventId,
    /// Tier, if the event uses tiers
    pub tier_id: Option<TierId>,
    /// Attendee display name
    pub attendee_name: String,
    /// Attendee email (synthetic for phone-only claims)
    pub attendee_email: String,
    /// Normalized attendee phone
    pub attendee_phone: String,
    /// Stored payment status (see [`PaymentStatus::effective`] for the read view)
    pub payment_status: PaymentStatus,
    /// Payment path chosen at claim time
    pub payment_method: Option<PaymentMethod>,
    /// Reconciliation reference (synthesized or gateway order id)
    pub payment_ref_id: Option<String>,
    /// One-way admission flag
    pub is_validated: bool,
    /// When the ticket was validated
    pub validated_at: Option<DateTime<Utc>>,
    /// Claim time; the booking window is measured from here
    pub created_at: DateTime<Utc>,
    /// When payment was confirmed
    pub paid_at: Option<DateTime<Utc>>,
    /// When the ticket was cancelled
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Ticket {
    /// Payment status as seen by a reader at `now`, with lazy expiry applied.
    #[must_use]
    pub fn effective_status(&self, now: DateTime<Utc>) -> PaymentStatus {
        self.payment_status.effective(self.created_at, now)
    }
}

/// A ticket ready to be inserted by the store.
#[derive(Clone, Debug)]
pub struct NewTicket {
    /// Candidate code (may collide; the store reports it)
    pub ticket_code: TicketCode,
    /// Event
    pub event_id: EventId,
    /// Tier
    pub tier_id: Option<TierId>,
    /// Attendee display name
    pub attendee_name: String,
    /// Attendee email
    pub attendee_email: String,
    /// Normalized attendee phone
    pub attendee_phone: String,
    /// Initial payment status
    pub payment_status: PaymentStatus,
    /// Payment path
    pub payment_method: Option<PaymentMethod>,
    /// Synthesized payment reference
    pub payment_ref_id: Option<String>,
    /// Claim time
    pub created_at: DateTime<Utc>,
}

/// Event fields denormalized onto a ticket lookup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    /// Event ID
    pub id: EventId,
    /// Owner (authorization boundary for scans)
    pub owner_id: AccountId,
    /// Title
    pub title: String,
    /// Venue
    pub venue: Option<String>,
    /// Event date
    pub event_date: DateTime<Utc>,
    /// Currency code
    pub currency: String,
    /// Free flag
    pub is_free: bool,
}

impl From<&Event> for EventSummary {
    fn from(event: &Event) -> Self {
        Self {
            id: event.id,
            owner_id: event.owner_id,
            title: event.title.clone(),
            venue: event.venue.clone(),
            event_date: event.event_date,
            currency: event.currency.clone(),
            is_free: event.is_free,
        }
    }
}

/// Tier fields denormalized onto a ticket lookup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSummary {
    /// Tier ID
    pub id: TierId,
    /// Tier name
    pub name: String,
    /// Price
    pub price: Money,
    /// Currency code
    pub currency: String,
}

impl From<&TicketTier> for TierSummary {
    fn from(tier: &TicketTier) -> Self {
        Self {
            id: tier.id,
            name: tier.name.clone(),
            price: tier.price,
            currency: tier.currency.clone(),
        }
    }
}

/// A ticket joined with its event and tier, as read by scans and status views.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRecord {
    /// The ticket
    pub ticket: Ticket,
    /// Event snapshot
    pub event: EventSummary,
    /// Tier snapshot
    pub tier: Option<TierSummary>,
}

/// Audit of stored counters against a recount of non-cancelled tickets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterAudit {
    /// Event audited
    pub event_id: EventId,
    /// `events.tickets_issued`
    pub recorded_issued: u32,
    /// Recounted non-cancelled tickets
    pub actual_issued: u32,
    /// Per-tier comparison
    pub tiers: Vec<TierCounterAudit>,
}

impl CounterAudit {
    /// True when every stored counter matches its recount.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.recorded_issued == self.actual_issued
            && self
                .tiers
                .iter()
                .all(|tier| tier.recorded_sold == tier.actual_sold)
    }
}

/// Per-tier counter audit row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCounterAudit {
    /// Tier audited
    pub tier_id: TierId,
    /// `ticket_tiers.tickets_sold`
    pub recorded_sold: u32,
    /// Recounted non-cancelled tickets
    pub actual_sold: u32,
}

/// Append-only record backing the claim rate limiter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimAttempt {
    /// Event claimed
    pub event_id: EventId,
    /// Client network origin (IP address)
    pub origin: String,
    /// When the attempt was admitted
    pub attempted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_displays_minor_units() {
        assert_eq!(Money::from_minor(49_900).to_string(), "499.00");
        assert_eq!(Money::from_minor(5).to_string(), "0.05");
        assert_eq!(Money::from_minor(-250).to_string(), "-2.50");
    }

    #[test]
    fn remaining_capacity() {
        let event = Event {
            id: EventId::new(),
            owner_id: AccountId::new(),
            title: "Launch".to_string(),
            venue: None,
            event_date: Utc::now(),
            is_free: true,
            capacity: Some(3),
            tickets_issued: 2,
            currency: "INR".to_string(),
            created_at: Utc::now(),
        };
        assert_eq!(event.remaining(), Some(1));

        let unlimited = Event {
            capacity: None,
            ..event
        };
        assert_eq!(unlimited.remaining(), None);
    }
}
