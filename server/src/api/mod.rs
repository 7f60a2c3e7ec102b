//! HTTP API handlers and response bodies.
//!
//! # Routes (under `/api`)
//!
//! | Method | Path | Auth | Handler |
//! |--------|------|------|---------|
//! | POST | `/claims` | public, rate-limited | [`claims::claim_ticket`] |
//! | GET | `/tickets/by-code/:code` | public | [`tickets::ticket_by_code`] |
//! | POST | `/tickets/:id/confirm-payment` | owner | [`tickets::confirm_payment`] |
//! | POST | `/tickets/:id/cancel` | owner | [`tickets::cancel_ticket`] |
//! | POST | `/scans` | owner | [`scans::scan_ticket`] |
//! | POST | `/scans/confirm-payment` | owner | [`scans::confirm_and_admit`] |
//! | POST | `/events` | session | [`events::create_event`] |
//! | GET | `/events/:id` | owner | [`events::get_event`] |
//! | POST | `/events/:id/tiers` | owner | [`events::create_tier`] |
//! | POST | `/events/:id/tiers/:tier_id/active` | owner | [`events::set_tier_active`] |
//! | GET | `/events/:id/audit` | owner | [`events::audit_counters`] |
//! | POST | `/payments/orders` | session | [`payments::create_order`] |

pub mod claims;
pub mod error;
pub mod events;
pub mod extractors;
pub mod payments;
pub mod scans;
pub mod tickets;

pub use error::AppError;
pub use extractors::{Authenticated, ClientIp};

use chrono::{DateTime, Utc};
use gatepass_core::payment::{PaymentMethod, PaymentStatus};
use gatepass_core::types::{
    Event, EventId, EventSummary, Money, Ticket, TicketId, TicketRecord, TicketTier, TierId,
    TierSummary,
};
use serde::Serialize;

/// Event details embedded in a ticket.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSnapshot {
    /// Event
    pub id: EventId,
    /// Title
    pub title: String,
    /// Venue
    pub venue: Option<String>,
    /// Date
    pub event_date: DateTime<Utc>,
    /// Currency
    pub currency: String,
    /// Free event
    pub is_free: bool,
}

impl From<&EventSummary> for EventSnapshot {
    fn from(event: &EventSummary) -> Self {
        Self {
            id: event.id,
            title: event.title.clone(),
            venue: event.venue.clone(),
            event_date: event.event_date,
            currency: event.currency.clone(),
            is_free: event.is_free,
        }
    }
}

/// Tier details embedded in a ticket.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierSnapshot {
    /// Tier
    pub id: TierId,
    /// Name
    pub name: String,
    /// Price in minor units
    pub price: Money,
    /// Currency
    pub currency: String,
}

impl From<&TierSummary> for TierSnapshot {
    fn from(tier: &TierSummary) -> Self {
        Self {
            id: tier.id,
            name: tier.name.clone(),
            price: tier.price,
            currency: tier.currency.clone(),
        }
    }
}

/// Attendee-facing ticket. Contact details are never echoed back.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketResponse {
    /// Ticket
    pub id: TicketId,
    /// Code rendered in the QR image
    pub ticket_code: String,
    /// Payment status
    pub payment_status: PaymentStatus,
    /// Chosen payment path
    pub payment_method: Option<PaymentMethod>,
    /// Reconciliation reference
    pub payment_ref_id: Option<String>,
    /// Attendee display name
    pub attendee_name: String,
    /// Admitted at the door
    pub is_validated: bool,
    /// When it was admitted
    pub validated_at: Option<DateTime<Utc>>,
    /// Claim time
    pub created_at: DateTime<Utc>,
    /// Event snapshot
    pub event: EventSnapshot,
    /// Tier snapshot
    pub tier: Option<TierSnapshot>,
}

impl From<&TicketRecord> for TicketResponse {
    fn from(record: &TicketRecord) -> Self {
        let ticket = &record.ticket;
        Self {
            id: ticket.id,
            ticket_code: ticket.ticket_code.to_string(),
            payment_status: ticket.payment_status,
            payment_method: ticket.payment_method,
            payment_ref_id: ticket.payment_ref_id.clone(),
            attendee_name: ticket.attendee_name.clone(),
            is_validated: ticket.is_validated,
            validated_at: ticket.validated_at,
            created_at: ticket.created_at,
            event: EventSnapshot::from(&record.event),
            tier: record.tier.as_ref().map(TierSnapshot::from),
        }
    }
}

/// Ticket state after an organizer action.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketStatusResponse {
    /// Ticket
    pub id: TicketId,
    /// Code
    pub ticket_code: String,
    /// Payment status
    pub payment_status: PaymentStatus,
    /// When payment was confirmed
    pub paid_at: Option<DateTime<Utc>>,
    /// When the ticket was cancelled
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Admitted at the door
    pub is_validated: bool,
}

impl From<&Ticket> for TicketStatusResponse {
    fn from(ticket: &Ticket) -> Self {
        Self {
            id: ticket.id,
            ticket_code: ticket.ticket_code.to_string(),
            payment_status: ticket.payment_status,
            paid_at: ticket.paid_at,
            cancelled_at: ticket.cancelled_at,
            is_validated: ticket.is_validated,
        }
    }
}

/// Tier as seen by its organizer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierView {
    /// Tier
    pub id: TierId,
    /// Name
    pub name: String,
    /// Price in minor units
    pub price: Money,
    /// Currency
    pub currency: String,
    /// Capacity
    pub capacity: Option<u32>,
    /// Live tickets in the tier
    pub tickets_sold: u32,
    /// Open for claims
    pub is_active: bool,
}

impl From<&TicketTier> for TierView {
    fn from(tier: &TicketTier) -> Self {
        Self {
            id: tier.id,
            name: tier.name.clone(),
            price: tier.price,
            currency: tier.currency.clone(),
            capacity: tier.capacity,
            tickets_sold: tier.tickets_sold,
            is_active: tier.is_active,
        }
    }
}

/// Event as seen by its organizer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventView {
    /// Event
    pub id: EventId,
    /// Title
    pub title: String,
    /// Venue
    pub venue: Option<String>,
    /// Date
    pub event_date: DateTime<Utc>,
    /// Free event
    pub is_free: bool,
    /// Capacity
    pub capacity: Option<u32>,
    /// Live tickets
    pub tickets_issued: u32,
    /// Slots left, `None` when unlimited
    pub remaining: Option<u32>,
    /// Currency
    pub currency: String,
    /// Tiers
    pub tiers: Vec<TierView>,
}

impl EventView {
    /// Build the view from an event and its tiers.
    #[must_use]
    pub fn new(event: &Event, tiers: &[TicketTier]) -> Self {
        Self {
            id: event.id,
            title: event.title.clone(),
            venue: event.venue.clone(),
            event_date: event.event_date,
            is_free: event.is_free,
            capacity: event.capacity,
            tickets_issued: event.tickets_issued,
            remaining: event.remaining(),
            currency: event.currency.clone(),
            tiers: tiers.iter().map(TierView::from).collect(),
        }
    }
}
