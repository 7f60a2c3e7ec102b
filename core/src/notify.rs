//! Ticket confirmation messages and the sender contract.
//!
//! Delivery is best-effort and at-least-once. A sender failure never reaches
//! the claim that produced the message.

use crate::identity::is_synthetic_email;
use crate::types::{EventId, TicketRecord, TicketId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur while delivering a notification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotificationError {
    /// Transient delivery failure (network, 5xx, timeout).
    #[error("delivery failed: {0}")]
    Transport(String),

    /// The provider refused the message; retrying will not help.
    #[error("delivery rejected: {0}")]
    Rejected(String),
}

impl NotificationError {
    /// Whether the dispatcher should try again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Confirmation sent to an attendee after issuance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketNotification {
    /// Ticket
    pub ticket_id: TicketId,
    /// Code rendered in the QR image
    pub ticket_code: String,
    /// Event
    pub event_id: EventId,
    /// Attendee display name
    pub attendee_name: String,
    /// Real email, `None` for phone-first claims
    pub attendee_email: Option<String>,
    /// Normalized phone
    pub attendee_phone: String,
    /// Event title
    pub event_title: String,
    /// Event date
    pub event_date: DateTime<Utc>,
    /// Venue
    pub venue: Option<String>,
    /// Public page that renders the ticket
    pub ticket_url: String,
}

impl TicketNotification {
    /// Builds the confirmation for a freshly issued ticket.
    ///
    /// `base_url` is the public origin; the ticket page is `/t/<code>` under it.
    #[must_use]
    pub fn for_record(record: &TicketRecord, base_url: &str) -> Self {
        let ticket = &record.ticket;
        let email = (!is_synthetic_email(&ticket.attendee_email))
            .then(|| ticket.attendee_email.clone());
        Self {
            ticket_id: ticket.id,
            ticket_code: ticket.ticket_code.to_string(),
            event_id: ticket.event_id,
            attendee_name: ticket.attendee_name.clone(),
            attendee_email: email,
            attendee_phone: ticket.attendee_phone.clone(),
            event_title: record.event.title.clone(),
            event_date: record.event.event_date,
            venue: record.event.venue.clone(),
            ticket_url: format!("{}/t/{}", base_url.trim_end_matches('/'), ticket.ticket_code),
        }
    }
}

/// Delivers confirmations (email, SMS, webhook, ...).
pub trait NotificationSender: Send + Sync {
    /// Deliver one message.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationError`] when delivery fails.
    fn send<'a>(
        &'a self,
        notification: &'a TicketNotification,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotificationError>> + Send + 'a>>;
}
