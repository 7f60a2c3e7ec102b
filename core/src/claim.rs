//! Public claim request and its validation.
//!
//! The wire body is deliberately loose (every field optional, strings only) so
//! that a missing field is reported as `missing_fields` for that field instead
//! of an opaque deserialization failure. [`ClaimRequest::validate`] is the only
//! way to obtain a [`ValidatedClaim`], and the issuer only accepts the latter.

use crate::error::ValidationFailed;
use crate::identity::{AttendeeEmail, AttendeeName, AttendeePhone};
use crate::payment::PaymentMethod;
use crate::types::{EventId, TierId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Raw claim body as posted by the attendee.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    /// Event to claim for
    pub event_id: Option<String>,
    /// Attendee display name
    pub name: Option<String>,
    /// Attendee phone (identity key)
    pub phone: Option<String>,
    /// Present on the form-first flow
    pub email: Option<String>,
    /// Tier, for tiered events
    pub tier_id: Option<String>,
    /// `upi` or `cash`; omitted for free events and plain online claims
    pub payment_method: Option<String>,
}

/// How the attendee reached the claim endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClaimChannel {
    /// Name and phone only; email is synthesized
    PhoneFirst,
    /// Full form including a real email
    FormFirst {
        /// Attendee email
        email: AttendeeEmail,
    },
}

/// A claim whose every field is well-typed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedClaim {
    /// Event
    pub event_id: EventId,
    /// Tier
    pub tier_id: Option<TierId>,
    /// Attendee name
    pub name: AttendeeName,
    /// Attendee phone
    pub phone: AttendeePhone,
    /// Claim channel
    pub channel: ClaimChannel,
    /// Chosen payment path
    pub payment_method: Option<PaymentMethod>,
}

impl ValidatedClaim {
    /// Email to store on the ticket.
    #[must_use]
    pub fn attendee_email(&self) -> String {
        match &self.channel {
            ClaimChannel::PhoneFirst => self.phone.synthetic_email(),
            ClaimChannel::FormFirst { email } => email.as_str().to_string(),
        }
    }
}

fn present(value: Option<&String>) -> Option<&str> {
    value.map(|value| value.trim()).filter(|value| !value.is_empty())
}

fn parse_uuid(field: &'static str, value: &str) -> Result<Uuid, ValidationFailed> {
    Uuid::parse_str(value).map_err(|_| ValidationFailed::invalid(field, "must be a UUID"))
}

impl ClaimRequest {
    /// Validates every field, reporting the first failure.
    ///
    /// Fields are checked in the order `eventId`, `name`, `phone`, `email`,
    /// `tierId`, `paymentMethod`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationFailed`] naming the offending field.
    pub fn validate(&self) -> Result<ValidatedClaim, ValidationFailed> {
        let event_id = present(self.event_id.as_ref())
            .ok_or_else(|| ValidationFailed::missing("eventId"))
            .and_then(|raw| parse_uuid("eventId", raw))
            .map(EventId::from_uuid)?;

        let name = AttendeeName::parse(self.name.as_deref().unwrap_or_default())?;
        let phone = AttendeePhone::parse(self.phone.as_deref().unwrap_or_default())?;

        let channel = match present(self.email.as_ref()) {
            Some(raw) => ClaimChannel::FormFirst {
                email: AttendeeEmail::parse(raw)?,
            },
            None => ClaimChannel::PhoneFirst,
        };

        let tier_id = present(self.tier_id.as_ref())
            .map(|raw| parse_uuid("tierId", raw).map(TierId::from_uuid))
            .transpose()?;

        let payment_method = present(self.payment_method.as_ref())
            .map(|raw| {
                PaymentMethod::parse(raw).ok_or_else(|| {
                    ValidationFailed::invalid("paymentMethod", "must be 'upi' or 'cash'")
                })
            })
            .transpose()?;

        Ok(ValidatedClaim {
            event_id,
            tier_id,
            name,
            phone,
            channel,
            payment_method,
        })
    }
}
