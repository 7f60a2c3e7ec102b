//! Organizer operations: events, tiers and the counter audit.

use chrono::{DateTime, Utc};
use gatepass_core::environment::Clock;
use gatepass_core::error::{StoreError, ValidationFailed};
use gatepass_core::store::TicketStore;
use gatepass_core::types::{
    AccountId, CounterAudit, Event, EventId, Money, NewEvent, NewTier, TicketTier, TierId,
};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

const MAX_TITLE_LEN: usize = 200;
const MAX_TIER_NAME_LEN: usize = 80;

/// Failure of an organizer operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdminError {
    /// Malformed input.
    #[error(transparent)]
    Validation(#[from] ValidationFailed),

    /// No such event.
    #[error("event not found")]
    EventNotFound,

    /// No such tier on this event.
    #[error("tier not found")]
    TierNotFound,

    /// The caller does not own the event.
    #[error("not authorized for this event")]
    Unauthorized,

    /// Upstream storage fault.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl AdminError {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(failed) => failed.code(),
            Self::EventNotFound => "event_not_found",
            Self::TierNotFound => "tier_not_found",
            Self::Unauthorized => "unauthorized",
            Self::Storage(_) => "server_error",
        }
    }

    /// Whether the same request may succeed later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

/// Event creation body.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEvent {
    /// Title shown to attendees
    pub title: String,
    /// Venue
    pub venue: Option<String>,
    /// When the event happens
    pub event_date: DateTime<Utc>,
    /// Free events issue tickets as paid
    #[serde(default)]
    pub is_free: bool,
    /// Maximum live tickets; `None` for unlimited
    pub capacity: Option<u32>,
    /// ISO 4217 code, defaults to INR
    pub currency: Option<String>,
}

/// Tier creation body.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTier {
    /// Tier name
    pub name: String,
    /// Price in minor units
    pub price: i64,
    /// Maximum live tickets in this tier
    pub capacity: Option<u32>,
    /// Whether claims may select the tier; defaults to true
    pub is_active: Option<bool>,
}

/// Organizer operations on owned events.
#[derive(Clone)]
pub struct EventAdmin {
    store: Arc<dyn TicketStore>,
    clock: Arc<dyn Clock>,
}

impl EventAdmin {
    /// Create the service.
    #[must_use]
    pub fn new(store: Arc<dyn TicketStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Create an event owned by `owner`.
    ///
    /// # Errors
    ///
    /// [`AdminError::Validation`] for bad input, [`AdminError::Storage`] on store failure.
    pub async fn create_event(
        &self,
        owner: AccountId,
        body: CreateEvent,
    ) -> Result<Event, AdminError> {
        let title = body.title.trim();
        if title.is_empty() {
            return Err(ValidationFailed::missing("title").into());
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(ValidationFailed::invalid("title", "is too long").into());
        }
        if body.capacity == Some(0) {
            return Err(ValidationFailed::invalid("capacity", "must be at least 1").into());
        }
        let currency = currency(body.currency.as_deref())?;

        let event = self
            .store
            .create_event(NewEvent {
                owner_id: owner,
                title: title.to_string(),
                venue: body
                    .venue
                    .map(|venue| venue.trim().to_string())
                    .filter(|venue| !venue.is_empty()),
                event_date: body.event_date,
                is_free: body.is_free,
                capacity: body.capacity,
                currency,
                created_at: self.clock.now(),
            })
            .await?;
        info!(event_id = %event.id, %owner, is_free = event.is_free, "Event created");
        Ok(event)
    }

    /// Fetch an owned event with its tiers.
    ///
    /// # Errors
    ///
    /// [`AdminError::EventNotFound`], [`AdminError::Unauthorized`], [`AdminError::Storage`].
    pub async fn event(
        &self,
        owner: AccountId,
        event_id: EventId,
    ) -> Result<(Event, Vec<TicketTier>), AdminError> {
        let event = self.owned_event(owner, event_id).await?;
        let tiers = self.store.list_tiers(event_id).await?;
        Ok((event, tiers))
    }

    /// Add a tier to an owned event. The tier is priced in the event's currency.
    ///
    /// # Errors
    ///
    /// [`AdminError::Validation`] for bad input, plus the ownership errors of [`Self::event`].
    pub async fn create_tier(
        &self,
        owner: AccountId,
        event_id: EventId,
        body: CreateTier,
    ) -> Result<TicketTier, AdminError> {
        let event = self.owned_event(owner, event_id).await?;
        let name = body.name.trim();
        if name.is_empty() {
            return Err(ValidationFailed::missing("name").into());
        }
        if name.chars().count() > MAX_TIER_NAME_LEN {
            return Err(ValidationFailed::invalid("name", "is too long").into());
        }
        if body.price < 0 {
            return Err(ValidationFailed::invalid("price", "must not be negative").into());
        }
        if event.is_free && body.price != 0 {
            return Err(ValidationFailed::invalid("price", "must be 0 for a free event").into());
        }
        if body.capacity == Some(0) {
            return Err(ValidationFailed::invalid("capacity", "must be at least 1").into());
        }

        let tier = self
            .store
            .create_tier(NewTier {
                event_id,
                name: name.to_string(),
                price: Money::from_minor(body.price),
                currency: event.currency,
                capacity: body.capacity,
                is_active: body.is_active.unwrap_or(true),
                created_at: self.clock.now(),
            })
            .await?;
        info!(%event_id, tier_id = %tier.id, "Tier created");
        Ok(tier)
    }

    /// Open or close a tier for new claims. Existing tickets are unaffected.
    ///
    /// # Errors
    ///
    /// [`AdminError::TierNotFound`] if the tier is not on this event, plus the
    /// ownership errors of [`Self::event`].
    pub async fn set_tier_active(
        &self,
        owner: AccountId,
        event_id: EventId,
        tier_id: TierId,
        is_active: bool,
    ) -> Result<TicketTier, AdminError> {
        self.owned_event(owner, event_id).await?;
        let belongs = self
            .store
            .get_tier(tier_id)
            .await?
            .is_some_and(|tier| tier.event_id == event_id);
        if !belongs {
            return Err(AdminError::TierNotFound);
        }
        let tier = self
            .store
            .set_tier_active(tier_id, is_active)
            .await?
            .ok_or(AdminError::TierNotFound)?;
        info!(%event_id, %tier_id, is_active, "Tier availability changed");
        Ok(tier)
    }

    /// Recount live tickets against the stored counters.
    ///
    /// Read-only; drift is logged, never repaired here.
    ///
    /// # Errors
    ///
    /// The ownership errors of [`Self::event`].
    pub async fn audit(
        &self,
        owner: AccountId,
        event_id: EventId,
    ) -> Result<CounterAudit, AdminError> {
        self.owned_event(owner, event_id).await?;
        let audit = self
            .store
            .audit_counters(event_id)
            .await?
            .ok_or(AdminError::EventNotFound)?;
        if !audit.is_consistent() {
            warn!(
                %event_id,
                recorded_issued = audit.recorded_issued,
                actual_issued = audit.actual_issued,
                "Ticket counters have drifted"
            );
        }
        Ok(audit)
    }

    async fn owned_event(&self, owner: AccountId, event_id: EventId) -> Result<Event, AdminError> {
        let event = self
            .store
            .get_event(event_id)
            .await?
            .ok_or(AdminError::EventNotFound)?;
        if event.owner_id == owner {
            Ok(event)
        } else {
            warn!(%event_id, %owner, "Organizer action on an event owned by another account");
            Err(AdminError::Unauthorized)
        }
    }
}

fn currency(raw: Option<&str>) -> Result<String, ValidationFailed> {
    match raw.map(str::trim).filter(|raw| !raw.is_empty()) {
        None => Ok("INR".to_string()),
        Some(code) if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) => {
            Ok(code.to_ascii_uppercase())
        }
        Some(_) => Err(ValidationFailed::invalid("currency", "must be a 3-letter ISO code")),
    }
}

impl std::fmt::Debug for EventAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventAdmin").finish_non_exhaustive()
    }
}
