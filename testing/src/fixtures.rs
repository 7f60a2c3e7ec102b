//! Fixture builders and scripted collaborators.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use crate::mocks::test_epoch;
use chrono::{DateTime, Duration, Utc};
use gatepass_core::claim::ClaimRequest;
use gatepass_core::identity::AttendeePhone;
use gatepass_core::notify::{NotificationError, NotificationSender, TicketNotification};
use gatepass_core::payment::PaymentStatus;
use gatepass_core::ticket_code::{CodeSource, RandomCodes, TicketCode};
use gatepass_core::types::{AccountId, EventId, Money, NewEvent, NewTicket, NewTier, TierId};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// A free event a week after [`test_epoch`].
#[must_use]
pub fn free_event(owner_id: AccountId, capacity: Option<u32>) -> NewEvent {
    NewEvent {
        owner_id,
        title: "Community Meetup".to_string(),
        venue: Some("Hall A".to_string()),
        event_date: test_epoch() + Duration::days(7),
        is_free: true,
        capacity,
        currency: "INR".to_string(),
        created_at: test_epoch(),
    }
}

/// A paid event a week after [`test_epoch`].
#[must_use]
pub fn paid_event(owner_id: AccountId, capacity: Option<u32>) -> NewEvent {
    NewEvent {
        title: "Rooftop Jazz Night".to_string(),
        is_free: false,
        ..free_event(owner_id, capacity)
    }
}

/// An active tier.
#[must_use]
pub fn tier(event_id: EventId, price: Money, capacity: Option<u32>) -> NewTier {
    NewTier {
        event_id,
        name: "General".to_string(),
        price,
        currency: "INR".to_string(),
        capacity,
        is_active: true,
        created_at: test_epoch(),
    }
}

/// A ticket ready for `TicketStore::issue_ticket`, status `paid`.
///
/// `phone` is normalized the way the claim path stores it.
#[must_use]
pub fn new_ticket(
    event_id: EventId,
    tier_id: Option<TierId>,
    ticket_code: TicketCode,
    phone: &str,
    created_at: DateTime<Utc>,
) -> NewTicket {
    let phone = AttendeePhone::parse(phone).unwrap();
    NewTicket {
        ticket_code,
        event_id,
        tier_id,
        attendee_name: "Test Attendee".to_string(),
        attendee_email: phone.synthetic_email(),
        attendee_phone: phone.as_str().to_string(),
        payment_status: PaymentStatus::Paid,
        payment_method: None,
        payment_ref_id: None,
        created_at,
    }
}

/// A phone-first claim body.
#[must_use]
pub fn claim_request(event_id: EventId, phone: &str) -> ClaimRequest {
    ClaimRequest {
        event_id: Some(event_id.to_string()),
        name: Some("Test Attendee".to_string()),
        phone: Some(phone.to_string()),
        ..ClaimRequest::default()
    }
}

/// The `n`th distinct phone number of a test run.
#[must_use]
pub fn phone(n: u32) -> String {
    format!("+91{:010}", 9_000_000_000_u64 + u64::from(n))
}

/// Code source that replays a script, then falls back to random codes.
///
/// Used to force uniqueness violations at insert time.
#[derive(Clone, Debug, Default)]
pub struct ScriptedCodes {
    script: Arc<Mutex<VecDeque<TicketCode>>>,
    drawn: Arc<AtomicU32>,
}

impl ScriptedCodes {
    /// Replays `codes` in order.
    #[must_use]
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let script = codes
            .into_iter()
            .map(|code| TicketCode::parse(code.as_ref()).unwrap())
            .collect();
        Self {
            script: Arc::new(Mutex::new(script)),
            drawn: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Replays the same code forever.
    #[must_use]
    pub fn always(code: &str) -> Self {
        Self::new(std::iter::repeat_n(code, 64))
    }

    /// How many codes have been handed out.
    #[must_use]
    pub fn drawn(&self) -> u32 {
        self.drawn.load(Ordering::SeqCst)
    }
}

impl CodeSource for ScriptedCodes {
    fn next_code(&self) -> TicketCode {
        self.drawn.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| RandomCodes.next_code())
    }
}

/// Notification sender that records deliveries and can fail on demand.
#[derive(Clone, Debug, Default)]
pub struct RecordingNotifier {
    delivered: Arc<Mutex<Vec<TicketNotification>>>,
    attempts: Arc<AtomicU32>,
    failures_left: Arc<AtomicU32>,
    reject: bool,
}

impl RecordingNotifier {
    /// Always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the first `n` attempts with a transport error.
    #[must_use]
    pub fn failing_first(n: u32) -> Self {
        Self {
            failures_left: Arc::new(AtomicU32::new(n)),
            ..Self::default()
        }
    }

    /// Always fails with a transport error.
    #[must_use]
    pub fn always_failing() -> Self {
        Self::failing_first(u32::MAX)
    }

    /// Always rejects; rejections are not retried.
    #[must_use]
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    /// Successfully delivered messages.
    #[must_use]
    pub fn delivered(&self) -> Vec<TicketNotification> {
        self.delivered.lock().unwrap().clone()
    }

    /// Delivery attempts, successful or not.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl NotificationSender for RecordingNotifier {
    fn send<'a>(
        &'a self,
        notification: &'a TicketNotification,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotificationError>> + Send + 'a>> {
        Box::pin(async move {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.reject {
                return Err(NotificationError::Rejected("recipient refused".to_string()));
            }
            let failing = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok();
            if failing {
                return Err(NotificationError::Transport("simulated outage".to_string()));
            }
            self.delivered.lock().unwrap().push(notification.clone());
            Ok(())
        })
    }
}
