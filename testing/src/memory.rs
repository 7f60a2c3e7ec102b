//! In-memory store implementations.
//!
//! Every trait method takes the state lock once, does all of its reads and
//! writes, and releases it before returning. That makes each call atomic in
//! the same sense as a database transaction, and the lock is never held
//! across an `.await`.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Poisoned locks only follow a panicking test

use chrono::{DateTime, Utc};
use gatepass_core::eligibility::{EligibilitySnapshot, TierCounters};
use gatepass_core::error::{StoreError, StoreResult};
use gatepass_core::identity::AttendeePhone;
use gatepass_core::payment::{self, PaymentStatus};
use gatepass_core::store::{
    ClaimLog, IssueOutcome, RateDecision, SessionResolver, StoreFuture, TicketStore, WriteOutcome,
    retry_after,
};
use gatepass_core::ticket_code::TicketCode;
use gatepass_core::types::{
    AccountId, ClaimAttempt, CounterAudit, Event, EventId, EventSummary, NewEvent, NewTicket,
    NewTier, Ticket, TicketId, TicketRecord, TicketTier, TierCounterAudit, TierId, TierSummary,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct State {
    events: HashMap<EventId, Event>,
    tiers: HashMap<TierId, TicketTier>,
    tickets: HashMap<TicketId, Ticket>,
    codes: HashMap<TicketCode, TicketId>,
}

impl State {
    fn record(&self, ticket: &Ticket) -> StoreResult<TicketRecord> {
        let event = self
            .events
            .get(&ticket.event_id)
            .ok_or_else(|| StoreError::Corrupt(format!("ticket {} has no event", ticket.id)))?;
        let tier = ticket
            .tier_id
            .and_then(|tier_id| self.tiers.get(&tier_id))
            .map(TierSummary::from);
        Ok(TicketRecord {
            ticket: ticket.clone(),
            event: EventSummary::from(event),
            tier,
        })
    }

    fn snapshot(
        &self,
        event: &Event,
        tier_id: Option<TierId>,
        phone: &str,
    ) -> StoreResult<EligibilitySnapshot> {
        let tier = match tier_id {
            Some(tier_id) => {
                let tier = self
                    .tiers
                    .get(&tier_id)
                    .filter(|tier| tier.event_id == event.id)
                    .ok_or_else(|| StoreError::NotFound {
                        entity: "tier",
                        id: tier_id.to_string(),
                    })?;
                Some(TierCounters {
                    capacity: tier.capacity,
                    sold: tier.tickets_sold,
                    is_active: tier.is_active,
                })
            }
            None => None,
        };
        let duplicate = self.tickets.values().any(|ticket| {
            ticket.event_id == event.id
                && ticket.attendee_phone == phone
                && ticket.payment_status.holds_slot()
        });
        Ok(EligibilitySnapshot {
            event_capacity: event.capacity,
            event_issued: event.tickets_issued,
            tier,
            duplicate,
        })
    }

    /// Applies `change` when `guard` holds for the current ticket.
    fn guarded_update(
        &mut self,
        id: TicketId,
        guard: impl FnOnce(&Ticket) -> bool,
        change: impl FnOnce(&mut Ticket),
    ) -> WriteOutcome {
        let Some(ticket) = self.tickets.get_mut(&id) else {
            return WriteOutcome::Missing;
        };
        if guard(ticket) {
            change(ticket);
            WriteOutcome::Applied(ticket.clone())
        } else {
            WriteOutcome::Unchanged(ticket.clone())
        }
    }
}

/// In-memory [`TicketStore`] for fast, deterministic tests.
///
/// Clones share state.
#[derive(Clone, Debug, Default)]
pub struct InMemoryTicketStore {
    state: Arc<Mutex<State>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryTicketStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `StoreError::Database`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Database("store unavailable".to_string()))
        } else {
            Ok(())
        }
    }

    /// Rewrite a ticket's claim time, e.g. to age it past the booking window.
    pub fn backdate_ticket(&self, id: TicketId, created_at: DateTime<Utc>) {
        if let Some(ticket) = self.state.lock().unwrap().tickets.get_mut(&id) {
            ticket.created_at = created_at;
        }
    }

    /// Every ticket of an event, in no particular order.
    #[must_use]
    pub fn tickets_for(&self, event_id: EventId) -> Vec<Ticket> {
        self.state
            .lock()
            .unwrap()
            .tickets
            .values()
            .filter(|ticket| ticket.event_id == event_id)
            .cloned()
            .collect()
    }

    /// Number of non-cancelled tickets of an event.
    #[must_use]
    pub fn live_ticket_count(&self, event_id: EventId) -> usize {
        self.tickets_for(event_id)
            .iter()
            .filter(|ticket| ticket.payment_status.holds_slot())
            .count()
    }

    /// Directly overwrite the stored counters, for drift tests.
    pub fn force_counters(&self, event_id: EventId, tickets_issued: u32) {
        if let Some(event) = self.state.lock().unwrap().events.get_mut(&event_id) {
            event.tickets_issued = tickets_issued;
        }
    }
}

impl TicketStore for InMemoryTicketStore {
    fn create_event(&self, new: NewEvent) -> StoreFuture<'_, Event> {
        Box::pin(async move {
            self.check_available()?;
            let event = Event {
                id: EventId::new(),
                owner_id: new.owner_id,
                title: new.title,
                venue: new.venue,
                event_date: new.event_date,
                is_free: new.is_free,
                capacity: new.capacity,
                tickets_issued: 0,
                currency: new.currency,
                created_at: new.created_at,
            };
            self.state
                .lock()
                .unwrap()
                .events
                .insert(event.id, event.clone());
            Ok(event)
        })
    }

    fn get_event(&self, id: EventId) -> StoreFuture<'_, Option<Event>> {
        Box::pin(async move {
            self.check_available()?;
            Ok(self.state.lock().unwrap().events.get(&id).cloned())
        })
    }

    fn create_tier(&self, new: NewTier) -> StoreFuture<'_, TicketTier> {
        Box::pin(async move {
            self.check_available()?;
            let mut state = self.state.lock().unwrap();
            if !state.events.contains_key(&new.event_id) {
                return Err(StoreError::NotFound {
                    entity: "event",
                    id: new.event_id.to_string(),
                });
            }
            let tier = TicketTier {
                id: TierId::new(),
                event_id: new.event_id,
                name: new.name,
                price: new.price,
                currency: new.currency,
                capacity: new.capacity,
                tickets_sold: 0,
                is_active: new.is_active,
                created_at: new.created_at,
            };
            state.tiers.insert(tier.id, tier.clone());
            Ok(tier)
        })
    }

    fn get_tier(&self, id: TierId) -> StoreFuture<'_, Option<TicketTier>> {
        Box::pin(async move {
            self.check_available()?;
            Ok(self.state.lock().unwrap().tiers.get(&id).cloned())
        })
    }

    fn list_tiers(&self, event_id: EventId) -> StoreFuture<'_, Vec<TicketTier>> {
        Box::pin(async move {
            self.check_available()?;
            let mut tiers: Vec<TicketTier> = self
                .state
                .lock()
                .unwrap()
                .tiers
                .values()
                .filter(|tier| tier.event_id == event_id)
                .cloned()
                .collect();
            tiers.sort_by_key(|tier| tier.created_at);
            Ok(tiers)
        })
    }

    fn set_tier_active(
        &self,
        id: TierId,
        is_active: bool,
    ) -> StoreFuture<'_, Option<TicketTier>> {
        Box::pin(async move {
            self.check_available()?;
            let mut state = self.state.lock().unwrap();
            Ok(state.tiers.get_mut(&id).map(|tier| {
                tier.is_active = is_active;
                tier.clone()
            }))
        })
    }

    fn eligibility_snapshot<'a>(
        &'a self,
        event_id: EventId,
        tier_id: Option<TierId>,
        phone: &'a AttendeePhone,
    ) -> StoreFuture<'a, EligibilitySnapshot> {
        Box::pin(async move {
            self.check_available()?;
            let state = self.state.lock().unwrap();
            let event = state.events.get(&event_id).ok_or_else(|| StoreError::NotFound {
                entity: "event",
                id: event_id.to_string(),
            })?;
            state.snapshot(event, tier_id, phone.as_str())
        })
    }

    fn issue_ticket(&self, new: NewTicket) -> StoreFuture<'_, IssueOutcome> {
        Box::pin(async move {
            self.check_available()?;
            let mut state = self.state.lock().unwrap();
            let event = state
                .events
                .get(&new.event_id)
                .ok_or_else(|| StoreError::NotFound {
                    entity: "event",
                    id: new.event_id.to_string(),
                })?;

            let verdict = state
                .snapshot(event, new.tier_id, &new.attendee_phone)?
                .evaluate();
            if !verdict.is_eligible() {
                return Ok(IssueOutcome::Rejected(verdict));
            }
            if state.codes.contains_key(&new.ticket_code) {
                return Err(StoreError::CodeCollision);
            }

            let ticket = Ticket {
                id: TicketId::new(),
                ticket_code: new.ticket_code,
                event_id: new.event_id,
                tier_id: new.tier_id,
                attendee_name: new.attendee_name,
                attendee_email: new.attendee_email,
                attendee_phone: new.attendee_phone,
                payment_status: new.payment_status,
                payment_method: new.payment_method,
                payment_ref_id: new.payment_ref_id,
                is_validated: false,
                validated_at: None,
                created_at: new.created_at,
                paid_at: (new.payment_status == PaymentStatus::Paid).then_some(new.created_at),
                cancelled_at: None,
            };

            if let Some(event) = state.events.get_mut(&ticket.event_id) {
                event.tickets_issued += 1;
            }
            if let Some(tier) = ticket.tier_id.and_then(|id| state.tiers.get_mut(&id)) {
                tier.tickets_sold += 1;
            }
            state.codes.insert(ticket.ticket_code.clone(), ticket.id);
            state.tickets.insert(ticket.id, ticket.clone());
            Ok(IssueOutcome::Issued(ticket))
        })
    }

    fn find_by_code<'a>(&'a self, code: &'a TicketCode) -> StoreFuture<'a, Option<TicketRecord>> {
        Box::pin(async move {
            self.check_available()?;
            let state = self.state.lock().unwrap();
            state
                .codes
                .get(code)
                .and_then(|id| state.tickets.get(id))
                .map(|ticket| state.record(ticket))
                .transpose()
        })
    }

    fn find_by_id(&self, id: TicketId) -> StoreFuture<'_, Option<TicketRecord>> {
        Box::pin(async move {
            self.check_available()?;
            let state = self.state.lock().unwrap();
            state
                .tickets
                .get(&id)
                .map(|ticket| state.record(ticket))
                .transpose()
        })
    }

    fn mark_validated(&self, id: TicketId, now: DateTime<Utc>) -> StoreFuture<'_, WriteOutcome> {
        Box::pin(async move {
            self.check_available()?;
            Ok(self.state.lock().unwrap().guarded_update(
                id,
                |ticket| !ticket.is_validated && ticket.payment_status == PaymentStatus::Paid,
                |ticket| {
                    ticket.is_validated = true;
                    ticket.validated_at = Some(now);
                },
            ))
        })
    }

    fn confirm_and_validate(
        &self,
        id: TicketId,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, WriteOutcome> {
        Box::pin(async move {
            self.check_available()?;
            Ok(self.state.lock().unwrap().guarded_update(
                id,
                |ticket| {
                    !ticket.is_validated
                        && matches!(
                            ticket.effective_status(now),
                            PaymentStatus::Paid | PaymentStatus::Pending | PaymentStatus::PayAtVenue
                        )
                },
                |ticket| {
                    ticket.payment_status = PaymentStatus::Paid;
                    ticket.paid_at = ticket.paid_at.or(Some(now));
                    ticket.is_validated = true;
                    ticket.validated_at = Some(now);
                },
            ))
        })
    }

    fn confirm_payment(&self, id: TicketId, now: DateTime<Utc>) -> StoreFuture<'_, WriteOutcome> {
        Box::pin(async move {
            self.check_available()?;
            Ok(self.state.lock().unwrap().guarded_update(
                id,
                |ticket| ticket.effective_status(now).is_unpaid(),
                |ticket| {
                    ticket.payment_status = PaymentStatus::Paid;
                    ticket.paid_at = Some(now);
                },
            ))
        })
    }

    fn cancel_ticket(&self, id: TicketId, now: DateTime<Utc>) -> StoreFuture<'_, WriteOutcome> {
        Box::pin(async move {
            self.check_available()?;
            let mut state = self.state.lock().unwrap();
            let outcome = state.guarded_update(
                id,
                |ticket| {
                    matches!(
                        ticket.payment_status,
                        PaymentStatus::Pending | PaymentStatus::PayAtVenue | PaymentStatus::Expired
                    )
                },
                |ticket| {
                    ticket.payment_status = PaymentStatus::Cancelled;
                    ticket.cancelled_at = Some(now);
                },
            );
            if let WriteOutcome::Applied(ticket) = &outcome {
                if let Some(event) = state.events.get_mut(&ticket.event_id) {
                    event.tickets_issued = event.tickets_issued.saturating_sub(1);
                }
                if let Some(tier) = ticket.tier_id.and_then(|id| state.tiers.get_mut(&id)) {
                    tier.tickets_sold = tier.tickets_sold.saturating_sub(1);
                }
            }
            Ok(outcome)
        })
    }

    fn expire_ticket(&self, id: TicketId, now: DateTime<Utc>) -> StoreFuture<'_, WriteOutcome> {
        Box::pin(async move {
            self.check_available()?;
            Ok(self.state.lock().unwrap().guarded_update(
                id,
                |ticket| {
                    ticket.payment_status.is_unpaid()
                        && payment::is_past_window(ticket.created_at, now)
                },
                |ticket| ticket.payment_status = PaymentStatus::Expired,
            ))
        })
    }

    fn expire_stale(&self, now: DateTime<Utc>, limit: u32) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            self.check_available()?;
            let mut state = self.state.lock().unwrap();
            let mut stale: Vec<&mut Ticket> = state
                .tickets
                .values_mut()
                .filter(|ticket| {
                    ticket.payment_status.is_unpaid()
                        && payment::is_past_window(ticket.created_at, now)
                })
                .collect();
            stale.sort_by_key(|ticket| ticket.created_at);
            let mut expired = 0;
            for ticket in stale.into_iter().take(limit as usize) {
                ticket.payment_status = PaymentStatus::Expired;
                expired += 1;
            }
            Ok(expired)
        })
    }

    fn record_payment_reference(
        &self,
        id: TicketId,
        reference: String,
    ) -> StoreFuture<'_, WriteOutcome> {
        Box::pin(async move {
            self.check_available()?;
            Ok(self.state.lock().unwrap().guarded_update(
                id,
                |ticket| ticket.payment_status == PaymentStatus::Pending,
                |ticket| ticket.payment_ref_id = Some(reference),
            ))
        })
    }

    fn audit_counters(&self, event_id: EventId) -> StoreFuture<'_, Option<CounterAudit>> {
        Box::pin(async move {
            self.check_available()?;
            let state = self.state.lock().unwrap();
            let Some(event) = state.events.get(&event_id) else {
                return Ok(None);
            };
            let live: Vec<&Ticket> = state
                .tickets
                .values()
                .filter(|ticket| ticket.event_id == event_id && ticket.payment_status.holds_slot())
                .collect();
            let mut tiers: Vec<TierCounterAudit> = state
                .tiers
                .values()
                .filter(|tier| tier.event_id == event_id)
                .map(|tier| TierCounterAudit {
                    tier_id: tier.id,
                    recorded_sold: tier.tickets_sold,
                    actual_sold: count(live.iter().filter(|t| t.tier_id == Some(tier.id)).count()),
                })
                .collect();
            tiers.sort_by_key(|tier| *tier.tier_id.as_uuid());
            Ok(Some(CounterAudit {
                event_id,
                recorded_issued: event.tickets_issued,
                actual_issued: count(live.len()),
                tiers,
            }))
        })
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move { self.check_available() })
    }
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// In-memory [`ClaimLog`].
#[derive(Clone, Debug, Default)]
pub struct InMemoryClaimLog {
    attempts: Arc<Mutex<Vec<ClaimAttempt>>>,
}

impl InMemoryClaimLog {
    /// Create an empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded attempts
    #[must_use]
    pub fn len(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    /// True when nothing has been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ClaimLog for InMemoryClaimLog {
    fn admit<'a>(
        &'a self,
        event_id: EventId,
        origin: &'a str,
        now: DateTime<Utc>,
        window: Duration,
    ) -> StoreFuture<'a, RateDecision> {
        Box::pin(async move {
            let mut attempts = self.attempts.lock().unwrap();
            let window_start = now - chrono::Duration::from_std(window).unwrap_or_default();
            let latest = attempts
                .iter()
                .filter(|attempt| attempt.event_id == event_id && attempt.origin == origin)
                .map(|attempt| attempt.attempted_at)
                .filter(|at| *at >= window_start)
                .max();
            if let Some(last) = latest {
                return Ok(RateDecision::Denied {
                    retry_after: retry_after(last, now, window),
                });
            }
            attempts.push(ClaimAttempt {
                event_id,
                origin: origin.to_string(),
                attempted_at: now,
            });
            Ok(RateDecision::Allowed)
        })
    }

    fn prune(&self, before: DateTime<Utc>) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let mut attempts = self.attempts.lock().unwrap();
            let len = attempts.len();
            attempts.retain(|attempt| attempt.attempted_at >= before);
            Ok((len - attempts.len()) as u64)
        })
    }
}

/// Fixed token → account table.
#[derive(Clone, Debug, Default)]
pub struct StaticSessions {
    tokens: HashMap<String, AccountId>,
}

impl StaticSessions {
    /// Empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `token` for `account`
    #[must_use]
    pub fn with(mut self, token: impl Into<String>, account: AccountId) -> Self {
        self.tokens.insert(token.into(), account);
        self
    }
}

impl SessionResolver for StaticSessions {
    fn resolve<'a>(
        &'a self,
        token: &'a str,
        _now: DateTime<Utc>,
    ) -> StoreFuture<'a, Option<AccountId>> {
        Box::pin(async move { Ok(self.tokens.get(token).copied()) })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::mocks::test_epoch;
    use gatepass_core::eligibility::Eligibility;
    use gatepass_core::types::Money;

    fn new_ticket(event_id: EventId, code: &str, phone: &str) -> NewTicket {
        fixtures::new_ticket(event_id, None, TicketCode::parse(code).unwrap(), phone, test_epoch())
    }

    #[tokio::test]
    async fn issue_enforces_capacity_and_duplicates() {
        let store = InMemoryTicketStore::new();
        let event = store
            .create_event(fixtures::free_event(AccountId::new(), Some(1)))
            .await
            .unwrap();

        let first = store
            .issue_ticket(new_ticket(event.id, "AAAAAAAA-00000001", "9000000001"))
            .await
            .unwrap();
        assert!(matches!(first, IssueOutcome::Issued(_)));

        let second = store
            .issue_ticket(new_ticket(event.id, "AAAAAAAA-00000002", "9000000002"))
            .await
            .unwrap();
        assert_eq!(second, IssueOutcome::Rejected(Eligibility::SoldOut));
        assert_eq!(store.get_event(event.id).await.unwrap().unwrap().tickets_issued, 1);
    }

    #[tokio::test]
    async fn colliding_code_writes_nothing() {
        let store = InMemoryTicketStore::new();
        let event = store
            .create_event(fixtures::free_event(AccountId::new(), None))
            .await
            .unwrap();
        store
            .issue_ticket(new_ticket(event.id, "AAAAAAAA-00000001", "9000000001"))
            .await
            .unwrap();
        let collision = store
            .issue_ticket(new_ticket(event.id, "AAAAAAAA-00000001", "9000000002"))
            .await;
        assert_eq!(collision, Err(StoreError::CodeCollision));
        assert_eq!(store.live_ticket_count(event.id), 1);
        assert_eq!(store.get_event(event.id).await.unwrap().unwrap().tickets_issued, 1);
    }

    #[tokio::test]
    async fn cancel_releases_slots() {
        let store = InMemoryTicketStore::new();
        let event = store
            .create_event(fixtures::paid_event(AccountId::new(), Some(1)))
            .await
            .unwrap();
        let tier = store
            .create_tier(fixtures::tier(event.id, Money::from_minor(50_000), Some(1)))
            .await
            .unwrap();
        let mut pending = new_ticket(event.id, "AAAAAAAA-00000001", "9000000001");
        pending.tier_id = Some(tier.id);
        pending.payment_status = PaymentStatus::Pending;
        let IssueOutcome::Issued(ticket) = store.issue_ticket(pending).await.unwrap() else {
            panic!("expected issuance");
        };

        let cancelled = store.cancel_ticket(ticket.id, test_epoch()).await.unwrap();
        assert!(cancelled.is_applied());
        assert_eq!(store.get_event(event.id).await.unwrap().unwrap().tickets_issued, 0);
        assert_eq!(store.get_tier(tier.id).await.unwrap().unwrap().tickets_sold, 0);

        let audit = store.audit_counters(event.id).await.unwrap().unwrap();
        assert!(audit.is_consistent());

        let again = store.cancel_ticket(ticket.id, test_epoch()).await.unwrap();
        assert!(matches!(again, WriteOutcome::Unchanged(_)));
    }

    #[tokio::test]
    async fn validation_is_single_use() {
        let store = InMemoryTicketStore::new();
        let event = store
            .create_event(fixtures::free_event(AccountId::new(), None))
            .await
            .unwrap();
        let IssueOutcome::Issued(ticket) = store
            .issue_ticket(new_ticket(event.id, "AAAAAAAA-00000001", "9000000001"))
            .await
            .unwrap()
        else {
            panic!("expected issuance");
        };

        let first = store.mark_validated(ticket.id, test_epoch()).await.unwrap();
        let second = store
            .mark_validated(ticket.id, test_epoch() + chrono::Duration::minutes(5))
            .await
            .unwrap();
        assert!(first.is_applied());
        let WriteOutcome::Unchanged(current) = second else {
            panic!("second validation must not apply");
        };
        assert_eq!(current.validated_at, Some(test_epoch()));
    }

    #[tokio::test]
    async fn claim_log_denies_inside_window() {
        let log = InMemoryClaimLog::new();
        let event_id = EventId::new();
        let window = Duration::from_secs(30);
        let now = test_epoch();

        assert_eq!(
            log.admit(event_id, "10.0.0.1", now, window).await.unwrap(),
            RateDecision::Allowed
        );
        assert_eq!(
            log.admit(event_id, "10.0.0.1", now + chrono::Duration::seconds(12), window)
                .await
                .unwrap(),
            RateDecision::Denied {
                retry_after: Duration::from_secs(18)
            }
        );
        assert_eq!(
            log.admit(event_id, "10.0.0.2", now, window).await.unwrap(),
            RateDecision::Allowed
        );
        assert_eq!(
            log.admit(event_id, "10.0.0.1", now + chrono::Duration::seconds(30), window)
                .await
                .unwrap(),
            RateDecision::Denied {
                retry_after: Duration::from_secs(1)
            }
        );
        assert_eq!(
            log.admit(event_id, "10.0.0.1", now + chrono::Duration::seconds(31), window)
                .await
                .unwrap(),
            RateDecision::Allowed
        );
        assert_eq!(log.prune(now + chrono::Duration::seconds(1)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn unavailable_store_fails_calls() {
        let store = InMemoryTicketStore::new();
        store.set_unavailable(true);
        assert!(matches!(store.ping().await, Err(StoreError::Database(_))));
        store.set_unavailable(false);
        assert!(store.ping().await.is_ok());
    }
}
