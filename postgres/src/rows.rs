//! Row decoding.

use chrono::{DateTime, Utc};
use gatepass_core::error::{StoreError, StoreResult};
use gatepass_core::payment::{PaymentMethod, PaymentStatus};
use gatepass_core::ticket_code::TicketCode;
use gatepass_core::types::{
    AccountId, Event, EventId, EventSummary, Money, Ticket, TicketId, TicketRecord, TicketTier,
    TierId, TierSummary,
};
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

pub(crate) const EVENT_COLUMNS: &str = "id, owner_id, title, venue, event_date, is_free, \
     capacity, tickets_issued, currency, created_at";

pub(crate) const TIER_COLUMNS: &str = "id, event_id, name, price_minor, currency, capacity, \
     tickets_sold, is_active, created_at";

pub(crate) const TICKET_COLUMNS: &str = "t.id, t.ticket_code, t.event_id, t.tier_id, \
     t.attendee_name, t.attendee_email, t.attendee_phone, t.payment_status, t.payment_method, \
     t.payment_ref_id, t.is_validated, t.validated_at, t.created_at, t.paid_at, t.cancelled_at";

/// Ticket joined with its event and (optional) tier.
pub(crate) const RECORD_SELECT: &str = "SELECT t.id, t.ticket_code, t.event_id, t.tier_id, \
     t.attendee_name, t.attendee_email, t.attendee_phone, t.payment_status, t.payment_method, \
     t.payment_ref_id, t.is_validated, t.validated_at, t.created_at, t.paid_at, t.cancelled_at, \
     e.owner_id AS e_owner_id, e.title AS e_title, e.venue AS e_venue, \
     e.event_date AS e_event_date, e.currency AS e_currency, e.is_free AS e_is_free, \
     tr.name AS tr_name, tr.price_minor AS tr_price_minor, tr.currency AS tr_currency \
     FROM tickets t \
     JOIN events e ON e.id = t.event_id \
     LEFT JOIN ticket_tiers tr ON tr.id = t.tier_id";

fn get<'r, T>(row: &'r PgRow, column: &str) -> StoreResult<T>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Corrupt(format!("column {column}: {e}")))
}

pub(crate) fn count(value: i64, column: &str) -> StoreResult<u32> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{column} out of range: {value}")))
}

fn optional_count(value: Option<i64>, column: &str) -> StoreResult<Option<u32>> {
    value.map(|value| count(value, column)).transpose()
}

pub(crate) fn event_from_row(row: &PgRow) -> StoreResult<Event> {
    Ok(Event {
        id: EventId::from_uuid(get(row, "id")?),
        owner_id: AccountId::from_uuid(get(row, "owner_id")?),
        title: get(row, "title")?,
        venue: get(row, "venue")?,
        event_date: get(row, "event_date")?,
        is_free: get(row, "is_free")?,
        capacity: optional_count(get(row, "capacity")?, "capacity")?,
        tickets_issued: count(get(row, "tickets_issued")?, "tickets_issued")?,
        currency: get(row, "currency")?,
        created_at: get(row, "created_at")?,
    })
}

pub(crate) fn tier_from_row(row: &PgRow) -> StoreResult<TicketTier> {
    Ok(TicketTier {
        id: TierId::from_uuid(get(row, "id")?),
        event_id: EventId::from_uuid(get(row, "event_id")?),
        name: get(row, "name")?,
        price: Money::from_minor(get(row, "price_minor")?),
        currency: get(row, "currency")?,
        capacity: optional_count(get(row, "capacity")?, "capacity")?,
        tickets_sold: count(get(row, "tickets_sold")?, "tickets_sold")?,
        is_active: get(row, "is_active")?,
        created_at: get(row, "created_at")?,
    })
}

pub(crate) fn ticket_from_row(row: &PgRow) -> StoreResult<Ticket> {
    let code: String = get(row, "ticket_code")?;
    let status: String = get(row, "payment_status")?;
    let method: Option<String> = get(row, "payment_method")?;
    let tier_id: Option<Uuid> = get(row, "tier_id")?;

    Ok(Ticket {
        id: TicketId::from_uuid(get(row, "id")?),
        ticket_code: TicketCode::parse(&code)
            .map_err(|_| StoreError::Corrupt(format!("malformed ticket code {code}")))?,
        event_id: EventId::from_uuid(get(row, "event_id")?),
        tier_id: tier_id.map(TierId::from_uuid),
        attendee_name: get(row, "attendee_name")?,
        attendee_email: get(row, "attendee_email")?,
        attendee_phone: get(row, "attendee_phone")?,
        payment_status: PaymentStatus::parse(&status)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown payment status {status}")))?,
        payment_method: method
            .map(|method| {
                PaymentMethod::parse(&method)
                    .ok_or_else(|| StoreError::Corrupt(format!("unknown payment method {method}")))
            })
            .transpose()?,
        payment_ref_id: get(row, "payment_ref_id")?,
        is_validated: get(row, "is_validated")?,
        validated_at: get::<Option<DateTime<Utc>>>(row, "validated_at")?,
        created_at: get(row, "created_at")?,
        paid_at: get(row, "paid_at")?,
        cancelled_at: get(row, "cancelled_at")?,
    })
}

pub(crate) fn record_from_row(row: &PgRow) -> StoreResult<TicketRecord> {
    let ticket = ticket_from_row(row)?;
    let event = EventSummary {
        id: ticket.event_id,
        owner_id: AccountId::from_uuid(get(row, "e_owner_id")?),
        title: get(row, "e_title")?,
        venue: get(row, "e_venue")?,
        event_date: get(row, "e_event_date")?,
        currency: get(row, "e_currency")?,
        is_free: get(row, "e_is_free")?,
    };
    let tier = match ticket.tier_id {
        Some(id) => Some(TierSummary {
            id,
            name: get(row, "tr_name")?,
            price: Money::from_minor(get(row, "tr_price_minor")?),
            currency: get(row, "tr_currency")?,
        }),
        None => None,
    };
    Ok(TicketRecord {
        ticket,
        event,
        tier,
    })
}
