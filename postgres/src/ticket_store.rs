//! `PostgreSQL` ticket store.
//!
//! # Concurrency
//!
//! Issuance runs in one transaction:
//!
//! 1. `UPDATE events SET tickets_issued = tickets_issued + 1 WHERE ... AND
//!    tickets_issued < capacity`. The row lock serializes concurrent claims for
//!    the same event and the guard is re-evaluated after the lock is granted,
//!    so capacity can never be exceeded.
//! 2. The same guarded increment on the tier.
//! 3. `INSERT` the ticket. The partial unique index on
//!    `(event_id, attendee_phone) WHERE payment_status <> 'cancelled'` turns a
//!    duplicate claim into a constraint violation, and `tickets_code_unique`
//!    turns a code collision into one.
//!
//! Any rejection drops the transaction, which rolls the increments back.
//! Single-ticket transitions are guarded `UPDATE ... RETURNING` statements; an
//! empty result means the guard did not hold.

use crate::rows::{
    self, EVENT_COLUMNS, RECORD_SELECT, TICKET_COLUMNS, TIER_COLUMNS, event_from_row,
    record_from_row, ticket_from_row, tier_from_row,
};
use crate::{CODE_CONSTRAINT, LIVE_PHONE_CONSTRAINT, db_error};
use chrono::{DateTime, Utc};
use gatepass_core::eligibility::{Eligibility, EligibilitySnapshot, TierCounters};
use gatepass_core::error::{StoreError, StoreResult};
use gatepass_core::identity::AttendeePhone;
use gatepass_core::payment::expiry_cutoff;
use gatepass_core::store::{IssueOutcome, StoreFuture, TicketStore, WriteOutcome};
use gatepass_core::ticket_code::TicketCode;
use gatepass_core::types::{
    CounterAudit, Event, EventId, NewEvent, NewTicket, NewTier, Ticket, TicketId, TicketRecord,
    TicketTier, TierCounterAudit, TierId,
};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, warn};
use uuid::Uuid;

/// `PostgreSQL`-backed [`TicketStore`].
///
/// # Example
///
/// ```no_run
/// use gatepass_postgres::PostgresTicketStore;
///
/// # async fn example(pool: sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let store = PostgresTicketStore::new(pool);
/// store.migrate().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct PostgresTicketStore {
    pool: PgPool,
}

impl PostgresTicketStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Access the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a migration fails.
    pub async fn migrate(&self) -> StoreResult<()> {
        crate::migrate(&self.pool).await
    }

    async fn fetch_ticket(&self, id: TicketId) -> StoreResult<Option<Ticket>> {
        let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets t WHERE t.id = $1");
        sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("load ticket", &e))?
            .as_ref()
            .map(ticket_from_row)
            .transpose()
    }

    /// Turns the `RETURNING` row of a guarded update into a [`WriteOutcome`].
    async fn settle(&self, id: TicketId, updated: Option<Ticket>) -> StoreResult<WriteOutcome> {
        if let Some(ticket) = updated {
            return Ok(WriteOutcome::Applied(ticket));
        }
        Ok(match self.fetch_ticket(id).await? {
            Some(ticket) => WriteOutcome::Unchanged(ticket),
            None => WriteOutcome::Missing,
        })
    }

    async fn guarded_update(
        &self,
        id: TicketId,
        set_and_guard: &str,
        now: DateTime<Utc>,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<WriteOutcome> {
        // $1 = id, $2 = now, $3 = expiry cutoff; statements may leave $2 or $3 unused
        let sql = format!("UPDATE tickets AS t {set_and_guard} RETURNING {TICKET_COLUMNS}");
        let updated = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(now)
            .bind(cutoff)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("update ticket", &e))?
            .as_ref()
            .map(ticket_from_row)
            .transpose()?;
        self.settle(id, updated).await
    }

    async fn increment_event(
        tx: &mut Transaction<'_, Postgres>,
        event_id: EventId,
    ) -> StoreResult<Option<Eligibility>> {
        let bumped = sqlx::query(
            r"
            UPDATE events
            SET tickets_issued = tickets_issued + 1
            WHERE id = $1 AND (capacity IS NULL OR tickets_issued < capacity)
            ",
        )
        .bind(event_id.as_uuid())
        .execute(&mut **tx)
        .await
        .map_err(|e| db_error("reserve event slot", &e))?;
        if bumped.rows_affected() == 1 {
            return Ok(None);
        }

        let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM events WHERE id = $1)")
            .bind(event_id.as_uuid())
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| db_error("check event", &e))?;
        if exists.0 {
            Ok(Some(Eligibility::SoldOut))
        } else {
            Err(StoreError::NotFound {
                entity: "event",
                id: event_id.to_string(),
            })
        }
    }

    async fn increment_tier(
        tx: &mut Transaction<'_, Postgres>,
        event_id: EventId,
        tier_id: TierId,
    ) -> StoreResult<Option<Eligibility>> {
        let bumped = sqlx::query(
            r"
            UPDATE ticket_tiers
            SET tickets_sold = tickets_sold + 1
            WHERE id = $1 AND event_id = $2 AND is_active
              AND (capacity IS NULL OR tickets_sold < capacity)
            ",
        )
        .bind(tier_id.as_uuid())
        .bind(event_id.as_uuid())
        .execute(&mut **tx)
        .await
        .map_err(|e| db_error("reserve tier slot", &e))?;
        if bumped.rows_affected() == 1 {
            return Ok(None);
        }

        let state: Option<(bool,)> =
            sqlx::query_as("SELECT is_active FROM ticket_tiers WHERE id = $1 AND event_id = $2")
                .bind(tier_id.as_uuid())
                .bind(event_id.as_uuid())
                .fetch_optional(&mut **tx)
                .await
                .map_err(|e| db_error("check tier", &e))?;
        match state {
            Some((true,)) => Ok(Some(Eligibility::TierSoldOut)),
            Some((false,)) => Ok(Some(Eligibility::TierInactive)),
            None => Err(StoreError::NotFound {
                entity: "tier",
                id: tier_id.to_string(),
            }),
        }
    }

    async fn insert_ticket(
        tx: &mut Transaction<'_, Postgres>,
        new: &NewTicket,
    ) -> StoreResult<Result<Ticket, Eligibility>> {
        let sql = format!(
            r"
            INSERT INTO tickets AS t (
                id, ticket_code, event_id, tier_id, attendee_name, attendee_email,
                attendee_phone, payment_status, payment_method, payment_ref_id,
                is_validated, created_at, paid_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, FALSE, $11,
                      CASE WHEN $8 = 'paid' THEN $11 END)
            RETURNING {TICKET_COLUMNS}
            "
        );
        let inserted = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(new.ticket_code.as_str())
            .bind(new.event_id.as_uuid())
            .bind(new.tier_id.map(|id| *id.as_uuid()))
            .bind(&new.attendee_name)
            .bind(&new.attendee_email)
            .bind(&new.attendee_phone)
            .bind(new.payment_status.as_str())
            .bind(new.payment_method.map(|method| method.as_str()))
            .bind(new.payment_ref_id.as_deref())
            .bind(new.created_at)
            .fetch_one(&mut **tx)
            .await;

        match inserted {
            Ok(row) => ticket_from_row(&row).map(Ok),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                let constraint = db.constraint().unwrap_or_default().to_string();
                metrics::counter!(
                    "gatepass_store_unique_violations_total",
                    "constraint" => constraint.clone()
                )
                .increment(1);
                match constraint.as_str() {
                    CODE_CONSTRAINT => Err(StoreError::CodeCollision),
                    LIVE_PHONE_CONSTRAINT => Ok(Err(Eligibility::DuplicateIdentity)),
                    other => Err(StoreError::Database(format!(
                        "unexpected unique violation on {other}"
                    ))),
                }
            }
            Err(e) => Err(db_error("insert ticket", &e)),
        }
    }
}

impl TicketStore for PostgresTicketStore {
    fn create_event(&self, new: NewEvent) -> StoreFuture<'_, Event> {
        Box::pin(async move {
            let sql = format!(
                r"
                INSERT INTO events (id, owner_id, title, venue, event_date, is_free,
                                    capacity, tickets_issued, currency, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, 0, $8, $9)
                RETURNING {EVENT_COLUMNS}
                "
            );
            let row = sqlx::query(&sql)
                .bind(Uuid::new_v4())
                .bind(new.owner_id.as_uuid())
                .bind(&new.title)
                .bind(new.venue.as_deref())
                .bind(new.event_date)
                .bind(new.is_free)
                .bind(new.capacity.map(i64::from))
                .bind(&new.currency)
                .bind(new.created_at)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| db_error("create event", &e))?;
            event_from_row(&row)
        })
    }

    fn get_event(&self, id: EventId) -> StoreFuture<'_, Option<Event>> {
        Box::pin(async move {
            let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1");
            sqlx::query(&sql)
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("load event", &e))?
                .as_ref()
                .map(event_from_row)
                .transpose()
        })
    }

    fn create_tier(&self, new: NewTier) -> StoreFuture<'_, TicketTier> {
        Box::pin(async move {
            let sql = format!(
                r"
                INSERT INTO ticket_tiers (id, event_id, name, price_minor, currency,
                                          capacity, tickets_sold, is_active, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, 0, $7, $8)
                RETURNING {TIER_COLUMNS}
                "
            );
            let row = sqlx::query(&sql)
                .bind(Uuid::new_v4())
                .bind(new.event_id.as_uuid())
                .bind(&new.name)
                .bind(new.price.minor())
                .bind(&new.currency)
                .bind(new.capacity.map(i64::from))
                .bind(new.is_active)
                .bind(new.created_at)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| match &e {
                    sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                        StoreError::NotFound {
                            entity: "event",
                            id: new.event_id.to_string(),
                        }
                    }
                    _ => db_error("create tier", &e),
                })?;
            tier_from_row(&row)
        })
    }

    fn get_tier(&self, id: TierId) -> StoreFuture<'_, Option<TicketTier>> {
        Box::pin(async move {
            let sql = format!("SELECT {TIER_COLUMNS} FROM ticket_tiers WHERE id = $1");
            sqlx::query(&sql)
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("load tier", &e))?
                .as_ref()
                .map(tier_from_row)
                .transpose()
        })
    }

    fn list_tiers(&self, event_id: EventId) -> StoreFuture<'_, Vec<TicketTier>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT {TIER_COLUMNS} FROM ticket_tiers \
                 WHERE event_id = $1 ORDER BY created_at, id"
            );
            sqlx::query(&sql)
                .bind(event_id.as_uuid())
                .fetch_all(&self.pool)
                .await
                .map_err(|e| db_error("list tiers", &e))?
                .iter()
                .map(tier_from_row)
                .collect()
        })
    }

    fn set_tier_active(
        &self,
        id: TierId,
        is_active: bool,
    ) -> StoreFuture<'_, Option<TicketTier>> {
        Box::pin(async move {
            let sql = format!(
                "UPDATE ticket_tiers SET is_active = $2 WHERE id = $1 RETURNING {TIER_COLUMNS}"
            );
            sqlx::query(&sql)
                .bind(id.as_uuid())
                .bind(is_active)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("update tier", &e))?
                .as_ref()
                .map(tier_from_row)
                .transpose()
        })
    }

    fn eligibility_snapshot<'a>(
        &'a self,
        event_id: EventId,
        tier_id: Option<TierId>,
        phone: &'a AttendeePhone,
    ) -> StoreFuture<'a, EligibilitySnapshot> {
        Box::pin(async move {
            let event = sqlx::query(
                r"
                SELECT e.capacity, e.tickets_issued,
                       EXISTS(
                           SELECT 1 FROM tickets t
                           WHERE t.event_id = e.id
                             AND t.attendee_phone = $2
                             AND t.payment_status <> 'cancelled'
                       ) AS duplicate
                FROM events e
                WHERE e.id = $1
                ",
            )
            .bind(event_id.as_uuid())
            .bind(phone.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("eligibility snapshot", &e))?
            .ok_or_else(|| StoreError::NotFound {
                entity: "event",
                id: event_id.to_string(),
            })?;

            let tier = match tier_id {
                Some(tier_id) => {
                    let row = sqlx::query(
                        r"
                        SELECT capacity, tickets_sold, is_active
                        FROM ticket_tiers
                        WHERE id = $1 AND event_id = $2
                        ",
                    )
                    .bind(tier_id.as_uuid())
                    .bind(event_id.as_uuid())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| db_error("tier snapshot", &e))?
                    .ok_or_else(|| StoreError::NotFound {
                        entity: "tier",
                        id: tier_id.to_string(),
                    })?;
                    let capacity: Option<i64> = row
                        .try_get("capacity")
                        .map_err(|e| db_error("tier snapshot", &e))?;
                    let sold: i64 = row
                        .try_get("tickets_sold")
                        .map_err(|e| db_error("tier snapshot", &e))?;
                    Some(TierCounters {
                        capacity: capacity.map(|c| rows::count(c, "capacity")).transpose()?,
                        sold: rows::count(sold, "tickets_sold")?,
                        is_active: row
                            .try_get("is_active")
                            .map_err(|e| db_error("tier snapshot", &e))?,
                    })
                }
                None => None,
            };

            let capacity: Option<i64> = event
                .try_get("capacity")
                .map_err(|e| db_error("eligibility snapshot", &e))?;
            let issued: i64 = event
                .try_get("tickets_issued")
                .map_err(|e| db_error("eligibility snapshot", &e))?;
            Ok(EligibilitySnapshot {
                event_capacity: capacity.map(|c| rows::count(c, "capacity")).transpose()?,
                event_issued: rows::count(issued, "tickets_issued")?,
                tier,
                duplicate: event
                    .try_get("duplicate")
                    .map_err(|e| db_error("eligibility snapshot", &e))?,
            })
        })
    }

    fn issue_ticket(&self, new: NewTicket) -> StoreFuture<'_, IssueOutcome> {
        Box::pin(async move {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| db_error("begin issuance", &e))?;

            if let Some(rejection) = Self::increment_event(&mut tx, new.event_id).await? {
                debug!(event_id = %new.event_id, ?rejection, "claim rejected at write time");
                return Ok(IssueOutcome::Rejected(rejection));
            }
            if let Some(tier_id) = new.tier_id {
                let rejected = Self::increment_tier(&mut tx, new.event_id, tier_id).await?;
                if let Some(rejection) = rejected {
                    debug!(
                        event_id = %new.event_id,
                        %tier_id,
                        ?rejection,
                        "claim rejected at write time"
                    );
                    return Ok(IssueOutcome::Rejected(rejection));
                }
            }

            match Self::insert_ticket(&mut tx, &new).await? {
                Ok(ticket) => {
                    tx.commit()
                        .await
                        .map_err(|e| db_error("commit issuance", &e))?;
                    Ok(IssueOutcome::Issued(ticket))
                }
                Err(rejection) => Ok(IssueOutcome::Rejected(rejection)),
            }
        })
    }

    fn find_by_code<'a>(&'a self, code: &'a TicketCode) -> StoreFuture<'a, Option<TicketRecord>> {
        Box::pin(async move {
            let sql = format!("{RECORD_SELECT} WHERE t.ticket_code = $1");
            sqlx::query(&sql)
                .bind(code.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("find ticket by code", &e))?
                .as_ref()
                .map(record_from_row)
                .transpose()
        })
    }

    fn find_by_id(&self, id: TicketId) -> StoreFuture<'_, Option<TicketRecord>> {
        Box::pin(async move {
            let sql = format!("{RECORD_SELECT} WHERE t.id = $1");
            sqlx::query(&sql)
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("find ticket by id", &e))?
                .as_ref()
                .map(record_from_row)
                .transpose()
        })
    }

    fn mark_validated(&self, id: TicketId, now: DateTime<Utc>) -> StoreFuture<'_, WriteOutcome> {
        Box::pin(async move {
            self.guarded_update(
                id,
                r"
                SET is_validated = TRUE, validated_at = $2
                WHERE t.id = $1 AND NOT t.is_validated AND t.payment_status = 'paid'
                ",
                now,
                expiry_cutoff(now),
            )
            .await
        })
    }

    fn confirm_and_validate(
        &self,
        id: TicketId,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, WriteOutcome> {
        Box::pin(async move {
            self.guarded_update(
                id,
                r"
                SET payment_status = 'paid',
                    paid_at = COALESCE(t.paid_at, $2),
                    is_validated = TRUE,
                    validated_at = $2
                WHERE t.id = $1
                  AND NOT t.is_validated
                  AND (t.payment_status = 'paid'
                       OR (t.payment_status IN ('pending', 'pay_at_venue') AND t.created_at >= $3))
                ",
                now,
                expiry_cutoff(now),
            )
            .await
        })
    }

    fn confirm_payment(&self, id: TicketId, now: DateTime<Utc>) -> StoreFuture<'_, WriteOutcome> {
        Box::pin(async move {
            self.guarded_update(
                id,
                r"
                SET payment_status = 'paid', paid_at = $2
                WHERE t.id = $1
                  AND t.payment_status IN ('pending', 'pay_at_venue')
                  AND t.created_at >= $3
                ",
                now,
                expiry_cutoff(now),
            )
            .await
        })
    }

    fn cancel_ticket(&self, id: TicketId, now: DateTime<Utc>) -> StoreFuture<'_, WriteOutcome> {
        Box::pin(async move {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| db_error("begin cancel", &e))?;

            let sql = format!(
                r"
                UPDATE tickets AS t
                SET payment_status = 'cancelled', cancelled_at = $2
                WHERE t.id = $1 AND t.payment_status IN ('pending', 'pay_at_venue', 'expired')
                RETURNING {TICKET_COLUMNS}
                "
            );
            let cancelled = sqlx::query(&sql)
                .bind(id.as_uuid())
                .bind(now)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| db_error("cancel ticket", &e))?
                .as_ref()
                .map(ticket_from_row)
                .transpose()?;

            let Some(ticket) = cancelled else {
                drop(tx);
                return self.settle(id, None).await;
            };

            sqlx::query(
                "UPDATE events SET tickets_issued = GREATEST(tickets_issued - 1, 0) WHERE id = $1",
            )
            .bind(ticket.event_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("release event slot", &e))?;

            if let Some(tier_id) = ticket.tier_id {
                sqlx::query(
                    r"
                    UPDATE ticket_tiers
                    SET tickets_sold = GREATEST(tickets_sold - 1, 0)
                    WHERE id = $1
                    ",
                )
                .bind(tier_id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(|e| db_error("release tier slot", &e))?;
            }

            tx.commit()
                .await
                .map_err(|e| db_error("commit cancel", &e))?;
            Ok(WriteOutcome::Applied(ticket))
        })
    }

    fn expire_ticket(&self, id: TicketId, now: DateTime<Utc>) -> StoreFuture<'_, WriteOutcome> {
        Box::pin(async move {
            self.guarded_update(
                id,
                r"
                SET payment_status = 'expired'
                WHERE t.id = $1
                  AND t.payment_status IN ('pending', 'pay_at_venue')
                  AND t.created_at < $3
                ",
                now,
                expiry_cutoff(now),
            )
            .await
        })
    }

    fn expire_stale(&self, now: DateTime<Utc>, limit: u32) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let result = sqlx::query(
                r"
                UPDATE tickets
                SET payment_status = 'expired'
                WHERE id IN (
                    SELECT id FROM tickets
                    WHERE payment_status IN ('pending', 'pay_at_venue') AND created_at < $1
                    ORDER BY created_at
                    LIMIT $2
                    FOR UPDATE SKIP LOCKED
                )
                ",
            )
            .bind(expiry_cutoff(now))
            .bind(i64::from(limit))
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("expire stale tickets", &e))?;
            Ok(result.rows_affected())
        })
    }

    fn record_payment_reference(
        &self,
        id: TicketId,
        reference: String,
    ) -> StoreFuture<'_, WriteOutcome> {
        Box::pin(async move {
            let sql = format!(
                r"
                UPDATE tickets AS t SET payment_ref_id = $2
                WHERE t.id = $1 AND t.payment_status = 'pending'
                RETURNING {TICKET_COLUMNS}
                "
            );
            let updated = sqlx::query(&sql)
                .bind(id.as_uuid())
                .bind(&reference)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("record payment reference", &e))?
                .as_ref()
                .map(ticket_from_row)
                .transpose()?;
            self.settle(id, updated).await
        })
    }

    fn audit_counters(&self, event_id: EventId) -> StoreFuture<'_, Option<CounterAudit>> {
        Box::pin(async move {
            let event: Option<(i64, i64)> = sqlx::query_as(
                r"
                SELECT e.tickets_issued,
                       (SELECT COUNT(*) FROM tickets t
                        WHERE t.event_id = e.id AND t.payment_status <> 'cancelled')
                FROM events e
                WHERE e.id = $1
                ",
            )
            .bind(event_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("audit event counters", &e))?;
            let Some((recorded, actual)) = event else {
                return Ok(None);
            };

            let tiers: Vec<(Uuid, i64, i64)> = sqlx::query_as(
                r"
                SELECT tr.id, tr.tickets_sold,
                       COUNT(t.id) FILTER (WHERE t.payment_status <> 'cancelled')
                FROM ticket_tiers tr
                LEFT JOIN tickets t ON t.tier_id = tr.id
                WHERE tr.event_id = $1
                GROUP BY tr.id, tr.tickets_sold
                ORDER BY tr.id
                ",
            )
            .bind(event_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("audit tier counters", &e))?;

            let audit = CounterAudit {
                event_id,
                recorded_issued: rows::count(recorded, "tickets_issued")?,
                actual_issued: rows::count(actual, "count")?,
                tiers: tiers
                    .into_iter()
                    .map(|(id, recorded, actual)| {
                        Ok(TierCounterAudit {
                            tier_id: TierId::from_uuid(id),
                            recorded_sold: rows::count(recorded, "tickets_sold")?,
                            actual_sold: rows::count(actual, "count")?,
                        })
                    })
                    .collect::<StoreResult<_>>()?,
            };
            if !audit.is_consistent() {
                warn!(
                    %event_id,
                    recorded = audit.recorded_issued,
                    actual = audit.actual_issued,
                    "ticket counters drifted from recount"
                );
            }
            Ok(Some(audit))
        })
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(|e| db_error("ping", &e))?;
            Ok(())
        })
    }
}
