//! `PostgreSQL` claim attempt log.

use crate::db_error;
use chrono::{DateTime, Utc};
use gatepass_core::store::{ClaimLog, RateDecision, StoreFuture, retry_after};
use gatepass_core::types::EventId;
use sqlx::PgPool;
use std::time::Duration;

/// `PostgreSQL`-backed [`ClaimLog`].
///
/// `admit` takes a transaction-scoped advisory lock on `(event_id, origin)`
/// before checking and appending, so two simultaneous attempts from the same
/// origin are serialized and the second one sees the first.
#[derive(Clone, Debug)]
pub struct PostgresClaimLog {
    pool: PgPool,
}

impl PostgresClaimLog {
    /// Create a log over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl ClaimLog for PostgresClaimLog {
    fn admit<'a>(
        &'a self,
        event_id: EventId,
        origin: &'a str,
        now: DateTime<Utc>,
        window: Duration,
    ) -> StoreFuture<'a, RateDecision> {
        Box::pin(async move {
            let window_start = now - chrono::Duration::from_std(window).unwrap_or_default();
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| db_error("begin admit", &e))?;

            sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
                .bind(format!("claim:{event_id}:{origin}"))
                .execute(&mut *tx)
                .await
                .map_err(|e| db_error("lock claim key", &e))?;

            let latest: (Option<DateTime<Utc>>,) = sqlx::query_as(
                r"
                SELECT MAX(attempted_at) FROM claim_attempts
                WHERE event_id = $1 AND origin = $2 AND attempted_at >= $3
                ",
            )
            .bind(event_id.as_uuid())
            .bind(origin)
            .bind(window_start)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| db_error("check claim attempts", &e))?;

            if let Some(last) = latest.0 {
                return Ok(RateDecision::Denied {
                    retry_after: retry_after(last, now, window),
                });
            }

            sqlx::query(
                "INSERT INTO claim_attempts (event_id, origin, attempted_at) VALUES ($1, $2, $3)",
            )
            .bind(event_id.as_uuid())
            .bind(origin)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("record claim attempt", &e))?;

            tx.commit()
                .await
                .map_err(|e| db_error("commit admit", &e))?;
            Ok(RateDecision::Allowed)
        })
    }

    fn prune(&self, before: DateTime<Utc>) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM claim_attempts WHERE attempted_at < $1")
                .bind(before)
                .execute(&self.pool)
                .await
                .map_err(|e| db_error("prune claim attempts", &e))?;
            Ok(result.rows_affected())
        })
    }
}
