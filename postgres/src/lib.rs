//! `PostgreSQL` storage for gatepass.
//!
//! Implements the storage traits from `gatepass-core`:
//!
//! - [`PostgresTicketStore`]: events, tiers and tickets with guarded atomic writes
//! - [`PostgresClaimLog`]: the sliding-window claim attempt log
//! - [`PostgresSessionResolver`]: hashed bearer sessions for organizers and staff
//!
//! Migrations are embedded and run with [`migrate`].
//!
//! # Example
//!
//! ```no_run
//! use gatepass_postgres::{PostgresTicketStore, migrate};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = sqlx::PgPool::connect("postgres://localhost/gatepass").await?;
//! migrate(&pool).await?;
//! let store = PostgresTicketStore::new(pool);
//! # Ok(())
//! # }
//! ```

mod claim_log;
mod rows;
mod sessions;
mod ticket_store;

pub use claim_log::PostgresClaimLog;
pub use sessions::{PostgresSessionResolver, hash_token};
pub use ticket_store::PostgresTicketStore;

use gatepass_core::error::{StoreError, StoreResult};
use sqlx::PgPool;

/// Unique constraint on `tickets.ticket_code`.
pub(crate) const CODE_CONSTRAINT: &str = "tickets_code_unique";

/// Partial unique index on live `(event_id, attendee_phone)` pairs.
pub(crate) const LIVE_PHONE_CONSTRAINT: &str = "tickets_live_phone_unique";

/// Run the embedded migrations.
///
/// # Errors
///
/// Returns [`StoreError::Database`] if a migration fails.
pub async fn migrate(pool: &PgPool) -> StoreResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
    tracing::info!("database migrations applied");
    Ok(())
}

pub(crate) fn db_error(context: &str, error: &sqlx::Error) -> StoreError {
    tracing::error!(error = %error, context, "database operation failed");
    StoreError::Database(format!("{context}: {error}"))
}
