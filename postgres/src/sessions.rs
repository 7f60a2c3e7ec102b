//! Organizer/staff bearer sessions.
//!
//! Tokens are random 32-byte values encoded as URL-safe base64. Only their
//! SHA-256 digest is stored, so a database leak does not leak live tokens.

use crate::db_error;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use gatepass_core::error::StoreResult;
use gatepass_core::store::{SessionResolver, StoreFuture};
use gatepass_core::types::AccountId;
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

/// Digest stored for `token`.
#[must_use]
pub fn hash_token(token: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes()))
}

/// `PostgreSQL`-backed [`SessionResolver`].
#[derive(Clone, Debug)]
pub struct PostgresSessionResolver {
    pool: PgPool,
}

impl PostgresSessionResolver {
    /// Create a resolver over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Issue a new session token for `account_id`, valid for `ttl`.
    ///
    /// The plaintext token is returned once and never stored.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the insert fails.
    pub async fn create_session(
        &self,
        account_id: AccountId,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> StoreResult<String> {
        let mut bytes = [0_u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = URL_SAFE_NO_PAD.encode(bytes);

        sqlx::query(
            r"
            INSERT INTO account_sessions (token_hash, account_id, expires_at, created_at)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(hash_token(&token))
        .bind(account_id.as_uuid())
        .bind(now + ttl)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("create session", &e))?;
        Ok(token)
    }

    /// Delete a session. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the delete fails.
    pub async fn revoke(&self, token: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM account_sessions WHERE token_hash = $1")
            .bind(hash_token(token))
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("revoke session", &e))?;
        Ok(result.rows_affected() > 0)
    }
}

impl SessionResolver for PostgresSessionResolver {
    fn resolve<'a>(
        &'a self,
        token: &'a str,
        now: DateTime<Utc>,
    ) -> StoreFuture<'a, Option<AccountId>> {
        Box::pin(async move {
            let row: Option<(Uuid,)> = sqlx::query_as(
                "SELECT account_id FROM account_sessions WHERE token_hash = $1 AND expires_at > $2",
            )
            .bind(hash_token(token))
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("resolve session", &e))?;
            Ok(row.map(|(id,)| AccountId::from_uuid(id)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_hash_is_stable_and_url_safe() {
        let hash = hash_token("organizer-token");
        assert_eq!(hash, hash_token("organizer-token"));
        assert_ne!(hash, hash_token("organizer-token2"));
        assert_eq!(hash.len(), 43);
        assert!(hash.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
