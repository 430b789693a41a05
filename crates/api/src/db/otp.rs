//! One-time passcode storage.
//!
//! Codes are stored as SHA-256 hex digests; the plaintext only ever exists in
//! the outgoing email.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use univendor_core::{Email, OtpId};

use super::RepositoryError;

/// A stored login code.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OtpRecord {
    pub id: OtpId,
    pub email: String,
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
    pub created_at: DateTime<Utc>,
}

/// Repository for OTP codes.
pub struct OtpRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OtpRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a new code hash for `email`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        email: &Email,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<OtpRecord, RepositoryError> {
        let record = sqlx::query_as::<_, OtpRecord>(
            r"
            INSERT INTO otp_codes (email, code_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, email, code_hash, expires_at, is_used, created_at
            ",
        )
        .bind(email.as_str())
        .bind(code_hash)
        .bind(expires_at)
        .fetch_one(self.pool)
        .await?;

        Ok(record)
    }

    /// The most recent code for `email` that is unused and unexpired at `now`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn latest_valid(
        &self,
        email: &Email,
        now: DateTime<Utc>,
    ) -> Result<Option<OtpRecord>, RepositoryError> {
        let record = sqlx::query_as::<_, OtpRecord>(
            r"
            SELECT id, email, code_hash, expires_at, is_used, created_at
            FROM otp_codes
            WHERE email = $1 AND is_used = FALSE AND expires_at > $2
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            ",
        )
        .bind(email.as_str())
        .bind(now)
        .fetch_optional(self.pool)
        .await?;

        Ok(record)
    }

    /// Consume a code. Returns `false` if another request already used it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_used(&self, id: OtpId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE otp_codes SET is_used = TRUE WHERE id = $1 AND is_used = FALSE")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Delete codes that expired before `cutoff`. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn purge_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM otp_codes WHERE expires_at < $1")
            .bind(cutoff)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
