//! Storefront domain repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use univendor_core::{
    DomainId, DomainName, DomainStatus, DomainType, VendorId, VerificationStatus,
};

use super::RepositoryError;
use crate::models::domain::{DnsRecord, Domain};

const DOMAIN_COLUMNS: &str = "id, vendor_id, name, type, status, verification_status, \
                              verification_token, dns_records, ssl_status, is_primary, \
                              last_checked_at, expires_at, created_at, updated_at";

/// A domain ready to be stored.
#[derive(Debug, Clone)]
pub struct NewDomain {
    pub vendor_id: VendorId,
    pub name: DomainName,
    pub domain_type: DomainType,
    pub status: DomainStatus,
    pub verification_status: VerificationStatus,
    pub verification_token: Option<String>,
    pub dns_records: Vec<DnsRecord>,
    pub is_primary: bool,
    pub expires_at: DateTime<Utc>,
}

pub struct DomainRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DomainRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: DomainId) -> Result<Option<Domain>, RepositoryError> {
        let domain = sqlx::query_as::<_, Domain>(&format!(
            "SELECT {DOMAIN_COLUMNS} FROM domains WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(domain)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_vendor(&self, vendor_id: VendorId) -> Result<Vec<Domain>, RepositoryError> {
        let domains = sqlx::query_as::<_, Domain>(&format!(
            "SELECT {DOMAIN_COLUMNS} FROM domains WHERE vendor_id = $1 \
             ORDER BY is_primary DESC, created_at, id"
        ))
        .bind(vendor_id)
        .fetch_all(self.pool)
        .await?;

        Ok(domains)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Domain>, RepositoryError> {
        let domains = sqlx::query_as::<_, Domain>(&format!(
            "SELECT {DOMAIN_COLUMNS} FROM domains ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(domains)
    }

    /// The active, verified domain with this exact name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_live(&self, name: &str) -> Result<Option<Domain>, RepositoryError> {
        let domain = sqlx::query_as::<_, Domain>(&format!(
            "SELECT {DOMAIN_COLUMNS} FROM domains \
             WHERE name = $1 AND status = 'active' AND verification_status = 'verified'"
        ))
        .bind(name)
        .fetch_optional(self.pool)
        .await?;

        Ok(domain)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is already registered.
    pub async fn create(&self, new: &NewDomain) -> Result<Domain, RepositoryError> {
        let domain = sqlx::query_as::<_, Domain>(&format!(
            r"
            INSERT INTO domains (
                vendor_id, name, type, status, verification_status, verification_token,
                dns_records, is_primary, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {DOMAIN_COLUMNS}
            "
        ))
        .bind(new.vendor_id)
        .bind(new.name.as_str())
        .bind(new.domain_type)
        .bind(new.status)
        .bind(new.verification_status)
        .bind(new.verification_token.as_deref())
        .bind(Json(&new.dns_records))
        .bind(new.is_primary)
        .bind(new.expires_at)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_violation(e, "Domain already exists"))?;

        Ok(domain)
    }

    /// Persist every mutable field of `domain`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the domain doesn't exist and
    /// `RepositoryError::Conflict` if a rename collides.
    pub async fn save(&self, domain: &Domain) -> Result<Domain, RepositoryError> {
        let saved = sqlx::query_as::<_, Domain>(&format!(
            r"
            UPDATE domains SET
                name = $2, type = $3, status = $4, verification_status = $5,
                verification_token = $6, dns_records = $7, ssl_status = $8,
                is_primary = $9, last_checked_at = $10, expires_at = $11, updated_at = NOW()
            WHERE id = $1
            RETURNING {DOMAIN_COLUMNS}
            "
        ))
        .bind(domain.id)
        .bind(&domain.name)
        .bind(domain.domain_type)
        .bind(domain.status)
        .bind(domain.verification_status)
        .bind(domain.verification_token.as_deref())
        .bind(&domain.dns_records)
        .bind(domain.ssl_status)
        .bind(domain.is_primary)
        .bind(domain.last_checked_at)
        .bind(domain.expires_at)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_violation(e, "Domain already exists"))?
        .ok_or(RepositoryError::NotFound)?;

        Ok(saved)
    }

    /// Mark SSL active on every live domain. Returns the number updated.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn activate_ssl_for_live(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE domains SET ssl_status = 'active', last_checked_at = $1, updated_at = NOW()
            WHERE status = 'active' AND verification_status = 'verified'
            ",
        )
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Delete a domain, returning its name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the domain doesn't exist.
    pub async fn delete(&self, id: DomainId) -> Result<String, RepositoryError> {
        let (name,): (String,) = sqlx::query_as("DELETE FROM domains WHERE id = $1 RETURNING name")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        Ok(name)
    }
}
