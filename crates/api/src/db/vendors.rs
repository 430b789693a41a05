//! Vendor repository.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;

use univendor_core::{PlanId, UserId, UserRole, VendorId, VendorStatus};

use super::RepositoryError;
use super::users;
use crate::models::vendor::Vendor;

const VENDOR_COLUMNS: &str = "id, user_id, store_name, description, logo_url, contact_email, \
                              contact_phone, address, status, subscription_plan_id, \
                              subscription_status, trial_ends_at, next_billing_date, \
                              created_at, updated_at";

/// Store profile fields supplied by the vendor.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorProfile {
    pub store_name: Option<String>,
    pub description: Option<String>,
    pub logo_url: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
}

pub struct VendorRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> VendorRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: VendorId) -> Result<Option<Vendor>, RepositoryError> {
        let vendor = sqlx::query_as::<_, Vendor>(&format!(
            "SELECT {VENDOR_COLUMNS} FROM vendors WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(vendor)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_user(&self, user_id: UserId) -> Result<Option<Vendor>, RepositoryError> {
        let vendor = sqlx::query_as::<_, Vendor>(&format!(
            "SELECT {VENDOR_COLUMNS} FROM vendors WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(vendor)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Vendor>, RepositoryError> {
        let vendors = sqlx::query_as::<_, Vendor>(&format!(
            "SELECT {VENDOR_COLUMNS} FROM vendors ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(vendors)
    }

    /// Create the vendor for `user_id` and promote the user to `vendor`.
    ///
    /// The vendor starts a trial ending at `trial_ends_at` (also the first
    /// billing date) on `plan_id` when given.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already has a vendor.
    pub async fn create(
        &self,
        user_id: UserId,
        store_name: &str,
        profile: &VendorProfile,
        plan_id: Option<PlanId>,
        trial_ends_at: DateTime<Utc>,
    ) -> Result<Vendor, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let vendor = sqlx::query_as::<_, Vendor>(&format!(
            r"
            INSERT INTO vendors (
                user_id, store_name, description, logo_url, contact_email, contact_phone,
                address, status, subscription_plan_id, subscription_status,
                trial_ends_at, next_billing_date
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'active', $8, 'trial', $9, $9)
            RETURNING {VENDOR_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(store_name)
        .bind(profile.description.as_deref())
        .bind(profile.logo_url.as_deref())
        .bind(profile.contact_email.as_deref())
        .bind(profile.contact_phone.as_deref())
        .bind(profile.address.as_deref())
        .bind(plan_id)
        .bind(trial_ends_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::unique_violation(e, "user already has a vendor"))?;

        // Super admins keep their role when they open a store.
        let (role,): (UserRole,) = sqlx::query_as("SELECT role FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;
        if role != UserRole::SuperAdmin {
            users::set_role(&mut *tx, user_id, UserRole::Vendor).await?;
        }

        tx.commit().await?;
        Ok(vendor)
    }

    /// Update store profile fields; absent fields are unchanged.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the vendor doesn't exist.
    pub async fn update_profile(
        &self,
        id: VendorId,
        profile: &VendorProfile,
    ) -> Result<Vendor, RepositoryError> {
        let vendor = sqlx::query_as::<_, Vendor>(&format!(
            r"
            UPDATE vendors SET
                store_name = COALESCE($2, store_name),
                description = COALESCE($3, description),
                logo_url = COALESCE($4, logo_url),
                contact_email = COALESCE($5, contact_email),
                contact_phone = COALESCE($6, contact_phone),
                address = COALESCE($7, address),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {VENDOR_COLUMNS}
            "
        ))
        .bind(id)
        .bind(profile.store_name.as_deref())
        .bind(profile.description.as_deref())
        .bind(profile.logo_url.as_deref())
        .bind(profile.contact_email.as_deref())
        .bind(profile.contact_phone.as_deref())
        .bind(profile.address.as_deref())
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(vendor)
    }

    /// Change a vendor's operational status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the vendor doesn't exist.
    pub async fn set_status(
        &self,
        id: VendorId,
        status: VendorStatus,
    ) -> Result<Vendor, RepositoryError> {
        let vendor = sqlx::query_as::<_, Vendor>(&format!(
            "UPDATE vendors SET status = $2, updated_at = NOW() WHERE id = $1 \
             RETURNING {VENDOR_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(vendor)
    }
}
