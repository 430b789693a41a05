//! Vendor platform subscriptions.

use chrono::{DateTime, Months, Utc};
use sqlx::PgPool;

use univendor_core::{BillingCycle, SubscriptionId, VendorId};

use super::RepositoryError;
use super::payments::insert_invoice;
use crate::models::payment::Invoice;
use crate::models::vendor::{PlatformSubscription, SubscriptionInfo, SubscriptionPlan};

const SUBSCRIPTION_COLUMNS: &str = "id, vendor_id, plan_id, status, billing_cycle, \
                                    current_period_start, current_period_end, canceled_at, \
                                    cancel_reason, created_at, updated_at";

/// End of the billing period that starts at `start`.
#[must_use]
pub fn period_end(start: DateTime<Utc>, cycle: BillingCycle) -> DateTime<Utc> {
    start
        .checked_add_months(Months::new(cycle.months()))
        .unwrap_or(start)
}

pub struct SubscriptionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SubscriptionRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The vendor's newest subscription that has not been canceled.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn current(
        &self,
        vendor_id: VendorId,
    ) -> Result<Option<PlatformSubscription>, RepositoryError> {
        let sub = sqlx::query_as::<_, PlatformSubscription>(&format!(
            r"
            SELECT {SUBSCRIPTION_COLUMNS} FROM platform_subscriptions
            WHERE vendor_id = $1 AND status NOT IN ('canceled', 'expired')
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "
        ))
        .bind(vendor_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(sub)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        id: SubscriptionId,
    ) -> Result<Option<PlatformSubscription>, RepositoryError> {
        let sub = sqlx::query_as::<_, PlatformSubscription>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM platform_subscriptions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(sub)
    }

    /// Put the vendor on `plan` starting at `now`.
    ///
    /// In one transaction: any running subscription is canceled, the new one
    /// is created, the vendor's plan and billing state are updated and a
    /// pending invoice for the first period is issued.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails.
    pub async fn subscribe(
        &self,
        vendor_id: VendorId,
        plan: &SubscriptionPlan,
        cycle: BillingCycle,
        now: DateTime<Utc>,
    ) -> Result<(SubscriptionInfo, Invoice), RepositoryError> {
        let end = period_end(now, cycle);
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            UPDATE platform_subscriptions SET
                status = 'canceled', canceled_at = $2,
                cancel_reason = 'Replaced by a new subscription', updated_at = NOW()
            WHERE vendor_id = $1 AND status NOT IN ('canceled', 'expired')
            ",
        )
        .bind(vendor_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let subscription = sqlx::query_as::<_, PlatformSubscription>(&format!(
            r"
            INSERT INTO platform_subscriptions (
                vendor_id, plan_id, status, billing_cycle, current_period_start, current_period_end
            )
            VALUES ($1, $2, 'active', $3, $4, $5)
            RETURNING {SUBSCRIPTION_COLUMNS}
            "
        ))
        .bind(vendor_id)
        .bind(plan.id)
        .bind(cycle)
        .bind(now)
        .bind(end)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r"
            UPDATE vendors SET
                subscription_plan_id = $2, subscription_status = 'active',
                next_billing_date = $3, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(vendor_id)
        .bind(plan.id)
        .bind(end)
        .execute(&mut *tx)
        .await?;

        let invoice = insert_invoice(
            &mut *tx,
            vendor_id,
            Some(subscription.id),
            plan.price_for(cycle),
            &plan.currency,
            now,
        )
        .await?;

        tx.commit().await?;

        Ok((
            SubscriptionInfo {
                subscription,
                plan: plan.clone(),
            },
            invoice,
        ))
    }

    /// Cancel a subscription and mark the vendor's billing state canceled.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no running subscription has this id.
    pub async fn cancel(
        &self,
        id: SubscriptionId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<PlatformSubscription, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sub = sqlx::query_as::<_, PlatformSubscription>(&format!(
            r"
            UPDATE platform_subscriptions SET
                status = 'canceled', canceled_at = $2, cancel_reason = $3, updated_at = NOW()
            WHERE id = $1 AND status NOT IN ('canceled', 'expired')
            RETURNING {SUBSCRIPTION_COLUMNS}
            "
        ))
        .bind(id)
        .bind(now)
        .bind(reason)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        sqlx::query(
            "UPDATE vendors SET subscription_status = 'canceled', updated_at = NOW() WHERE id = $1",
        )
        .bind(sub.vendor_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(sub)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_period_end() {
        let start = Utc.with_ymd_and_hms(2025, 1, 31, 12, 0, 0).single().expect("date");
        assert_eq!(
            period_end(start, BillingCycle::Monthly),
            Utc.with_ymd_and_hms(2025, 2, 28, 12, 0, 0).single().expect("date")
        );
        assert_eq!(
            period_end(start, BillingCycle::Yearly),
            Utc.with_ymd_and_hms(2026, 1, 31, 12, 0, 0).single().expect("date")
        );
    }
}
