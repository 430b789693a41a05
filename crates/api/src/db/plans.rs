//! Subscription plan repository.

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use sqlx::types::Json;

use univendor_core::PlanId;

use super::RepositoryError;
use crate::models::vendor::SubscriptionPlan;

const PLAN_COLUMNS: &str = "id, name, description, price, yearly_price, currency, features, \
                            product_limit, storage_limit, custom_domain_limit, support_level, \
                            trial_days, is_active, is_default, created_at, updated_at";

/// Fields for creating or fully replacing a plan.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanInput {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub yearly_price: Option<Decimal>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub features: Vec<String>,
    pub product_limit: Option<i32>,
    pub storage_limit: Option<i32>,
    pub custom_domain_limit: Option<i32>,
    pub support_level: Option<String>,
    #[serde(default)]
    pub trial_days: i32,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
    #[serde(default)]
    pub is_default: bool,
}

fn default_currency() -> String {
    "USD".to_string()
}

const fn active_by_default() -> bool {
    true
}

pub struct PlanRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PlanRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List plans, cheapest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, active_only: bool) -> Result<Vec<SubscriptionPlan>, RepositoryError> {
        let plans = sqlx::query_as::<_, SubscriptionPlan>(&format!(
            "SELECT {PLAN_COLUMNS} FROM subscription_plans \
             WHERE ($1 = FALSE OR is_active) ORDER BY price, id"
        ))
        .bind(active_only)
        .fetch_all(self.pool)
        .await?;

        Ok(plans)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: PlanId) -> Result<Option<SubscriptionPlan>, RepositoryError> {
        let plan = sqlx::query_as::<_, SubscriptionPlan>(&format!(
            "SELECT {PLAN_COLUMNS} FROM subscription_plans WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(plan)
    }

    /// The plan new vendors are put on, if one is marked default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_default(&self) -> Result<Option<SubscriptionPlan>, RepositoryError> {
        let plan = sqlx::query_as::<_, SubscriptionPlan>(&format!(
            "SELECT {PLAN_COLUMNS} FROM subscription_plans WHERE is_default AND is_active LIMIT 1"
        ))
        .fetch_optional(self.pool)
        .await?;

        Ok(plan)
    }

    /// Create a plan. When it is the default, every other plan loses the flag
    /// in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken.
    pub async fn create(&self, input: &PlanInput) -> Result<SubscriptionPlan, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if input.is_default {
            sqlx::query("UPDATE subscription_plans SET is_default = FALSE, updated_at = NOW() WHERE is_default")
                .execute(&mut *tx)
                .await?;
        }

        let plan = sqlx::query_as::<_, SubscriptionPlan>(&format!(
            r"
            INSERT INTO subscription_plans (
                name, description, price, yearly_price, currency, features,
                product_limit, storage_limit, custom_domain_limit, support_level,
                trial_days, is_active, is_default
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {PLAN_COLUMNS}
            "
        ))
        .bind(&input.name)
        .bind(input.description.as_deref())
        .bind(input.price)
        .bind(input.yearly_price)
        .bind(&input.currency)
        .bind(Json(&input.features))
        .bind(input.product_limit)
        .bind(input.storage_limit)
        .bind(input.custom_domain_limit)
        .bind(input.support_level.as_deref())
        .bind(input.trial_days)
        .bind(input.is_active)
        .bind(input.is_default)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::unique_violation(e, "plan name already exists"))?;

        tx.commit().await?;
        Ok(plan)
    }

    /// Replace a plan's fields, moving the default flag if requested.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the plan doesn't exist.
    pub async fn update(
        &self,
        id: PlanId,
        input: &PlanInput,
    ) -> Result<SubscriptionPlan, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if input.is_default {
            sqlx::query(
                "UPDATE subscription_plans SET is_default = FALSE, updated_at = NOW() \
                 WHERE is_default AND id <> $1",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        let plan = sqlx::query_as::<_, SubscriptionPlan>(&format!(
            r"
            UPDATE subscription_plans SET
                name = $2, description = $3, price = $4, yearly_price = $5,
                currency = $6, features = $7, product_limit = $8, storage_limit = $9,
                custom_domain_limit = $10, support_level = $11, trial_days = $12,
                is_active = $13, is_default = $14, updated_at = NOW()
            WHERE id = $1
            RETURNING {PLAN_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&input.name)
        .bind(input.description.as_deref())
        .bind(input.price)
        .bind(input.yearly_price)
        .bind(&input.currency)
        .bind(Json(&input.features))
        .bind(input.product_limit)
        .bind(input.storage_limit)
        .bind(input.custom_domain_limit)
        .bind(input.support_level.as_deref())
        .bind(input.trial_days)
        .bind(input.is_active)
        .bind(input.is_default)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| RepositoryError::unique_violation(e, "plan name already exists"))?
        .ok_or(RepositoryError::NotFound)?;

        tx.commit().await?;
        Ok(plan)
    }

    /// Delete a plan that no vendor or subscription references.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the plan is in use and
    /// `RepositoryError::NotFound` if it doesn't exist.
    pub async fn delete(&self, id: PlanId) -> Result<(), RepositoryError> {
        let (in_use,): (bool,) = sqlx::query_as(
            r"
            SELECT EXISTS (SELECT 1 FROM vendors WHERE subscription_plan_id = $1)
                OR EXISTS (SELECT 1 FROM platform_subscriptions WHERE plan_id = $1)
            ",
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;

        if in_use {
            return Err(RepositoryError::Conflict(
                "plan is in use by one or more vendors".to_owned(),
            ));
        }

        let result = sqlx::query("DELETE FROM subscription_plans WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| {
                RepositoryError::foreign_key_violation(e, "plan is in use by one or more vendors")
            })?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
