//! Vendors, subscription plans and platform subscriptions.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::types::Json;

use univendor_core::{
    BillingCycle, PlanId, SubscriptionId, SubscriptionStatus, UserId, VendorId, VendorStatus,
};

/// A store on the platform, owned by exactly one user.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Vendor {
    pub id: VendorId,
    pub user_id: UserId,
    pub store_name: String,
    pub description: Option<String>,
    pub logo_url: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
    pub status: VendorStatus,
    pub subscription_plan_id: Option<PlanId>,
    pub subscription_status: SubscriptionStatus,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub next_billing_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A platform subscription plan offered to vendors.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionPlan {
    pub id: PlanId,
    pub name: String,
    pub description: Option<String>,
    /// Monthly price.
    pub price: Decimal,
    pub yearly_price: Option<Decimal>,
    pub currency: String,
    pub features: Json<Vec<String>>,
    pub product_limit: Option<i32>,
    pub storage_limit: Option<i32>,
    pub custom_domain_limit: Option<i32>,
    pub support_level: Option<String>,
    pub trial_days: i32,
    pub is_active: bool,
    /// At most one plan is the default; new vendors are put on it.
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionPlan {
    /// Price of one billing period. Yearly falls back to twelve months.
    #[must_use]
    pub fn price_for(&self, cycle: BillingCycle) -> Decimal {
        match cycle {
            BillingCycle::Monthly => self.price,
            BillingCycle::Yearly => self
                .yearly_price
                .unwrap_or_else(|| self.price * Decimal::from(12)),
        }
    }
}

/// A vendor's subscription to a plan.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PlatformSubscription {
    pub id: SubscriptionId,
    pub vendor_id: VendorId,
    pub plan_id: PlanId,
    pub status: SubscriptionStatus,
    pub billing_cycle: BillingCycle,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A subscription together with its plan.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionInfo {
    #[serde(flatten)]
    pub subscription: PlatformSubscription,
    pub plan: SubscriptionPlan,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(price: i64, yearly: Option<i64>) -> SubscriptionPlan {
        SubscriptionPlan {
            id: PlanId::new(1),
            name: "Pro".to_string(),
            description: None,
            price: Decimal::from(price),
            yearly_price: yearly.map(Decimal::from),
            currency: "USD".to_string(),
            features: Json(vec![]),
            product_limit: None,
            storage_limit: None,
            custom_domain_limit: None,
            support_level: None,
            trial_days: 14,
            is_active: true,
            is_default: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_price_for_cycle() {
        let p = plan(80, Some(800));
        assert_eq!(p.price_for(BillingCycle::Monthly), Decimal::from(80));
        assert_eq!(p.price_for(BillingCycle::Yearly), Decimal::from(800));
        assert_eq!(
            plan(10, None).price_for(BillingCycle::Yearly),
            Decimal::from(120)
        );
    }
}
