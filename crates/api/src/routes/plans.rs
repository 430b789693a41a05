//! Subscription plans and vendor subscriptions.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use univendor_core::{BillingCycle, PlanId};

use crate::db::plans::{PlanInput, PlanRepository};
use crate::db::subscriptions::SubscriptionRepository;
use crate::error::{AppError, Result};
use crate::middleware::{RequireRole, SuperAdminOnly, VendorOnly};
use crate::models::payment::Invoice;
use crate::models::vendor::{SubscriptionInfo, SubscriptionPlan};
use crate::routes::{not_found, own_vendor};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/plans", get(list_plans).post(create_plan))
        .route("/api/plans/{id}", put(update_plan).delete(delete_plan))
        .route("/api/subscription", get(current_subscription).post(subscribe))
        .route("/api/subscription/cancel", post(cancel_subscription))
}

fn validate_plan(input: &PlanInput) -> Result<()> {
    if input.name.trim().is_empty() {
        return Err(AppError::BadRequest("Plan name is required".to_string()));
    }
    if input.price.is_sign_negative() || input.yearly_price.is_some_and(|p| p.is_sign_negative()) {
        return Err(AppError::BadRequest("Prices cannot be negative".to_string()));
    }
    if input.trial_days < 0 {
        return Err(AppError::BadRequest("Trial days cannot be negative".to_string()));
    }
    Ok(())
}

/// Active plans, cheapest first.
pub async fn list_plans(State(state): State<AppState>) -> Result<Json<Vec<SubscriptionPlan>>> {
    Ok(Json(PlanRepository::new(state.pool()).list(true).await?))
}

#[instrument(skip(state, _admin, body), fields(name = %body.name))]
pub async fn create_plan(
    State(state): State<AppState>,
    _admin: RequireRole<SuperAdminOnly>,
    Json(body): Json<PlanInput>,
) -> Result<(StatusCode, Json<SubscriptionPlan>)> {
    validate_plan(&body)?;
    let plan = PlanRepository::new(state.pool()).create(&body).await?;
    tracing::info!(plan_id = %plan.id, "Plan created");
    Ok((StatusCode::CREATED, Json(plan)))
}

#[instrument(skip(state, _admin, body))]
pub async fn update_plan(
    State(state): State<AppState>,
    _admin: RequireRole<SuperAdminOnly>,
    Path(id): Path<PlanId>,
    Json(body): Json<PlanInput>,
) -> Result<Json<SubscriptionPlan>> {
    validate_plan(&body)?;
    Ok(Json(PlanRepository::new(state.pool()).update(id, &body).await?))
}

#[instrument(skip(state, _admin))]
pub async fn delete_plan(
    State(state): State<AppState>,
    _admin: RequireRole<SuperAdminOnly>,
    Path(id): Path<PlanId>,
) -> Result<StatusCode> {
    PlanRepository::new(state.pool()).delete(id).await?;
    tracing::info!(plan_id = %id, "Plan deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// The vendor's running subscription with its plan, or `null`.
#[instrument(skip(state, user))]
pub async fn current_subscription(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
) -> Result<Json<Option<SubscriptionInfo>>> {
    let vendor = own_vendor(&state, &user).await?;

    let Some(subscription) = SubscriptionRepository::new(state.pool())
        .current(vendor.id)
        .await?
    else {
        return Ok(Json(None));
    };

    let plan = PlanRepository::new(state.pool())
        .get(subscription.plan_id)
        .await?
        .ok_or_else(|| not_found("Plan"))?;

    Ok(Json(Some(SubscriptionInfo { subscription, plan })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    pub plan_id: PlanId,
    #[serde(default = "monthly")]
    pub billing_cycle: BillingCycle,
}

const fn monthly() -> BillingCycle {
    BillingCycle::Monthly
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeResponse {
    pub subscription: SubscriptionInfo,
    pub invoice: Invoice,
}

/// Start a subscription; any running one is replaced and the first
/// period is invoiced.
#[instrument(skip(state, user))]
pub async fn subscribe(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
    Json(body): Json<SubscribeRequest>,
) -> Result<Json<SubscribeResponse>> {
    let vendor = own_vendor(&state, &user).await?;
    let plan = PlanRepository::new(state.pool())
        .get(body.plan_id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| not_found("Plan"))?;

    let (subscription, invoice) = SubscriptionRepository::new(state.pool())
        .subscribe(vendor.id, &plan, body.billing_cycle, Utc::now())
        .await?;

    tracing::info!(
        vendor_id = %vendor.id,
        plan_id = %plan.id,
        cycle = %body.billing_cycle,
        invoice = %invoice.invoice_number,
        "Vendor subscribed"
    );
    Ok(Json(SubscribeResponse {
        subscription,
        invoice,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: String,
}

#[instrument(skip(state, user, body))]
pub async fn cancel_subscription(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
    Json(body): Json<CancelRequest>,
) -> Result<Json<SubscriptionInfo>> {
    let vendor = own_vendor(&state, &user).await?;
    let subs = SubscriptionRepository::new(state.pool());

    let current = subs
        .current(vendor.id)
        .await?
        .ok_or_else(|| not_found("Subscription"))?;

    let reason = body.reason.trim();
    let reason = if reason.is_empty() { "No reason given" } else { reason };
    let subscription = subs.cancel(current.id, reason, Utc::now()).await?;

    let plan = PlanRepository::new(state.pool())
        .get(subscription.plan_id)
        .await?
        .ok_or_else(|| not_found("Plan"))?;

    tracing::info!(vendor_id = %vendor.id, subscription_id = %subscription.id, "Subscription canceled");
    Ok(Json(SubscriptionInfo { subscription, plan }))
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn input() -> PlanInput {
        PlanInput {
            name: "Starter".to_string(),
            description: None,
            price: Decimal::new(2900, 2),
            yearly_price: None,
            currency: "USD".to_string(),
            features: vec![],
            product_limit: Some(100),
            storage_limit: None,
            custom_domain_limit: Some(1),
            support_level: None,
            trial_days: 14,
            is_active: true,
            is_default: false,
        }
    }

    #[test]
    fn test_validate_plan() {
        assert!(validate_plan(&input()).is_ok());

        let mut blank = input();
        blank.name = " ".to_string();
        assert!(validate_plan(&blank).is_err());

        let mut negative = input();
        negative.price = Decimal::new(-1, 0);
        assert!(validate_plan(&negative).is_err());
    }
}
