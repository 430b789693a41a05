//! Vendor store management.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use univendor_core::{UserRole, VendorId, VendorStatus};

use crate::db::plans::PlanRepository;
use crate::db::vendors::{VendorProfile, VendorRepository};
use crate::error::{AppError, Result};
use crate::middleware::{RequireAuth, RequireRole, SuperAdminOnly, VendorOnly, set_current_user};
use crate::models::CurrentUser;
use crate::models::vendor::Vendor;
use crate::routes::{authorize_vendor, not_found, own_vendor};
use crate::state::AppState;

/// Length of a new store's free trial.
const TRIAL_DAYS: i64 = 14;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/vendors", get(list).post(create))
        .route("/api/vendors/me", get(me))
        .route("/api/vendors/{id}", get(show).patch(update))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVendorRequest {
    pub store_name: String,
    #[serde(flatten)]
    pub profile: VendorProfile,
}

/// Open a store for the signed-in user, who becomes a vendor.
#[instrument(skip(state, session, user, body), fields(store_name = %body.store_name))]
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Json(body): Json<CreateVendorRequest>,
) -> Result<(StatusCode, Json<Vendor>)> {
    let store_name = body.store_name.trim();
    if store_name.is_empty() {
        return Err(AppError::BadRequest("Store name is required".to_string()));
    }

    let default_plan = PlanRepository::new(state.pool()).get_default().await?;
    let trial_ends_at = Utc::now() + Duration::days(TRIAL_DAYS);

    let vendor = VendorRepository::new(state.pool())
        .create(
            user.id,
            store_name,
            &body.profile,
            default_plan.map(|p| p.id),
            trial_ends_at,
        )
        .await?;

    if user.role == UserRole::Customer {
        let promoted = CurrentUser {
            role: UserRole::Vendor,
            ..user
        };
        set_current_user(&session, &promoted).await?;
    }

    tracing::info!(vendor_id = %vendor.id, "Vendor created");
    Ok((StatusCode::CREATED, Json(vendor)))
}

pub async fn list(
    State(state): State<AppState>,
    _admin: RequireRole<SuperAdminOnly>,
) -> Result<Json<Vec<Vendor>>> {
    Ok(Json(VendorRepository::new(state.pool()).list().await?))
}

pub async fn me(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
) -> Result<Json<Vendor>> {
    Ok(Json(own_vendor(&state, &user).await?))
}

pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<VendorId>,
) -> Result<Json<Vendor>> {
    authorize_vendor(&state, &user, id, "Vendor").await?;
    VendorRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("Vendor"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVendorRequest {
    #[serde(flatten)]
    pub profile: VendorProfile,
    /// Honoured for super admins only.
    pub status: Option<VendorStatus>,
}

/// Edit a store profile. Only super admins may change `status`.
#[instrument(skip(state, user, body))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<VendorId>,
    Json(body): Json<UpdateVendorRequest>,
) -> Result<Json<Vendor>> {
    authorize_vendor(&state, &user, id, "Vendor").await?;
    if body.status.is_some() && !user.is_super_admin() {
        return Err(AppError::Forbidden("Insufficient permissions".to_string()));
    }

    let vendors = VendorRepository::new(state.pool());
    let mut vendor = vendors.update_profile(id, &body.profile).await?;
    if let Some(status) = body.status {
        vendor = vendors.set_status(id, status).await?;
        tracing::info!(vendor_id = %id, status = %status, "Vendor status changed");
    }

    state.storefronts().invalidate_all();
    Ok(Json(vendor))
}
