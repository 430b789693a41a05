//! Storefront domain management.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use univendor_core::{DomainId, DomainStatus, DomainType, VendorId};

use crate::db::domains::DomainRepository;
use crate::error::{AppError, Result};
use crate::middleware::{RequireRole, SuperAdminOnly, VendorOnly};
use crate::models::CurrentUser;
use crate::models::domain::Domain;
use crate::routes::{authorize_vendor, not_found, own_vendor};
use crate::services::domains::{DomainPatch, DomainService};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/domains", get(list).post(create))
        .route("/api/domains/check-ssl", post(check_ssl))
        .route(
            "/api/domains/{id}",
            get(show).patch(update).delete(delete),
        )
        .route("/api/domains/{id}/verify", post(verify))
        .route("/api/domains/{id}/regenerate-token", post(regenerate_token))
}

fn service(state: &AppState) -> DomainService<'_> {
    let config = state.config();
    DomainService::new(
        state.pool(),
        state.verifier(),
        &config.platform_domain,
        &config.cname_target,
    )
}

/// Load a domain the user may manage.
async fn owned_domain(state: &AppState, user: &CurrentUser, id: DomainId) -> Result<Domain> {
    let domain = DomainRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| not_found("Domain"))?;
    authorize_vendor(state, user, domain.vendor_id, "Domain").await?;
    Ok(domain)
}

/// Own domains, or every domain for super admins.
pub async fn list(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
) -> Result<Json<Vec<Domain>>> {
    let domains = DomainRepository::new(state.pool());
    if user.is_super_admin() {
        return Ok(Json(domains.list_all().await?));
    }
    let vendor = own_vendor(&state, &user).await?;
    Ok(Json(domains.list_by_vendor(vendor.id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDomainRequest {
    pub name: String,
    #[serde(rename = "type", default = "custom")]
    pub domain_type: DomainType,
    #[serde(default)]
    pub is_primary: bool,
    /// Super admins may register a domain for another store.
    pub vendor_id: Option<VendorId>,
}

const fn custom() -> DomainType {
    DomainType::Custom
}

#[instrument(skip(state, user, body), fields(name = %body.name))]
pub async fn create(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
    Json(body): Json<CreateDomainRequest>,
) -> Result<(StatusCode, Json<Domain>)> {
    let vendor_id = match body.vendor_id {
        Some(id) if user.is_super_admin() => id,
        _ => own_vendor(&state, &user).await?.id,
    };

    let domain = service(&state)
        .create(vendor_id, &body.name, body.domain_type, body.is_primary, Utc::now())
        .await?;

    state.storefronts().invalidate_all();
    Ok((StatusCode::CREATED, Json(domain)))
}

pub async fn show(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
    Path(id): Path<DomainId>,
) -> Result<Json<Domain>> {
    Ok(Json(owned_domain(&state, &user, id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDomainRequest {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub domain_type: Option<DomainType>,
    pub is_primary: Option<bool>,
    pub status: Option<DomainStatus>,
}

#[instrument(skip(state, user, body))]
pub async fn update(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
    Path(id): Path<DomainId>,
    Json(body): Json<UpdateDomainRequest>,
) -> Result<Json<Domain>> {
    if body.status.is_some() && !user.is_super_admin() {
        return Err(AppError::Forbidden("Insufficient permissions".to_string()));
    }
    let domain = owned_domain(&state, &user, id).await?;

    let patch = DomainPatch {
        name: body.name,
        domain_type: body.domain_type,
        is_primary: body.is_primary,
        status: body.status,
    };
    let domain = service(&state).update(domain, patch).await?;

    state.storefronts().invalidate_all();
    Ok(Json(domain))
}

#[instrument(skip(state, user))]
pub async fn delete(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
    Path(id): Path<DomainId>,
) -> Result<StatusCode> {
    owned_domain(&state, &user, id).await?;
    let name = DomainRepository::new(state.pool()).delete(id).await?;
    tracing::info!(domain = %name, "Domain deleted");

    state.storefronts().invalidate_all();
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, user))]
pub async fn verify(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
    Path(id): Path<DomainId>,
) -> Result<Json<Domain>> {
    let domain = owned_domain(&state, &user, id).await?;
    let result = service(&state).verify(domain, Utc::now()).await;

    // A failed check is still recorded on the domain.
    state.storefronts().invalidate_all();
    Ok(Json(result?))
}

#[instrument(skip(state, user))]
pub async fn regenerate_token(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
    Path(id): Path<DomainId>,
) -> Result<Json<Domain>> {
    let domain = owned_domain(&state, &user, id).await?;
    let domain = service(&state).regenerate_token(domain, Utc::now()).await?;
    Ok(Json(domain))
}

#[derive(Debug, Serialize)]
pub struct SslCheckResponse {
    pub updated: u64,
}

#[instrument(skip(state, _admin))]
pub async fn check_ssl(
    State(state): State<AppState>,
    _admin: RequireRole<SuperAdminOnly>,
) -> Result<Json<SslCheckResponse>> {
    let updated = service(&state).check_ssl(Utc::now()).await?;
    Ok(Json(SslCheckResponse { updated }))
}
