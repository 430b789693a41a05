//! Dashboard reports.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use serde::Deserialize;

use univendor_core::VendorId;

use crate::db::analytics::PlatformStats;
use crate::error::Result;
use crate::middleware::{RequireRole, SuperAdminOnly, VendorOnly};
use crate::models::CurrentUser;
use crate::routes::own_vendor;
use crate::services::analytics::{AnalyticsService, CategoryShare, HourlySales, TopProduct};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/analytics/top-products", get(top_products))
        .route("/api/analytics/sales-by-hour", get(sales_by_hour))
        .route("/api/analytics/sales-by-category", get(sales_by_category))
        .route("/api/admin/stats", get(platform_stats))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    /// Super admins may report on any store.
    pub vendor_id: Option<VendorId>,
    pub limit: Option<i64>,
}

async fn report_vendor(state: &AppState, user: &CurrentUser, query: &ReportQuery) -> Result<VendorId> {
    match query.vendor_id {
        Some(id) if user.is_super_admin() => Ok(id),
        _ => Ok(own_vendor(state, user).await?.id),
    }
}

pub async fn top_products(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<Vec<TopProduct>>> {
    let vendor_id = report_vendor(&state, &user, &query).await?;
    Ok(Json(
        AnalyticsService::new(state.pool())
            .top_products(vendor_id, query.limit)
            .await?,
    ))
}

pub async fn sales_by_hour(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<Vec<HourlySales>>> {
    let vendor_id = report_vendor(&state, &user, &query).await?;
    Ok(Json(
        AnalyticsService::new(state.pool())
            .sales_by_hour(vendor_id)
            .await?,
    ))
}

pub async fn sales_by_category(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<Vec<CategoryShare>>> {
    let vendor_id = report_vendor(&state, &user, &query).await?;
    Ok(Json(
        AnalyticsService::new(state.pool())
            .sales_by_category(vendor_id)
            .await?,
    ))
}

pub async fn platform_stats(
    State(state): State<AppState>,
    _admin: RequireRole<SuperAdminOnly>,
) -> Result<Json<PlatformStats>> {
    Ok(Json(
        AnalyticsService::new(state.pool()).platform_stats().await?,
    ))
}
