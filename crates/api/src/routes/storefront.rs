//! Public storefront reads, scoped to the vendor behind the request host.

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use univendor_core::VendorId;

use crate::db::categories::CategoryRepository;
use crate::db::products::ProductRepository;
use crate::error::Result;
use crate::middleware::Storefront;
use crate::models::catalog::{CategoryWithCount, Product};
use crate::models::vendor::Vendor;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/storefront", get(profile))
        .route("/api/storefront/products", get(products))
        .route("/api/storefront/categories", get(categories))
}

/// The shopper-facing part of a vendor record.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreProfile {
    pub id: VendorId,
    pub store_name: String,
    pub description: Option<String>,
    pub logo_url: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
}

impl From<Vendor> for StoreProfile {
    fn from(vendor: Vendor) -> Self {
        Self {
            id: vendor.id,
            store_name: vendor.store_name,
            description: vendor.description,
            logo_url: vendor.logo_url,
            contact_email: vendor.contact_email,
            contact_phone: vendor.contact_phone,
            address: vendor.address,
        }
    }
}

pub async fn profile(Storefront(vendor): Storefront) -> Json<StoreProfile> {
    Json(vendor.into())
}

pub async fn products(
    State(state): State<AppState>,
    Storefront(vendor): Storefront,
) -> Result<Json<Vec<Product>>> {
    Ok(Json(
        ProductRepository::new(state.pool())
            .list_by_vendor(vendor.id, true)
            .await?,
    ))
}

pub async fn categories(
    State(state): State<AppState>,
    Storefront(vendor): Storefront,
) -> Result<Json<Vec<CategoryWithCount>>> {
    Ok(Json(
        CategoryRepository::new(state.pool())
            .list_for_vendor(vendor.id)
            .await?,
    ))
}
