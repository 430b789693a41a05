//! Catalog routes: categories, products and variants.
//!
//! Vendors manage their own catalog. Global categories are shared by every
//! store and only super admins may change them.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
};
use serde::Deserialize;
use tracing::instrument;

use univendor_core::{CategoryId, ProductId, VariantId, VendorId};

use crate::db::categories::{CategoryInput, CategoryRepository};
use crate::db::products::{ProductInput, ProductRepository, VariantInput};
use crate::error::{AppError, Result};
use crate::middleware::{OptionalAuth, RequireRole, SuperAdminOnly, VendorOnly};
use crate::models::CurrentUser;
use crate::models::catalog::{
    Category, CategoryWithCount, Product, ProductDetail, ProductVariant, validate_prices,
};
use crate::routes::{authorize_vendor, not_found, own_vendor};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/categories", get(list_categories).post(create_category))
        .route("/api/categories/global", get(global_categories))
        .route("/api/categories/all", get(all_categories))
        .route(
            "/api/categories/{id}",
            put(update_category).delete(delete_category),
        )
        .route("/api/categories/{id}/products", get(category_products))
        .route("/api/products", get(list_products).post(create_product))
        .route(
            "/api/products/{id}",
            get(show_product).put(update_product).delete(delete_product),
        )
        .route(
            "/api/products/{id}/variants",
            get(list_variants).post(create_variant),
        )
        .route(
            "/api/variants/{id}",
            put(update_variant).delete(delete_variant),
        )
}

// Categories

/// Load a category the user may change.
async fn editable_category(
    state: &AppState,
    user: &CurrentUser,
    id: CategoryId,
) -> Result<Category> {
    let category = CategoryRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| not_found("Category"))?;

    match category.vendor_id {
        Some(vendor_id) => authorize_vendor(state, user, vendor_id, "Category").await?,
        None if user.is_super_admin() => {}
        None => {
            return Err(AppError::Forbidden(
                "Only super admins can modify global categories".to_string(),
            ));
        }
    }
    Ok(category)
}

/// A category may be used by `vendor_id` when it is global or its own.
async fn check_category_usable(
    state: &AppState,
    category_id: Option<CategoryId>,
    vendor_id: Option<VendorId>,
) -> Result<()> {
    let Some(category_id) = category_id else {
        return Ok(());
    };
    let category = CategoryRepository::new(state.pool())
        .get(category_id)
        .await?
        .ok_or_else(|| not_found("Category"))?;

    if category.is_global || category.vendor_id == vendor_id {
        Ok(())
    } else {
        Err(not_found("Category"))
    }
}

fn validate_category(input: &CategoryInput) -> Result<()> {
    if input.name.trim().is_empty() {
        return Err(AppError::BadRequest("Category name is required".to_string()));
    }
    Ok(())
}

/// Own and global categories with the store's product counts.
pub async fn list_categories(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
) -> Result<Json<Vec<CategoryWithCount>>> {
    let vendor = own_vendor(&state, &user).await?;
    Ok(Json(
        CategoryRepository::new(state.pool())
            .list_for_vendor(vendor.id)
            .await?,
    ))
}

pub async fn global_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    Ok(Json(CategoryRepository::new(state.pool()).list_global().await?))
}

pub async fn all_categories(
    State(state): State<AppState>,
    _admin: RequireRole<SuperAdminOnly>,
) -> Result<Json<Vec<Category>>> {
    Ok(Json(CategoryRepository::new(state.pool()).list_all().await?))
}

/// Super admins create global categories; vendors create their own.
#[instrument(skip(state, user, body), fields(name = %body.name))]
pub async fn create_category(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
    Json(body): Json<CategoryInput>,
) -> Result<(StatusCode, Json<Category>)> {
    validate_category(&body)?;

    let vendor_id = if user.is_super_admin() {
        None
    } else {
        Some(own_vendor(&state, &user).await?.id)
    };
    check_category_usable(&state, body.parent_id, vendor_id).await?;

    let category = CategoryRepository::new(state.pool())
        .create(vendor_id, &body)
        .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

#[instrument(skip(state, user, body))]
pub async fn update_category(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
    Path(id): Path<CategoryId>,
    Json(body): Json<CategoryInput>,
) -> Result<Json<Category>> {
    validate_category(&body)?;
    let category = editable_category(&state, &user, id).await?;
    check_category_usable(&state, body.parent_id, category.vendor_id).await?;

    Ok(Json(
        CategoryRepository::new(state.pool())
            .update(id, &body)
            .await?,
    ))
}

#[instrument(skip(state, user))]
pub async fn delete_category(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
    Path(id): Path<CategoryId>,
) -> Result<StatusCode> {
    editable_category(&state, &user, id).await?;
    CategoryRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryProductsQuery {
    #[serde(default)]
    pub include_subcategories: bool,
}

/// The store's products in a category.
pub async fn category_products(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
    Path(id): Path<CategoryId>,
    Query(query): Query<CategoryProductsQuery>,
) -> Result<Json<Vec<Product>>> {
    let vendor = own_vendor(&state, &user).await?;
    check_category_usable(&state, Some(id), Some(vendor.id)).await?;

    Ok(Json(
        ProductRepository::new(state.pool())
            .list_by_category(id, Some(vendor.id), query.include_subcategories)
            .await?,
    ))
}

// Products

/// Load a product the user may change.
async fn owned_product(state: &AppState, user: &CurrentUser, id: ProductId) -> Result<Product> {
    let product = ProductRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| not_found("Product"))?;
    authorize_vendor(state, user, product.vendor_id, "Product").await?;
    Ok(product)
}

fn validate_product(input: &ProductInput) -> Result<()> {
    if input.name.trim().is_empty() {
        return Err(AppError::BadRequest("Product name is required".to_string()));
    }
    if input.stock_quantity < 0 {
        return Err(AppError::BadRequest("Stock cannot be negative".to_string()));
    }
    validate_prices(input.mrp, Some(input.selling_price)).map_err(AppError::BadRequest)
}

fn validate_variant(input: &VariantInput) -> Result<()> {
    if input.stock_quantity < 0 {
        return Err(AppError::BadRequest("Stock cannot be negative".to_string()));
    }
    validate_prices(input.mrp, input.selling_price).map_err(AppError::BadRequest)
}

pub async fn list_products(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
) -> Result<Json<Vec<Product>>> {
    let vendor = own_vendor(&state, &user).await?;
    Ok(Json(
        ProductRepository::new(state.pool())
            .list_by_vendor(vendor.id, false)
            .await?,
    ))
}

#[instrument(skip(state, user, body), fields(name = %body.name))]
pub async fn create_product(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
    Json(body): Json<ProductInput>,
) -> Result<(StatusCode, Json<Product>)> {
    validate_product(&body)?;
    let vendor = own_vendor(&state, &user).await?;
    check_category_usable(&state, body.category_id, Some(vendor.id)).await?;

    let product = ProductRepository::new(state.pool())
        .create(vendor.id, &body)
        .await?;
    tracing::info!(product_id = %product.id, vendor_id = %vendor.id, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// A product with its variants.
///
/// Inactive products are only visible to their store and super admins.
pub async fn show_product(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductDetail>> {
    let detail = ProductRepository::new(state.pool())
        .get_detail(id)
        .await?
        .ok_or_else(|| not_found("Product"))?;

    if !detail.product.is_active {
        let user = user.ok_or_else(|| not_found("Product"))?;
        authorize_vendor(&state, &user, detail.product.vendor_id, "Product").await?;
    }
    Ok(Json(detail))
}

#[instrument(skip(state, user, body))]
pub async fn update_product(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
    Path(id): Path<ProductId>,
    Json(body): Json<ProductInput>,
) -> Result<Json<Product>> {
    validate_product(&body)?;
    let product = owned_product(&state, &user, id).await?;
    check_category_usable(&state, body.category_id, Some(product.vendor_id)).await?;

    Ok(Json(
        ProductRepository::new(state.pool())
            .update(id, &body)
            .await?,
    ))
}

#[instrument(skip(state, user))]
pub async fn delete_product(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    owned_product(&state, &user, id).await?;
    ProductRepository::new(state.pool()).delete(id).await?;
    tracing::info!(product_id = %id, "Product deleted");
    Ok(StatusCode::NO_CONTENT)
}

// Variants

pub async fn list_variants(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Vec<ProductVariant>>> {
    let products = ProductRepository::new(state.pool());
    products.get(id).await?.ok_or_else(|| not_found("Product"))?;
    Ok(Json(products.list_variants(id).await?))
}

#[instrument(skip(state, user, body))]
pub async fn create_variant(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
    Path(id): Path<ProductId>,
    Json(body): Json<VariantInput>,
) -> Result<(StatusCode, Json<ProductVariant>)> {
    validate_variant(&body)?;
    owned_product(&state, &user, id).await?;

    let variant = ProductRepository::new(state.pool())
        .create_variant(id, &body)
        .await?;
    Ok((StatusCode::CREATED, Json(variant)))
}

/// Load a variant whose product the user may change.
async fn owned_variant(
    state: &AppState,
    user: &CurrentUser,
    id: VariantId,
) -> Result<ProductVariant> {
    let variant = ProductRepository::new(state.pool())
        .get_variant(id)
        .await?
        .ok_or_else(|| not_found("Variant"))?;
    owned_product(state, user, variant.product_id)
        .await
        .map_err(|e| match e {
            AppError::NotFound(_) => not_found("Variant"),
            other => other,
        })?;
    Ok(variant)
}

#[instrument(skip(state, user, body))]
pub async fn update_variant(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
    Path(id): Path<VariantId>,
    Json(body): Json<VariantInput>,
) -> Result<Json<ProductVariant>> {
    validate_variant(&body)?;
    owned_variant(&state, &user, id).await?;

    Ok(Json(
        ProductRepository::new(state.pool())
            .update_variant(id, &body)
            .await?,
    ))
}

#[instrument(skip(state, user))]
pub async fn delete_variant(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
    Path(id): Path<VariantId>,
) -> Result<StatusCode> {
    owned_variant(&state, &user, id).await?;
    ProductRepository::new(state.pool()).delete_variant(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn product() -> ProductInput {
        ProductInput {
            category_id: None,
            name: "Linen shirt".to_string(),
            description: None,
            sku: Some("LS-01".to_string()),
            mrp: Some(Decimal::new(4999, 2)),
            selling_price: Decimal::new(3999, 2),
            purchase_price: None,
            stock_quantity: 10,
            featured_image_url: None,
            is_active: true,
        }
    }

    #[test]
    fn test_validate_product() {
        assert!(validate_product(&product()).is_ok());

        let mut over_mrp = product();
        over_mrp.selling_price = Decimal::new(5999, 2);
        assert!(matches!(
            validate_product(&over_mrp),
            Err(AppError::BadRequest(msg)) if msg == "Selling price cannot exceed MRP"
        ));

        let mut unnamed = product();
        unnamed.name = String::new();
        assert!(validate_product(&unnamed).is_err());
    }

    #[test]
    fn test_validate_variant() {
        let variant = VariantInput {
            color: "Red".to_string(),
            size: "XL".to_string(),
            stock_quantity: -1,
            ..VariantInput::default()
        };
        assert!(validate_variant(&variant).is_err());
    }
}
