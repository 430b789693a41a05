//! Product and variant repository.

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;

use univendor_core::{CategoryId, ProductId, VariantId, VendorId};

use super::RepositoryError;
use crate::models::catalog::{Product, ProductDetail, ProductVariant};

const PRODUCT_COLUMNS: &str = "id, vendor_id, category_id, name, description, sku, mrp, \
                               selling_price, purchase_price, stock_quantity, \
                               featured_image_url, is_active, created_at, updated_at";

const VARIANT_COLUMNS: &str = "id, product_id, color, size, sku, mrp, selling_price, \
                               stock_quantity, image_url, created_at, updated_at";

/// Product fields for create and full update.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub category_id: Option<CategoryId>,
    pub name: String,
    pub description: Option<String>,
    pub sku: Option<String>,
    pub mrp: Option<Decimal>,
    pub selling_price: Decimal,
    pub purchase_price: Option<Decimal>,
    #[serde(default)]
    pub stock_quantity: i32,
    pub featured_image_url: Option<String>,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
}

/// Variant fields for create and full update.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantInput {
    pub color: String,
    pub size: String,
    pub sku: Option<String>,
    pub mrp: Option<Decimal>,
    pub selling_price: Option<Decimal>,
    #[serde(default)]
    pub stock_quantity: i32,
    pub image_url: Option<String>,
}

const fn active_by_default() -> bool {
    true
}

pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(product)
    }

    /// A product together with its variants.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_detail(&self, id: ProductId) -> Result<Option<ProductDetail>, RepositoryError> {
        let Some(product) = self.get(id).await? else {
            return Ok(None);
        };
        let variants = self.list_variants(id).await?;
        Ok(Some(ProductDetail { product, variants }))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_vendor(
        &self,
        vendor_id: VendorId,
        active_only: bool,
    ) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE vendor_id = $1 AND ($2 = FALSE OR is_active) \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(vendor_id)
        .bind(active_only)
        .fetch_all(self.pool)
        .await?;

        Ok(products)
    }

    /// Products filed under `category_id`, optionally also those in its
    /// direct subcategories.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_category(
        &self,
        category_id: CategoryId,
        vendor_id: Option<VendorId>,
        include_subcategories: bool,
    ) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as::<_, Product>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS} FROM products
            WHERE (
                category_id = $1
                OR ($2 AND category_id IN (
                    SELECT id FROM product_categories WHERE parent_id = $1
                ))
            )
            AND ($3::INTEGER IS NULL OR vendor_id = $3)
            ORDER BY name, id
            "
        ))
        .bind(category_id)
        .bind(include_subcategories)
        .bind(vendor_id)
        .fetch_all(self.pool)
        .await?;

        Ok(products)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        vendor_id: VendorId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            r"
            INSERT INTO products (
                vendor_id, category_id, name, description, sku, mrp, selling_price,
                purchase_price, stock_quantity, featured_image_url, is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(vendor_id)
        .bind(input.category_id)
        .bind(&input.name)
        .bind(input.description.as_deref())
        .bind(input.sku.as_deref())
        .bind(input.mrp)
        .bind(input.selling_price)
        .bind(input.purchase_price)
        .bind(input.stock_quantity)
        .bind(input.featured_image_url.as_deref())
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::foreign_key_violation(e, "Category does not exist"))?;

        Ok(product)
    }

    /// Replace a product's fields and bump `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn update(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            r"
            UPDATE products SET
                category_id = $2, name = $3, description = $4, sku = $5, mrp = $6,
                selling_price = $7, purchase_price = $8, stock_quantity = $9,
                featured_image_url = $10, is_active = $11, updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(input.category_id)
        .bind(&input.name)
        .bind(input.description.as_deref())
        .bind(input.sku.as_deref())
        .bind(input.mrp)
        .bind(input.selling_price)
        .bind(input.purchase_price)
        .bind(input.stock_quantity)
        .bind(input.featured_image_url.as_deref())
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::foreign_key_violation(e, "Category does not exist"))?
        .ok_or(RepositoryError::NotFound)?;

        Ok(product)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    // Variants

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_variants(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<ProductVariant>, RepositoryError> {
        let variants = sqlx::query_as::<_, ProductVariant>(&format!(
            "SELECT {VARIANT_COLUMNS} FROM product_variants WHERE product_id = $1 \
             ORDER BY color, size, id"
        ))
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;

        Ok(variants)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_variant(&self, id: VariantId) -> Result<Option<ProductVariant>, RepositoryError> {
        let variant = sqlx::query_as::<_, ProductVariant>(&format!(
            "SELECT {VARIANT_COLUMNS} FROM product_variants WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(variant)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the product already has a
    /// variant with this color and size.
    pub async fn create_variant(
        &self,
        product_id: ProductId,
        input: &VariantInput,
    ) -> Result<ProductVariant, RepositoryError> {
        let variant = sqlx::query_as::<_, ProductVariant>(&format!(
            r"
            INSERT INTO product_variants (
                product_id, color, size, sku, mrp, selling_price, stock_quantity, image_url
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {VARIANT_COLUMNS}
            "
        ))
        .bind(product_id)
        .bind(&input.color)
        .bind(&input.size)
        .bind(input.sku.as_deref())
        .bind(input.mrp)
        .bind(input.selling_price)
        .bind(input.stock_quantity)
        .bind(input.image_url.as_deref())
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            RepositoryError::unique_violation(e, "A variant with this color and size already exists")
        })?;

        Ok(variant)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the variant doesn't exist and
    /// `RepositoryError::Conflict` on a color/size collision.
    pub async fn update_variant(
        &self,
        id: VariantId,
        input: &VariantInput,
    ) -> Result<ProductVariant, RepositoryError> {
        let variant = sqlx::query_as::<_, ProductVariant>(&format!(
            r"
            UPDATE product_variants SET
                color = $2, size = $3, sku = $4, mrp = $5, selling_price = $6,
                stock_quantity = $7, image_url = $8, updated_at = NOW()
            WHERE id = $1
            RETURNING {VARIANT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&input.color)
        .bind(&input.size)
        .bind(input.sku.as_deref())
        .bind(input.mrp)
        .bind(input.selling_price)
        .bind(input.stock_quantity)
        .bind(input.image_url.as_deref())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| {
            RepositoryError::unique_violation(e, "A variant with this color and size already exists")
        })?
        .ok_or(RepositoryError::NotFound)?;

        Ok(variant)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the variant doesn't exist.
    pub async fn delete_variant(&self, id: VariantId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM product_variants WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
