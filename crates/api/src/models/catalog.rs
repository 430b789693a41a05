//! Product catalog: categories, products and color/size variants.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use univendor_core::{CategoryId, ProductId, VariantId, VendorId};

/// A product category, either vendor-specific or global.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    /// `None` for global categories.
    pub vendor_id: Option<VendorId>,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub parent_id: Option<CategoryId>,
    /// Depth in the tree; roots are level 0.
    pub level: i32,
    pub is_global: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A category with the number of a vendor's products filed under it.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CategoryWithCount {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub category: Category,
    pub product_count: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub vendor_id: VendorId,
    pub category_id: Option<CategoryId>,
    pub name: String,
    pub description: Option<String>,
    pub sku: Option<String>,
    /// List price (maximum retail price).
    pub mrp: Option<Decimal>,
    pub selling_price: Decimal,
    pub purchase_price: Option<Decimal>,
    pub stock_quantity: i32,
    pub featured_image_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A color/size variant of a product.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProductVariant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub color: String,
    pub size: String,
    pub sku: Option<String>,
    pub mrp: Option<Decimal>,
    /// Overrides the product price when set.
    pub selling_price: Option<Decimal>,
    pub stock_quantity: i32,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductVariant {
    /// Human-readable label such as `Red / XL`.
    #[must_use]
    pub fn label(&self) -> String {
        match (self.color.is_empty(), self.size.is_empty()) {
            (false, false) => format!("{} / {}", self.color, self.size),
            (false, true) => self.color.clone(),
            (true, false) => self.size.clone(),
            (true, true) => "Default".to_string(),
        }
    }
}

/// A product with its variants, as served on product pages.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub variants: Vec<ProductVariant>,
}

/// Check the price relationship shared by products and variants.
///
/// # Errors
///
/// Returns a message when a price is negative or the selling price exceeds
/// the list price.
pub fn validate_prices(mrp: Option<Decimal>, selling_price: Option<Decimal>) -> Result<(), String> {
    if mrp.is_some_and(|m| m.is_sign_negative()) || selling_price.is_some_and(|s| s.is_sign_negative())
    {
        return Err("Prices cannot be negative".to_string());
    }
    if let (Some(mrp), Some(selling)) = (mrp, selling_price)
        && selling > mrp
    {
        return Err("Selling price cannot exceed MRP".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(color: &str, size: &str) -> ProductVariant {
        ProductVariant {
            id: VariantId::new(1),
            product_id: ProductId::new(1),
            color: color.to_string(),
            size: size.to_string(),
            sku: None,
            mrp: None,
            selling_price: None,
            stock_quantity: 0,
            image_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_variant_label() {
        assert_eq!(variant("Red", "XL").label(), "Red / XL");
        assert_eq!(variant("Red", "").label(), "Red");
        assert_eq!(variant("", "M").label(), "M");
        assert_eq!(variant("", "").label(), "Default");
    }

    #[test]
    fn test_validate_prices() {
        let d = Decimal::from;
        assert!(validate_prices(Some(d(100)), Some(d(80))).is_ok());
        assert!(validate_prices(None, Some(d(80))).is_ok());
        assert!(validate_prices(Some(d(100)), Some(d(100))).is_ok());
        assert_eq!(
            validate_prices(Some(d(50)), Some(d(80))),
            Err("Selling price cannot exceed MRP".to_string())
        );
        assert!(validate_prices(Some(d(-1)), None).is_err());
    }
}
