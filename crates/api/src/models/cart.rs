//! Shopping carts.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use univendor_core::{
    CartId, CartItemId, CartLine, CartTotals, ProductId, UserId, VariantId, VendorId,
};

/// Who a cart belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartOwner {
    User(UserId),
    /// Anonymous shopper identified by a token kept in their session.
    Guest(String),
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: CartItemId,
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    /// Product name at the time the line was added.
    pub name: String,
    pub variant_label: Option<String>,
    pub image_url: Option<String>,
    /// Unit price snapshot.
    pub price: Decimal,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

impl CartItem {
    #[must_use]
    pub const fn line(&self) -> CartLine {
        CartLine::new(self.price, self.quantity)
    }
}

/// Persisted cart header.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CartRecord {
    pub id: CartId,
    pub vendor_id: Option<VendorId>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

/// A cart as returned to clients.
///
/// An owner without a persisted cart gets `id: null` and zero totals.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: Option<CartId>,
    pub vendor_id: Option<VendorId>,
    pub items: Vec<CartItem>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub item_count: i64,
}

impl Cart {
    #[must_use]
    pub fn empty() -> Self {
        let totals = CartTotals::zero();
        Self {
            id: None,
            vendor_id: None,
            items: Vec::new(),
            subtotal: totals.subtotal,
            tax: totals.tax,
            total: totals.total,
            item_count: totals.item_count,
        }
    }

    #[must_use]
    pub fn from_parts(record: CartRecord, items: Vec<CartItem>) -> Self {
        let item_count = items.iter().map(|i| i64::from(i.quantity.max(0))).sum();
        Self {
            id: Some(record.id),
            vendor_id: record.vendor_id,
            items,
            subtotal: record.subtotal,
            tax: record.tax,
            total: record.total,
            item_count,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
