//! Cart and checkout operations.
//!
//! Validates shopper input against the catalog before handing priced lines
//! to the cart repository, which keeps totals in step with the items.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use thiserror::Error;

use univendor_core::{CartItemId, ProductId, UserId, VariantId};

use crate::db::RepositoryError;
use crate::db::carts::{CartRepository, NewCartLine};
use crate::db::orders::{CheckoutInput, OrderRepository};
use crate::db::products::ProductRepository;
use crate::models::cart::{Cart, CartOwner};
use crate::models::order::OrderDetail;

#[derive(Debug, Error)]
pub enum CartError {
    #[error("Quantity must be at least 1")]
    InvalidQuantity,

    #[error("Product not found")]
    ProductNotFound,

    #[error("Product is not available")]
    ProductUnavailable,

    #[error("Variant does not belong to this product")]
    VariantMismatch,

    #[error("Cart is empty")]
    EmptyCart,

    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub struct CartService<'a> {
    carts: CartRepository<'a>,
    products: ProductRepository<'a>,
    orders: OrderRepository<'a>,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, tax_rate: Decimal) -> Self {
        Self {
            carts: CartRepository::new(pool, tax_rate),
            products: ProductRepository::new(pool),
            orders: OrderRepository::new(pool),
        }
    }

    /// The owner's cart, or an empty one.
    ///
    /// # Errors
    ///
    /// Returns a repository error if the lookup fails.
    pub async fn get(&self, owner: &CartOwner) -> Result<Cart, CartError> {
        Ok(self.carts.find(owner).await?.unwrap_or_else(Cart::empty))
    }

    /// Add `quantity` units of a product (or one of its variants).
    ///
    /// The unit price is the variant's selling price when it has one,
    /// otherwise the product's.
    ///
    /// # Errors
    ///
    /// Returns a `CartError` for invalid quantities, unknown or inactive
    /// products and foreign variants; repository conflicts for stock and
    /// vendor mismatches.
    pub async fn add(
        &self,
        owner: &CartOwner,
        product_id: ProductId,
        variant_id: Option<VariantId>,
        quantity: i32,
    ) -> Result<Cart, CartError> {
        if quantity < 1 {
            return Err(CartError::InvalidQuantity);
        }

        let product = self
            .products
            .get(product_id)
            .await?
            .ok_or(CartError::ProductNotFound)?;
        if !product.is_active {
            return Err(CartError::ProductUnavailable);
        }

        let variant = match variant_id {
            Some(id) => {
                let variant = self
                    .products
                    .get_variant(id)
                    .await?
                    .filter(|v| v.product_id == product.id)
                    .ok_or(CartError::VariantMismatch)?;
                Some(variant)
            }
            None => None,
        };

        let line = NewCartLine {
            vendor_id: product.vendor_id,
            product_id: product.id,
            variant_id: variant.as_ref().map(|v| v.id),
            name: product.name.clone(),
            variant_label: variant.as_ref().map(|v| v.label()),
            image_url: variant
                .as_ref()
                .and_then(|v| v.image_url.clone())
                .or_else(|| product.featured_image_url.clone()),
            price: variant
                .as_ref()
                .and_then(|v| v.selling_price)
                .unwrap_or(product.selling_price),
            quantity,
            available: variant
                .as_ref()
                .map_or(product.stock_quantity, |v| v.stock_quantity),
        };

        Ok(self.carts.add_item(owner, &line).await?)
    }

    /// Set a line's quantity; zero removes it.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` for negative quantities.
    pub async fn update_quantity(
        &self,
        owner: &CartOwner,
        item_id: CartItemId,
        quantity: i32,
    ) -> Result<Cart, CartError> {
        if quantity < 0 {
            return Err(CartError::InvalidQuantity);
        }
        Ok(self.carts.update_quantity(owner, item_id, quantity).await?)
    }

    /// # Errors
    ///
    /// Returns a repository error if the item is not in the cart.
    pub async fn remove(&self, owner: &CartOwner, item_id: CartItemId) -> Result<Cart, CartError> {
        Ok(self.carts.remove_item(owner, item_id).await?)
    }

    /// # Errors
    ///
    /// Returns a repository error if the update fails.
    pub async fn clear(&self, owner: &CartOwner) -> Result<Cart, CartError> {
        Ok(self.carts.clear(owner).await?)
    }

    /// Move a guest's cart onto the user who just signed in.
    ///
    /// # Errors
    ///
    /// Returns a repository error if the merge fails.
    pub async fn merge_guest(&self, guest_token: &str, user_id: UserId) -> Result<(), CartError> {
        if let Some(cart) = self.carts.merge_guest(guest_token, user_id).await? {
            tracing::info!(user_id = %user_id, items = cart.item_count, "Guest cart merged");
        }
        Ok(())
    }

    /// Place an order for everything in the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Invalid` for missing buyer details,
    /// `CartError::EmptyCart` for an empty cart and a repository conflict
    /// when stock has run out.
    pub async fn checkout(
        &self,
        owner: &CartOwner,
        user_id: Option<UserId>,
        input: &CheckoutInput,
        now: DateTime<Utc>,
    ) -> Result<OrderDetail, CartError> {
        validate_checkout(input)?;

        let cart = self.get(owner).await?;
        if cart.is_empty() {
            return Err(CartError::EmptyCart);
        }

        let order = self.orders.place_order(owner, user_id, input, now).await?;
        tracing::info!(
            order_number = %order.order.order_number,
            vendor_id = %order.order.vendor_id,
            total = %order.order.total,
            "Order placed"
        );
        Ok(order)
    }
}

fn validate_checkout(input: &CheckoutInput) -> Result<(), CartError> {
    let blank = |s: &Option<String>| s.as_deref().is_none_or(|s| s.trim().is_empty());
    if blank(&input.customer.first_name) || blank(&input.customer.last_name) {
        return Err(CartError::Invalid(
            "First and last name are required".to_string(),
        ));
    }
    if let Some(field) = input.shipping_address.missing_field() {
        return Err(CartError::Invalid(format!("{field} is required")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use univendor_core::Email;

    use super::*;
    use crate::db::customers::CustomerInput;
    use crate::models::order::AddressInput;

    fn checkout() -> CheckoutInput {
        CheckoutInput {
            customer: CustomerInput {
                email: Email::parse("buyer@example.com").expect("valid email"),
                first_name: Some("Grace".to_string()),
                last_name: Some("Hopper".to_string()),
                phone: None,
            },
            shipping_address: AddressInput {
                full_name: "Grace Hopper".to_string(),
                line1: "1 Harbor St".to_string(),
                line2: None,
                city: "Arlington".to_string(),
                state: "VA".to_string(),
                postal_code: "22201".to_string(),
                country: "US".to_string(),
                phone: None,
                is_default: false,
            },
            notes: None,
        }
    }

    #[test]
    fn test_validate_checkout() {
        assert!(validate_checkout(&checkout()).is_ok());

        let mut no_name = checkout();
        no_name.customer.last_name = Some("  ".to_string());
        assert!(matches!(
            validate_checkout(&no_name),
            Err(CartError::Invalid(_))
        ));

        let mut no_city = checkout();
        no_city.shipping_address.city = String::new();
        let err = validate_checkout(&no_city).expect_err("missing city");
        assert_eq!(err.to_string(), "city is required");

        let mut no_postcode = checkout();
        no_postcode.shipping_address.postal_code = " ".to_string();
        let err = validate_checkout(&no_postcode).expect_err("missing postal code");
        assert_eq!(err.to_string(), "postalCode is required");
    }
}
