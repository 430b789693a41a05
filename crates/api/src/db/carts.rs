//! Cart persistence.
//!
//! Every mutation runs in one transaction that ends by recomputing the cart
//! totals from its lines, so stored totals always match the items.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use univendor_core::{
    CartId, CartItemId, CartLine, CartTotals, ProductId, UserId, VariantId, VendorId,
};

use super::RepositoryError;
use crate::models::cart::{Cart, CartItem, CartOwner, CartRecord};

const CART_COLUMNS: &str = "id, vendor_id, subtotal, tax, total";

const ITEM_COLUMNS: &str = "id, cart_id, product_id, variant_id, name, variant_label, \
                            image_url, price, quantity, created_at";

/// A priced line to add to a cart.
#[derive(Debug, Clone)]
pub struct NewCartLine {
    pub vendor_id: VendorId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub name: String,
    pub variant_label: Option<String>,
    pub image_url: Option<String>,
    pub price: Decimal,
    pub quantity: i32,
    /// Units in stock for the product or variant.
    pub available: i32,
}

pub struct CartRepository<'a> {
    pool: &'a PgPool,
    tax_rate: Decimal,
}

impl<'a> CartRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, tax_rate: Decimal) -> Self {
        Self { pool, tax_rate }
    }

    /// The owner's cart, if one has been persisted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn find(&self, owner: &CartOwner) -> Result<Option<Cart>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let Some(record) = find_record(&mut conn, owner, false).await? else {
            return Ok(None);
        };
        let items = load_items(&mut conn, record.id).await?;
        Ok(Some(Cart::from_parts(record, items)))
    }

    /// Add a line, merging with an existing line for the same product and
    /// variant.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the cart holds another vendor's
    /// products or the merged quantity exceeds stock.
    pub async fn add_item(&self, owner: &CartOwner, line: &NewCartLine) -> Result<Cart, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let record = get_or_create_record(&mut tx, owner).await?;

        if let Some(vendor_id) = record.vendor_id
            && vendor_id != line.vendor_id
        {
            return Err(RepositoryError::Conflict(
                "Cart contains items from another store; clear it first".to_owned(),
            ));
        }

        let (quantity,): (i32,) = sqlx::query_as(
            r"
            INSERT INTO cart_items (
                cart_id, product_id, variant_id, name, variant_label, image_url, price, quantity
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (cart_id, product_id, (COALESCE(variant_id, 0))) DO UPDATE SET
                quantity = cart_items.quantity + EXCLUDED.quantity,
                price = EXCLUDED.price,
                name = EXCLUDED.name,
                variant_label = EXCLUDED.variant_label,
                image_url = EXCLUDED.image_url
            RETURNING quantity
            ",
        )
        .bind(record.id)
        .bind(line.product_id)
        .bind(line.variant_id)
        .bind(&line.name)
        .bind(line.variant_label.as_deref())
        .bind(line.image_url.as_deref())
        .bind(line.price)
        .bind(line.quantity)
        .fetch_one(&mut *tx)
        .await?;

        if quantity > line.available {
            return Err(insufficient_stock(line.available));
        }

        sqlx::query("UPDATE carts SET vendor_id = $2 WHERE id = $1")
            .bind(record.id)
            .bind(line.vendor_id)
            .execute(&mut *tx)
            .await?;

        let cart = recalculate(&mut tx, record.id, self.tax_rate).await?;
        tx.commit().await?;
        Ok(cart)
    }

    /// Set a line's quantity; zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the item is not in the owner's
    /// cart and `RepositoryError::Conflict` if stock is insufficient.
    pub async fn update_quantity(
        &self,
        owner: &CartOwner,
        item_id: CartItemId,
        quantity: i32,
    ) -> Result<Cart, RepositoryError> {
        if quantity <= 0 {
            return self.remove_item(owner, item_id).await;
        }

        let mut tx = self.pool.begin().await?;
        let record = find_record(&mut tx, owner, true)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let (available,): (i32,) = sqlx::query_as(
            r"
            SELECT COALESCE(v.stock_quantity, p.stock_quantity)
            FROM cart_items ci
            JOIN products p ON p.id = ci.product_id
            LEFT JOIN product_variants v ON v.id = ci.variant_id
            WHERE ci.id = $1 AND ci.cart_id = $2
            ",
        )
        .bind(item_id)
        .bind(record.id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        if quantity > available {
            return Err(insufficient_stock(available));
        }

        sqlx::query("UPDATE cart_items SET quantity = $3 WHERE id = $1 AND cart_id = $2")
            .bind(item_id)
            .bind(record.id)
            .bind(quantity)
            .execute(&mut *tx)
            .await?;

        let cart = recalculate(&mut tx, record.id, self.tax_rate).await?;
        tx.commit().await?;
        Ok(cart)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the item is not in the owner's cart.
    pub async fn remove_item(
        &self,
        owner: &CartOwner,
        item_id: CartItemId,
    ) -> Result<Cart, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let record = find_record(&mut tx, owner, true)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND cart_id = $2")
            .bind(item_id)
            .bind(record.id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        let cart = recalculate(&mut tx, record.id, self.tax_rate).await?;
        tx.commit().await?;
        Ok(cart)
    }

    /// Empty the owner's cart. A missing cart counts as already empty.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a statement fails.
    pub async fn clear(&self, owner: &CartOwner) -> Result<Cart, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let Some(record) = find_record(&mut tx, owner, true).await? else {
            return Ok(Cart::empty());
        };

        let cart = clear_cart(&mut tx, record.id).await?;
        tx.commit().await?;
        Ok(cart)
    }

    /// Fold a guest cart into the user's cart after login.
    ///
    /// Lines for the same product and variant are summed, then capped at the
    /// stock on hand; lines with nothing left in stock are dropped. When the
    /// two carts hold different vendors' products the guest cart replaces the
    /// user's lines. The guest cart is deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a statement fails.
    pub async fn merge_guest(
        &self,
        guest_token: &str,
        user_id: UserId,
    ) -> Result<Option<Cart>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let guest_owner = CartOwner::Guest(guest_token.to_owned());
        let Some(guest) = find_record(&mut tx, &guest_owner, true).await? else {
            return Ok(None);
        };

        let user_owner = CartOwner::User(user_id);
        let Some(user_cart) = find_record(&mut tx, &user_owner, true).await? else {
            // Adopt the guest cart as-is.
            sqlx::query(
                "UPDATE carts SET user_id = $2, guest_token = NULL, updated_at = NOW() WHERE id = $1",
            )
            .bind(guest.id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
            cap_to_stock(&mut tx, guest.id).await?;
            let cart = recalculate(&mut tx, guest.id, self.tax_rate).await?;
            tx.commit().await?;
            return Ok(Some(cart));
        };

        if guest.vendor_id.is_some() && user_cart.vendor_id != guest.vendor_id {
            sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
                .bind(user_cart.id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            r"
            INSERT INTO cart_items (
                cart_id, product_id, variant_id, name, variant_label, image_url, price, quantity
            )
            SELECT $2, product_id, variant_id, name, variant_label, image_url, price, quantity
            FROM cart_items WHERE cart_id = $1
            ON CONFLICT (cart_id, product_id, (COALESCE(variant_id, 0))) DO UPDATE SET
                quantity = cart_items.quantity + EXCLUDED.quantity,
                price = EXCLUDED.price
            ",
        )
        .bind(guest.id)
        .bind(user_cart.id)
        .execute(&mut *tx)
        .await?;

        if guest.vendor_id.is_some() {
            sqlx::query("UPDATE carts SET vendor_id = $2 WHERE id = $1")
                .bind(user_cart.id)
                .bind(guest.vendor_id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("DELETE FROM carts WHERE id = $1")
            .bind(guest.id)
            .execute(&mut *tx)
            .await?;

        cap_to_stock(&mut tx, user_cart.id).await?;
        let cart = recalculate(&mut tx, user_cart.id, self.tax_rate).await?;
        tx.commit().await?;
        Ok(Some(cart))
    }
}

/// Quantity a merged line may keep, or `None` when it must be dropped.
fn capped_quantity(quantity: i32, available: i32) -> Option<i32> {
    let capped = quantity.min(available);
    (capped > 0).then_some(capped)
}

/// Lower every line of the cart to the stock currently available.
async fn cap_to_stock(conn: &mut PgConnection, cart_id: CartId) -> Result<(), RepositoryError> {
    let lines: Vec<(CartItemId, i32, i32)> = sqlx::query_as(
        r"
        SELECT ci.id, ci.quantity, COALESCE(v.stock_quantity, p.stock_quantity)
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        LEFT JOIN product_variants v ON v.id = ci.variant_id
        WHERE ci.cart_id = $1
        ",
    )
    .bind(cart_id)
    .fetch_all(&mut *conn)
    .await?;

    for (item_id, quantity, available) in lines {
        match capped_quantity(quantity, available) {
            Some(kept) if kept == quantity => {}
            Some(kept) => {
                tracing::info!(item_id = %item_id, quantity, kept, "Merged cart line capped at stock");
                sqlx::query("UPDATE cart_items SET quantity = $2 WHERE id = $1")
                    .bind(item_id)
                    .bind(kept)
                    .execute(&mut *conn)
                    .await?;
            }
            None => {
                tracing::info!(item_id = %item_id, "Merged cart line dropped, out of stock");
                sqlx::query("DELETE FROM cart_items WHERE id = $1")
                    .bind(item_id)
                    .execute(&mut *conn)
                    .await?;
            }
        }
    }

    Ok(())
}

fn insufficient_stock(available: i32) -> RepositoryError {
    RepositoryError::Conflict(format!("Insufficient stock: only {available} available"))
}

pub(crate) async fn find_record(
    conn: &mut PgConnection,
    owner: &CartOwner,
    for_update: bool,
) -> Result<Option<CartRecord>, RepositoryError> {
    let column = match owner {
        CartOwner::User(_) => "user_id",
        CartOwner::Guest(_) => "guest_token",
    };
    let lock = if for_update { "FOR UPDATE" } else { "" };
    let sql = format!("SELECT {CART_COLUMNS} FROM carts WHERE {column} = $1 {lock}");

    let query = sqlx::query_as::<_, CartRecord>(&sql);
    let query = match owner {
        CartOwner::User(user_id) => query.bind(*user_id),
        CartOwner::Guest(token) => query.bind(token.as_str()),
    };

    Ok(query.fetch_optional(conn).await?)
}

async fn get_or_create_record(
    conn: &mut PgConnection,
    owner: &CartOwner,
) -> Result<CartRecord, RepositoryError> {
    let (user_id, token) = match owner {
        CartOwner::User(id) => (Some(*id), None),
        CartOwner::Guest(token) => (None, Some(token.as_str())),
    };
    let conflict_target = if user_id.is_some() { "user_id" } else { "guest_token" };

    // The no-op update makes RETURNING yield the existing row and locks it.
    let record = sqlx::query_as::<_, CartRecord>(&format!(
        r"
        INSERT INTO carts (user_id, guest_token)
        VALUES ($1, $2)
        ON CONFLICT ({conflict_target}) DO UPDATE SET updated_at = NOW()
        RETURNING {CART_COLUMNS}
        "
    ))
    .bind(user_id)
    .bind(token)
    .fetch_one(conn)
    .await?;

    Ok(record)
}

pub(crate) async fn load_items(
    conn: &mut PgConnection,
    cart_id: CartId,
) -> Result<Vec<CartItem>, RepositoryError> {
    let items = sqlx::query_as::<_, CartItem>(&format!(
        "SELECT {ITEM_COLUMNS} FROM cart_items WHERE cart_id = $1 ORDER BY created_at, id"
    ))
    .bind(cart_id)
    .fetch_all(conn)
    .await?;

    Ok(items)
}

/// Remove every line and zero the totals.
pub(crate) async fn clear_cart(
    conn: &mut PgConnection,
    cart_id: CartId,
) -> Result<Cart, RepositoryError> {
    sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
        .bind(cart_id)
        .execute(&mut *conn)
        .await?;

    let record = sqlx::query_as::<_, CartRecord>(&format!(
        r"
        UPDATE carts SET vendor_id = NULL, subtotal = 0, tax = 0, total = 0, updated_at = NOW()
        WHERE id = $1
        RETURNING {CART_COLUMNS}
        "
    ))
    .bind(cart_id)
    .fetch_one(conn)
    .await?;

    Ok(Cart::from_parts(record, Vec::new()))
}

/// Recompute and store totals from the cart's current lines.
async fn recalculate(
    conn: &mut PgConnection,
    cart_id: CartId,
    tax_rate: Decimal,
) -> Result<Cart, RepositoryError> {
    let items = load_items(&mut *conn, cart_id).await?;
    let lines: Vec<CartLine> = items.iter().map(CartItem::line).collect();
    let totals = CartTotals::compute(&lines, tax_rate);

    let record = sqlx::query_as::<_, CartRecord>(&format!(
        r"
        UPDATE carts SET
            subtotal = $2, tax = $3, total = $4,
            vendor_id = CASE WHEN $5 THEN NULL ELSE vendor_id END,
            updated_at = NOW()
        WHERE id = $1
        RETURNING {CART_COLUMNS}
        "
    ))
    .bind(cart_id)
    .bind(totals.subtotal)
    .bind(totals.tax)
    .bind(totals.total)
    .bind(items.is_empty())
    .fetch_one(conn)
    .await?;

    Ok(Cart::from_parts(record, items))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capped_quantity_keeps_lines_within_stock() {
        assert_eq!(capped_quantity(3, 10), Some(3));
        assert_eq!(capped_quantity(5, 5), Some(5));
    }

    #[test]
    fn test_capped_quantity_lowers_summed_lines_to_stock() {
        // 3 from the user's cart plus 3 from the guest cart, 5 on hand.
        assert_eq!(capped_quantity(3 + 3, 5), Some(5));
    }

    #[test]
    fn test_capped_quantity_drops_sold_out_lines() {
        assert_eq!(capped_quantity(2, 0), None);
        assert_eq!(capped_quantity(2, -1), None);
    }
}
