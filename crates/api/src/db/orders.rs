//! Orders and checkout.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};

use univendor_core::{
    Email, OrderId, OrderStatus, PaymentStatus, UserId, VendorId, order_number, round_money,
};

use super::RepositoryError;
use super::addresses::insert_address;
use super::carts::{clear_cart, find_record, load_items};
use super::customers::{CustomerInput, upsert_customer};
use super::payments::insert_payment_transaction;
use crate::models::cart::{CartItem, CartOwner};
use crate::models::order::{AddressInput, Order, OrderDetail, OrderItem};

const ORDER_COLUMNS: &str = "id, order_number, vendor_id, customer_id, shipping_address_id, \
                             status, payment_status, subtotal, tax, total, tracking_number, \
                             notes, created_at, updated_at";

const ORDER_ITEM_COLUMNS: &str =
    "id, order_id, product_id, variant_id, name, variant_label, price, quantity, total";

/// Buyer details submitted at checkout.
#[derive(Debug, Clone)]
pub struct CheckoutInput {
    pub customer: CustomerInput,
    pub shipping_address: AddressInput,
    pub notes: Option<String>,
}

/// Fulfilment fields a vendor may change; absent fields are unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdate {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub tracking_number: Option<String>,
}

pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Turn the owner's cart into an order.
    ///
    /// Runs as one transaction: the customer and shipping address are
    /// stored, the order and its lines are created from the cart, stock is
    /// decremented, a pending payment is recorded and the cart is emptied.
    /// Any failure leaves the cart and stock untouched.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the cart is empty or a line
    /// exceeds the remaining stock.
    pub async fn place_order(
        &self,
        owner: &CartOwner,
        user_id: Option<UserId>,
        input: &CheckoutInput,
        now: DateTime<Utc>,
    ) -> Result<OrderDetail, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let cart = find_record(&mut tx, owner, true)
            .await?
            .ok_or_else(empty_cart)?;
        let items = load_items(&mut tx, cart.id).await?;
        let vendor_id = match cart.vendor_id {
            Some(vendor_id) if !items.is_empty() => vendor_id,
            _ => return Err(empty_cart()),
        };

        let customer = upsert_customer(&mut tx, vendor_id, user_id, &input.customer).await?;
        let address = insert_address(&mut tx, customer.id, &input.shipping_address).await?;

        let order = loop {
            let inserted = sqlx::query_as::<_, Order>(&format!(
                r"
                INSERT INTO orders (
                    order_number, vendor_id, customer_id, shipping_address_id,
                    subtotal, tax, total, notes
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (order_number) DO NOTHING
                RETURNING {ORDER_COLUMNS}
                "
            ))
            .bind(order_number(now))
            .bind(vendor_id)
            .bind(customer.id)
            .bind(address.id)
            .bind(cart.subtotal)
            .bind(cart.tax)
            .bind(cart.total)
            .bind(input.notes.as_deref())
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(order) = inserted {
                break order;
            }
        };

        let mut order_items = Vec::with_capacity(items.len());
        for item in &items {
            take_stock(&mut tx, item).await?;
            order_items.push(insert_order_item(&mut tx, order.id, item).await?);
        }

        insert_payment_transaction(
            &mut tx,
            vendor_id,
            order.id,
            order.total,
            &format!("Payment for order {}", order.order_number),
        )
        .await?;

        clear_cart(&mut tx, cart.id).await?;
        tx.commit().await?;

        Ok(OrderDetail {
            order,
            items: order_items,
        })
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_vendor(&self, vendor_id: VendorId) -> Result<Vec<Order>, RepositoryError> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE vendor_id = $1 \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(vendor_id)
        .fetch_all(self.pool)
        .await?;

        Ok(orders)
    }

    /// Orders placed under `email` with any vendor.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_customer_email(&self, email: &Email) -> Result<Vec<Order>, RepositoryError> {
        let orders = sqlx::query_as::<_, Order>(
            r"
            SELECT o.id, o.order_number, o.vendor_id, o.customer_id, o.shipping_address_id,
                   o.status, o.payment_status, o.subtotal, o.tax, o.total, o.tracking_number,
                   o.notes, o.created_at, o.updated_at
            FROM orders o
            JOIN customers c ON c.id = o.customer_id
            WHERE c.email = $1
            ORDER BY o.created_at DESC, o.id DESC
            ",
        )
        .bind(email.as_str())
        .fetch_all(self.pool)
        .await?;

        Ok(orders)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<OrderDetail>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        self.with_items(order).await
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_number(&self, number: &str) -> Result<Option<OrderDetail>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = $1"
        ))
        .bind(number)
        .fetch_optional(self.pool)
        .await?;

        self.with_items(order).await
    }

    /// Apply a fulfilment update.
    ///
    /// Marking an order paid settles its pending payment transactions.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    pub async fn update(&self, id: OrderId, update: &OrderUpdate) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let order = sqlx::query_as::<_, Order>(&format!(
            r"
            UPDATE orders SET
                status = COALESCE($2, status),
                payment_status = COALESCE($3, payment_status),
                tracking_number = COALESCE($4, tracking_number),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(update.status)
        .bind(update.payment_status)
        .bind(update.tracking_number.as_deref())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        if update.payment_status == Some(PaymentStatus::Paid) {
            sqlx::query(
                r"
                UPDATE transactions SET status = 'completed', updated_at = NOW()
                WHERE order_id = $1 AND type = 'payment' AND status = 'pending'
                ",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(order)
    }

    async fn with_items(&self, order: Option<Order>) -> Result<Option<OrderDetail>, RepositoryError> {
        let Some(order) = order else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, OrderItem>(&format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY id"
        ))
        .bind(order.id)
        .fetch_all(self.pool)
        .await?;

        Ok(Some(OrderDetail { order, items }))
    }
}

fn empty_cart() -> RepositoryError {
    RepositoryError::Conflict("Cart is empty".to_owned())
}

/// Decrement stock for one cart line, refusing to go below zero.
async fn take_stock(conn: &mut PgConnection, item: &CartItem) -> Result<(), RepositoryError> {
    let result = match item.variant_id {
        Some(variant_id) => {
            sqlx::query(
                "UPDATE product_variants SET stock_quantity = stock_quantity - $2, \
                 updated_at = NOW() WHERE id = $1 AND stock_quantity >= $2",
            )
            .bind(variant_id)
            .bind(item.quantity)
            .execute(conn)
            .await?
        }
        None => {
            sqlx::query(
                "UPDATE products SET stock_quantity = stock_quantity - $2, \
                 updated_at = NOW() WHERE id = $1 AND stock_quantity >= $2",
            )
            .bind(item.product_id)
            .bind(item.quantity)
            .execute(conn)
            .await?
        }
    };

    if result.rows_affected() == 0 {
        return Err(RepositoryError::Conflict(format!(
            "Insufficient stock for {}",
            item.name
        )));
    }
    Ok(())
}

async fn insert_order_item(
    conn: &mut PgConnection,
    order_id: OrderId,
    item: &CartItem,
) -> Result<OrderItem, RepositoryError> {
    let line = sqlx::query_as::<_, OrderItem>(&format!(
        r"
        INSERT INTO order_items (
            order_id, product_id, variant_id, name, variant_label, price, quantity, total
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {ORDER_ITEM_COLUMNS}
        "
    ))
    .bind(order_id)
    .bind(item.product_id)
    .bind(item.variant_id)
    .bind(&item.name)
    .bind(item.variant_label.as_deref())
    .bind(item.price)
    .bind(item.quantity)
    .bind(round_money(item.line().line_total()))
    .fetch_one(conn)
    .await?;

    Ok(line)
}
