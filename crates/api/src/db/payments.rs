//! Vendor payment methods, platform invoices, the transaction ledger and payouts.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use univendor_core::{
    InvoiceId, OrderId, PaymentMethodId, PaymentMethodType, PayoutId, SubscriptionId,
    TransactionId, VendorId, invoice_number,
};

use super::RepositoryError;
use crate::models::payment::{Invoice, PaymentMethod, Payout, Transaction};

const METHOD_COLUMNS: &str =
    "id, vendor_id, type, label, last4, details, is_default, created_at, updated_at";

const INVOICE_COLUMNS: &str = "id, invoice_number, vendor_id, subscription_id, amount, currency, \
                               status, due_date, paid_at, created_at, updated_at";

const TRANSACTION_COLUMNS: &str = "id, vendor_id, order_id, invoice_id, type, status, amount, \
                                   refunded_amount, currency, description, refund_reason, \
                                   metadata, created_at, updated_at";

const PAYOUT_COLUMNS: &str = "id, vendor_id, payment_method_id, amount, currency, status, \
                              reference, completed_at, created_at";

/// Days a vendor has to settle a new invoice.
const INVOICE_DUE_DAYS: i64 = 7;

/// Fields of a payment method.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodInput {
    #[serde(rename = "type")]
    pub method_type: PaymentMethodType,
    pub label: String,
    pub last4: Option<String>,
    #[serde(default)]
    pub details: serde_json::Value,
    #[serde(default)]
    pub is_default: bool,
}

/// Issue a pending invoice inside an open transaction.
///
/// Invoice numbers are random; a collision is retried rather than failing
/// the caller's transaction.
pub(crate) async fn insert_invoice(
    conn: &mut PgConnection,
    vendor_id: VendorId,
    subscription_id: Option<SubscriptionId>,
    amount: Decimal,
    currency: &str,
    now: DateTime<Utc>,
) -> Result<Invoice, RepositoryError> {
    let due_date = now + Duration::days(INVOICE_DUE_DAYS);

    loop {
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r"
            INSERT INTO invoices (invoice_number, vendor_id, subscription_id, amount, currency, due_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (invoice_number) DO NOTHING
            RETURNING {INVOICE_COLUMNS}
            "
        ))
        .bind(invoice_number(now))
        .bind(vendor_id)
        .bind(subscription_id)
        .bind(amount)
        .bind(currency)
        .bind(due_date)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(invoice) = invoice {
            return Ok(invoice);
        }
    }
}

/// Record a ledger entry inside an open transaction.
pub(crate) async fn insert_payment_transaction(
    conn: &mut PgConnection,
    vendor_id: VendorId,
    order_id: OrderId,
    amount: Decimal,
    description: &str,
) -> Result<Transaction, RepositoryError> {
    let tx = sqlx::query_as::<_, Transaction>(&format!(
        r"
        INSERT INTO transactions (vendor_id, order_id, type, status, amount, description)
        VALUES ($1, $2, 'payment', 'pending', $3, $4)
        RETURNING {TRANSACTION_COLUMNS}
        "
    ))
    .bind(vendor_id)
    .bind(order_id)
    .bind(amount)
    .bind(description)
    .fetch_one(conn)
    .await?;

    Ok(tx)
}

pub struct PaymentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PaymentRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    // Payment methods

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_methods(
        &self,
        vendor_id: VendorId,
    ) -> Result<Vec<PaymentMethod>, RepositoryError> {
        let methods = sqlx::query_as::<_, PaymentMethod>(&format!(
            "SELECT {METHOD_COLUMNS} FROM payment_methods WHERE vendor_id = $1 \
             ORDER BY is_default DESC, created_at, id"
        ))
        .bind(vendor_id)
        .fetch_all(self.pool)
        .await?;

        Ok(methods)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_method(
        &self,
        id: PaymentMethodId,
    ) -> Result<Option<PaymentMethod>, RepositoryError> {
        let method = sqlx::query_as::<_, PaymentMethod>(&format!(
            "SELECT {METHOD_COLUMNS} FROM payment_methods WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(method)
    }

    /// Add a payment method. The vendor's first method becomes the default
    /// regardless of `is_default`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails.
    pub async fn create_method(
        &self,
        vendor_id: VendorId,
        input: &PaymentMethodInput,
    ) -> Result<PaymentMethod, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (has_methods,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM payment_methods WHERE vendor_id = $1)")
                .bind(vendor_id)
                .fetch_one(&mut *tx)
                .await?;
        let is_default = input.is_default || !has_methods;

        if is_default {
            clear_default_method(&mut *tx, vendor_id).await?;
        }

        let method = sqlx::query_as::<_, PaymentMethod>(&format!(
            r"
            INSERT INTO payment_methods (vendor_id, type, label, last4, details, is_default)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {METHOD_COLUMNS}
            "
        ))
        .bind(vendor_id)
        .bind(input.method_type)
        .bind(&input.label)
        .bind(input.last4.as_deref())
        .bind(Json(&input.details))
        .bind(is_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(method)
    }

    /// Replace a payment method's fields.
    ///
    /// Clearing `is_default` on the current default is ignored; a vendor
    /// always keeps one default while it has methods.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the method doesn't exist.
    pub async fn update_method(
        &self,
        id: PaymentMethodId,
        input: &PaymentMethodInput,
    ) -> Result<PaymentMethod, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (vendor_id, was_default): (VendorId, bool) = sqlx::query_as(
            "SELECT vendor_id, is_default FROM payment_methods WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        if input.is_default && !was_default {
            clear_default_method(&mut *tx, vendor_id).await?;
        }

        let method = sqlx::query_as::<_, PaymentMethod>(&format!(
            r"
            UPDATE payment_methods SET
                type = $2, label = $3, last4 = $4, details = $5,
                is_default = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING {METHOD_COLUMNS}
            "
        ))
        .bind(id)
        .bind(input.method_type)
        .bind(&input.label)
        .bind(input.last4.as_deref())
        .bind(Json(&input.details))
        .bind(input.is_default || was_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(method)
    }

    /// Delete a payment method. When it was the default, the vendor's oldest
    /// remaining method takes over.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the method doesn't exist.
    pub async fn delete_method(&self, id: PaymentMethodId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (vendor_id, was_default): (VendorId, bool) = sqlx::query_as(
            "DELETE FROM payment_methods WHERE id = $1 RETURNING vendor_id, is_default",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        if was_default {
            sqlx::query(
                r"
                UPDATE payment_methods SET is_default = TRUE, updated_at = NOW()
                WHERE id = (
                    SELECT id FROM payment_methods WHERE vendor_id = $1
                    ORDER BY created_at, id LIMIT 1
                )
                ",
            )
            .bind(vendor_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Make `id` the vendor's only default method.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the method doesn't exist.
    pub async fn set_default_method(
        &self,
        id: PaymentMethodId,
    ) -> Result<PaymentMethod, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (vendor_id,): (VendorId,) =
            sqlx::query_as("SELECT vendor_id FROM payment_methods WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(RepositoryError::NotFound)?;

        clear_default_method(&mut *tx, vendor_id).await?;

        let method = sqlx::query_as::<_, PaymentMethod>(&format!(
            "UPDATE payment_methods SET is_default = TRUE, updated_at = NOW() WHERE id = $1 \
             RETURNING {METHOD_COLUMNS}"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(method)
    }

    // Invoices

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_invoices(&self, vendor_id: VendorId) -> Result<Vec<Invoice>, RepositoryError> {
        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE vendor_id = $1 \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(vendor_id)
        .fetch_all(self.pool)
        .await?;

        Ok(invoices)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_invoice(&self, id: InvoiceId) -> Result<Option<Invoice>, RepositoryError> {
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(invoice)
    }

    /// Settle an open invoice and record the vendor's fee payment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the invoice doesn't exist and
    /// `RepositoryError::Conflict` if it is already paid or void.
    pub async fn mark_invoice_paid(
        &self,
        id: InvoiceId,
        now: DateTime<Utc>,
    ) -> Result<Invoice, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r"
            UPDATE invoices SET status = 'paid', paid_at = $2, updated_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'overdue')
            RETURNING {INVOICE_COLUMNS}
            "
        ))
        .bind(id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(invoice) = invoice else {
            let (exists,): (bool,) =
                sqlx::query_as("SELECT EXISTS (SELECT 1 FROM invoices WHERE id = $1)")
                    .bind(id)
                    .fetch_one(&mut *tx)
                    .await?;
            return Err(if exists {
                RepositoryError::Conflict("invoice is not open".to_owned())
            } else {
                RepositoryError::NotFound
            });
        };

        sqlx::query(
            r"
            INSERT INTO transactions (vendor_id, invoice_id, type, status, amount, currency, description)
            VALUES ($1, $2, 'fee', 'completed', $3, $4, $5)
            ",
        )
        .bind(invoice.vendor_id)
        .bind(invoice.id)
        .bind(invoice.amount)
        .bind(&invoice.currency)
        .bind(format!("Platform invoice {}", invoice.invoice_number))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(invoice)
    }

    // Transactions

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_transactions(
        &self,
        vendor_id: VendorId,
    ) -> Result<Vec<Transaction>, RepositoryError> {
        let txs = sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE vendor_id = $1 \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(vendor_id)
        .fetch_all(self.pool)
        .await?;

        Ok(txs)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_order_transactions(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<Transaction>, RepositoryError> {
        let txs = sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE order_id = $1 \
             ORDER BY created_at, id"
        ))
        .bind(order_id)
        .fetch_all(self.pool)
        .await?;

        Ok(txs)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, RepositoryError> {
        let tx = sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(tx)
    }

    /// Refund part or all of a payment.
    ///
    /// The payment row is locked for the duration, so concurrent refunds
    /// cannot exceed its amount. Returns the updated payment and the new
    /// refund entry. A full refund of an order payment also marks the order
    /// refunded.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the transaction doesn't exist
    /// and `RepositoryError::Conflict` when the refund is not allowed.
    pub async fn refund(
        &self,
        id: TransactionId,
        amount: Decimal,
        reason: &str,
    ) -> Result<(Transaction, Transaction), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let original = sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let (refunded, status) = original
            .apply_refund(amount)
            .map_err(RepositoryError::Conflict)?;

        let updated = sqlx::query_as::<_, Transaction>(&format!(
            r"
            UPDATE transactions SET
                refunded_amount = $2, status = $3, refund_reason = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING {TRANSACTION_COLUMNS}
            "
        ))
        .bind(id)
        .bind(refunded)
        .bind(status)
        .bind(reason)
        .fetch_one(&mut *tx)
        .await?;

        let refund = sqlx::query_as::<_, Transaction>(&format!(
            r"
            INSERT INTO transactions (
                vendor_id, order_id, type, status, amount, currency, description, metadata
            )
            VALUES ($1, $2, 'refund', 'completed', $3, $4, $5, $6)
            RETURNING {TRANSACTION_COLUMNS}
            "
        ))
        .bind(original.vendor_id)
        .bind(original.order_id)
        .bind(amount)
        .bind(&original.currency)
        .bind(format!("Refund of transaction {id}"))
        .bind(Json(json!({
            "original_transaction_id": id,
            "refund_reason": reason,
        })))
        .fetch_one(&mut *tx)
        .await?;

        if refunded == original.amount
            && let Some(order_id) = original.order_id
        {
            sqlx::query(
                "UPDATE orders SET payment_status = 'refunded', updated_at = NOW() WHERE id = $1",
            )
            .bind(order_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok((updated, refund))
    }

    // Payouts

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_payouts(&self, vendor_id: VendorId) -> Result<Vec<Payout>, RepositoryError> {
        let payouts = sqlx::query_as::<_, Payout>(&format!(
            "SELECT {PAYOUT_COLUMNS} FROM payouts WHERE vendor_id = $1 \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(vendor_id)
        .fetch_all(self.pool)
        .await?;

        Ok(payouts)
    }

    /// Schedule a payout to the vendor's chosen (or default) payment method.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the method belongs to another
    /// vendor or the vendor has no payment method.
    pub async fn create_payout(
        &self,
        vendor_id: VendorId,
        payment_method_id: Option<PaymentMethodId>,
        amount: Decimal,
        currency: &str,
    ) -> Result<Payout, RepositoryError> {
        let method: Option<(PaymentMethodId,)> = sqlx::query_as(
            r"
            SELECT id FROM payment_methods
            WHERE vendor_id = $1 AND ($2::INTEGER IS NULL OR id = $2)
            ORDER BY is_default DESC, created_at, id
            LIMIT 1
            ",
        )
        .bind(vendor_id)
        .bind(payment_method_id)
        .fetch_optional(self.pool)
        .await?;

        let Some((method_id,)) = method else {
            return Err(RepositoryError::Conflict(
                "vendor has no matching payment method".to_owned(),
            ));
        };

        let payout = sqlx::query_as::<_, Payout>(&format!(
            r"
            INSERT INTO payouts (vendor_id, payment_method_id, amount, currency, status)
            VALUES ($1, $2, $3, $4, 'pending')
            RETURNING {PAYOUT_COLUMNS}
            "
        ))
        .bind(vendor_id)
        .bind(method_id)
        .bind(amount)
        .bind(currency)
        .fetch_one(self.pool)
        .await?;

        Ok(payout)
    }

    /// Mark a payout completed and record it in the ledger.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no unfinished payout has this id.
    pub async fn complete_payout(
        &self,
        id: PayoutId,
        reference: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Payout, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let payout = sqlx::query_as::<_, Payout>(&format!(
            r"
            UPDATE payouts SET status = 'completed', reference = COALESCE($2, reference),
                completed_at = $3
            WHERE id = $1 AND status IN ('pending', 'processing')
            RETURNING {PAYOUT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(reference)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        sqlx::query(
            r"
            INSERT INTO transactions (vendor_id, type, status, amount, currency, description, metadata)
            VALUES ($1, 'payout', 'completed', $2, $3, $4, $5)
            ",
        )
        .bind(payout.vendor_id)
        .bind(payout.amount)
        .bind(&payout.currency)
        .bind(format!("Payout {}", payout.id))
        .bind(Json(json!({ "payout_id": payout.id })))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(payout)
    }
}

async fn clear_default_method(
    conn: &mut PgConnection,
    vendor_id: VendorId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE payment_methods SET is_default = FALSE, updated_at = NOW() \
         WHERE vendor_id = $1 AND is_default",
    )
    .bind(vendor_id)
    .execute(conn)
    .await?;
    Ok(())
}
