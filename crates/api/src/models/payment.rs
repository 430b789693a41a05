//! Payment methods, invoices, ledger transactions and payouts.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::types::Json;

use univendor_core::{
    InvoiceId, InvoiceStatus, OrderId, PaymentMethodId, PaymentMethodType, PayoutId, PayoutStatus,
    SubscriptionId, TransactionId, TransactionStatus, TransactionType, VendorId,
};

/// Where a vendor receives payouts.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethod {
    pub id: PaymentMethodId,
    pub vendor_id: VendorId,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub method_type: PaymentMethodType,
    pub label: String,
    pub last4: Option<String>,
    pub details: Json<serde_json::Value>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A platform invoice for a vendor's subscription.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: InvoiceId,
    pub invoice_number: String,
    pub vendor_id: VendorId,
    pub subscription_id: Option<SubscriptionId>,
    pub amount: Decimal,
    pub currency: String,
    pub status: InvoiceStatus,
    pub due_date: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A ledger entry.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub vendor_id: VendorId,
    pub order_id: Option<OrderId>,
    pub invoice_id: Option<InvoiceId>,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub amount: Decimal,
    /// Sum of refunds issued against this entry.
    pub refunded_amount: Decimal,
    pub currency: String,
    pub description: Option<String>,
    pub refund_reason: Option<String>,
    pub metadata: Json<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Amount still available to refund.
    #[must_use]
    pub fn refundable(&self) -> Decimal {
        (self.amount - self.refunded_amount).max(Decimal::ZERO)
    }

    /// Work out the effect of refunding `amount` against this entry.
    ///
    /// Returns the new cumulative refunded amount and the entry's new status.
    ///
    /// # Errors
    ///
    /// Returns a client-facing message when the entry cannot be refunded or
    /// the amount is out of range.
    pub fn apply_refund(
        &self,
        amount: Decimal,
    ) -> Result<(Decimal, TransactionStatus), String> {
        if self.transaction_type != TransactionType::Payment {
            return Err("Only payment transactions can be refunded".to_string());
        }
        if !matches!(
            self.status,
            TransactionStatus::Completed | TransactionStatus::PartialRefund
        ) {
            return Err(format!("Cannot refund a {} transaction", self.status));
        }
        if amount <= Decimal::ZERO {
            return Err("Refund amount must be greater than zero".to_string());
        }
        // Amounts are stored to the cent; a finer amount would be rounded on
        // write and could disagree with the status computed here.
        if amount.normalize().scale() > 2 {
            return Err("Refund amount cannot have more than two decimal places".to_string());
        }
        if amount > self.refundable() {
            return Err(format!(
                "Refund amount exceeds refundable balance of {}",
                self.refundable()
            ));
        }

        let refunded = self.refunded_amount + amount;
        let status = if refunded == self.amount {
            TransactionStatus::Refunded
        } else {
            TransactionStatus::PartialRefund
        };
        Ok((refunded, status))
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Payout {
    pub id: PayoutId,
    pub vendor_id: VendorId,
    pub payment_method_id: Option<PaymentMethodId>,
    pub amount: Decimal,
    pub currency: String,
    pub status: PayoutStatus,
    pub reference: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment(amount: i64, refunded: i64, status: TransactionStatus) -> Transaction {
        Transaction {
            id: TransactionId::new(1),
            vendor_id: VendorId::new(1),
            order_id: Some(OrderId::new(1)),
            invoice_id: None,
            transaction_type: TransactionType::Payment,
            status,
            amount: Decimal::from(amount),
            refunded_amount: Decimal::from(refunded),
            currency: "USD".to_string(),
            description: None,
            refund_reason: None,
            metadata: Json(serde_json::json!({})),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_partial_then_full_refund() {
        let tx = payment(100, 0, TransactionStatus::Completed);
        assert_eq!(
            tx.apply_refund(Decimal::from(40)),
            Ok((Decimal::from(40), TransactionStatus::PartialRefund))
        );

        let tx = payment(100, 40, TransactionStatus::PartialRefund);
        assert_eq!(
            tx.apply_refund(Decimal::from(60)),
            Ok((Decimal::from(100), TransactionStatus::Refunded))
        );
    }

    #[test]
    fn test_refund_out_of_range() {
        let tx = payment(100, 40, TransactionStatus::PartialRefund);
        assert!(tx.apply_refund(Decimal::from(61)).is_err());
        assert!(tx.apply_refund(Decimal::ZERO).is_err());
        assert!(tx.apply_refund(Decimal::from(-5)).is_err());
    }

    #[test]
    fn test_refund_rejects_fractions_of_a_cent() {
        let tx = payment(100, 0, TransactionStatus::Completed);
        assert!(tx.apply_refund(Decimal::new(99_995, 3)).is_err());
        assert!(tx.apply_refund(Decimal::new(4, 3)).is_err());

        // Trailing zeros are still whole cents.
        assert_eq!(
            tx.apply_refund(Decimal::new(100_000, 3)),
            Ok((Decimal::from(100), TransactionStatus::Refunded))
        );
    }

    #[test]
    fn test_refund_requires_settled_payment() {
        assert!(
            payment(100, 0, TransactionStatus::Pending)
                .apply_refund(Decimal::ONE)
                .is_err()
        );
        let mut fee = payment(100, 0, TransactionStatus::Completed);
        fee.transaction_type = TransactionType::Fee;
        assert!(fee.apply_refund(Decimal::ONE).is_err());
    }
}
