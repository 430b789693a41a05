//! Status and kind enums for platform entities.
//!
//! Every enum serializes as `snake_case` in JSON, maps to a Postgres enum
//! type of the same spelling (with the `postgres` feature), and round-trips
//! through `Display` / `FromStr`.

use serde::{Deserialize, Serialize};

/// Define a string-backed status enum.
///
/// The second argument is the Postgres type name used by `sqlx`.
macro_rules! define_status {
    (
        $(#[$meta:meta])*
        $name:ident, $pg_type:tt {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[cfg_attr(feature = "postgres", derive(sqlx::Type))]
        #[cfg_attr(
            feature = "postgres",
            sqlx(type_name = $pg_type, rename_all = "snake_case")
        )]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The wire and database spelling of this value.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(format!(concat!("invalid ", stringify!($name), ": {}"), s)),
                }
            }
        }
    };
}

define_status! {
    /// Platform role of a user account.
    UserRole, "user_role" {
        /// Platform operator; can manage every vendor and impersonate users.
        SuperAdmin => "super_admin",
        /// Store owner.
        Vendor => "vendor",
        /// Shopper who signed in on a storefront.
        Customer => "customer",
    }
}

define_status! {
    /// Lifecycle of a vendor account, controlled by platform operators.
    VendorStatus, "vendor_status" {
        Pending => "pending",
        Active => "active",
        Suspended => "suspended",
    }
}

define_status! {
    /// Billing state of a vendor's platform subscription.
    SubscriptionStatus, "subscription_status" {
        Trial => "trial",
        Active => "active",
        Overdue => "overdue",
        Canceled => "canceled",
        Expired => "expired",
    }
}

define_status! {
    /// How a storefront domain is hosted.
    DomainType, "domain_type" {
        /// A name under the platform domain, verified on creation.
        Subdomain => "subdomain",
        /// A vendor-owned name that must prove ownership through DNS.
        Custom => "custom",
    }
}

define_status! {
    /// Serving state of a domain.
    DomainStatus, "domain_status" {
        Pending => "pending",
        Active => "active",
        Inactive => "inactive",
        Error => "error",
    }
}

define_status! {
    /// DNS ownership verification state of a domain.
    VerificationStatus, "verification_status" {
        Pending => "pending",
        Verified => "verified",
        Failed => "failed",
    }
}

define_status! {
    /// TLS certificate state of a domain.
    SslStatus, "ssl_status" {
        Pending => "pending",
        Active => "active",
        Invalid => "invalid",
    }
}

define_status! {
    /// Fulfillment state of an order.
    OrderStatus, "order_status" {
        Pending => "pending",
        Processing => "processing",
        Shipped => "shipped",
        Delivered => "delivered",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

define_status! {
    /// Payment state of an order.
    PaymentStatus, "payment_status" {
        Pending => "pending",
        Paid => "paid",
        Failed => "failed",
        Refunded => "refunded",
    }
}

define_status! {
    /// Subscription billing period.
    BillingCycle, "billing_cycle" {
        Monthly => "monthly",
        Yearly => "yearly",
    }
}

define_status! {
    /// State of a platform invoice issued to a vendor.
    InvoiceStatus, "invoice_status" {
        Pending => "pending",
        Paid => "paid",
        Overdue => "overdue",
        Void => "void",
    }
}

define_status! {
    /// Kind of money movement recorded in the ledger.
    TransactionType, "transaction_type" {
        Payment => "payment",
        Refund => "refund",
        Payout => "payout",
        Fee => "fee",
    }
}

define_status! {
    /// Settlement state of a ledger transaction.
    TransactionStatus, "transaction_status" {
        Pending => "pending",
        Completed => "completed",
        Failed => "failed",
        Refunded => "refunded",
        PartialRefund => "partial_refund",
    }
}

define_status! {
    /// State of a payout to a vendor.
    PayoutStatus, "payout_status" {
        Pending => "pending",
        Processing => "processing",
        Completed => "completed",
        Failed => "failed",
    }
}

define_status! {
    /// Kind of payout destination a vendor has on file.
    PaymentMethodType, "payment_method_type" {
        Card => "card",
        BankAccount => "bank_account",
        Paypal => "paypal",
    }
}

impl UserRole {
    /// Roles a user may pick for themselves at registration.
    #[must_use]
    pub const fn is_self_assignable(self) -> bool {
        !matches!(self, Self::SuperAdmin)
    }
}

impl BillingCycle {
    /// Length of one billing period in months.
    #[must_use]
    pub const fn months(self) -> u32 {
        match self {
            Self::Monthly => 1,
            Self::Yearly => 12,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_round_trips<T>(all: &[T])
    where
        T: Copy
            + PartialEq
            + std::fmt::Debug
            + std::fmt::Display
            + std::str::FromStr<Err = String>
            + Serialize,
    {
        for value in all {
            let text = value.to_string();
            assert_eq!(text.parse::<T>().as_ref(), Ok(value));
            // serde's snake_case and the hand-written spelling must agree
            let json = serde_json::to_string(value).expect("serialize");
            assert_eq!(json, format!("\"{text}\""));
        }
    }

    #[test]
    fn test_all_statuses_round_trip() {
        assert_round_trips(UserRole::ALL);
        assert_round_trips(VendorStatus::ALL);
        assert_round_trips(SubscriptionStatus::ALL);
        assert_round_trips(DomainType::ALL);
        assert_round_trips(DomainStatus::ALL);
        assert_round_trips(VerificationStatus::ALL);
        assert_round_trips(SslStatus::ALL);
        assert_round_trips(OrderStatus::ALL);
        assert_round_trips(PaymentStatus::ALL);
        assert_round_trips(BillingCycle::ALL);
        assert_round_trips(InvoiceStatus::ALL);
        assert_round_trips(TransactionType::ALL);
        assert_round_trips(TransactionStatus::ALL);
        assert_round_trips(PayoutStatus::ALL);
        assert_round_trips(PaymentMethodType::ALL);
    }

    #[test]
    fn test_from_str_rejects_unknown() {
        assert_eq!(
            "owner".parse::<UserRole>(),
            Err("invalid UserRole: owner".to_string())
        );
        assert!("PAID".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn test_partial_refund_spelling() {
        assert_eq!(TransactionStatus::PartialRefund.as_str(), "partial_refund");
    }

    #[test]
    fn test_super_admin_not_self_assignable() {
        assert!(!UserRole::SuperAdmin.is_self_assignable());
        assert!(UserRole::Vendor.is_self_assignable());
        assert!(UserRole::Customer.is_self_assignable());
    }

    #[test]
    fn test_billing_cycle_months() {
        assert_eq!(BillingCycle::Monthly.months(), 1);
        assert_eq!(BillingCycle::Yearly.months(), 12);
    }
}
