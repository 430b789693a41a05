//! Reporting queries over completed orders.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use univendor_core::VendorId;

use super::RepositoryError;

/// Units sold and revenue for one product.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductSalesRow {
    pub name: String,
    pub sales: i64,
    pub revenue: Decimal,
}

/// Revenue attributed to one category.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CategorySalesRow {
    pub name: String,
    pub amount: Decimal,
}

/// Platform-wide counters for the super admin dashboard.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PlatformStats {
    pub total_vendors: i64,
    pub active_domains: i64,
    pub total_revenue: Decimal,
    pub pending_issues: i64,
}

pub struct AnalyticsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AnalyticsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The vendor's products by units sold in completed orders, best first.
    /// Products that never sold are included with zero sales.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn top_products(
        &self,
        vendor_id: VendorId,
        limit: i64,
    ) -> Result<Vec<ProductSalesRow>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductSalesRow>(
            r"
            SELECT p.name,
                   COALESCE(SUM(oi.quantity), 0)::BIGINT AS sales,
                   COALESCE(SUM(oi.price * oi.quantity), 0) AS revenue
            FROM products p
            LEFT JOIN order_items oi ON oi.product_id = p.id
                AND EXISTS (
                    SELECT 1 FROM orders o WHERE o.id = oi.order_id AND o.status = 'completed'
                )
            WHERE p.vendor_id = $1
            GROUP BY p.id, p.name
            ORDER BY sales DESC, p.id
            LIMIT $2
            ",
        )
        .bind(vendor_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Completed-order counts keyed by UTC hour of day (0-23). Hours without
    /// orders are omitted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn orders_by_hour(&self, vendor_id: VendorId) -> Result<Vec<(i32, i64)>, RepositoryError> {
        let rows: Vec<(i32, i64)> = sqlx::query_as(
            r"
            SELECT EXTRACT(HOUR FROM created_at AT TIME ZONE 'UTC')::INTEGER AS hour,
                   COUNT(*) AS orders
            FROM orders
            WHERE vendor_id = $1 AND status = 'completed'
            GROUP BY hour
            ",
        )
        .bind(vendor_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Completed order line totals grouped by product category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn sales_by_category(
        &self,
        vendor_id: VendorId,
    ) -> Result<Vec<CategorySalesRow>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategorySalesRow>(
            r"
            SELECT c.name, SUM(oi.total) AS amount
            FROM order_items oi
            JOIN orders o ON o.id = oi.order_id
            JOIN products p ON p.id = oi.product_id
            JOIN product_categories c ON c.id = p.category_id
            WHERE o.vendor_id = $1 AND o.status = 'completed'
            GROUP BY c.id, c.name
            ",
        )
        .bind(vendor_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn platform_stats(&self) -> Result<PlatformStats, RepositoryError> {
        let stats = sqlx::query_as::<_, PlatformStats>(
            r"
            SELECT
                (SELECT COUNT(*) FROM vendors) AS total_vendors,
                (SELECT COUNT(*) FROM domains WHERE status = 'active') AS active_domains,
                (SELECT COALESCE(SUM(total), 0) FROM orders WHERE payment_status = 'paid')
                    AS total_revenue,
                (
                    (SELECT COUNT(*) FROM domains WHERE status = 'error' OR ssl_status = 'invalid')
                    + (SELECT COUNT(*) FROM vendors WHERE status = 'suspended')
                    + (SELECT COUNT(*) FROM vendors WHERE subscription_status = 'overdue')
                ) AS pending_issues
            ",
        )
        .fetch_one(self.pool)
        .await?;

        Ok(stats)
    }
}
