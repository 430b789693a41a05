//! Vendor dashboard reports.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use sqlx::PgPool;

use univendor_core::{VendorId, format_usd};

use crate::db::RepositoryError;
use crate::db::analytics::{AnalyticsRepository, CategorySalesRow, PlatformStats, ProductSalesRow};

pub const DEFAULT_TOP_PRODUCTS: i64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopProduct {
    pub name: String,
    pub sales: i64,
    /// Formatted, e.g. `$1299.00`.
    pub revenue: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HourlySales {
    pub hour: String,
    pub sales: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryShare {
    pub name: String,
    /// Whole-number percentage of total category sales.
    pub value: i64,
    pub amount: String,
}

/// `12am`, `1am` ... `11am`, `12pm`, `1pm` ... `11pm`.
#[must_use]
pub fn hour_label(hour: u32) -> String {
    match hour {
        0 => "12am".to_string(),
        1..=11 => format!("{hour}am"),
        12 => "12pm".to_string(),
        _ => format!("{}pm", hour - 12),
    }
}

/// Spread per-hour counts over 24 buckets and keep every third one
/// (12am, 3am, ..., 9pm).
#[must_use]
pub fn hourly_buckets(counts: &[(i32, i64)]) -> Vec<HourlySales> {
    let mut buckets = [0_i64; 24];
    for &(hour, count) in counts {
        if let Some(slot) = usize::try_from(hour).ok().and_then(|h| buckets.get_mut(h)) {
            *slot += count;
        }
    }

    (0_u32..24)
        .zip(buckets)
        .step_by(3)
        .map(|(hour, sales)| HourlySales {
            hour: hour_label(hour),
            sales,
        })
        .collect()
}

/// Each category's share of the total, largest first.
#[must_use]
pub fn category_shares(rows: &[CategorySalesRow]) -> Vec<CategoryShare> {
    let total: Decimal = rows.iter().map(|r| r.amount).sum();
    let denominator = if total.is_zero() { Decimal::ONE } else { total };

    let mut shares: Vec<CategoryShare> = rows
        .iter()
        .map(|row| {
            let percent = (row.amount / denominator * Decimal::ONE_HUNDRED)
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
            CategoryShare {
                name: row.name.clone(),
                value: percent.to_i64().unwrap_or(0),
                amount: format_usd(row.amount),
            }
        })
        .collect();
    shares.sort_by(|a, b| b.value.cmp(&a.value));
    shares
}

fn top_product(row: ProductSalesRow) -> TopProduct {
    TopProduct {
        name: row.name,
        sales: row.sales,
        revenue: format_usd(row.revenue),
    }
}

pub struct AnalyticsService<'a> {
    repo: AnalyticsRepository<'a>,
}

impl<'a> AnalyticsService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            repo: AnalyticsRepository::new(pool),
        }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn top_products(
        &self,
        vendor_id: VendorId,
        limit: Option<i64>,
    ) -> Result<Vec<TopProduct>, RepositoryError> {
        let limit = limit.filter(|l| *l > 0).unwrap_or(DEFAULT_TOP_PRODUCTS);
        let rows = self.repo.top_products(vendor_id, limit).await?;
        Ok(rows.into_iter().map(top_product).collect())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn sales_by_hour(&self, vendor_id: VendorId) -> Result<Vec<HourlySales>, RepositoryError> {
        let counts = self.repo.orders_by_hour(vendor_id).await?;
        Ok(hourly_buckets(&counts))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn sales_by_category(
        &self,
        vendor_id: VendorId,
    ) -> Result<Vec<CategoryShare>, RepositoryError> {
        let rows = self.repo.sales_by_category(vendor_id).await?;
        Ok(category_shares(&rows))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn platform_stats(&self) -> Result<PlatformStats, RepositoryError> {
        self.repo.platform_stats().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hour_label() {
        assert_eq!(hour_label(0), "12am");
        assert_eq!(hour_label(9), "9am");
        assert_eq!(hour_label(12), "12pm");
        assert_eq!(hour_label(23), "11pm");
    }

    #[test]
    fn test_hourly_buckets_every_third_hour() {
        let buckets = hourly_buckets(&[(0, 2), (3, 5), (4, 7), (21, 1), (99, 4)]);
        let labels: Vec<&str> = buckets.iter().map(|b| b.hour.as_str()).collect();
        assert_eq!(
            labels,
            ["12am", "3am", "6am", "9am", "12pm", "3pm", "6pm", "9pm"]
        );
        let sales: Vec<i64> = buckets.iter().map(|b| b.sales).collect();
        assert_eq!(sales, [2, 5, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn test_category_shares() {
        let rows = vec![
            CategorySalesRow {
                name: "Shoes".to_string(),
                amount: Decimal::new(2500, 2),
            },
            CategorySalesRow {
                name: "Hats".to_string(),
                amount: Decimal::new(7500, 2),
            },
        ];
        let shares = category_shares(&rows);
        assert_eq!(
            shares,
            vec![
                CategoryShare {
                    name: "Hats".to_string(),
                    value: 75,
                    amount: "$75.00".to_string(),
                },
                CategoryShare {
                    name: "Shoes".to_string(),
                    value: 25,
                    amount: "$25.00".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_category_shares_empty() {
        assert!(category_shares(&[]).is_empty());
    }
}
