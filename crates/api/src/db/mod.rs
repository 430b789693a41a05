//! Database operations for the API `PostgreSQL` database.
//!
//! ## Tables
//!
//! - `users`, `otp_codes` - Accounts and emailed login codes
//! - `subscription_plans`, `vendors`, `platform_subscriptions`
//! - `domains` - Storefront domains and their verification state
//! - `product_categories`, `products`, `product_variants`
//! - `carts`, `cart_items`
//! - `customers`, `customer_addresses`, `orders`, `order_items`
//! - `payment_methods`, `invoices`, `transactions`, `payouts`
//! - `tower_sessions.session` - Created by the session store on startup
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p univendor-cli -- migrate
//! ```

pub mod addresses;
pub mod analytics;
pub mod carts;
pub mod categories;
pub mod customers;
pub mod domains;
pub mod orders;
pub mod otp;
pub mod payments;
pub mod plans;
pub mod products;
pub mod subscriptions;
pub mod users;
pub mod vendors;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map unique-constraint violations to `Conflict(message)`.
    pub(crate) fn unique_violation(e: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return Self::Conflict(message.to_owned());
        }
        Self::Database(e)
    }

    /// Map foreign-key violations to `Conflict(message)`.
    pub(crate) fn foreign_key_violation(e: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_foreign_key_violation()
        {
            return Self::Conflict(message.to_owned());
        }
        Self::Database(e)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(30))
        .connect(database_url.expose_secret())
        .await
}
