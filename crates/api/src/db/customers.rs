//! Vendor customer repository.

use sqlx::{PgConnection, PgPool};

use univendor_core::{CustomerId, Email, UserId, VendorId};

use super::RepositoryError;
use crate::models::order::Customer;

const CUSTOMER_COLUMNS: &str =
    "id, vendor_id, user_id, email, first_name, last_name, phone, created_at, updated_at";

/// Contact details of a customer.
#[derive(Debug, Clone)]
pub struct CustomerInput {
    pub email: Email,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

pub struct CustomerRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CustomerRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, vendor_id: VendorId) -> Result<Vec<Customer>, RepositoryError> {
        let customers = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE vendor_id = $1 \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(vendor_id)
        .fetch_all(self.pool)
        .await?;

        Ok(customers)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(customer)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the vendor already has a
    /// customer with this email.
    pub async fn create(
        &self,
        vendor_id: VendorId,
        input: &CustomerInput,
    ) -> Result<Customer, RepositoryError> {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            r"
            INSERT INTO customers (vendor_id, email, first_name, last_name, phone)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {CUSTOMER_COLUMNS}
            "
        ))
        .bind(vendor_id)
        .bind(input.email.as_str())
        .bind(input.first_name.as_deref())
        .bind(input.last_name.as_deref())
        .bind(input.phone.as_deref())
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_violation(e, "Customer with this email already exists"))?;

        Ok(customer)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the customer doesn't exist and
    /// `RepositoryError::Conflict` if the new email is taken.
    pub async fn update(
        &self,
        id: CustomerId,
        input: &CustomerInput,
    ) -> Result<Customer, RepositoryError> {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            r"
            UPDATE customers SET
                email = $2, first_name = $3, last_name = $4, phone = $5, updated_at = NOW()
            WHERE id = $1
            RETURNING {CUSTOMER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(input.email.as_str())
        .bind(input.first_name.as_deref())
        .bind(input.last_name.as_deref())
        .bind(input.phone.as_deref())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_violation(e, "Customer with this email already exists"))?
        .ok_or(RepositoryError::NotFound)?;

        Ok(customer)
    }
}

/// Find the vendor's customer with this email or create it, inside an open
/// transaction. Known contact fields are refreshed from `input`.
pub(crate) async fn upsert_customer(
    conn: &mut PgConnection,
    vendor_id: VendorId,
    user_id: Option<UserId>,
    input: &CustomerInput,
) -> Result<Customer, RepositoryError> {
    let customer = sqlx::query_as::<_, Customer>(&format!(
        r"
        INSERT INTO customers (vendor_id, user_id, email, first_name, last_name, phone)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (vendor_id, email) DO UPDATE SET
            user_id = COALESCE(EXCLUDED.user_id, customers.user_id),
            first_name = COALESCE(EXCLUDED.first_name, customers.first_name),
            last_name = COALESCE(EXCLUDED.last_name, customers.last_name),
            phone = COALESCE(EXCLUDED.phone, customers.phone),
            updated_at = NOW()
        RETURNING {CUSTOMER_COLUMNS}
        "
    ))
    .bind(vendor_id)
    .bind(user_id)
    .bind(input.email.as_str())
    .bind(input.first_name.as_deref())
    .bind(input.last_name.as_deref())
    .bind(input.phone.as_deref())
    .fetch_one(conn)
    .await?;

    Ok(customer)
}
