//! Customer address book.
//!
//! A customer has at most one default address; setting a new default
//! clears the old one in the same transaction.

use sqlx::{PgConnection, PgPool};

use univendor_core::{AddressId, CustomerId};

use super::RepositoryError;
use crate::models::order::{Address, AddressInput};

const ADDRESS_COLUMNS: &str = "id, customer_id, full_name, line1, line2, city, state, \
                               postal_code, country, phone, is_default, created_at, updated_at";

pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, customer_id: CustomerId) -> Result<Vec<Address>, RepositoryError> {
        let addresses = sqlx::query_as::<_, Address>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM customer_addresses WHERE customer_id = $1 \
             ORDER BY is_default DESC, created_at, id"
        ))
        .bind(customer_id)
        .fetch_all(self.pool)
        .await?;

        Ok(addresses)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: AddressId) -> Result<Option<Address>, RepositoryError> {
        let address = sqlx::query_as::<_, Address>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM customer_addresses WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(address)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a statement fails.
    pub async fn create(
        &self,
        customer_id: CustomerId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let address = insert_address(&mut tx, customer_id, input).await?;
        tx.commit().await?;
        Ok(address)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address doesn't exist.
    pub async fn update(&self, id: AddressId, input: &AddressInput) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (customer_id,): (CustomerId,) =
            sqlx::query_as("SELECT customer_id FROM customer_addresses WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(RepositoryError::NotFound)?;

        if input.is_default {
            clear_default(&mut tx, customer_id).await?;
        }

        let address = sqlx::query_as::<_, Address>(&format!(
            r"
            UPDATE customer_addresses SET
                full_name = $2, line1 = $3, line2 = $4, city = $5, state = $6,
                postal_code = $7, country = $8, phone = $9,
                is_default = $10 OR is_default, updated_at = NOW()
            WHERE id = $1
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&input.full_name)
        .bind(&input.line1)
        .bind(input.line2.as_deref())
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.postal_code)
        .bind(&input.country)
        .bind(input.phone.as_deref())
        .bind(input.is_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(address)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address doesn't exist.
    pub async fn delete(&self, id: AddressId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM customer_addresses WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

/// Insert an address inside an open transaction. The customer's first
/// address becomes the default.
pub(crate) async fn insert_address(
    conn: &mut PgConnection,
    customer_id: CustomerId,
    input: &AddressInput,
) -> Result<Address, RepositoryError> {
    let (has_default,): (bool,) = sqlx::query_as(
        "SELECT EXISTS (SELECT 1 FROM customer_addresses WHERE customer_id = $1 AND is_default)",
    )
    .bind(customer_id)
    .fetch_one(&mut *conn)
    .await?;

    let is_default = input.is_default || !has_default;
    if is_default && has_default {
        clear_default(&mut *conn, customer_id).await?;
    }

    let address = sqlx::query_as::<_, Address>(&format!(
        r"
        INSERT INTO customer_addresses (
            customer_id, full_name, line1, line2, city, state, postal_code, country, phone,
            is_default
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING {ADDRESS_COLUMNS}
        "
    ))
    .bind(customer_id)
    .bind(&input.full_name)
    .bind(&input.line1)
    .bind(input.line2.as_deref())
    .bind(&input.city)
    .bind(&input.state)
    .bind(&input.postal_code)
    .bind(&input.country)
    .bind(input.phone.as_deref())
    .bind(is_default)
    .fetch_one(conn)
    .await?;

    Ok(address)
}

async fn clear_default(conn: &mut PgConnection, customer_id: CustomerId) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE customer_addresses SET is_default = FALSE, updated_at = NOW() \
         WHERE customer_id = $1 AND is_default",
    )
    .bind(customer_id)
    .execute(conn)
    .await?;
    Ok(())
}
