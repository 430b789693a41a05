//! Product category repository.

use serde::Deserialize;
use sqlx::PgPool;

use univendor_core::{CategoryId, VendorId};

use super::RepositoryError;
use crate::models::catalog::{Category, CategoryWithCount};

const CATEGORY_COLUMNS: &str = "id, vendor_id, name, description, image_url, parent_id, level, \
                                is_global, created_at, updated_at";

/// Editable category fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryInput {
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub parent_id: Option<CategoryId>,
}

pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let category = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM product_categories WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(category)
    }

    /// The vendor's own categories plus every global one, with the number of
    /// the vendor's products in each.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_vendor(
        &self,
        vendor_id: VendorId,
    ) -> Result<Vec<CategoryWithCount>, RepositoryError> {
        let categories = sqlx::query_as::<_, CategoryWithCount>(
            r"
            SELECT c.id, c.vendor_id, c.name, c.description, c.image_url, c.parent_id,
                   c.level, c.is_global, c.created_at, c.updated_at,
                   COUNT(p.id) AS product_count
            FROM product_categories c
            LEFT JOIN products p ON p.category_id = c.id AND p.vendor_id = $1
            WHERE c.vendor_id = $1 OR c.is_global
            GROUP BY c.id
            ORDER BY c.level, c.name, c.id
            ",
        )
        .bind(vendor_id)
        .fetch_all(self.pool)
        .await?;

        Ok(categories)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_global(&self) -> Result<Vec<Category>, RepositoryError> {
        let categories = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM product_categories WHERE is_global \
             ORDER BY level, name, id"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(categories)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Category>, RepositoryError> {
        let categories = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM product_categories ORDER BY level, name, id"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(categories)
    }

    /// Direct children of `parent_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn children(&self, parent_id: CategoryId) -> Result<Vec<Category>, RepositoryError> {
        let categories = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM product_categories WHERE parent_id = $1 \
             ORDER BY name, id"
        ))
        .bind(parent_id)
        .fetch_all(self.pool)
        .await?;

        Ok(categories)
    }

    /// Create a category owned by `vendor_id`, or a global one when `None`.
    ///
    /// `level` is one deeper than the parent's, 0 for roots.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the parent doesn't exist and
    /// `RepositoryError::Conflict` if a global category with this name exists.
    pub async fn create(
        &self,
        vendor_id: Option<VendorId>,
        input: &CategoryInput,
    ) -> Result<Category, RepositoryError> {
        let level = self.child_level(input.parent_id).await?;

        let category = sqlx::query_as::<_, Category>(&format!(
            r"
            INSERT INTO product_categories (
                vendor_id, name, description, image_url, parent_id, level, is_global
            )
            VALUES ($1, $2, $3, $4, $5, $6, $1 IS NULL)
            RETURNING {CATEGORY_COLUMNS}
            "
        ))
        .bind(vendor_id)
        .bind(&input.name)
        .bind(input.description.as_deref())
        .bind(input.image_url.as_deref())
        .bind(input.parent_id)
        .bind(level)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_violation(e, "Category already exists"))?;

        Ok(category)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category or new parent
    /// doesn't exist.
    pub async fn update(
        &self,
        id: CategoryId,
        input: &CategoryInput,
    ) -> Result<Category, RepositoryError> {
        if input.parent_id == Some(id) {
            return Err(RepositoryError::Conflict(
                "A category cannot be its own parent".to_owned(),
            ));
        }
        let level = self.child_level(input.parent_id).await?;

        let category = sqlx::query_as::<_, Category>(&format!(
            r"
            UPDATE product_categories SET
                name = $2, description = $3, image_url = $4, parent_id = $5, level = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {CATEGORY_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&input.name)
        .bind(input.description.as_deref())
        .bind(input.image_url.as_deref())
        .bind(input.parent_id)
        .bind(level)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_violation(e, "Category already exists"))?
        .ok_or(RepositoryError::NotFound)?;

        Ok(category)
    }

    /// Delete a category. Products and subcategories keep existing with the
    /// reference cleared.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category doesn't exist.
    pub async fn delete(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM product_categories WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn child_level(&self, parent_id: Option<CategoryId>) -> Result<i32, RepositoryError> {
        let Some(parent_id) = parent_id else {
            return Ok(0);
        };
        let parent = self.get(parent_id).await?.ok_or(RepositoryError::NotFound)?;
        Ok(parent.level + 1)
    }
}
