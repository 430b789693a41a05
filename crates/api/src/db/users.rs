//! User repository for database operations.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{PgExecutor, PgPool};

use univendor_core::{Email, UserId, UserRole};

use super::RepositoryError;
use crate::models::User;

const USER_COLUMNS: &str = "id, email, first_name, last_name, phone, avatar_url, role, \
                            is_profile_complete, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    email: String,
    first_name: Option<String>,
    last_name: Option<String>,
    phone: Option<String>,
    avatar_url: Option<String>,
    role: UserRole,
    is_profile_complete: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&r.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: r.id,
            email,
            first_name: r.first_name,
            last_name: r.last_name,
            phone: r.phone,
            avatar_url: r.avatar_url,
            role: r.role,
            is_profile_complete: r.is_profile_complete,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Fields for a new user.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub email: &'a Email,
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub role: UserRole,
    pub is_profile_complete: bool,
}

/// Profile fields a user may edit.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the email in the database is invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user by their email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// List all users, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(User::try_from).collect()
    }

    /// Create a new user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, new: &NewUser<'_>) -> Result<User, RepositoryError> {
        insert_user(self.pool, new).await
    }

    /// Fetch the user with this email, creating it with `role` if absent.
    ///
    /// Concurrent first logins for the same email converge on one row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_or_create(
        &self,
        email: &Email,
        role: UserRole,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            INSERT INTO users (email, role, is_profile_complete)
            VALUES ($1, $2, FALSE)
            ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(email.as_str())
        .bind(role)
        .fetch_one(self.pool)
        .await?;

        User::try_from(row)
    }

    /// Update a user's editable profile fields.
    ///
    /// Absent fields are left unchanged. The profile is marked complete once
    /// both names are present.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    pub async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            UPDATE users SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                phone = COALESCE($4, phone),
                avatar_url = COALESCE($5, avatar_url),
                is_profile_complete = is_profile_complete OR (
                    NULLIF(TRIM(COALESCE($2, first_name)), '') IS NOT NULL
                    AND NULLIF(TRIM(COALESCE($3, last_name)), '') IS NOT NULL
                ),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(update.first_name.as_deref())
        .bind(update.last_name.as_deref())
        .bind(update.phone.as_deref())
        .bind(update.avatar_url.as_deref())
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        User::try_from(row)
    }

    /// Change a user's role.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    pub async fn set_role(&self, id: UserId, role: UserRole) -> Result<User, RepositoryError> {
        set_role(self.pool, id, role).await
    }

    /// Create a super admin, or promote the existing account with this email.
    ///
    /// Returns the user and whether it was newly created.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert_super_admin(
        &self,
        email: &Email,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<(User, bool), RepositoryError> {
        let (created,): (bool,) = sqlx::query_as(
            r"
            INSERT INTO users (email, first_name, last_name, role, is_profile_complete)
            VALUES ($1, $2, $3, 'super_admin', $2 IS NOT NULL AND $3 IS NOT NULL)
            ON CONFLICT (email) DO UPDATE SET
                role = 'super_admin',
                first_name = COALESCE(EXCLUDED.first_name, users.first_name),
                last_name = COALESCE(EXCLUDED.last_name, users.last_name),
                updated_at = NOW()
            RETURNING (xmax = 0)
            ",
        )
        .bind(email.as_str())
        .bind(first_name)
        .bind(last_name)
        .fetch_one(self.pool)
        .await?;

        let user = self
            .get_by_email(email)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        Ok((user, created))
    }
}

/// Insert a user on any executor (pool or open transaction).
pub(crate) async fn insert_user<'e>(
    executor: impl PgExecutor<'e>,
    new: &NewUser<'_>,
) -> Result<User, RepositoryError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        r"
        INSERT INTO users (email, first_name, last_name, role, is_profile_complete)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {USER_COLUMNS}
        "
    ))
    .bind(new.email.as_str())
    .bind(new.first_name)
    .bind(new.last_name)
    .bind(new.role)
    .bind(new.is_profile_complete)
    .fetch_one(executor)
    .await
    .map_err(|e| RepositoryError::unique_violation(e, "email already exists"))?;

    User::try_from(row)
}

/// Change a user's role on any executor.
pub(crate) async fn set_role<'e>(
    executor: impl PgExecutor<'e>,
    id: UserId,
    role: UserRole,
) -> Result<User, RepositoryError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
    ))
    .bind(id)
    .bind(role)
    .fetch_optional(executor)
    .await?
    .ok_or(RepositoryError::NotFound)?;

    User::try_from(row)
}
