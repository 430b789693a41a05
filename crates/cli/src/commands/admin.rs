//! Super admin account management.

use univendor_api::db::users::UserRepository;
use univendor_core::Email;

use super::{CliError, connect};

/// Create a super admin, or promote the account that already uses `email`.
///
/// # Errors
///
/// Returns an error for a malformed email or a database failure.
pub async fn create(
    email: &str,
    first_name: Option<&str>,
    last_name: Option<&str>,
) -> Result<(), CliError> {
    let email = Email::parse(email).map_err(|e| CliError::InvalidEmail(e.to_string()))?;
    let pool = connect().await?;

    let (user, created) = UserRepository::new(&pool)
        .upsert_super_admin(&email, first_name, last_name)
        .await?;

    if created {
        tracing::info!(user_id = %user.id, email = %user.email, "Super admin created");
    } else {
        tracing::info!(user_id = %user.id, email = %user.email, "Existing user promoted to super admin");
    }
    Ok(())
}
