//! Periodic maintenance jobs, meant to be run from cron.

use chrono::Utc;

use univendor_api::db::domains::DomainRepository;
use univendor_api::db::otp::OtpRepository;

use super::{CliError, connect};

/// Mark SSL active on every active, verified domain.
///
/// # Errors
///
/// Returns an error if the database is unreachable or the update fails.
pub async fn check_ssl() -> Result<(), CliError> {
    let pool = connect().await?;
    let updated = DomainRepository::new(&pool)
        .activate_ssl_for_live(Utc::now())
        .await?;

    tracing::info!(updated, "SSL check complete");
    Ok(())
}

/// Delete login codes that have already expired.
///
/// # Errors
///
/// Returns an error if the database is unreachable or the delete fails.
pub async fn purge_otps() -> Result<(), CliError> {
    let pool = connect().await?;
    let removed = OtpRepository::new(&pool).purge_expired(Utc::now()).await?;

    tracing::info!(removed, "Expired login codes purged");
    Ok(())
}
