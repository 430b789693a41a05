//! Authentication service.
//!
//! Passwordless sign-in with emailed one-time codes. A code is valid for a
//! configurable number of minutes and can be used once; only its SHA-256
//! digest is stored.

mod error;

pub use error::AuthError;

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use univendor_core::{Email, OtpCode, UserRole};

use crate::db::RepositoryError;
use crate::db::otp::OtpRepository;
use crate::db::users::{NewUser, UserRepository};
use crate::models::User;
use crate::services::email::EmailService;

/// Hex SHA-256 digest of a code, as stored in `otp_codes.code_hash`.
#[must_use]
pub fn hash_code(code: &OtpCode) -> String {
    hex::encode(Sha256::digest(code.as_str().as_bytes()))
}

/// Compare two digests without short-circuiting on the first mismatch.
fn digests_match(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a
            .bytes()
            .zip(b.bytes())
            .fold(0u8, |acc, (x, y)| acc | (x ^ y))
            == 0
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
    otps: OtpRepository<'a>,
    email: &'a EmailService,
    otp_ttl_minutes: i64,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, email: &'a EmailService, otp_ttl_minutes: i64) -> Self {
        Self {
            users: UserRepository::new(pool),
            otps: OtpRepository::new(pool),
            email,
            otp_ttl_minutes,
        }
    }

    /// Issue a fresh code for `email` and send it.
    ///
    /// Earlier codes stay valid until they expire or one of them is used.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` for a malformed address and
    /// `AuthError::Email` if delivery fails.
    pub async fn request_otp(&self, email: &str, now: DateTime<Utc>) -> Result<(), AuthError> {
        let email = Email::parse(email)?;
        let code = OtpCode::generate();
        let expires_at = now + Duration::minutes(self.otp_ttl_minutes);

        self.otps.create(&email, &hash_code(&code), expires_at).await?;
        self.email.send_otp(&email, &code, self.otp_ttl_minutes).await?;

        tracing::info!(email = %email, "Sign-in code issued");
        Ok(())
    }

    /// Check a submitted code and return the signed-in user.
    ///
    /// The newest unused, unexpired code for the email is compared. On a
    /// match it is consumed and the user is fetched, or created with `role`
    /// on first sign-in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingCredentials`, `AuthError::NoValidCode` or
    /// `AuthError::InvalidCode` when the code cannot be accepted.
    pub async fn verify_otp(
        &self,
        email: &str,
        code: &str,
        role: UserRole,
        now: DateTime<Utc>,
    ) -> Result<User, AuthError> {
        if email.trim().is_empty() || code.trim().is_empty() {
            return Err(AuthError::MissingCredentials);
        }
        let email = Email::parse(email)?;

        let record = self
            .otps
            .latest_valid(&email, now)
            .await?
            .ok_or(AuthError::NoValidCode)?;

        let code = OtpCode::parse(code).map_err(|_| AuthError::InvalidCode)?;
        if !digests_match(&hash_code(&code), &record.code_hash) {
            tracing::info!(email = %email, "Sign-in code mismatch");
            return Err(AuthError::InvalidCode);
        }

        // A concurrent request may have consumed the same code.
        if !self.otps.mark_used(record.id).await? {
            return Err(AuthError::NoValidCode);
        }

        let user = self.users.get_or_create(&email, role).await?;
        tracing::info!(user_id = %user.id, "User signed in");
        Ok(user)
    }

    /// Create an account with a complete profile.
    ///
    /// Defaults to the vendor role. `super_admin` is never self-assignable.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserAlreadyExists` if the email is registered and
    /// `AuthError::RoleNotAllowed` for a privileged role.
    pub async fn register(
        &self,
        email: &str,
        first_name: &str,
        last_name: &str,
        role: Option<UserRole>,
    ) -> Result<User, AuthError> {
        let email = Email::parse(email)?;
        let role = role.unwrap_or(UserRole::Vendor);
        if !role.is_self_assignable() {
            return Err(AuthError::RoleNotAllowed);
        }

        let first_name = first_name.trim();
        let last_name = last_name.trim();
        let new = NewUser {
            email: &email,
            first_name: Some(first_name).filter(|s| !s.is_empty()),
            last_name: Some(last_name).filter(|s| !s.is_empty()),
            role,
            is_profile_complete: !first_name.is_empty() && !last_name.is_empty(),
        };

        self.users.create(&new).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
            other => AuthError::Repository(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_code_is_stable_hex() {
        let code = OtpCode::parse("123456").expect("valid code");
        let digest = hash_code(&code);
        assert_eq!(digest.len(), 64);
        assert_eq!(
            digest,
            "8d969eef6ecad3c29a3a629280e686cf0c3f5d5a86aff3ca12020c923adc6c92"
        );
        assert_eq!(digest, hash_code(&code));
    }

    #[test]
    fn test_digests_match() {
        assert!(digests_match("abc", "abc"));
        assert!(!digests_match("abc", "abd"));
        assert!(!digests_match("abc", "abcd"));
    }
}
