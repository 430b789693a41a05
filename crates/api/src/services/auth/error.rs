//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::email::EmailError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] univendor_core::EmailError),

    /// Email or code missing from the request.
    #[error("email and code are required")]
    MissingCredentials,

    /// No unused, unexpired code exists for the email.
    #[error("no valid code for this email")]
    NoValidCode,

    /// The submitted code does not match.
    #[error("invalid code")]
    InvalidCode,

    /// User not found.
    #[error("user not found")]
    UserNotFound,

    /// User already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// The requested role cannot be chosen by the user.
    #[error("role cannot be self-assigned")]
    RoleNotAllowed,

    /// The code email could not be sent.
    #[error("email delivery failed: {0}")]
    Email(#[from] EmailError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}
