//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Errors render as a JSON body
//! `{"message": "..."}`; server-side failures are captured to Sentry and
//! reported to the client without detail.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::cart::CartError;
use crate::services::domains::DomainError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Cart or checkout operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Domain operation failed.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User lacks permission.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Session store failure.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

const INTERNAL: &str = "Internal server error";

fn repository_status(err: &RepositoryError) -> (StatusCode, String) {
    match err {
        RepositoryError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
        RepositoryError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string())
        }
    }
}

impl AppError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::Database(err) => repository_status(err),
            Self::Auth(err) => match err {
                AuthError::InvalidEmail(_) => {
                    (StatusCode::BAD_REQUEST, "Invalid email address".to_string())
                }
                AuthError::MissingCredentials => (
                    StatusCode::BAD_REQUEST,
                    "Email and OTP are required".to_string(),
                ),
                AuthError::NoValidCode => (
                    StatusCode::BAD_REQUEST,
                    "No valid OTP found for this email".to_string(),
                ),
                AuthError::InvalidCode => (StatusCode::BAD_REQUEST, "Invalid OTP".to_string()),
                AuthError::UserAlreadyExists => (
                    StatusCode::BAD_REQUEST,
                    "User with this email already exists".to_string(),
                ),
                AuthError::RoleNotAllowed => (
                    StatusCode::FORBIDDEN,
                    "This role cannot be self-assigned".to_string(),
                ),
                AuthError::UserNotFound => (StatusCode::NOT_FOUND, "User not found".to_string()),
                AuthError::Email(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to send OTP email".to_string(),
                ),
                AuthError::Repository(err) => repository_status(err),
            },
            Self::Cart(err) => match err {
                CartError::ProductNotFound => (StatusCode::NOT_FOUND, err.to_string()),
                CartError::Repository(err) => repository_status(err),
                CartError::InvalidQuantity
                | CartError::ProductUnavailable
                | CartError::VariantMismatch
                | CartError::EmptyCart
                | CartError::Invalid(_) => (StatusCode::BAD_REQUEST, err.to_string()),
            },
            Self::Domain(err) => match err {
                DomainError::InvalidName(e) => {
                    (StatusCode::BAD_REQUEST, format!("Invalid domain name: {e}"))
                }
                DomainError::NotPlatformSubdomain(_) | DomainError::VerificationFailed(_) => {
                    (StatusCode::BAD_REQUEST, capitalize(&err.to_string()))
                }
                DomainError::Repository(err) => repository_status(err),
            },
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            Self::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests, please try again later".to_string(),
            ),
            Self::Session(_) | Self::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string())
            }
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (status, Json(json!({ "message": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    async fn get_message(err: AppError) -> String {
        let body = to_bytes(err.into_response().into_body(), 1024)
            .await
            .expect("body");
        let value: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        value["message"].as_str().expect("message").to_string()
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("Vendor not found".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::Conflict("test".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(get_status(AppError::RateLimited), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            get_status(AppError::Database(RepositoryError::NotFound)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::Conflict("x".to_string()))),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Auth(AuthError::InvalidCode)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Cart(CartError::EmptyCart)),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_messages_are_json() {
        assert_eq!(
            get_message(AppError::Auth(AuthError::NoValidCode)).await,
            "No valid OTP found for this email"
        );
        assert_eq!(
            get_message(AppError::Conflict("Cart contains items from another store".to_string()))
                .await,
            "Cart contains items from another store"
        );
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        assert_eq!(
            get_message(AppError::Internal("connection reset by peer".to_string())).await,
            "Internal server error"
        );
        assert_eq!(
            get_message(AppError::Database(RepositoryError::DataCorruption(
                "bad email".to_string()
            )))
            .await,
            "Internal server error"
        );
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("subdomains must end"), "Subdomains must end");
        assert_eq!(capitalize(""), "");
    }
}
