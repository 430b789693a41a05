//! Authentication middleware and extractors.
//!
//! Provides extractors for requiring a signed-in user, optionally with a
//! particular role, in route handlers.

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use univendor_core::UserRole;

use crate::error::AppError;
use crate::models::{CurrentUser, session_keys};

/// Extractor that requires an authenticated user.
///
/// Rejects with 401 "Authentication required" when nobody is signed in.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(user): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.email)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

fn unauthenticated() -> AppError {
    AppError::Unauthorized("Authentication required".to_string())
}

async fn session_user(parts: &Parts) -> Option<CurrentUser> {
    let session = parts.extensions.get::<Session>()?;
    session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        session_user(parts)
            .await
            .map(Self)
            .ok_or_else(unauthenticated)
    }
}

/// Extractor that optionally gets the current user.
///
/// Unlike `RequireAuth`, this does not reject anonymous requests.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(session_user(parts).await))
    }
}

/// A set of roles allowed through [`RequireRole`].
pub trait RoleRequirement {
    fn allows(role: UserRole) -> bool;
}

/// Platform operators only.
pub struct SuperAdminOnly;

impl RoleRequirement for SuperAdminOnly {
    fn allows(role: UserRole) -> bool {
        role == UserRole::SuperAdmin
    }
}

/// Store owners, plus super admins acting on their behalf.
pub struct VendorOnly;

impl RoleRequirement for VendorOnly {
    fn allows(role: UserRole) -> bool {
        matches!(role, UserRole::Vendor | UserRole::SuperAdmin)
    }
}

/// Extractor that requires a signed-in user whose role passes `R`.
///
/// Rejects with 401 "Authentication required" or 403 "Insufficient
/// permissions".
pub struct RequireRole<R: RoleRequirement>(pub CurrentUser, pub PhantomData<R>);

impl<R: RoleRequirement> RequireRole<R> {
    #[must_use]
    pub fn into_user(self) -> CurrentUser {
        self.0
    }
}

impl<S, R> FromRequestParts<S> for RequireRole<R>
where
    S: Send + Sync,
    R: RoleRequirement,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = session_user(parts).await.ok_or_else(unauthenticated)?;
        if !R::allows(user.role) {
            return Err(AppError::Forbidden("Insufficient permissions".to_string()));
        }
        Ok(Self(user, PhantomData))
    }
}

/// Helper to set the current user in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Helper to clear the current user from the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentUser>(session_keys::CURRENT_USER)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_requirements() {
        assert!(SuperAdminOnly::allows(UserRole::SuperAdmin));
        assert!(!SuperAdminOnly::allows(UserRole::Vendor));
        assert!(VendorOnly::allows(UserRole::Vendor));
        assert!(VendorOnly::allows(UserRole::SuperAdmin));
        assert!(!VendorOnly::allows(UserRole::Customer));
    }
}
