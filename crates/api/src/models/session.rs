//! Session-related types.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use univendor_core::{Email, UserId, UserRole};

use super::User;

/// Session-stored user identity.
///
/// Refreshed from the database on every `/api/auth/session` call so role
/// changes take effect without a new login.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub id: UserId,
    pub email: Email,
    pub role: UserRole,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// True while a super admin is acting as this user.
    #[serde(default)]
    pub is_impersonated: bool,
    /// The super admin behind an impersonated session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_user_id: Option<UserId>,
}

impl CurrentUser {
    #[must_use]
    pub fn is_super_admin(&self) -> bool {
        self.role == UserRole::SuperAdmin
    }
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            is_impersonated: false,
            original_user_id: None,
        }
    }
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the super admin identity saved while impersonating.
    pub const ORIGINAL_USER: &str = "original_user";

    /// Key for the token that owns a guest cart.
    pub const GUEST_CART_TOKEN: &str = "guest_cart_token";
}
