//! Authentication route handlers.
//!
//! Sign-in is passwordless: a code is emailed by `request-otp` and exchanged
//! for a session by `verify-otp`. Super admins can impersonate other users;
//! logging out of an impersonated session returns to the admin account.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_sessions::Session;
use tracing::instrument;

use univendor_core::{Email, UserId, UserRole};

use crate::db::users::{ProfileUpdate, UserRepository};
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{
    OptionalAuth, RequireAuth, RequireRole, SuperAdminOnly, clear_current_user, otp_rate_limiter,
    set_current_user,
};
use crate::models::{CurrentUser, User, session_keys};
use crate::routes::cart::take_guest_token;
use crate::services::auth::AuthService;
use crate::services::cart::CartService;
use crate::state::AppState;

/// Build the auth router (mounted at `/api/auth`).
pub fn router() -> Router<AppState> {
    let otp = Router::new()
        .route("/request-otp", post(request_otp))
        .route("/verify-otp", post(verify_otp))
        .layer(otp_rate_limiter());

    Router::new()
        .merge(otp)
        .route("/session", get(session))
        .route("/logout", post(logout))
        .route("/register", post(register))
        .route("/profile", put(update_profile))
        .route("/impersonate/{user_id}", post(impersonate))
        .route("/impersonation-status", get(impersonation_status))
}

fn auth_service(state: &AppState) -> AuthService<'_> {
    AuthService::new(state.pool(), state.email(), state.config().otp_ttl_minutes)
}

/// Put `user` in the session under a fresh session ID.
async fn sign_in(session: &Session, user: &CurrentUser) -> Result<()> {
    session.cycle_id().await?;
    set_current_user(session, user).await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct RequestOtpRequest {
    #[serde(default)]
    pub email: String,
}

/// Email a sign-in code.
#[instrument(skip(state, body), fields(email = %body.email))]
pub async fn request_otp(
    State(state): State<AppState>,
    Json(body): Json<RequestOtpRequest>,
) -> Result<Json<Value>> {
    auth_service(&state).request_otp(&body.email, Utc::now()).await?;
    Ok(Json(json!({ "message": "OTP sent to email" })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub otp: String,
    /// Shoppers sign in as customers; everyone else as vendors.
    #[serde(default)]
    pub is_customer: bool,
}

/// Exchange a sign-in code for a session.
///
/// A guest cart held by the session is moved onto the user.
#[instrument(skip(state, session, body), fields(email = %body.email))]
pub async fn verify_otp(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<VerifyOtpRequest>,
) -> Result<Json<User>> {
    let role = if body.is_customer {
        UserRole::Customer
    } else {
        UserRole::Vendor
    };
    let user = auth_service(&state)
        .verify_otp(&body.email, &body.otp, role, Utc::now())
        .await?;

    let guest_token = take_guest_token(&session).await?;
    sign_in(&session, &CurrentUser::from(&user)).await?;

    if let Some(token) = guest_token {
        CartService::new(state.pool(), state.config().tax_rate)
            .merge_guest(&token, user.id)
            .await?;
    }

    Ok(Json(user))
}

/// The signed-in user as seen by clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    #[serde(flatten)]
    pub user: User,
    pub is_impersonated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_user_id: Option<UserId>,
}

/// Current session, refreshed from the database.
///
/// Role changes made since sign-in take effect here. A user deleted since
/// sign-in is logged out.
#[instrument(skip(state, session, current))]
pub async fn session(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(current): OptionalAuth,
) -> Result<Json<SessionUser>> {
    let current = current.ok_or_else(|| AppError::Unauthorized("Not authenticated".to_string()))?;

    let Some(user) = UserRepository::new(state.pool()).get_by_id(current.id).await? else {
        tracing::info!(user_id = %current.id, "Session user no longer exists");
        session.flush().await?;
        clear_sentry_user();
        return Err(AppError::Unauthorized("User not found".to_string()));
    };

    let refreshed = CurrentUser {
        is_impersonated: current.is_impersonated,
        original_user_id: current.original_user_id,
        ..CurrentUser::from(&user)
    };
    if refreshed.role != current.role {
        tracing::info!(
            user_id = %user.id,
            old_role = %current.role,
            new_role = %refreshed.role,
            "Session role refreshed"
        );
    }
    set_current_user(&session, &refreshed).await?;

    Ok(Json(SessionUser {
        user,
        is_impersonated: refreshed.is_impersonated,
        original_user_id: refreshed.original_user_id,
    }))
}

/// End the session, or step back out of an impersonated one.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<Json<Value>> {
    if let Some(original) = session
        .remove::<CurrentUser>(session_keys::ORIGINAL_USER)
        .await?
    {
        set_current_user(&session, &original).await?;
        set_sentry_user(&original.id, Some(original.email.as_str()));
        tracing::info!(user_id = %original.id, "Impersonation ended");
        return Ok(Json(json!({
            "message": "Returned to original account",
            "user": original,
            "impersonationEnded": true,
        })));
    }

    clear_current_user(&session).await?;
    session.flush().await?;
    clear_sentry_user();
    Ok(Json(json!({ "message": "Logged out successfully" })))
}

/// Act as another user (super admin only).
#[instrument(skip(state, session, admin))]
pub async fn impersonate(
    State(state): State<AppState>,
    session: Session,
    admin: RequireRole<SuperAdminOnly>,
    Path(user_id): Path<UserId>,
) -> Result<Json<Value>> {
    let admin = admin.into_user();
    if admin.is_impersonated {
        return Err(AppError::BadRequest(
            "Already impersonating a user".to_string(),
        ));
    }

    let target = UserRepository::new(state.pool())
        .get_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let impersonated = CurrentUser {
        is_impersonated: true,
        original_user_id: Some(admin.id),
        ..CurrentUser::from(&target)
    };

    session.insert(session_keys::ORIGINAL_USER, &admin).await?;
    set_current_user(&session, &impersonated).await?;
    tracing::info!(admin_id = %admin.id, user_id = %target.id, "Impersonation started");

    Ok(Json(json!({
        "message": "Impersonation started",
        "user": impersonated,
        "impersonationStarted": true,
    })))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginalUser {
    pub id: UserId,
    pub email: Email,
    pub role: UserRole,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpersonationStatus {
    pub is_impersonating: bool,
    pub original_user: Option<OriginalUser>,
}

pub async fn impersonation_status(
    session: Session,
    RequireAuth(_user): RequireAuth,
) -> Result<Json<ImpersonationStatus>> {
    let original = session
        .get::<CurrentUser>(session_keys::ORIGINAL_USER)
        .await?;

    Ok(Json(ImpersonationStatus {
        is_impersonating: original.is_some(),
        original_user: original.map(|u| OriginalUser {
            id: u.id,
            email: u.email,
            role: u.role,
            first_name: u.first_name,
            last_name: u.last_name,
        }),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub role: Option<UserRole>,
}

/// Create an account with a full profile and sign in.
#[instrument(skip(state, session, body), fields(email = %body.email))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<RegisterRequest>,
) -> Result<Json<User>> {
    let user = auth_service(&state)
        .register(&body.email, &body.first_name, &body.last_name, body.role)
        .await?;

    sign_in(&session, &CurrentUser::from(&user)).await?;
    tracing::info!(user_id = %user.id, role = %user.role, "User registered");
    Ok(Json(user))
}

/// Edit the signed-in user's profile.
#[instrument(skip(state, session, current, body))]
pub async fn update_profile(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(current): RequireAuth,
    Json(body): Json<ProfileUpdate>,
) -> Result<Json<User>> {
    let user = UserRepository::new(state.pool())
        .update_profile(current.id, &body)
        .await?;

    let refreshed = CurrentUser {
        is_impersonated: current.is_impersonated,
        original_user_id: current.original_user_id,
        ..CurrentUser::from(&user)
    };
    set_current_user(&session, &refreshed).await?;
    Ok(Json(user))
}
