//! User administration (super admin).

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, patch},
};
use serde::Deserialize;
use tracing::instrument;

use univendor_core::{UserId, UserRole};

use crate::db::users::UserRepository;
use crate::error::Result;
use crate::middleware::{RequireRole, SuperAdminOnly};
use crate::models::User;
use crate::routes::not_found;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(list))
        .route("/api/users/{id}", get(show))
        .route("/api/users/{id}/role", patch(set_role))
}

pub async fn list(
    State(state): State<AppState>,
    _admin: RequireRole<SuperAdminOnly>,
) -> Result<Json<Vec<User>>> {
    Ok(Json(UserRepository::new(state.pool()).list().await?))
}

pub async fn show(
    State(state): State<AppState>,
    _admin: RequireRole<SuperAdminOnly>,
    Path(id): Path<UserId>,
) -> Result<Json<User>> {
    UserRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("User"))
}

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: UserRole,
}

/// Change a user's role. Takes effect on the user's next session check.
#[instrument(skip(state, admin))]
pub async fn set_role(
    State(state): State<AppState>,
    RequireRole(admin, _): RequireRole<SuperAdminOnly>,
    Path(id): Path<UserId>,
    Json(body): Json<SetRoleRequest>,
) -> Result<Json<User>> {
    let user = UserRepository::new(state.pool()).set_role(id, body.role).await?;
    tracing::info!(admin_id = %admin.id, user_id = %id, role = %body.role, "User role changed");
    Ok(Json(user))
}
