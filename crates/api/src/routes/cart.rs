//! Cart and checkout route handlers.
//!
//! Signed-in shoppers own their cart directly. Guests are identified by a
//! random token kept in the session, created on their first cart write.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, patch, post},
};
use chrono::Utc;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;
use uuid::Uuid;

use univendor_core::{CartItemId, Email, ProductId, VariantId};

use crate::db::customers::CustomerInput;
use crate::db::orders::CheckoutInput;
use crate::error::{AppError, Result};
use crate::middleware::OptionalAuth;
use crate::models::cart::{Cart, CartOwner};
use crate::models::order::{AddressInput, OrderDetail};
use crate::models::{CurrentUser, session_keys};
use crate::services::cart::CartService;
use crate::state::AppState;

/// Build the cart router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/cart", get(show).delete(clear))
        .route("/api/cart/items", post(add))
        .route("/api/cart/items/{item_id}", patch(update).delete(remove))
        .route("/api/checkout", post(checkout))
}

// =============================================================================
// Session Helpers
// =============================================================================

async fn guest_token(session: &Session) -> Result<Option<String>> {
    Ok(session.get::<String>(session_keys::GUEST_CART_TOKEN).await?)
}

/// Remove and return the session's guest cart token.
pub(crate) async fn take_guest_token(session: &Session) -> Result<Option<String>> {
    Ok(session
        .remove::<String>(session_keys::GUEST_CART_TOKEN)
        .await?)
}

/// The cart owner for reads; `None` for a guest without a token yet.
async fn existing_owner(session: &Session, user: Option<&CurrentUser>) -> Result<Option<CartOwner>> {
    if let Some(user) = user {
        return Ok(Some(CartOwner::User(user.id)));
    }
    Ok(guest_token(session).await?.map(CartOwner::Guest))
}

/// The cart owner for writes, issuing a guest token when needed.
async fn owner_for_write(session: &Session, user: Option<&CurrentUser>) -> Result<CartOwner> {
    if let Some(owner) = existing_owner(session, user).await? {
        return Ok(owner);
    }
    let token = Uuid::new_v4().simple().to_string();
    session
        .insert(session_keys::GUEST_CART_TOKEN, &token)
        .await?;
    Ok(CartOwner::Guest(token))
}

fn cart_service(state: &AppState) -> CartService<'_> {
    CartService::new(state.pool(), state.config().tax_rate)
}

// =============================================================================
// Handlers
// =============================================================================

/// The shopper's cart, or an empty one.
#[instrument(skip(state, session, user))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<Cart>> {
    let cart = match existing_owner(&session, user.as_ref()).await? {
        Some(owner) => cart_service(&state).get(&owner).await?,
        None => Cart::empty(),
    };
    Ok(Json(cart))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    #[serde(default = "one")]
    pub quantity: i32,
}

const fn one() -> i32 {
    1
}

#[instrument(skip(state, session, user))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(body): Json<AddToCartRequest>,
) -> Result<Json<Cart>> {
    let owner = owner_for_write(&session, user.as_ref()).await?;
    let cart = cart_service(&state)
        .add(&owner, body.product_id, body.variant_id, body.quantity)
        .await?;
    Ok(Json(cart))
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i32,
}

/// Set a line's quantity; zero removes it.
#[instrument(skip(state, session, user))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Path(item_id): Path<CartItemId>,
    Json(body): Json<UpdateQuantityRequest>,
) -> Result<Json<Cart>> {
    let owner = existing_owner(&session, user.as_ref())
        .await?
        .ok_or_else(|| AppError::NotFound("Cart item not found".to_string()))?;
    let cart = cart_service(&state)
        .update_quantity(&owner, item_id, body.quantity)
        .await?;
    Ok(Json(cart))
}

#[instrument(skip(state, session, user))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Path(item_id): Path<CartItemId>,
) -> Result<Json<Cart>> {
    let owner = existing_owner(&session, user.as_ref())
        .await?
        .ok_or_else(|| AppError::NotFound("Cart item not found".to_string()))?;
    Ok(Json(cart_service(&state).remove(&owner, item_id).await?))
}

#[instrument(skip(state, session, user))]
pub async fn clear(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<Cart>> {
    let cart = match existing_owner(&session, user.as_ref()).await? {
        Some(owner) => cart_service(&state).clear(&owner).await?,
        None => Cart::empty(),
    };
    Ok(Json(cart))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    /// Defaults to the signed-in user's email.
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub shipping_address: AddressInput,
    pub notes: Option<String>,
}

/// Place an order for the whole cart.
#[instrument(skip(state, session, user, body))]
pub async fn checkout(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(body): Json<CheckoutRequest>,
) -> Result<Json<OrderDetail>> {
    let email = match (body.email.as_deref(), user.as_ref()) {
        (Some(email), _) => {
            Email::parse(email).map_err(|e| AppError::BadRequest(e.to_string()))?
        }
        (None, Some(user)) => user.email.clone(),
        (None, None) => return Err(AppError::BadRequest("Email is required".to_string())),
    };

    let owner = existing_owner(&session, user.as_ref())
        .await?
        .ok_or_else(|| AppError::BadRequest("Cart is empty".to_string()))?;

    let input = CheckoutInput {
        customer: CustomerInput {
            email,
            first_name: body.first_name,
            last_name: body.last_name,
            phone: body.phone,
        },
        shipping_address: body.shipping_address,
        notes: body.notes,
    };

    let order = cart_service(&state)
        .checkout(&owner, user.as_ref().map(|u| u.id), &input, Utc::now())
        .await?;
    Ok(Json(order))
}
