//! Orders, customers and customer addresses.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
};
use serde::Deserialize;
use tracing::instrument;

use univendor_core::{AddressId, CustomerId, Email, OrderId};

use crate::db::addresses::AddressRepository;
use crate::db::customers::{CustomerInput, CustomerRepository};
use crate::db::orders::{OrderRepository, OrderUpdate};
use crate::db::payments::PaymentRepository;
use crate::error::{AppError, Result};
use crate::middleware::{RequireAuth, RequireRole, VendorOnly};
use crate::models::CurrentUser;
use crate::models::order::{Address, AddressInput, Customer, Order, OrderDetail};
use crate::models::payment::Transaction;
use crate::routes::{authorize_vendor, not_found, own_vendor};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/orders", get(list_orders))
        .route("/api/orders/number/{number}", get(order_by_number))
        .route("/api/orders/{id}", get(show_order).patch(update_order))
        .route("/api/orders/{id}/transactions", get(order_transactions))
        .route("/api/account/orders", get(my_orders))
        .route("/api/customers", get(list_customers).post(create_customer))
        .route(
            "/api/customers/{id}",
            get(show_customer).put(update_customer),
        )
        .route(
            "/api/customers/{id}/addresses",
            get(list_addresses).post(create_address),
        )
        .route(
            "/api/addresses/{id}",
            put(update_address).delete(delete_address),
        )
}

// Orders

/// Check the user may read `order`: its store, a super admin, or the
/// shopper who placed it.
async fn authorize_order(state: &AppState, user: &CurrentUser, order: &Order) -> Result<()> {
    let customer = CustomerRepository::new(state.pool())
        .get(order.customer_id)
        .await?;
    if customer.is_some_and(|c| c.email == user.email) {
        return Ok(());
    }
    authorize_vendor(state, user, order.vendor_id, "Order").await
}

pub async fn list_orders(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
) -> Result<Json<Vec<Order>>> {
    let vendor = own_vendor(&state, &user).await?;
    Ok(Json(
        OrderRepository::new(state.pool())
            .list_by_vendor(vendor.id)
            .await?,
    ))
}

pub async fn show_order(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>> {
    let detail = OrderRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| not_found("Order"))?;
    authorize_order(&state, &user, &detail.order).await?;
    Ok(Json(detail))
}

pub async fn order_by_number(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(number): Path<String>,
) -> Result<Json<OrderDetail>> {
    let detail = OrderRepository::new(state.pool())
        .get_by_number(&number)
        .await?
        .ok_or_else(|| not_found("Order"))?;
    authorize_order(&state, &user, &detail.order).await?;
    Ok(Json(detail))
}

/// Update fulfilment status, payment status or tracking number.
#[instrument(skip(state, user, body))]
pub async fn update_order(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
    Path(id): Path<OrderId>,
    Json(body): Json<OrderUpdate>,
) -> Result<Json<Order>> {
    let orders = OrderRepository::new(state.pool());
    let detail = orders.get(id).await?.ok_or_else(|| not_found("Order"))?;
    authorize_vendor(&state, &user, detail.order.vendor_id, "Order").await?;

    let order = orders.update(id, &body).await?;
    tracing::info!(
        order = %order.order_number,
        status = %order.status,
        payment_status = %order.payment_status,
        "Order updated"
    );
    Ok(Json(order))
}

pub async fn order_transactions(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
    Path(id): Path<OrderId>,
) -> Result<Json<Vec<Transaction>>> {
    let detail = OrderRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| not_found("Order"))?;
    authorize_vendor(&state, &user, detail.order.vendor_id, "Order").await?;

    Ok(Json(
        PaymentRepository::new(state.pool())
            .list_order_transactions(id)
            .await?,
    ))
}

/// Orders the signed-in shopper placed with any store.
pub async fn my_orders(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(
        OrderRepository::new(state.pool())
            .list_by_customer_email(&user.email)
            .await?,
    ))
}

// Customers

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRequest {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

impl TryFrom<CustomerRequest> for CustomerInput {
    type Error = AppError;

    fn try_from(req: CustomerRequest) -> Result<Self> {
        let email = Email::parse(&req.email).map_err(|e| AppError::BadRequest(e.to_string()))?;
        Ok(Self {
            email,
            first_name: req.first_name,
            last_name: req.last_name,
            phone: req.phone,
        })
    }
}

async fn owned_customer(state: &AppState, user: &CurrentUser, id: CustomerId) -> Result<Customer> {
    let customer = CustomerRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| not_found("Customer"))?;
    authorize_vendor(state, user, customer.vendor_id, "Customer").await?;
    Ok(customer)
}

pub async fn list_customers(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
) -> Result<Json<Vec<Customer>>> {
    let vendor = own_vendor(&state, &user).await?;
    Ok(Json(CustomerRepository::new(state.pool()).list(vendor.id).await?))
}

#[instrument(skip(state, user, body))]
pub async fn create_customer(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
    Json(body): Json<CustomerRequest>,
) -> Result<(StatusCode, Json<Customer>)> {
    let input = CustomerInput::try_from(body)?;
    let vendor = own_vendor(&state, &user).await?;

    let customer = CustomerRepository::new(state.pool())
        .create(vendor.id, &input)
        .await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn show_customer(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
    Path(id): Path<CustomerId>,
) -> Result<Json<Customer>> {
    Ok(Json(owned_customer(&state, &user, id).await?))
}

#[instrument(skip(state, user, body))]
pub async fn update_customer(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
    Path(id): Path<CustomerId>,
    Json(body): Json<CustomerRequest>,
) -> Result<Json<Customer>> {
    let input = CustomerInput::try_from(body)?;
    owned_customer(&state, &user, id).await?;

    Ok(Json(
        CustomerRepository::new(state.pool())
            .update(id, &input)
            .await?,
    ))
}

// Addresses

fn validate_address(input: &AddressInput) -> Result<()> {
    match input.missing_field() {
        Some(field) => Err(AppError::BadRequest(format!("{field} is required"))),
        None => Ok(()),
    }
}

/// Load an address whose customer belongs to the user's store.
async fn owned_address(state: &AppState, user: &CurrentUser, id: AddressId) -> Result<Address> {
    let address = AddressRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| not_found("Address"))?;
    owned_customer(state, user, address.customer_id)
        .await
        .map_err(|e| match e {
            AppError::NotFound(_) => not_found("Address"),
            other => other,
        })?;
    Ok(address)
}

pub async fn list_addresses(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
    Path(id): Path<CustomerId>,
) -> Result<Json<Vec<Address>>> {
    owned_customer(&state, &user, id).await?;
    Ok(Json(AddressRepository::new(state.pool()).list(id).await?))
}

/// Add an address. A default address replaces the customer's previous one.
#[instrument(skip(state, user, body))]
pub async fn create_address(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
    Path(id): Path<CustomerId>,
    Json(body): Json<AddressInput>,
) -> Result<(StatusCode, Json<Address>)> {
    validate_address(&body)?;
    owned_customer(&state, &user, id).await?;

    let address = AddressRepository::new(state.pool()).create(id, &body).await?;
    Ok((StatusCode::CREATED, Json(address)))
}

#[instrument(skip(state, user, body))]
pub async fn update_address(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
    Path(id): Path<AddressId>,
    Json(body): Json<AddressInput>,
) -> Result<Json<Address>> {
    validate_address(&body)?;
    owned_address(&state, &user, id).await?;

    Ok(Json(AddressRepository::new(state.pool()).update(id, &body).await?))
}

#[instrument(skip(state, user))]
pub async fn delete_address(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
    Path(id): Path<AddressId>,
) -> Result<StatusCode> {
    owned_address(&state, &user, id).await?;
    AddressRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_request_parses_email() {
        let req = CustomerRequest {
            email: " Shopper@Example.com ".to_string(),
            first_name: Some("Ada".to_string()),
            last_name: None,
            phone: None,
        };
        let input = CustomerInput::try_from(req);
        assert!(input.is_ok_and(|i| i.email.as_str() == "shopper@example.com"));

        let bad = CustomerRequest {
            email: "not-an-email".to_string(),
            first_name: None,
            last_name: None,
            phone: None,
        };
        assert!(matches!(
            CustomerInput::try_from(bad),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_validate_address() {
        let address = AddressInput {
            full_name: "Ada Lovelace".to_string(),
            line1: "1 Analytical Way".to_string(),
            line2: None,
            city: "London".to_string(),
            state: String::new(),
            postal_code: "N1".to_string(),
            country: "GB".to_string(),
            phone: None,
            is_default: true,
        };
        assert!(matches!(
            validate_address(&address),
            Err(AppError::BadRequest(msg)) if msg == "state is required"
        ));
    }
}
