//! HTTP route handlers for the API.
//!
//! # Route Structure
//!
//! ```text
//! # Auth
//! POST   /api/auth/request-otp                 - Email a sign-in code (rate limited)
//! POST   /api/auth/verify-otp                  - Exchange a code for a session (rate limited)
//! GET    /api/auth/session                     - Current user, refreshed from the database
//! POST   /api/auth/logout                      - Log out, or end impersonation
//! POST   /api/auth/register                    - Create an account with a full profile
//! PUT    /api/auth/profile                     - Edit own profile
//! POST   /api/auth/impersonate/{user_id}       - Act as another user (super admin)
//! GET    /api/auth/impersonation-status        - Whether the session is impersonating
//!
//! # Users (super admin)
//! GET    /api/users                            - List users
//! GET    /api/users/{id}                       - User detail
//! PATCH  /api/users/{id}/role                  - Change role
//!
//! # Plans and subscriptions
//! GET    /api/plans                            - Active plans (public)
//! POST   /api/plans                            - Create plan (super admin)
//! PUT    /api/plans/{id}                       - Replace plan (super admin)
//! DELETE /api/plans/{id}                       - Delete unused plan (super admin)
//! GET    /api/subscription                     - Own subscription and plan
//! POST   /api/subscription                     - Subscribe to a plan
//! POST   /api/subscription/cancel              - Cancel with a reason
//!
//! # Vendors
//! POST   /api/vendors                          - Open own store
//! GET    /api/vendors                          - List stores (super admin)
//! GET    /api/vendors/me                       - Own store
//! GET    /api/vendors/{id}                     - Store (owner or super admin)
//! PATCH  /api/vendors/{id}                     - Edit store (owner or super admin)
//!
//! # Domains
//! GET    /api/domains                          - Own domains (all for super admin)
//! POST   /api/domains                          - Register a domain
//! POST   /api/domains/check-ssl                - SSL sweep (super admin)
//! GET    /api/domains/{id}                     - Domain detail
//! PATCH  /api/domains/{id}                     - Edit domain
//! DELETE /api/domains/{id}                     - Delete domain
//! POST   /api/domains/{id}/verify              - Verify ownership
//! POST   /api/domains/{id}/regenerate-token    - New verification token
//!
//! # Catalog
//! GET    /api/categories                       - Own + global categories with counts
//! POST   /api/categories                       - Create (global when super admin)
//! GET    /api/categories/global                - Global categories (public)
//! GET    /api/categories/all                   - Every category (super admin)
//! PUT    /api/categories/{id}                  - Edit category
//! DELETE /api/categories/{id}                  - Delete category
//! GET    /api/categories/{id}/products         - Own products in a category
//! GET    /api/products                         - Own products
//! POST   /api/products                         - Create product
//! GET    /api/products/{id}                    - Product with variants (public)
//! PUT    /api/products/{id}                    - Replace product
//! DELETE /api/products/{id}                    - Delete product
//! GET    /api/products/{id}/variants           - Variants (public)
//! POST   /api/products/{id}/variants           - Create variant
//! PUT    /api/variants/{id}                    - Replace variant
//! DELETE /api/variants/{id}                    - Delete variant
//!
//! # Storefront (vendor resolved from Host)
//! GET    /api/storefront                       - Store profile
//! GET    /api/storefront/products              - Active products
//! GET    /api/storefront/categories            - Categories with counts
//!
//! # Cart and checkout
//! GET    /api/cart                             - Current cart
//! DELETE /api/cart                             - Empty the cart
//! POST   /api/cart/items                       - Add a product
//! PATCH  /api/cart/items/{id}                  - Set quantity (0 removes)
//! DELETE /api/cart/items/{id}                  - Remove a line
//! POST   /api/checkout                         - Place an order
//!
//! # Orders, customers, addresses
//! GET    /api/orders                           - Own store's orders
//! GET    /api/orders/number/{number}           - Order by number
//! GET    /api/orders/{id}                      - Order with items
//! PATCH  /api/orders/{id}                      - Fulfilment and payment status
//! GET    /api/orders/{id}/transactions         - Order's ledger entries
//! GET    /api/account/orders                   - Signed-in shopper's orders
//! GET    /api/customers                        - Own customers
//! POST   /api/customers                        - Create customer
//! GET    /api/customers/{id}                   - Customer detail
//! PUT    /api/customers/{id}                   - Edit customer
//! GET    /api/customers/{id}/addresses         - Customer addresses
//! POST   /api/customers/{id}/addresses         - Add address
//! PUT    /api/addresses/{id}                   - Edit address
//! DELETE /api/addresses/{id}                   - Delete address
//!
//! # Payments
//! GET    /api/payment-methods                  - Own payout methods
//! POST   /api/payment-methods                  - Add method
//! PUT    /api/payment-methods/{id}             - Edit method
//! DELETE /api/payment-methods/{id}             - Delete method
//! POST   /api/payment-methods/{id}/default     - Make default
//! GET    /api/invoices                         - Own invoices
//! GET    /api/invoices/{id}                    - Invoice detail
//! POST   /api/invoices/{id}/pay                - Mark paid (super admin)
//! GET    /api/transactions                     - Own ledger
//! POST   /api/transactions/{id}/refund         - Refund a payment
//! GET    /api/payouts                          - Own payouts
//! POST   /api/payouts                          - Schedule payout (super admin)
//! POST   /api/payouts/{id}/complete            - Complete payout (super admin)
//!
//! # Analytics
//! GET    /api/analytics/top-products           - Best sellers
//! GET    /api/analytics/sales-by-hour          - Completed orders by hour
//! GET    /api/analytics/sales-by-category      - Revenue share by category
//! GET    /api/admin/stats                      - Platform counters (super admin)
//! ```

pub mod analytics;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod domains;
pub mod orders;
pub mod payments;
pub mod plans;
pub mod storefront;
pub mod users;
pub mod vendors;

use axum::{Router, middleware::map_response};

use univendor_core::VendorId;

use crate::db::vendors::VendorRepository;
use crate::error::{AppError, Result};
use crate::middleware::{api_rate_limiter, json_rate_limit_response};
use crate::models::CurrentUser;
use crate::models::vendor::Vendor;
use crate::state::AppState;

/// The store owned by the signed-in user.
pub(crate) async fn own_vendor(state: &AppState, user: &CurrentUser) -> Result<Vendor> {
    VendorRepository::new(state.pool())
        .get_by_user(user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Vendor not found".to_string()))
}

/// Pass when the user owns `vendor_id` or is a super admin.
///
/// Anything else is reported as a missing `what`, so other stores'
/// resources stay invisible.
pub(crate) async fn authorize_vendor(
    state: &AppState,
    user: &CurrentUser,
    vendor_id: VendorId,
    what: &str,
) -> Result<()> {
    if user.is_super_admin() {
        return Ok(());
    }
    let vendor = own_vendor(state, user).await?;
    if vendor.id == vendor_id {
        Ok(())
    } else {
        Err(not_found(what))
    }
}

pub(crate) fn not_found(what: &str) -> AppError {
    AppError::NotFound(format!("{what} not found"))
}

/// Create all API routes.
pub fn routes() -> Router<AppState> {
    let api = Router::new()
        .merge(users::router())
        .merge(plans::router())
        .merge(vendors::router())
        .merge(domains::router())
        .merge(catalog::router())
        .merge(storefront::router())
        .merge(cart::router())
        .merge(orders::router())
        .merge(payments::router())
        .merge(analytics::router())
        .layer(api_rate_limiter());

    Router::new()
        .nest("/api/auth", auth::router())
        .merge(api)
        .layer(map_response(json_rate_limit_response))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use crate::config::tests::test_config;
    use crate::services::domains::AcceptingVerifier;
    use crate::services::email::EmailService;

    use super::*;

    /// The full app over a pool that never connects; only requests that
    /// are rejected before touching the database are sent.
    fn app() -> axum::Router {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/univendor_test")
            .unwrap();
        let state = AppState::with_parts(
            test_config(),
            pool,
            EmailService::log_only(),
            Arc::new(AcceptingVerifier),
        );
        crate::app(state)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("x-forwarded-for", "203.0.113.9")
            .body(Body::empty())
            .unwrap()
    }

    async fn message(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        json["message"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app().oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_protected_routes_require_login() {
        for uri in [
            "/api/users",
            "/api/vendors/me",
            "/api/domains",
            "/api/orders",
            "/api/invoices",
            "/api/admin/stats",
            "/api/account/orders",
        ] {
            let response = app().oneshot(get(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(message(response).await, "Authentication required");
        }
    }

    #[tokio::test]
    async fn test_session_without_login() {
        let response = app().oneshot(get("/api/auth/session")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(message(response).await, "Not authenticated");
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let response = app().oneshot(get("/api/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_api_rate_limit_returns_json() {
        let app = app();
        let mut last = None;
        for _ in 0..60 {
            let response = app.clone().oneshot(get("/api/users")).await.unwrap();
            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                last = Some(response);
                break;
            }
        }
        let response = last.expect("burst limit reached");
        assert_eq!(
            message(response).await,
            "Too many requests, please try again later"
        );
    }
}
