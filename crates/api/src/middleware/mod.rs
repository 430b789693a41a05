//! HTTP middleware stack for the API.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request spans)
//! 3. Request ID (add unique ID to each request)
//! 4. CORS
//! 5. Session layer (tower-sessions with `PostgreSQL` store)
//! 6. Rate limiting (governor), per route group

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod session;
pub mod storefront;

pub use auth::{
    OptionalAuth, RequireAuth, RequireRole, SuperAdminOnly, VendorOnly, clear_current_user,
    set_current_user,
};
pub use rate_limit::{api_rate_limiter, json_rate_limit_response, otp_rate_limiter};
pub use request_id::request_id_middleware;
pub use session::{create_session_layer, session_store};
pub use storefront::Storefront;
