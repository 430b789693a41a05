//! Domain models for the API.
//!
//! Models double as JSON response bodies (`camelCase`, decimals as strings)
//! and, where every column decodes directly, as `sqlx` row types.

pub mod cart;
pub mod catalog;
pub mod domain;
pub mod order;
pub mod payment;
pub mod session;
pub mod user;
pub mod vendor;

pub use session::{CurrentUser, keys as session_keys};
pub use user::User;
