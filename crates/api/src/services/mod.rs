//! Business logic services for the API.
//!
//! # Services
//!
//! - `auth` - Passwordless sign-in with emailed one-time codes
//! - `email` - SMTP delivery of sign-in codes (log-only without SMTP)
//! - `cart` - Cart mutations and checkout
//! - `domains` - Domain registration, verification and SSL sweeps
//! - `analytics` - Vendor sales reports and platform counters
//! - `storefront` - Host to vendor resolution for shopper requests

pub mod analytics;
pub mod auth;
pub mod cart;
pub mod domains;
pub mod email;
pub mod storefront;
