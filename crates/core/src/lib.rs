//! UniVendor Core - Shared types library.
//!
//! This crate provides common types used across all UniVendor components:
//! - `api` - Multi-tenant REST API (vendors, storefronts, customers)
//! - `cli` - Command-line tools for migrations, seeding and operator tasks
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be
//! used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, emails, domain names, OTP codes,
//!   money arithmetic and status enums

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
