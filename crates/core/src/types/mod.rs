//! Core types for UniVendor.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod domain_name;
pub mod email;
pub mod id;
pub mod money;
pub mod otp;
pub mod reference;
pub mod status;

pub use domain_name::{DomainName, DomainNameError};
pub use email::{Email, EmailError};
pub use id::*;
pub use money::{CartLine, CartTotals, format_usd, round_money};
pub use otp::{OtpCode, OtpCodeError};
pub use reference::{generate_reference, invoice_number, order_number};
pub use status::*;
