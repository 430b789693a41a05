//! Human-readable reference numbers for orders and invoices.

use chrono::{DateTime, Utc};
use rand::Rng;

const SUFFIX_LEN: usize = 6;
const SUFFIX_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Generate a reference such as `ORD-20250314-K7Q2ZP`.
///
/// The suffix avoids look-alike characters (`0`/`O`, `1`/`I`). References are
/// not guaranteed unique; callers rely on a unique column and retry.
#[must_use]
pub fn generate_reference(prefix: &str, at: DateTime<Utc>) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| {
            let idx = rng.random_range(0..SUFFIX_ALPHABET.len());
            char::from(SUFFIX_ALPHABET.get(idx).copied().unwrap_or(b'X'))
        })
        .collect();
    format!("{prefix}-{}-{suffix}", at.format("%Y%m%d"))
}

/// Order number for an order placed at `at`.
#[must_use]
pub fn order_number(at: DateTime<Utc>) -> String {
    generate_reference("ORD", at)
}

/// Invoice number for an invoice issued at `at`.
#[must_use]
pub fn invoice_number(at: DateTime<Utc>) -> String {
    generate_reference("INV", at)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_order_number_format() {
        let at = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).single().expect("valid date");
        let number = order_number(at);
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts.first(), Some(&"ORD"));
        assert_eq!(parts.get(1), Some(&"20250314"));
        let suffix = parts.get(2).expect("suffix");
        assert_eq!(suffix.len(), SUFFIX_LEN);
        assert!(suffix.bytes().all(|b| SUFFIX_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_invoice_prefix() {
        assert!(invoice_number(Utc::now()).starts_with("INV-"));
    }
}
