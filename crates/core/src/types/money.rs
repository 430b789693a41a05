//! Decimal money arithmetic for carts and orders.
//!
//! All amounts are `rust_decimal::Decimal` in the currency's standard unit
//! (dollars, not cents). Stored and displayed amounts are always rounded to
//! two decimal places, half away from zero.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Round an amount to cents, half away from zero.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Format an amount for display (e.g., `$19.99`).
#[must_use]
pub fn format_usd(amount: Decimal) -> String {
    format!("${:.2}", round_money(amount))
}

/// A single priced line used for total calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartLine {
    /// Unit price snapshot taken when the line was added.
    pub unit_price: Decimal,
    /// Number of units; non-positive quantities contribute nothing.
    pub quantity: i32,
}

impl CartLine {
    /// Create a new line.
    #[must_use]
    pub const fn new(unit_price: Decimal, quantity: i32) -> Self {
        Self {
            unit_price,
            quantity,
        }
    }

    /// Extended price of the line (`unit_price * quantity`), unrounded.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        if self.quantity <= 0 {
            return Decimal::ZERO;
        }
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Computed totals for a cart or order.
///
/// Invariant: `total == subtotal + tax`, each component rounded to cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    /// Total units across all lines.
    pub item_count: i64,
}

impl CartTotals {
    /// Totals of an empty cart.
    #[must_use]
    pub const fn zero() -> Self {
        Self {
            subtotal: Decimal::ZERO,
            tax: Decimal::ZERO,
            total: Decimal::ZERO,
            item_count: 0,
        }
    }

    /// Compute totals for a list of lines at the given tax rate
    /// (e.g., `0.0825` for 8.25%).
    #[must_use]
    pub fn compute<'a, I>(lines: I, tax_rate: Decimal) -> Self
    where
        I: IntoIterator<Item = &'a CartLine>,
    {
        let (raw_subtotal, item_count) =
            lines
                .into_iter()
                .fold((Decimal::ZERO, 0_i64), |(sum, count), line| {
                    let units = i64::from(line.quantity.max(0));
                    (sum + line.line_total(), count + units)
                });

        // Tax is charged on the subtotal the shopper sees.
        let subtotal = round_money(raw_subtotal);
        let tax = round_money(subtotal * tax_rate);

        Self {
            subtotal,
            tax,
            total: subtotal + tax,
            item_count,
        }
    }
}

impl Default for CartTotals {
    fn default() -> Self {
        Self::zero()
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).expect("valid decimal")
    }

    #[test]
    fn test_round_money_half_away_from_zero() {
        assert_eq!(round_money(dec("1.005")), dec("1.01"));
        assert_eq!(round_money(dec("1.004")), dec("1.00"));
        assert_eq!(round_money(dec("2.5")), dec("2.50"));
    }

    #[test]
    fn test_format_usd() {
        assert_eq!(format_usd(dec("19.9")), "$19.90");
        assert_eq!(format_usd(Decimal::ZERO), "$0.00");
    }

    #[test]
    fn test_empty_cart_totals() {
        let totals = CartTotals::compute(&Vec::<CartLine>::new(), dec("0.0825"));
        assert_eq!(totals, CartTotals::zero());
    }

    #[test]
    fn test_totals_with_tax() {
        let lines = [
            CartLine::new(dec("19.99"), 2),
            CartLine::new(dec("5.00"), 1),
        ];
        let totals = CartTotals::compute(&lines, dec("0.0825"));

        // 44.98 * 0.0825 = 3.71085
        assert_eq!(totals.subtotal, dec("44.98"));
        assert_eq!(totals.tax, dec("3.71"));
        assert_eq!(totals.total, dec("48.69"));
        assert_eq!(totals.item_count, 3);
    }

    #[test]
    fn test_total_is_sum_of_rounded_parts() {
        let lines = [CartLine::new(dec("10.10"), 3)];
        let totals = CartTotals::compute(&lines, dec("0.0825"));
        assert_eq!(totals.total, totals.subtotal + totals.tax);
    }

    #[test]
    fn test_tax_uses_rounded_subtotal() {
        // 1.016 shows as 1.02; 1.02 * 0.25 = 0.255 rounds to 0.26, where
        // the unrounded 0.254 would give 0.25.
        let lines = [CartLine::new(dec("1.016"), 1)];
        let totals = CartTotals::compute(&lines, dec("0.25"));
        assert_eq!(totals.subtotal, dec("1.02"));
        assert_eq!(totals.tax, dec("0.26"));
        assert_eq!(totals.total, dec("1.28"));
    }

    #[test]
    fn test_non_positive_quantity_ignored() {
        let lines = [
            CartLine::new(dec("10.00"), 0),
            CartLine::new(dec("10.00"), -3),
            CartLine::new(dec("1.50"), 2),
        ];
        let totals = CartTotals::compute(&lines, Decimal::ZERO);
        assert_eq!(totals.subtotal, dec("3.00"));
        assert_eq!(totals.item_count, 2);
    }
}
