//! Monetary amounts using decimal arithmetic.
//!
//! The store trades in Vietnamese đồng, which has no minor unit in practice,
//! so a [`Money`] value is simply a [`Decimal`] count of VND. Decimal keeps
//! cart and revenue sums exact where the mobile client used doubles.

use rust_decimal::Decimal;

/// An amount of money in VND.
pub type Money = Decimal;

/// ISO 4217 code of the only currency the store sells in.
pub const CURRENCY_CODE: &str = "VND";

/// Build a [`Money`] value from a whole number of đồng.
#[must_use]
pub fn vnd(amount: i64) -> Money {
    Decimal::from(amount)
}

/// Price of `quantity` units at `unit_price`.
#[must_use]
pub fn line_total(unit_price: Money, quantity: u32) -> Money {
    unit_price * Decimal::from(quantity)
}

/// Format an amount for display, e.g. `1.250.000 ₫`.
///
/// Fractions are rounded to the nearest đồng.
#[must_use]
pub fn format_vnd(amount: Money) -> String {
    let rounded = amount.round();
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let digits = rounded.abs().trunc().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    if negative {
        format!("-{grouped} ₫")
    } else {
        format!("{grouped} ₫")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_total() {
        assert_eq!(line_total(vnd(250_000), 3), vnd(750_000));
        assert_eq!(line_total(vnd(250_000), 0), Decimal::ZERO);
    }

    #[test]
    fn test_format_vnd_groups_thousands() {
        assert_eq!(format_vnd(vnd(1_250_000)), "1.250.000 ₫");
        assert_eq!(format_vnd(vnd(999)), "999 ₫");
        assert_eq!(format_vnd(vnd(0)), "0 ₫");
    }

    #[test]
    fn test_format_vnd_negative_and_fraction() {
        assert_eq!(format_vnd(vnd(-12_000)), "-12.000 ₫");
        assert_eq!(format_vnd(Decimal::new(19_996, 1)), "2.000 ₫");
    }
}
