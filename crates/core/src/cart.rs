//! Cart arithmetic.

use rust_decimal::Decimal;

use crate::models::CartItem;
use crate::types::Money;

/// Sum of price × quantity over every line.
#[must_use]
pub fn cart_total(items: &[CartItem]) -> Money {
    items.iter().map(CartItem::line_total).sum::<Decimal>()
}

/// Total number of units in the cart.
#[must_use]
pub fn item_count(items: &[CartItem]) -> u64 {
    items.iter().map(|item| u64::from(item.quantity)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CartItemId, ProductId, UserId, vnd};

    fn line(price: i64, quantity: u32) -> CartItem {
        CartItem {
            id: CartItemId::generate(),
            product_id: ProductId::generate(),
            product_name: String::new(),
            product_image: String::new(),
            product_price: vnd(price),
            product_brand: String::new(),
            quantity,
            size: String::new(),
            user_id: UserId::generate(),
        }
    }

    #[test]
    fn test_empty_cart() {
        assert_eq!(cart_total(&[]), Decimal::ZERO);
        assert_eq!(item_count(&[]), 0);
    }

    #[test]
    fn test_total_is_sum_of_line_totals() {
        let items = [line(1_200_000, 1), line(450_000, 3), line(99_000, 2)];
        assert_eq!(cart_total(&items), vnd(1_200_000 + 1_350_000 + 198_000));
        assert_eq!(item_count(&items), 6);
    }

    #[test]
    fn test_fractional_prices_stay_exact() {
        let mut item = line(0, 3);
        item.product_price = Decimal::new(333_333, 1);
        assert_eq!(cart_total(&[item]), Decimal::new(999_999, 1));
    }
}
