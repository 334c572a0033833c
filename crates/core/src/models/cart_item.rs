//! Cart lines.

use serde::{Deserialize, Serialize};

use crate::types::{CartItemId, Money, ProductId, UserId, line_total};

const fn default_quantity() -> u32 {
    1
}

/// One line of a shopper's cart.
///
/// The product's display fields are copied in when the line is created so
/// that the cart (and any order snapshotting it) renders without a catalog
/// lookup. Lines are unique per (owner, product, size).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub product_id: ProductId,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub product_image: String,
    #[serde(default)]
    pub product_price: Money,
    #[serde(default)]
    pub product_brand: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub size: String,
    pub user_id: UserId,
}

impl CartItem {
    /// Price of the whole line.
    #[must_use]
    pub fn line_total(&self) -> Money {
        line_total(self.product_price, self.quantity)
    }

    /// Whether this line holds `product_id` in `size`.
    #[must_use]
    pub fn is_same_variant(&self, product_id: ProductId, size: &str) -> bool {
        self.product_id == product_id && self.size == size
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::vnd;

    #[test]
    fn test_missing_quantity_defaults_to_one() {
        let json = serde_json::json!({
            "id": CartItemId::generate(),
            "product_id": ProductId::generate(),
            "user_id": UserId::generate(),
            "product_price": "500000",
        });
        let item: CartItem = serde_json::from_value(json).unwrap();
        assert_eq!(item.quantity, 1);
        assert_eq!(item.line_total(), vnd(500_000));
        assert!(item.size.is_empty());
    }
}
