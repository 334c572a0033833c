//! Orders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cart::{cart_total, item_count};
use crate::models::CartItem;
use crate::types::{
    Money, OrderId, OrderStatus, PaymentMethod, PaymentStatus, TimelineStep, UserId,
};

/// A placed order.
///
/// `items` is a snapshot of the cart at checkout; later catalog edits do not
/// change it. `total_amount` is computed from that snapshot when the order is
/// built and stored alongside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    #[serde(default)]
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub total_amount: Money,
    #[serde(default)]
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub shipping_address: String,
    #[serde(default)]
    pub tracking_number: String,
    #[serde(default)]
    pub estimated_delivery_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

/// Everything needed to place an order except what the store assigns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    pub user_id: UserId,
    pub items: Vec<CartItem>,
    pub shipping_address: String,
    pub payment_method: PaymentMethod,
}

impl Order {
    /// Build a pending, unpaid order from a draft.
    #[must_use]
    pub fn from_draft(draft: OrderDraft, tracking_number: String, now: DateTime<Utc>) -> Self {
        let total_amount = cart_total(&draft.items);
        Self {
            id: OrderId::generate(),
            user_id: draft.user_id,
            items: draft.items,
            total_amount,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
            shipping_address: draft.shipping_address,
            tracking_number,
            estimated_delivery_time: None,
            payment_method: draft.payment_method,
            payment_status: PaymentStatus::Unpaid,
            transaction_id: None,
        }
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        item_count(&self.items)
    }

    /// Whether this order counts towards revenue.
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        self.status == OrderStatus::Delivered
    }

    /// Tracking timeline for the current status.
    #[must_use]
    pub fn timeline(&self) -> Vec<TimelineStep> {
        self.status.timeline()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CartItemId, ProductId, vnd};

    fn line(price: i64, quantity: u32) -> CartItem {
        CartItem {
            id: CartItemId::generate(),
            product_id: ProductId::generate(),
            product_name: "Runner".into(),
            product_image: String::new(),
            product_price: vnd(price),
            product_brand: "Brand".into(),
            quantity,
            size: "42".into(),
            user_id: UserId::generate(),
        }
    }

    #[test]
    fn test_from_draft_computes_total_and_defaults() {
        let draft = OrderDraft {
            user_id: UserId::generate(),
            items: vec![line(1_000_000, 2), line(350_000, 1)],
            shipping_address: "1 Lê Lợi, Quận 1".into(),
            payment_method: PaymentMethod::Vnpay,
        };
        let order = Order::from_draft(draft, "ABCDEFGHIJ".into(), Utc::now());

        assert_eq!(order.total_amount, vnd(2_350_000));
        assert_eq!(order.item_count(), 3);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Unpaid);
        assert_eq!(order.created_at, order.updated_at);
        assert!(!order.is_delivered());
    }
}
