//! Checkout, order tracking and payment.

use std::collections::BTreeMap;

use chrono::Utc;
use rand::Rng;
use thiserror::Error;
use tracing::instrument;

use solestore_core::{
    Order, OrderDraft, OrderId, OrderStatus, PaymentMethod, PaymentStatus, TimelineStep, UserId,
};

use crate::db::{CartStore, OrderStore, RepositoryError};
use crate::services::catalog::ProductCache;
use crate::services::events::{ChangeEvent, ChangeFeed};
use crate::services::payment::vnpay::gateway_amount;
use crate::services::payment::{PaymentError, PaymentResult, VnpayGateway};

/// Length of a tracking number.
pub const TRACKING_NUMBER_LEN: usize = 10;

const TRACKING_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Errors from order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order not found")]
    NotFound,

    #[error("cart is empty")]
    EmptyCart,

    #[error("shipping address is required")]
    MissingAddress,

    #[error("insufficient stock for {0}")]
    InsufficientStock(String),

    /// The order cannot be paid online (wrong method or already settled).
    #[error("{0}")]
    PaymentNotApplicable(&'static str),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for OrderError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => Self::NotFound,
            RepositoryError::InsufficientStock(product) => Self::InsufficientStock(product),
            other => Self::Repository(other),
        }
    }
}

/// Who is asking, for ownership checks.
#[derive(Debug, Clone, Copy)]
pub struct Viewer {
    pub user_id: UserId,
    pub is_admin: bool,
}

impl Viewer {
    fn may_see(self, order: &Order) -> bool {
        self.is_admin || order.user_id == self.user_id
    }
}

/// Order placement and lifecycle.
pub struct OrderService<'a> {
    orders: &'a dyn OrderStore,
    carts: &'a dyn CartStore,
    cache: &'a ProductCache,
    feed: &'a ChangeFeed,
    vnpay: Option<&'a VnpayGateway>,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(
        orders: &'a dyn OrderStore,
        carts: &'a dyn CartStore,
        cache: &'a ProductCache,
        feed: &'a ChangeFeed,
        vnpay: Option<&'a VnpayGateway>,
    ) -> Self {
        Self {
            orders,
            carts,
            cache,
            feed,
            vnpay,
        }
    }

    /// Place an order for everything in the user's cart.
    ///
    /// Stock for every line is decremented and the order inserted in one
    /// step; if any line is short nothing changes. Cash-on-delivery orders
    /// empty the cart immediately, VNPay orders once payment succeeds.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::EmptyCart`, `OrderError::MissingAddress` or
    /// `OrderError::InsufficientStock` naming the short product.
    #[instrument(skip(self, shipping_address))]
    pub async fn create_order(
        &self,
        user_id: UserId,
        shipping_address: &str,
        payment_method: PaymentMethod,
    ) -> Result<Order, OrderError> {
        let shipping_address = shipping_address.trim();
        if shipping_address.is_empty() {
            return Err(OrderError::MissingAddress);
        }
        let items = self.carts.list(user_id).await?;
        if items.is_empty() {
            return Err(OrderError::EmptyCart);
        }

        let draft = OrderDraft {
            user_id,
            items,
            shipping_address: shipping_address.to_string(),
            payment_method,
        };
        let order = Order::from_draft(draft, generate_tracking_number(), Utc::now());
        self.orders.place(&order).await?;

        if payment_method == PaymentMethod::Cod {
            self.carts.clear(user_id).await?;
            self.feed.publish(ChangeEvent::CartChanged(user_id));
        }
        self.cache.invalidate_all().await;
        self.feed.publish(ChangeEvent::ProductsChanged);
        self.feed.publish(ChangeEvent::OrderChanged(order.id));

        tracing::info!(
            order_id = %order.id,
            total = %order.total_amount,
            items = order.item_count(),
            "order placed"
        );
        Ok(order)
    }

    /// An order the viewer owns, or any order for admins.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` for unknown ids and for orders the
    /// viewer may not see.
    pub async fn get(&self, id: OrderId, viewer: Viewer) -> Result<Order, OrderError> {
        let order = self.orders.get(id).await?.ok_or(OrderError::NotFound)?;
        if !viewer.may_see(&order) {
            return Err(OrderError::NotFound);
        }
        Ok(order)
    }

    /// # Errors
    ///
    /// See [`OrderService::get`].
    pub async fn timeline(
        &self,
        id: OrderId,
        viewer: Viewer,
    ) -> Result<Vec<TimelineStep>, OrderError> {
        Ok(self.get(id, viewer).await?.timeline())
    }

    /// The user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the store fails.
    pub async fn user_orders(&self, user_id: UserId) -> Result<Vec<Order>, OrderError> {
        Ok(self.orders.list_for_user(user_id).await?)
    }

    /// Every order, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the store fails.
    pub async fn all_orders(&self) -> Result<Vec<Order>, OrderError> {
        Ok(self.orders.list_all().await?)
    }

    /// Move an order to any status.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` for unknown ids.
    #[instrument(skip(self))]
    pub async fn update_status(&self, id: OrderId, status: OrderStatus) -> Result<Order, OrderError> {
        let order = self.orders.update_status(id, status, Utc::now()).await?;
        self.feed.publish(ChangeEvent::OrderChanged(id));
        tracing::info!(order_id = %id, status = %status, "order status updated");
        Ok(order)
    }

    /// # Errors
    ///
    /// Returns `OrderError::NotFound` for unknown ids.
    #[instrument(skip(self))]
    pub async fn update_payment_status(
        &self,
        id: OrderId,
        status: PaymentStatus,
        transaction_id: Option<&str>,
    ) -> Result<Order, OrderError> {
        let order = self
            .orders
            .update_payment(id, status, transaction_id, Utc::now())
            .await?;
        self.feed.publish(ChangeEvent::OrderChanged(id));
        Ok(order)
    }

    /// Signed VNPay URL for an unpaid VNPay order.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::PaymentNotApplicable` for COD or settled orders
    /// and `PaymentError::NotConfigured` without merchant credentials.
    #[instrument(skip(self))]
    pub async fn start_vnpay_payment(
        &self,
        id: OrderId,
        viewer: Viewer,
        ip_addr: &str,
    ) -> Result<String, OrderError> {
        let gateway = self.vnpay.ok_or(PaymentError::NotConfigured)?;
        let order = self.get(id, viewer).await?;

        if order.payment_method != PaymentMethod::Vnpay {
            return Err(OrderError::PaymentNotApplicable(
                "order is cash on delivery",
            ));
        }
        if order.payment_status == PaymentStatus::Paid {
            return Err(OrderError::PaymentNotApplicable("order is already paid"));
        }

        let info = format!("Thanh toan don hang {}", order.tracking_number);
        Ok(gateway.create_payment_url(
            order.total_amount,
            &info,
            &order.id.as_uuid().simple().to_string(),
            ip_addr,
            Utc::now(),
        )?)
    }

    /// Apply a VNPay redirect to its order.
    ///
    /// Success marks the order paid and empties the buyer's cart. A
    /// redirect for an order that is already paid changes nothing.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidSignature` for forged parameters and
    /// `OrderError::NotFound` if the reference matches no order.
    #[instrument(skip_all)]
    pub async fn handle_vnpay_return(
        &self,
        params: &BTreeMap<String, String>,
    ) -> Result<(Order, PaymentResult), OrderError> {
        let gateway = self.vnpay.ok_or(PaymentError::NotConfigured)?;
        let ret = gateway.verify_return(params)?;

        let id: OrderId = ret.txn_ref.parse().map_err(|_| OrderError::NotFound)?;
        let order = self.orders.get(id).await?.ok_or(OrderError::NotFound)?;

        let expected_amount = gateway_amount(order.total_amount).ok();
        let result = match ret.result {
            PaymentResult::Success { .. } if ret.amount != expected_amount => {
                tracing::warn!(order_id = %id, amount = ?ret.amount, "VNPay amount mismatch");
                PaymentResult::Failed {
                    message: "Amount mismatch".to_string(),
                }
            }
            other => other,
        };

        if order.payment_status == PaymentStatus::Paid {
            return Ok((order, result));
        }

        let order = match &result {
            PaymentResult::Success { transaction_no } => {
                let order = self
                    .update_payment_status(id, PaymentStatus::Paid, Some(transaction_no))
                    .await?;
                self.carts.clear(order.user_id).await?;
                self.feed.publish(ChangeEvent::CartChanged(order.user_id));
                tracing::info!(order_id = %id, "VNPay payment captured");
                order
            }
            PaymentResult::Failed { message } => {
                tracing::info!(order_id = %id, %message, "VNPay payment failed");
                self.update_payment_status(id, PaymentStatus::Failed, None)
                    .await?
            }
        };
        Ok((order, result))
    }
}

/// Random tracking number of [`TRACKING_NUMBER_LEN`] characters from `A-Z0-9`.
#[must_use]
pub fn generate_tracking_number() -> String {
    let mut rng = rand::rng();
    (0..TRACKING_NUMBER_LEN)
        .map(|_| {
            let idx = rng.random_range(0..TRACKING_CHARSET.len());
            char::from(TRACKING_CHARSET.get(idx).copied().unwrap_or(b'0'))
        })
        .collect()
}
