//! Shopping cart service.

use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use solestore_core::cart::{cart_total, item_count};
use solestore_core::{CartItem, CartItemId, Money, ProductId, UserId};

use crate::db::{CartStore, ProductStore, RepositoryError};
use crate::services::events::{ChangeEvent, ChangeFeed};

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("product not found")]
    ProductNotFound,

    #[error("cart item not found")]
    ItemNotFound,

    #[error("size {0} is not available for this product")]
    InvalidSize(String),

    #[error("quantity must be at least 1")]
    InvalidQuantity,

    #[error("only {available} left in stock for {product}")]
    InsufficientStock { product: String, available: u32 },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// A cart with its computed totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartSummary {
    pub items: Vec<CartItem>,
    pub total: Money,
    pub item_count: u64,
}

impl CartSummary {
    #[must_use]
    pub fn new(items: Vec<CartItem>) -> Self {
        Self {
            total: cart_total(&items),
            item_count: item_count(&items),
            items,
        }
    }
}

/// Per-user cart operations.
pub struct CartService<'a> {
    carts: &'a dyn CartStore,
    products: &'a dyn ProductStore,
    feed: &'a ChangeFeed,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(
        carts: &'a dyn CartStore,
        products: &'a dyn ProductStore,
        feed: &'a ChangeFeed,
    ) -> Self {
        Self {
            carts,
            products,
            feed,
        }
    }

    /// # Errors
    ///
    /// Returns `CartError::Repository` if the store fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<CartItem>, CartError> {
        Ok(self.carts.list(user_id).await?)
    }

    /// The cart with its total and unit count.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the store fails.
    pub async fn summary(&self, user_id: UserId) -> Result<CartSummary, CartError> {
        Ok(CartSummary::new(self.list(user_id).await?))
    }

    /// # Errors
    ///
    /// Returns `CartError::Repository` if the store fails.
    pub async fn total(&self, user_id: UserId) -> Result<Money, CartError> {
        Ok(cart_total(&self.list(user_id).await?))
    }

    /// Add `quantity` units of a product in `size`, merging into an existing
    /// line for the same product and size.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ProductNotFound`, `CartError::InvalidSize`,
    /// `CartError::InvalidQuantity` or `CartError::InsufficientStock`.
    #[instrument(skip(self))]
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
        size: &str,
    ) -> Result<CartItem, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        let size = size.trim();
        let product = self
            .products
            .get(product_id)
            .await?
            .ok_or(CartError::ProductNotFound)?;
        if !product.offers_size(size) {
            return Err(CartError::InvalidSize(size.to_string()));
        }

        let already = self
            .carts
            .list(user_id)
            .await?
            .iter()
            .filter(|line| line.is_same_variant(product_id, size))
            .map(|line| line.quantity)
            .sum::<u32>();
        if already.saturating_add(quantity) > product.quantity {
            return Err(CartError::InsufficientStock {
                product: product.name,
                available: product.quantity,
            });
        }

        let line = CartItem {
            id: CartItemId::generate(),
            product_id,
            product_name: product.name,
            product_image: product.image,
            product_price: product.price,
            product_brand: product.brand,
            quantity,
            size: size.to_string(),
            user_id,
        };
        let stored = self.carts.add(&line).await?;
        self.feed.publish(ChangeEvent::CartChanged(user_id));
        Ok(stored)
    }

    /// Set a line's quantity. Zero or less removes the line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ItemNotFound` if the line is not in this cart.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: i64,
    ) -> Result<(), CartError> {
        let found = if quantity <= 0 {
            self.carts.remove(user_id, item_id).await?
        } else {
            let quantity = u32::try_from(quantity).map_err(|_| CartError::InvalidQuantity)?;
            self.carts.set_quantity(user_id, item_id, quantity).await?
        };
        if !found {
            return Err(CartError::ItemNotFound);
        }
        self.feed.publish(ChangeEvent::CartChanged(user_id));
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `CartError::ItemNotFound` if the line is not in this cart.
    #[instrument(skip(self))]
    pub async fn remove(&self, user_id: UserId, item_id: CartItemId) -> Result<(), CartError> {
        if !self.carts.remove(user_id, item_id).await? {
            return Err(CartError::ItemNotFound);
        }
        self.feed.publish(ChangeEvent::CartChanged(user_id));
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `CartError::Repository` if the store fails.
    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: UserId) -> Result<(), CartError> {
        self.carts.clear(user_id).await?;
        self.feed.publish(ChangeEvent::CartChanged(user_id));
        Ok(())
    }
}
