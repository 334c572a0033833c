//! In-memory implementation of every store.
//!
//! Used by tests and for running the API without a database
//! (`SOLESTORE_DATABASE_URL=memory`). All tables share one lock, so order
//! placement is atomic just like the `PostgreSQL` transaction.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use solestore_core::{
    CartItem, CartItemId, Email, Order, OrderId, OrderStatus, PaymentStatus, Product,
    ProductFilter, ProductId, Review, Role, User, UserId,
};

use super::{
    CartStore, OrderStore, PasswordResetStore, ProductDetails, ProductStore, RepositoryError,
    ReviewOutcome, ReviewWrite, UserStore,
};
use crate::models::PasswordResetCode;

struct StoredUser {
    user: User,
    password_hash: Option<String>,
}

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, StoredUser>,
    password_resets: HashMap<String, PasswordResetCode>,
    products: HashMap<ProductId, Product>,
    /// Insertion order is display order.
    cart_items: Vec<CartItem>,
    orders: HashMap<OrderId, Order>,
}

/// Shared in-memory database.
#[derive(Default)]
pub struct MemoryDb {
    tables: RwLock<Tables>,
}

impl MemoryDb {
    /// Store an order as is, without touching stock. For loading order
    /// history into a fresh database.
    pub async fn import_order(&self, order: Order) {
        self.tables.write().await.orders.insert(order.id, order);
    }
}

fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    orders
}

#[async_trait]
impl UserStore for MemoryDb {
    async fn get(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(&id).map(|u| u.user.clone()))
    }

    async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| &u.user.email == email)
            .map(|u| u.user.clone()))
    }

    async fn create(&self, user: &User, password_hash: Option<&str>) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.user.email == user.email) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }
        tables.users.insert(
            user.id,
            StoredUser {
                user: user.clone(),
                password_hash: password_hash.map(String::from),
            },
        );
        Ok(())
    }

    async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| &u.user.email == email)
            .and_then(|u| {
                u.password_hash
                    .as_ref()
                    .map(|hash| (u.user.clone(), hash.clone()))
            }))
    }

    async fn set_password_hash(&self, id: UserId, hash: &str) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        let stored = tables.users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        stored.password_hash = Some(hash.to_owned());
        stored.user.updated_at = Utc::now();
        Ok(())
    }

    async fn update_profile(&self, user: &User) -> Result<User, RepositoryError> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .users
            .get_mut(&user.id)
            .ok_or(RepositoryError::NotFound)?;
        stored.user.name.clone_from(&user.name);
        stored.user.phone.clone_from(&user.phone);
        stored.user.address.clone_from(&user.address);
        stored.user.photo_url.clone_from(&user.photo_url);
        stored.user.updated_at = user.updated_at;
        Ok(stored.user.clone())
    }

    async fn set_role(&self, id: UserId, role: Role) -> Result<User, RepositoryError> {
        let mut tables = self.tables.write().await;
        let stored = tables.users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        stored.user.role = role;
        stored.user.updated_at = Utc::now();
        Ok(stored.user.clone())
    }

    async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables.users.values().map(|u| u.user.clone()).collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(users)
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        Ok(self.tables.read().await.users.len() as u64)
    }
}

#[async_trait]
impl PasswordResetStore for MemoryDb {
    async fn insert(
        &self,
        code_hash: &str,
        email: &Email,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        if tables
            .password_resets
            .get(code_hash)
            .is_some_and(|pending| &pending.email != email)
        {
            return Err(RepositoryError::Conflict("reset code already issued".to_owned()));
        }
        tables.password_resets.retain(|_, code| &code.email != email);
        tables.password_resets.insert(
            code_hash.to_owned(),
            PasswordResetCode {
                email: email.clone(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn find(&self, code_hash: &str) -> Result<Option<PasswordResetCode>, RepositoryError> {
        Ok(self.tables.read().await.password_resets.get(code_hash).cloned())
    }

    async fn consume(&self, code_hash: &str) -> Result<bool, RepositoryError> {
        Ok(self
            .tables
            .write()
            .await
            .password_resets
            .remove(code_hash)
            .is_some())
    }
}

#[async_trait]
impl ProductStore for MemoryDb {
    async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let tables = self.tables.read().await;
        let mut products: Vec<Product> = tables
            .products
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(products)
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.tables.read().await.products.get(&id).cloned())
    }

    async fn insert(&self, product: &Product) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        if tables.products.contains_key(&product.id) {
            return Err(RepositoryError::Conflict("product already exists".to_owned()));
        }
        tables.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn update(
        &self,
        id: ProductId,
        details: &ProductDetails,
    ) -> Result<Product, RepositoryError> {
        let mut tables = self.tables.write().await;
        let product = tables.products.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        product.name.clone_from(&details.name);
        product.brand.clone_from(&details.brand);
        product.price = details.price;
        product.sizes.clone_from(&details.sizes);
        product.image.clone_from(&details.image);
        product.quantity = details.quantity;
        product.description.clone_from(&details.description);
        Ok(product.clone())
    }

    async fn save_review(
        &self,
        id: ProductId,
        review: &Review,
        mode: ReviewWrite,
    ) -> Result<ReviewOutcome, RepositoryError> {
        let mut tables = self.tables.write().await;
        let product = tables.products.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if let Some(rejected) = mode.rejection(product.review_by(review.user_id).is_some()) {
            return Ok(rejected);
        }
        product.upsert_review(review.clone());
        Ok(ReviewOutcome::Saved(Box::new(product.clone())))
    }

    async fn delete(&self, id: ProductId) -> Result<bool, RepositoryError> {
        Ok(self.tables.write().await.products.remove(&id).is_some())
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        Ok(self.tables.read().await.products.len() as u64)
    }
}

#[async_trait]
impl CartStore for MemoryDb {
    async fn list(&self, user_id: UserId) -> Result<Vec<CartItem>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .cart_items
            .iter()
            .filter(|item| item.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn add(&self, item: &CartItem) -> Result<CartItem, RepositoryError> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables.cart_items.iter_mut().find(|line| {
            line.user_id == item.user_id && line.is_same_variant(item.product_id, &item.size)
        }) {
            existing.quantity = existing.quantity.saturating_add(item.quantity);
            return Ok(existing.clone());
        }
        tables.cart_items.push(item.clone());
        Ok(item.clone())
    }

    async fn set_quantity(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.write().await;
        match tables
            .cart_items
            .iter_mut()
            .find(|line| line.id == item_id && line.user_id == user_id)
        {
            Some(line) => {
                line.quantity = quantity;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove(&self, user_id: UserId, item_id: CartItemId) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.write().await;
        let before = tables.cart_items.len();
        tables
            .cart_items
            .retain(|line| !(line.id == item_id && line.user_id == user_id));
        Ok(tables.cart_items.len() != before)
    }

    async fn clear(&self, user_id: UserId) -> Result<(), RepositoryError> {
        self.tables
            .write()
            .await
            .cart_items
            .retain(|line| line.user_id != user_id);
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryDb {
    async fn place(&self, order: &Order) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        if tables.orders.contains_key(&order.id) {
            return Err(RepositoryError::Conflict("order already exists".to_owned()));
        }

        // Check every line before touching anything.
        let mut needed: HashMap<ProductId, u64> = HashMap::new();
        for item in &order.items {
            let total = needed.entry(item.product_id).or_insert(0);
            *total += u64::from(item.quantity);
            let in_stock = tables
                .products
                .get(&item.product_id)
                .map_or(0, |p| u64::from(p.quantity));
            if *total > in_stock {
                return Err(RepositoryError::InsufficientStock(item.product_name.clone()));
            }
        }

        for item in &order.items {
            if let Some(product) = tables.products.get_mut(&item.product_id) {
                product.quantity -= item.quantity;
            }
        }
        tables.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables
                .orders
                .values()
                .filter(|o| o.user_id == user_id)
                .cloned()
                .collect(),
        ))
    }

    async fn list_all(&self) -> Result<Vec<Order>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(newest_first(tables.orders.values().cloned().collect()))
    }

    async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<Order, RepositoryError> {
        let mut tables = self.tables.write().await;
        let order = tables.orders.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        order.status = status;
        order.updated_at = now;
        Ok(order.clone())
    }

    async fn update_payment(
        &self,
        id: OrderId,
        status: PaymentStatus,
        transaction_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Order, RepositoryError> {
        let mut tables = self.tables.write().await;
        let order = tables.orders.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        order.payment_status = status;
        if let Some(txn) = transaction_id {
            order.transaction_id = Some(txn.to_owned());
        }
        order.updated_at = now;
        Ok(order.clone())
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        Ok(self.tables.read().await.orders.len() as u64)
    }
}
