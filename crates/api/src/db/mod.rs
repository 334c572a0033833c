//! Persistence for the API.
//!
//! Every collection sits behind an `async_trait` store so that services run
//! unchanged against `PostgreSQL` in production and the in-memory backend in
//! tests and local development.
//!
//! ## Tables
//!
//! - `users` - Profiles, roles and optional password hashes
//! - `password_reset_codes` - Hashed single-use reset codes
//! - `products` - Catalog with embedded reviews (`JSONB`)
//! - `cart_items` - One row per (user, product, size)
//! - `orders` - Orders with their cart snapshot (`JSONB`)
//! - `tower_sessions.session` - Session storage (created by the session store)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p solestore-cli -- migrate
//! ```

pub mod memory;
pub mod postgres;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use solestore_core::{
    CartItem, CartItemId, Email, Money, Order, OrderId, OrderStatus, PaymentStatus, Product,
    ProductFilter, ProductId, Review, Role, User, UserId,
};

use crate::models::PasswordResetCode;

/// Errors from the persistence layer.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// A product in an order does not have enough units left.
    #[error("insufficient stock for {0}")]
    InsufficientStock(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// User profiles and credentials.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError>;

    /// Insert a new user.
    ///
    /// Returns `RepositoryError::Conflict` if the email is taken.
    async fn create(&self, user: &User, password_hash: Option<&str>) -> Result<(), RepositoryError>;

    /// The user and their password hash. `None` for unknown emails and for
    /// accounts that only sign in through Google.
    async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError>;

    async fn set_password_hash(&self, id: UserId, hash: &str) -> Result<(), RepositoryError>;

    /// Persist the editable profile fields of `user`.
    async fn update_profile(&self, user: &User) -> Result<User, RepositoryError>;

    async fn set_role(&self, id: UserId, role: Role) -> Result<User, RepositoryError>;

    /// All users, oldest first.
    async fn list(&self) -> Result<Vec<User>, RepositoryError>;

    async fn count(&self) -> Result<u64, RepositoryError>;
}

/// Pending password reset codes, keyed by the SHA-256 hex of the code.
#[async_trait]
pub trait PasswordResetStore: Send + Sync {
    /// Store a code for `email`, replacing any earlier code for that email.
    ///
    /// Returns `RepositoryError::Conflict` if the hash is already pending
    /// for another account; it is never reassigned.
    async fn insert(
        &self,
        code_hash: &str,
        email: &Email,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    async fn find(&self, code_hash: &str) -> Result<Option<PasswordResetCode>, RepositoryError>;

    /// Remove the code. Returns whether it existed.
    async fn consume(&self, code_hash: &str) -> Result<bool, RepositoryError>;
}

/// The fields an admin edits on a product. Reviews and rating are only
/// ever written through [`ProductStore::save_review`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProductDetails {
    pub name: String,
    pub brand: String,
    pub price: Money,
    pub sizes: Vec<String>,
    pub image: String,
    pub quantity: u32,
    pub description: String,
}

impl From<&Product> for ProductDetails {
    fn from(p: &Product) -> Self {
        Self {
            name: p.name.clone(),
            brand: p.brand.clone(),
            price: p.price,
            sizes: p.sizes.clone(),
            image: p.image.clone(),
            quantity: p.quantity,
            description: p.description.clone(),
        }
    }
}

/// How [`ProductStore::save_review`] treats the author's earlier review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewWrite {
    /// First review by this author.
    Add,
    /// Replace the author's existing review.
    Replace,
}

impl ReviewWrite {
    /// The rejection for this write, if the author's review state forbids it.
    pub(crate) fn rejection(self, already_reviewed: bool) -> Option<ReviewOutcome> {
        match (self, already_reviewed) {
            (Self::Add, true) => Some(ReviewOutcome::AlreadyReviewed),
            (Self::Replace, false) => Some(ReviewOutcome::NoExistingReview),
            _ => None,
        }
    }
}

/// Result of a review write.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewOutcome {
    /// Stored; the product as it is now.
    Saved(Box<Product>),
    AlreadyReviewed,
    NoExistingReview,
}

/// The product catalog.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Products matching `filter`, ordered by name.
    async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError>;

    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    async fn insert(&self, product: &Product) -> Result<(), RepositoryError>;

    /// Overwrite the editable fields and return the stored product.
    /// Reviews and rating are left as they are.
    ///
    /// Returns `RepositoryError::NotFound` for unknown ids.
    async fn update(
        &self,
        id: ProductId,
        details: &ProductDetails,
    ) -> Result<Product, RepositoryError>;

    /// Merge `review` into the product's reviews and recompute its rating,
    /// as one atomic step against the current row. Stock is not written.
    ///
    /// Returns `RepositoryError::NotFound` for unknown ids.
    async fn save_review(
        &self,
        id: ProductId,
        review: &Review,
        mode: ReviewWrite,
    ) -> Result<ReviewOutcome, RepositoryError>;

    /// Returns whether the product existed.
    async fn delete(&self, id: ProductId) -> Result<bool, RepositoryError>;

    async fn count(&self) -> Result<u64, RepositoryError>;
}

/// Shopping carts, one per user.
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn list(&self, user_id: UserId) -> Result<Vec<CartItem>, RepositoryError>;

    /// Add a line, merging its quantity into an existing line for the same
    /// product and size. Returns the stored line.
    async fn add(&self, item: &CartItem) -> Result<CartItem, RepositoryError>;

    /// Returns whether the line existed.
    async fn set_quantity(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<bool, RepositoryError>;

    /// Returns whether the line existed.
    async fn remove(&self, user_id: UserId, item_id: CartItemId) -> Result<bool, RepositoryError>;

    async fn clear(&self, user_id: UserId) -> Result<(), RepositoryError>;
}

/// Placed orders.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Decrement stock for every line and insert the order, all or nothing.
    ///
    /// Returns `RepositoryError::InsufficientStock` naming the first product
    /// that cannot be fulfilled; nothing is written in that case.
    async fn place(&self, order: &Order) -> Result<(), RepositoryError>;

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Orders of one user, newest first.
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError>;

    /// Every order, newest first.
    async fn list_all(&self) -> Result<Vec<Order>, RepositoryError>;

    async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<Order, RepositoryError>;

    async fn update_payment(
        &self,
        id: OrderId,
        status: PaymentStatus,
        transaction_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Order, RepositoryError>;

    async fn count(&self) -> Result<u64, RepositoryError>;
}

/// Every store the API needs, behind shared trait objects.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub password_resets: Arc<dyn PasswordResetStore>,
    pub products: Arc<dyn ProductStore>,
    pub carts: Arc<dyn CartStore>,
    pub orders: Arc<dyn OrderStore>,
}

impl Stores {
    /// Stores backed by `PostgreSQL`.
    #[must_use]
    pub fn postgres(pool: &PgPool) -> Self {
        Self {
            users: Arc::new(postgres::PgUserStore::new(pool.clone())),
            password_resets: Arc::new(postgres::PgPasswordResetStore::new(pool.clone())),
            products: Arc::new(postgres::PgProductStore::new(pool.clone())),
            carts: Arc::new(postgres::PgCartStore::new(pool.clone())),
            orders: Arc::new(postgres::PgOrderStore::new(pool.clone())),
        }
    }

    /// Stores backed by one shared in-memory database.
    #[must_use]
    pub fn in_memory() -> Self {
        let db = Arc::new(memory::MemoryDb::default());
        Self {
            users: db.clone(),
            password_resets: db.clone(),
            products: db.clone(),
            carts: db.clone(),
            orders: db,
        }
    }
}
