//! Entity records.
//!
//! These mirror what the store persists. Fields that may be absent in stored
//! documents (embedded reviews, order line snapshots) fall back to defaults on
//! decode instead of failing the whole record.

pub mod cart_item;
pub mod order;
pub mod product;
pub mod user;

pub use cart_item::CartItem;
pub use order::{Order, OrderDraft};
pub use product::{Product, ProductFilter, Review, average_rating};
pub use user::{PublicUser, User};
