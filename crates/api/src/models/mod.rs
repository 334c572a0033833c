//! API-local models.
//!
//! Shared entities (users, products, carts, orders) live in `solestore_core`.
//! This module holds what only the HTTP service needs: session payloads and
//! password reset records.

pub mod password_reset;
pub mod session;

pub use password_reset::PasswordResetCode;
pub use session::{CurrentUser, keys as session_keys};
