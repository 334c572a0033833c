//! SoleStore Core - Shared domain library.
//!
//! This crate provides the domain types and pure arithmetic used by every
//! SoleStore component:
//! - `api` - The JSON backend consumed by the mobile app
//! - `cli` - Command-line tools for migrations, seeding and management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and lets the reporting and
//! cart arithmetic be tested without any backend.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, emails, money, roles and statuses
//! - [`models`] - Entity records (users, products, reviews, cart items, orders)
//! - [`cart`] - Cart totals
//! - [`reports`] - Sales bucketing and order/product statistics

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod models;
pub mod reports;
pub mod types;

pub use models::*;
pub use types::*;
