//! Business logic services for the API.
//!
//! # Services
//!
//! - `auth` - Password and Google sign-in, password reset
//! - `catalog` - Products, reviews and the product read cache
//! - `cart` - Per-user cart lines
//! - `orders` - Checkout, tracking and VNPay settlement
//! - `profile` - Profiles, public user cards, roles
//! - `dashboard` - Admin totals and sales reports
//!
//! Services borrow their stores and collaborators for the length of one
//! request; construct them through the accessors on `AppState`.
//!
//! # External seams
//!
//! - `identity` - Google ID token verification
//! - `media` - Cloudinary uploads
//! - `email` - SMTP mail
//! - `payment` - VNPay URL signing and return verification
//! - `events` - In-process change feed behind the SSE endpoints

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod dashboard;
pub mod email;
pub mod events;
pub mod identity;
pub mod media;
pub mod orders;
pub mod payment;
pub mod profile;
