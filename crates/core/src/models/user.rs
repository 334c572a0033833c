//! Shopper and staff accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Email, Role, UserId};

/// Display name used when a profile has none.
pub const ANONYMOUS_NAME: &str = "Anonymous User";

/// A store account.
///
/// Credentials live with the identity layer, never on this record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    pub email: Email,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub photo_url: String,
    #[serde(default)]
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A fresh shopper account with an empty profile.
    #[must_use]
    pub fn new(email: Email, name: String, now: DateTime<Utc>) -> Self {
        Self {
            id: UserId::generate(),
            name,
            phone: String::new(),
            email,
            address: String::new(),
            photo_url: String::new(),
            role: Role::User,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this account may use the admin endpoints.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// What other shoppers may see about an account (e.g. next to a review).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicUser {
    pub id: UserId,
    pub name: String,
    pub photo_url: String,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        let name = if user.name.trim().is_empty() {
            ANONYMOUS_NAME.to_owned()
        } else {
            user.name.clone()
        };

        Self {
            id: user.id,
            name,
            photo_url: user.photo_url.clone(),
        }
    }
}
