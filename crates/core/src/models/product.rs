//! Catalog items and their embedded reviews.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Money, ProductId, UserId};

/// A shoe in the catalog.
///
/// `rating` is derived: it is the average of `reviews` and is recomputed
/// whenever a review is added or replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub price: Money,
    #[serde(default)]
    pub sizes: Vec<String>,
    /// Public image URL.
    #[serde(default)]
    pub image: String,
    /// Units in stock.
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub reviews: Vec<Review>,
    #[serde(default)]
    pub rating: f32,
}

impl Product {
    /// Whether `size` is one of the sizes this product is sold in.
    ///
    /// Products listed without sizes accept any size label.
    #[must_use]
    pub fn offers_size(&self, size: &str) -> bool {
        self.sizes.is_empty() || self.sizes.iter().any(|s| s == size)
    }

    /// Insert or replace `review`, keyed by its author, then recompute the
    /// average rating.
    ///
    /// Returns `true` when an existing review by the same author was replaced.
    pub fn upsert_review(&mut self, review: Review) -> bool {
        let replaced = if let Some(existing) = self
            .reviews
            .iter_mut()
            .find(|r| r.user_id == review.user_id)
        {
            *existing = review;
            true
        } else {
            self.reviews.push(review);
            false
        };
        self.rating = average_rating(&self.reviews);
        replaced
    }

    /// The review written by `user_id`, if any.
    #[must_use]
    pub fn review_by(&self, user_id: UserId) -> Option<&Review> {
        self.reviews.iter().find(|r| r.user_id == user_id)
    }
}

/// A shopper's rating and comment on a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Review {
    pub user_id: UserId,
    pub rating: f32,
    pub comment: String,
    pub timestamp: DateTime<Utc>,
}

impl Review {
    /// Lowest accepted star rating.
    pub const MIN_RATING: f32 = 1.0;
    /// Highest accepted star rating.
    pub const MAX_RATING: f32 = 5.0;

    /// Whether `rating` is a finite value within the star range.
    #[must_use]
    pub fn is_valid_rating(rating: f32) -> bool {
        rating.is_finite() && (Self::MIN_RATING..=Self::MAX_RATING).contains(&rating)
    }
}

/// Mean of the review ratings, `0.0` when there are none.
#[must_use]
pub fn average_rating(reviews: &[Review]) -> f32 {
    if reviews.is_empty() {
        return 0.0;
    }
    let sum: f64 = reviews.iter().map(|r| f64::from(r.rating)).sum();
    #[allow(clippy::cast_precision_loss)] // review counts are far below f64 precision
    let mean = sum / reviews.len() as f64;
    #[allow(clippy::cast_possible_truncation)] // ratings are within 0..=5
    let mean = mean as f32;
    mean
}

/// Catalog listing filter.
///
/// All criteria are optional and combined with AND. `search` matches the
/// product name or brand, ignoring case; price bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub brand: Option<String>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
}

impl ProductFilter {
    /// Whether `product` passes every criterion.
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        let matches_search = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .is_none_or(|q| {
                let q = q.to_lowercase();
                product.name.to_lowercase().contains(&q) || product.brand.to_lowercase().contains(&q)
            });

        let matches_brand = self
            .brand
            .as_deref()
            .is_none_or(|b| product.brand.eq_ignore_ascii_case(b));

        let matches_min = self.min_price.is_none_or(|min| product.price >= min);
        let matches_max = self.max_price.is_none_or(|max| product.price <= max);

        matches_search && matches_brand && matches_min && matches_max
    }
}
