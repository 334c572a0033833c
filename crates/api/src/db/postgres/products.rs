//! Catalog queries.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;

use solestore_core::{Product, ProductFilter, ProductId, Review};

use super::{count_from_db, map_unique_violation, quantity_from_db, quantity_to_db};
use crate::db::{ProductDetails, ProductStore, RepositoryError, ReviewOutcome, ReviewWrite};

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    brand: String,
    price: Decimal,
    sizes: Vec<String>,
    image: String,
    quantity: i32,
    description: String,
    reviews: Json<Vec<Review>>,
    rating: f32,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(r: ProductRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            name: r.name,
            brand: r.brand,
            price: r.price,
            sizes: r.sizes,
            image: r.image,
            quantity: quantity_from_db(r.quantity)?,
            description: r.description,
            reviews: r.reviews.0,
            rating: r.rating,
        })
    }
}

/// Escape `LIKE` metacharacters so user input matches literally.
fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// `PostgreSQL` product store.
pub struct PgProductStore {
    pool: PgPool,
}

impl PgProductStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductStore for PgProductStore {
    async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_pattern);

        sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, brand, price, sizes, image, quantity, description, reviews, rating
            FROM products
            WHERE ($1::text IS NULL OR name ILIKE $1 OR brand ILIKE $1)
              AND ($2::text IS NULL OR LOWER(brand) = LOWER($2))
              AND ($3::numeric IS NULL OR price >= $3)
              AND ($4::numeric IS NULL OR price <= $4)
            ORDER BY name, id
            ",
        )
        .bind(search)
        .bind(filter.brand.as_deref())
        .bind(filter.min_price)
        .bind(filter.max_price)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Product::try_from)
        .collect()
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, brand, price, sizes, image, quantity, description, reviews, rating
            FROM products
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Product::try_from)
        .transpose()
    }

    async fn insert(&self, product: &Product) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO products
                (id, name, brand, price, sizes, image, quantity, description, reviews, rating)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ",
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.brand)
        .bind(product.price)
        .bind(&product.sizes)
        .bind(&product.image)
        .bind(quantity_to_db(product.quantity)?)
        .bind(&product.description)
        .bind(Json(&product.reviews))
        .bind(product.rating)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "product"))?;
        Ok(())
    }

    async fn update(
        &self,
        id: ProductId,
        details: &ProductDetails,
    ) -> Result<Product, RepositoryError> {
        sqlx::query_as::<_, ProductRow>(
            r"
            UPDATE products
            SET name = $2, brand = $3, price = $4, sizes = $5, image = $6, quantity = $7,
                description = $8, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, brand, price, sizes, image, quantity, description, reviews, rating
            ",
        )
        .bind(id)
        .bind(&details.name)
        .bind(&details.brand)
        .bind(details.price)
        .bind(&details.sizes)
        .bind(&details.image)
        .bind(quantity_to_db(details.quantity)?)
        .bind(&details.description)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
        .and_then(Product::try_from)
    }

    async fn save_review(
        &self,
        id: ProductId,
        review: &Review,
        mode: ReviewWrite,
    ) -> Result<ReviewOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Row lock: concurrent reviews of this product queue up behind us.
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, brand, price, sizes, image, quantity, description, reviews, rating
            FROM products
            WHERE id = $1
            FOR UPDATE
            ",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;
        let mut product = Product::try_from(row)?;

        if let Some(rejected) = mode.rejection(product.review_by(review.user_id).is_some()) {
            return Ok(rejected);
        }
        product.upsert_review(review.clone());

        sqlx::query(
            "UPDATE products SET reviews = $2, rating = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(Json(&product.reviews))
        .bind(product.rating)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(ReviewOutcome::Saved(Box::new(product)))
    }

    async fn delete(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        count_from_db(count)
    }
}
