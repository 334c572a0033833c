//! Cart lines.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;

use solestore_core::{CartItem, CartItemId, ProductId, UserId};

use super::{quantity_from_db, quantity_to_db};
use crate::db::{CartStore, RepositoryError};

#[derive(sqlx::FromRow)]
struct CartRow {
    id: CartItemId,
    product_id: ProductId,
    product_name: String,
    product_image: String,
    product_price: Decimal,
    product_brand: String,
    quantity: i32,
    size: String,
    user_id: UserId,
}

impl TryFrom<CartRow> for CartItem {
    type Error = RepositoryError;

    fn try_from(r: CartRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            product_id: r.product_id,
            product_name: r.product_name,
            product_image: r.product_image,
            product_price: r.product_price,
            product_brand: r.product_brand,
            quantity: quantity_from_db(r.quantity)?,
            size: r.size,
            user_id: r.user_id,
        })
    }
}

/// `PostgreSQL` cart store.
pub struct PgCartStore {
    pool: PgPool,
}

impl PgCartStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CartStore for PgCartStore {
    async fn list(&self, user_id: UserId) -> Result<Vec<CartItem>, RepositoryError> {
        sqlx::query_as::<_, CartRow>(
            r"
            SELECT id, product_id, product_name, product_image, product_price, product_brand,
                   quantity, size, user_id
            FROM cart_items
            WHERE user_id = $1
            ORDER BY created_at, id
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(CartItem::try_from)
        .collect()
    }

    async fn add(&self, item: &CartItem) -> Result<CartItem, RepositoryError> {
        sqlx::query_as::<_, CartRow>(
            r"
            INSERT INTO cart_items
                (id, product_id, product_name, product_image, product_price, product_brand,
                 quantity, size, user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (user_id, product_id, size)
            DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
            RETURNING id, product_id, product_name, product_image, product_price, product_brand,
                      quantity, size, user_id
            ",
        )
        .bind(item.id)
        .bind(item.product_id)
        .bind(&item.product_name)
        .bind(&item.product_image)
        .bind(item.product_price)
        .bind(&item.product_brand)
        .bind(quantity_to_db(item.quantity)?)
        .bind(&item.size)
        .bind(item.user_id)
        .fetch_one(&self.pool)
        .await?
        .try_into()
    }

    async fn set_quantity(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("UPDATE cart_items SET quantity = $3 WHERE id = $1 AND user_id = $2")
                .bind(item_id)
                .bind(user_id)
                .bind(quantity_to_db(quantity)?)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove(&self, user_id: UserId, item_id: CartItemId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND user_id = $2")
            .bind(item_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear(&self, user_id: UserId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
