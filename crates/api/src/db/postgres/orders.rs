//! Orders and the checkout transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;

use solestore_core::{
    CartItem, Order, OrderId, OrderStatus, PaymentMethod, PaymentStatus, UserId,
};

use super::{count_from_db, map_unique_violation, quantity_to_db};
use crate::db::{OrderStore, RepositoryError};

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    items: Json<Vec<CartItem>>,
    total_amount: Decimal,
    status: OrderStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    shipping_address: String,
    tracking_number: String,
    estimated_delivery_time: Option<DateTime<Utc>>,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    transaction_id: Option<String>,
}

impl From<OrderRow> for Order {
    fn from(r: OrderRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            items: r.items.0,
            total_amount: r.total_amount,
            status: r.status,
            created_at: r.created_at,
            updated_at: r.updated_at,
            shipping_address: r.shipping_address,
            tracking_number: r.tracking_number,
            estimated_delivery_time: r.estimated_delivery_time,
            payment_method: r.payment_method,
            payment_status: r.payment_status,
            transaction_id: r.transaction_id,
        }
    }
}

/// `PostgreSQL` order store.
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn place(&self, order: &Order) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        for item in &order.items {
            let updated = sqlx::query(
                r"
                UPDATE products
                SET quantity = quantity - $2, updated_at = NOW()
                WHERE id = $1 AND quantity >= $2
                ",
            )
            .bind(item.product_id)
            .bind(quantity_to_db(item.quantity)?)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                tx.rollback().await?;
                return Err(RepositoryError::InsufficientStock(item.product_name.clone()));
            }
        }

        sqlx::query(
            r"
            INSERT INTO orders
                (id, user_id, items, total_amount, status, created_at, updated_at,
                 shipping_address, tracking_number, estimated_delivery_time,
                 payment_method, payment_status, transaction_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ",
        )
        .bind(order.id)
        .bind(order.user_id)
        .bind(Json(&order.items))
        .bind(order.total_amount)
        .bind(order.status)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(&order.shipping_address)
        .bind(&order.tracking_number)
        .bind(order.estimated_delivery_time)
        .bind(order.payment_method)
        .bind(order.payment_status)
        .bind(order.transaction_id.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, "order"))?;

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, user_id, items, total_amount, status, created_at, updated_at,
                   shipping_address, tracking_number, estimated_delivery_time,
                   payment_method, payment_status, transaction_id
            FROM orders
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Order::from))
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, user_id, items, total_amount, status, created_at, updated_at,
                   shipping_address, tracking_number, estimated_delivery_time,
                   payment_method, payment_status, transaction_id
            FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Order::from).collect())
    }

    async fn list_all(&self) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, user_id, items, total_amount, status, created_at, updated_at,
                   shipping_address, tracking_number, estimated_delivery_time,
                   payment_method, payment_status, transaction_id
            FROM orders
            ORDER BY created_at DESC
            ",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Order::from).collect())
    }

    async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<Order, RepositoryError> {
        sqlx::query_as::<_, OrderRow>(
            r"
            UPDATE orders
            SET status = $2, updated_at = $3
            WHERE id = $1
            RETURNING id, user_id, items, total_amount, status, created_at, updated_at,
                      shipping_address, tracking_number, estimated_delivery_time,
                      payment_method, payment_status, transaction_id
            ",
        )
        .bind(id)
        .bind(status)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?
        .map(Order::from)
        .ok_or(RepositoryError::NotFound)
    }

    async fn update_payment(
        &self,
        id: OrderId,
        status: PaymentStatus,
        transaction_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Order, RepositoryError> {
        sqlx::query_as::<_, OrderRow>(
            r"
            UPDATE orders
            SET payment_status = $2,
                transaction_id = COALESCE($3, transaction_id),
                updated_at = $4
            WHERE id = $1
            RETURNING id, user_id, items, total_amount, status, created_at, updated_at,
                      shipping_address, tracking_number, estimated_delivery_time,
                      payment_method, payment_status, transaction_id
            ",
        )
        .bind(id)
        .bind(status)
        .bind(transaction_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?
        .map(Order::from)
        .ok_or(RepositoryError::NotFound)
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;
        count_from_db(count)
    }
}
