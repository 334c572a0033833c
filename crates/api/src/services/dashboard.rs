//! Admin dashboard figures.
//!
//! Aggregates are computed in process from the order list using the pure
//! functions in `solestore_core::reports`.

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;

use solestore_core::Money;
use solestore_core::reports::{
    OrderStats, ProductStats, SalesDataPoint, SalesPeriod, SalesQuery, order_stats, sales_report,
    top_products, total_revenue,
};

use crate::db::{OrderStore, ProductStore, RepositoryError, UserStore};

/// Default number of rows in the best-sellers table.
pub const DEFAULT_TOP_PRODUCTS: usize = 5;

/// Headline numbers for the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardTotals {
    pub total_users: u64,
    pub total_products: u64,
    pub total_orders: u64,
    /// Sum of delivered orders.
    pub total_revenue: Money,
}

/// A sales chart for one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalesReport {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub points: Vec<SalesDataPoint>,
    pub total: Money,
}

/// Read-only reporting over every store.
pub struct DashboardService<'a> {
    users: &'a dyn UserStore,
    products: &'a dyn ProductStore,
    orders: &'a dyn OrderStore,
    offset: FixedOffset,
}

impl<'a> DashboardService<'a> {
    #[must_use]
    pub const fn new(
        users: &'a dyn UserStore,
        products: &'a dyn ProductStore,
        orders: &'a dyn OrderStore,
        offset: FixedOffset,
    ) -> Self {
        Self {
            users,
            products,
            orders,
            offset,
        }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError` if any store fails.
    pub async fn totals(&self) -> Result<DashboardTotals, RepositoryError> {
        let (total_users, total_products, total_orders, orders) = tokio::try_join!(
            self.users.count(),
            self.products.count(),
            self.orders.count(),
            self.orders.list_all(),
        )?;

        Ok(DashboardTotals {
            total_users,
            total_products,
            total_orders,
            total_revenue: total_revenue(&orders),
        })
    }

    /// Delivered sales for the period ending at `now`, bucketed in the
    /// store's reporting offset. `None` selects the monthly window grouped
    /// by day.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the order store fails.
    pub async fn sales(
        &self,
        period: Option<SalesPeriod>,
        now: DateTime<Utc>,
    ) -> Result<SalesReport, RepositoryError> {
        let query = SalesQuery::for_period(period, now);
        let orders = self.orders.list_all().await?;
        let points = sales_report(&orders, &query, self.offset);
        let total = points.iter().map(|p| p.amount).sum();

        Ok(SalesReport {
            start: query.start,
            end: query.end,
            points,
            total,
        })
    }

    /// # Errors
    ///
    /// Returns `RepositoryError` if the order store fails.
    pub async fn order_stats(&self) -> Result<OrderStats, RepositoryError> {
        Ok(order_stats(&self.orders.list_all().await?))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError` if the order store fails.
    pub async fn top_products(&self, limit: usize) -> Result<Vec<ProductStats>, RepositoryError> {
        Ok(top_products(&self.orders.list_all().await?, limit))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeDelta;
    use solestore_core::{
        CartItem, CartItemId, Order, OrderId, OrderStatus, PaymentMethod, PaymentStatus, ProductId,
        UserId, vnd,
    };

    use super::*;
    use crate::db::memory::MemoryDb;

    fn order(amount: i64, status: OrderStatus, created_at: DateTime<Utc>) -> Order {
        let user_id = UserId::generate();
        Order {
            id: OrderId::generate(),
            user_id,
            items: vec![CartItem {
                id: CartItemId::generate(),
                product_id: ProductId::generate(),
                product_name: "Chuck 70".to_string(),
                product_image: String::new(),
                product_price: vnd(amount),
                product_brand: "Converse".to_string(),
                quantity: 1,
                size: "42".to_string(),
                user_id,
            }],
            total_amount: vnd(amount),
            status,
            created_at,
            updated_at: created_at,
            shipping_address: "HCMC".to_string(),
            tracking_number: "ABCDE12345".to_string(),
            estimated_delivery_time: None,
            payment_method: PaymentMethod::Cod,
            payment_status: PaymentStatus::Unpaid,
            transaction_id: None,
        }
    }

    fn offset() -> FixedOffset {
        FixedOffset::east_opt(7 * 3600).unwrap()
    }

    async fn seed(db: &MemoryDb, orders: &[Order]) {
        for o in orders {
            db.import_order(o.clone()).await;
        }
    }

    #[tokio::test]
    async fn test_totals_count_only_delivered_revenue() {
        let db = MemoryDb::default();
        let now = Utc::now();
        seed(
            &db,
            &[
                order(500_000, OrderStatus::Delivered, now),
                order(700_000, OrderStatus::Pending, now),
                order(300_000, OrderStatus::Cancelled, now),
            ],
        )
        .await;

        let dashboard = DashboardService::new(&db, &db, &db, offset());
        let totals = dashboard.totals().await.unwrap();
        assert_eq!(totals.total_orders, 3);
        assert_eq!(totals.total_users, 0);
        assert_eq!(totals.total_revenue, vnd(500_000));

        let stats = dashboard.order_stats().await.unwrap();
        assert_eq!(stats.completed_orders, 1);
        assert_eq!(stats.pending_orders, 1);
        assert_eq!(stats.cancelled_orders, 1);
    }

    #[tokio::test]
    async fn test_weekly_sales_window() {
        let db = MemoryDb::default();
        let now = Utc::now();
        seed(
            &db,
            &[
                order(100_000, OrderStatus::Delivered, now - TimeDelta::days(2)),
                order(200_000, OrderStatus::Delivered, now - TimeDelta::days(10)),
            ],
        )
        .await;

        let dashboard = DashboardService::new(&db, &db, &db, offset());
        let report = dashboard.sales(Some(SalesPeriod::Weekly), now).await.unwrap();
        assert_eq!(report.total, vnd(100_000));
        assert!(report.points.iter().all(|p| p.label.starts_with('W')));

        let yearly = dashboard.sales(Some(SalesPeriod::Yearly), now).await.unwrap();
        assert_eq!(yearly.total, vnd(300_000));

        let top = dashboard.top_products(DEFAULT_TOP_PRODUCTS).await.unwrap();
        assert_eq!(top.len(), 2);
    }
}
