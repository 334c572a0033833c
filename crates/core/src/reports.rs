//! Sales reporting.
//!
//! Everything here works on an already-fetched list of orders. Only
//! [`OrderStatus::Delivered`] orders count as revenue.
//!
//! Calendar bucketing happens in a fixed UTC offset (the store's local time,
//! `+07:00` by default) so that "today" on the dashboard matches the shop's
//! day rather than the server's.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, Days, FixedOffset, Months, NaiveDate, NaiveTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::Order;
use crate::types::{Money, OrderStatus, ProductId};

/// Reporting period selected on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SalesPeriod {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl std::str::FromStr for SalesPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            _ => Err(format!("invalid sales period: {s}")),
        }
    }
}

/// Width of one bucket in a sales report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Week,
    Month,
}

/// Time window and bucket width for a sales report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SalesQuery {
    /// Inclusive lower bound.
    pub start: DateTime<Utc>,
    /// Inclusive upper bound.
    pub end: DateTime<Utc>,
    pub granularity: Granularity,
}

impl SalesQuery {
    /// The window ending at `now` for `period`.
    ///
    /// Daily covers the last day by day, weekly the last seven days by ISO
    /// week, monthly the last month by month and yearly the last year by
    /// month. Without a recognised period the last month is reported by day.
    #[must_use]
    pub fn for_period(period: Option<SalesPeriod>, now: DateTime<Utc>) -> Self {
        let (start, granularity) = match period {
            Some(SalesPeriod::Daily) => (now - TimeDelta::days(1), Granularity::Day),
            Some(SalesPeriod::Weekly) => (now - TimeDelta::weeks(1), Granularity::Week),
            Some(SalesPeriod::Monthly) => (months_before(now, 1), Granularity::Month),
            Some(SalesPeriod::Yearly) => (months_before(now, 12), Granularity::Month),
            None => (months_before(now, 1), Granularity::Day),
        };
        Self {
            start,
            end: now,
            granularity,
        }
    }

    /// Whether `at` falls inside the window.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

fn months_before(now: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// One bar of a sales chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalesDataPoint {
    /// `YYYY-MM-DD` for days, `W<n>` for ISO weeks, `Mon YYYY` for months.
    pub label: String,
    pub amount: Money,
    /// Start of the bucket.
    pub date: DateTime<Utc>,
}

/// Group delivered orders inside the window into buckets.
///
/// Each order lands in exactly one bucket. Buckets without sales are omitted
/// and the result is sorted by bucket start.
#[must_use]
pub fn sales_report(orders: &[Order], query: &SalesQuery, offset: FixedOffset) -> Vec<SalesDataPoint> {
    let mut buckets: BTreeMap<NaiveDate, Money> = BTreeMap::new();

    for order in orders
        .iter()
        .filter(|o| o.is_delivered() && query.contains(o.created_at))
    {
        let start = bucket_start(order.created_at, query.granularity, offset);
        *buckets.entry(start).or_insert(Decimal::ZERO) += order.total_amount;
    }

    buckets
        .into_iter()
        .map(|(start, amount)| SalesDataPoint {
            label: bucket_label(start, query.granularity),
            amount,
            date: local_midnight_to_utc(start, offset),
        })
        .collect()
}

/// First local calendar day of the bucket containing `at`.
#[must_use]
pub fn bucket_start(at: DateTime<Utc>, granularity: Granularity, offset: FixedOffset) -> NaiveDate {
    let local = at.with_timezone(&offset).date_naive();
    match granularity {
        Granularity::Day => local,
        Granularity::Week => {
            local - Days::new(u64::from(local.weekday().num_days_from_monday()))
        }
        Granularity::Month => local - Days::new(u64::from(local.day0())),
    }
}

fn bucket_label(start: NaiveDate, granularity: Granularity) -> String {
    match granularity {
        Granularity::Day => start.format("%Y-%m-%d").to_string(),
        Granularity::Week => format!("W{}", start.iso_week().week()),
        Granularity::Month => start.format("%b %Y").to_string(),
    }
}

fn local_midnight_to_utc(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    let local = date.and_time(NaiveTime::MIN);
    let utc = local - TimeDelta::seconds(i64::from(offset.local_minus_utc()));
    DateTime::from_naive_utc_and_offset(utc, Utc)
}

/// Revenue across all delivered orders.
#[must_use]
pub fn total_revenue(orders: &[Order]) -> Money {
    orders
        .iter()
        .filter(|o| o.is_delivered())
        .map(|o| o.total_amount)
        .sum()
}

/// Order counts by outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderStats {
    pub total_orders: usize,
    /// Delivered orders.
    pub completed_orders: usize,
    /// Orders still moving through fulfilment.
    pub pending_orders: usize,
    pub cancelled_orders: usize,
    /// Mean value of a delivered order, rounded to two places.
    pub average_order_value: Money,
}

/// Summarise orders by outcome.
#[must_use]
pub fn order_stats(orders: &[Order]) -> OrderStats {
    let completed_orders = orders.iter().filter(|o| o.is_delivered()).count();
    let pending_orders = orders.iter().filter(|o| o.status.is_in_progress()).count();
    let cancelled_orders = orders
        .iter()
        .filter(|o| o.status == OrderStatus::Cancelled)
        .count();

    let average_order_value = if completed_orders == 0 {
        Decimal::ZERO
    } else {
        (total_revenue(orders) / Decimal::from(completed_orders)).round_dp(2)
    };

    OrderStats {
        total_orders: orders.len(),
        completed_orders,
        pending_orders,
        cancelled_orders,
        average_order_value,
    }
}

/// Sales of one product across delivered orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductStats {
    pub id: ProductId,
    pub name: String,
    pub brand: String,
    pub quantity_sold: u64,
    pub revenue: Money,
}

/// Best-selling products across delivered orders.
///
/// Ranked by units sold, then revenue, then name. Names and brands come from
/// the most recent order line seen for the product.
#[must_use]
pub fn top_products(orders: &[Order], limit: usize) -> Vec<ProductStats> {
    let mut by_product: HashMap<ProductId, ProductStats> = HashMap::new();

    for item in orders
        .iter()
        .filter(|o| o.is_delivered())
        .flat_map(|o| o.items.iter())
    {
        let stats = by_product
            .entry(item.product_id)
            .or_insert_with(|| ProductStats {
                id: item.product_id,
                name: String::new(),
                brand: String::new(),
                quantity_sold: 0,
                revenue: Decimal::ZERO,
            });
        stats.name.clone_from(&item.product_name);
        stats.brand.clone_from(&item.product_brand);
        stats.quantity_sold += u64::from(item.quantity);
        stats.revenue += item.line_total();
    }

    let mut ranked: Vec<ProductStats> = by_product.into_values().collect();
    ranked.sort_by(|a, b| {
        b.quantity_sold
            .cmp(&a.quantity_sold)
            .then_with(|| b.revenue.cmp(&a.revenue))
            .then_with(|| a.name.cmp(&b.name))
    });
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::models::{CartItem, OrderDraft};
    use crate::types::{CartItemId, PaymentMethod, UserId, vnd};

    fn ict() -> FixedOffset {
        FixedOffset::east_opt(7 * 3600).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn line(product_id: ProductId, name: &str, price: i64, quantity: u32) -> CartItem {
        CartItem {
            id: CartItemId::generate(),
            product_id,
            product_name: name.into(),
            product_image: String::new(),
            product_price: vnd(price),
            product_brand: "Brand".into(),
            quantity,
            size: "40".into(),
            user_id: UserId::generate(),
        }
    }

    fn order(created_at: DateTime<Utc>, status: OrderStatus, items: Vec<CartItem>) -> Order {
        let draft = OrderDraft {
            user_id: UserId::generate(),
            items,
            shipping_address: String::new(),
            payment_method: PaymentMethod::Cod,
        };
        let mut order = Order::from_draft(draft, "TRACK00001".into(), created_at);
        order.status = status;
        order
    }

    fn simple(created_at: DateTime<Utc>, status: OrderStatus, amount: i64) -> Order {
        order(
            created_at,
            status,
            vec![line(ProductId::generate(), "Shoe", amount, 1)],
        )
    }

    #[test]
    fn test_period_parse() {
        assert_eq!("Weekly".parse::<SalesPeriod>().unwrap(), SalesPeriod::Weekly);
        assert!("hourly".parse::<SalesPeriod>().is_err());
    }

    #[test]
    fn test_query_windows() {
        let now = at(2025, 3, 31, 12);
        let daily = SalesQuery::for_period(Some(SalesPeriod::Daily), now);
        assert_eq!(daily.start, at(2025, 3, 30, 12));
        assert_eq!(daily.granularity, Granularity::Day);

        let monthly = SalesQuery::for_period(Some(SalesPeriod::Monthly), now);
        assert_eq!(monthly.start, at(2025, 2, 28, 12));
        assert_eq!(monthly.granularity, Granularity::Month);

        let yearly = SalesQuery::for_period(Some(SalesPeriod::Yearly), now);
        assert_eq!(yearly.start, at(2024, 3, 31, 12));
        assert_eq!(yearly.granularity, Granularity::Month);

        let fallback = SalesQuery::for_period(None, now);
        assert_eq!(fallback.start, monthly.start);
        assert_eq!(fallback.granularity, Granularity::Day);
    }

    #[test]
    fn test_only_delivered_orders_in_window_are_summed() {
        let now = at(2025, 6, 10, 12);
        let query = SalesQuery::for_period(Some(SalesPeriod::Weekly), now);
        let orders = vec![
            simple(at(2025, 6, 9, 3), OrderStatus::Delivered, 100_000),
            simple(at(2025, 6, 9, 4), OrderStatus::Shipping, 900_000),
            simple(at(2025, 6, 9, 5), OrderStatus::Cancelled, 900_000),
            simple(at(2025, 5, 1, 5), OrderStatus::Delivered, 900_000),
        ];

        let report = sales_report(&orders, &query, ict());
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].amount, vnd(100_000));
    }

    #[test]
    fn test_daily_buckets_use_local_calendar_day() {
        let now = at(2025, 6, 10, 23);
        let query = SalesQuery::for_period(Some(SalesPeriod::Daily), now);
        // 16:59 UTC is 23:59 local on the 9th; 17:00 UTC is 00:00 local on the 10th.
        let orders = vec![
            simple(at(2025, 6, 10, 16), OrderStatus::Delivered, 10),
            simple(at(2025, 6, 10, 17), OrderStatus::Delivered, 20),
            simple(at(2025, 6, 10, 18), OrderStatus::Delivered, 30),
        ];

        let report = sales_report(&orders, &query, ict());
        let labels: Vec<_> = report.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["2025-06-10", "2025-06-11"]);
        assert_eq!(report[0].amount, vnd(10));
        assert_eq!(report[1].amount, vnd(50));
        // Bucket start is local midnight expressed in UTC.
        assert_eq!(report[1].date, at(2025, 6, 10, 17));
    }

    #[test]
    fn test_weekly_buckets_start_on_monday() {
        // 2025-06-08 is a Sunday, 2025-06-09 a Monday.
        let sunday = bucket_start(at(2025, 6, 8, 10), Granularity::Week, ict());
        let monday = bucket_start(at(2025, 6, 9, 10), Granularity::Week, ict());
        assert_eq!(sunday, NaiveDate::from_ymd_opt(2025, 6, 2).unwrap());
        assert_eq!(monday, NaiveDate::from_ymd_opt(2025, 6, 9).unwrap());

        let now = at(2025, 6, 10, 0);
        let query = SalesQuery::for_period(Some(SalesPeriod::Weekly), now);
        let report = sales_report(
            &[
                simple(at(2025, 6, 8, 10), OrderStatus::Delivered, 1),
                simple(at(2025, 6, 9, 10), OrderStatus::Delivered, 2),
            ],
            &query,
            ict(),
        );
        let labels: Vec<_> = report.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["W23", "W24"]);
    }

    #[test]
    fn test_yearly_buckets_keep_years_apart() {
        let now = at(2025, 6, 15, 0);
        let query = SalesQuery::for_period(Some(SalesPeriod::Yearly), now);
        let report = sales_report(
            &[
                simple(at(2024, 6, 20, 0), OrderStatus::Delivered, 5),
                simple(at(2025, 6, 1, 0), OrderStatus::Delivered, 7),
                simple(at(2025, 6, 2, 0), OrderStatus::Delivered, 1),
            ],
            &query,
            ict(),
        );
        let labels: Vec<_> = report.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["Jun 2024", "Jun 2025"]);
        assert_eq!(report[1].amount, vnd(8));
    }

    #[test]
    fn test_every_order_lands_in_exactly_one_bucket() {
        let now = at(2025, 12, 31, 0);
        let orders: Vec<Order> = (0..60)
            .map(|i| {
                simple(
                    now - TimeDelta::hours(i * 5),
                    OrderStatus::Delivered,
                    1_000,
                )
            })
            .collect();

        for granularity_period in [
            SalesPeriod::Daily,
            SalesPeriod::Weekly,
            SalesPeriod::Monthly,
            SalesPeriod::Yearly,
        ] {
            let query = SalesQuery::for_period(Some(granularity_period), now);
            let in_window = orders.iter().filter(|o| query.contains(o.created_at)).count();
            let report = sales_report(&orders, &query, ict());
            let total: Money = report.iter().map(|p| p.amount).sum();
            assert_eq!(total, vnd(1_000) * Decimal::from(in_window));
        }
    }

    #[test]
    fn test_order_stats() {
        let now = Utc::now();
        let orders = vec![
            simple(now, OrderStatus::Delivered, 300),
            simple(now, OrderStatus::Delivered, 100),
            simple(now, OrderStatus::Pending, 999),
            simple(now, OrderStatus::Shipping, 999),
            simple(now, OrderStatus::Cancelled, 999),
        ];
        let stats = order_stats(&orders);
        assert_eq!(stats.total_orders, 5);
        assert_eq!(stats.completed_orders, 2);
        assert_eq!(stats.pending_orders, 2);
        assert_eq!(stats.cancelled_orders, 1);
        assert_eq!(stats.average_order_value, vnd(200));
        assert_eq!(total_revenue(&orders), vnd(400));
    }

    #[test]
    fn test_order_stats_without_deliveries() {
        let stats = order_stats(&[]);
        assert_eq!(stats.total_orders, 0);
        assert_eq!(stats.average_order_value, Decimal::ZERO);
    }

    #[test]
    fn test_top_products_ranking() {
        let now = Utc::now();
        let boots = ProductId::generate();
        let sneakers = ProductId::generate();
        let sandals = ProductId::generate();
        let orders = vec![
            order(
                now,
                OrderStatus::Delivered,
                vec![line(boots, "Boots", 1_000, 2), line(sneakers, "Sneakers", 500, 3)],
            ),
            order(
                now,
                OrderStatus::Delivered,
                vec![line(boots, "Boots", 1_000, 1)],
            ),
            order(
                now,
                OrderStatus::Pending,
                vec![line(sandals, "Sandals", 100, 50)],
            ),
        ];

        let top = top_products(&orders, 10);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].id, boots);
        assert_eq!(top[0].quantity_sold, 3);
        assert_eq!(top[0].revenue, vnd(3_000));
        assert_eq!(top[1].id, sneakers);

        assert_eq!(top_products(&orders, 1).len(), 1);
    }
}
