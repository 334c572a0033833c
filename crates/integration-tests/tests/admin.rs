//! Back-office dashboard, reports, order and user management.

#![allow(clippy::unwrap_used)]

use axum::http::{Method, StatusCode};
use serde_json::{Value, json};

use solestore_core::vnd;
use solestore_integration_tests::{Session, TestApp, money};

struct Shop {
    app: TestApp,
    admin: Session,
    shopper: Session,
    delivered: Value,
    pending: Value,
}

/// One delivered order of 2 × 1.000.000 and one pending order of
/// 1 × 500.000.
async fn shop_with_orders() -> Shop {
    let app = TestApp::new();
    let admin = app.admin("admin@example.com").await;
    let runner = app.create_product(&admin, "Runner", 1_000_000, 10).await;
    let slide = app.create_product(&admin, "Slide", 500_000, 10).await;
    let shopper = app.register("shopper@example.com").await;

    app.add_to_cart(&shopper, runner["id"].as_str().unwrap(), 2).await;
    let delivered = app
        .json(
            Method::POST,
            "/orders",
            &json!({ "shipping_address": "1 Lê Lợi" }),
            Some(&shopper),
        )
        .await
        .json();
    let response = app
        .json(
            Method::PUT,
            &format!("/admin/orders/{}/status", delivered["id"].as_str().unwrap()),
            &json!({ "status": "DELIVERED" }),
            Some(&admin),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let delivered = response.json();

    app.add_to_cart(&shopper, slide["id"].as_str().unwrap(), 1).await;
    let pending = app
        .json(
            Method::POST,
            "/orders",
            &json!({ "shipping_address": "2 Lê Lợi" }),
            Some(&shopper),
        )
        .await
        .json();

    Shop {
        app,
        admin,
        shopper,
        delivered,
        pending,
    }
}

#[tokio::test]
async fn admin_routes_reject_shoppers() {
    let shop = shop_with_orders().await;

    for uri in [
        "/admin/dashboard",
        "/admin/reports/sales",
        "/admin/reports/orders",
        "/admin/reports/products",
        "/admin/orders",
        "/admin/users",
    ] {
        let shopper = shop.app.get(uri, Some(&shop.shopper)).await;
        assert_eq!(shopper.status, StatusCode::FORBIDDEN, "{uri}");
        let guest = shop.app.get(uri, None).await;
        assert_eq!(guest.status, StatusCode::UNAUTHORIZED, "{uri}");
    }
}

#[tokio::test]
async fn dashboard_counts_delivered_revenue_only() {
    let shop = shop_with_orders().await;

    let body = shop.app.get("/admin/dashboard", Some(&shop.admin)).await.json();
    assert_eq!(body["total_users"], 2);
    assert_eq!(body["total_products"], 2);
    assert_eq!(body["total_orders"], 2);
    assert_eq!(money(&body["total_revenue"]), vnd(2_000_000));
}

#[tokio::test]
async fn order_report_splits_by_outcome() {
    let shop = shop_with_orders().await;

    let body = shop
        .app
        .get("/admin/reports/orders", Some(&shop.admin))
        .await
        .json();
    assert_eq!(body["total_orders"], 2);
    assert_eq!(body["completed_orders"], 1);
    assert_eq!(body["pending_orders"], 1);
    assert_eq!(body["cancelled_orders"], 0);
    assert_eq!(money(&body["average_order_value"]), vnd(2_000_000));
}

#[tokio::test]
async fn product_report_ranks_delivered_sales() {
    let shop = shop_with_orders().await;

    let body = shop
        .app
        .get("/admin/reports/products?limit=5", Some(&shop.admin))
        .await
        .json();
    let ranked = body.as_array().unwrap();
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0]["name"], "Runner");
    assert_eq!(ranked[0]["quantity_sold"], 2);
    assert_eq!(money(&ranked[0]["revenue"]), vnd(2_000_000));
}

#[tokio::test]
async fn sales_report_includes_todays_delivery() {
    let shop = shop_with_orders().await;

    let daily = shop
        .app
        .get("/admin/reports/sales?period=daily", Some(&shop.admin))
        .await;
    assert_eq!(daily.status, StatusCode::OK);
    let body = daily.json();
    assert_eq!(money(&body["total"]), vnd(2_000_000));
    assert!(!body["points"].as_array().unwrap().is_empty());

    // Unknown periods fall back to the default window instead of failing.
    let fallback = shop
        .app
        .get("/admin/reports/sales?period=fortnightly", Some(&shop.admin))
        .await;
    assert_eq!(fallback.status, StatusCode::OK);
    assert_eq!(money(&fallback.json()["total"]), vnd(2_000_000));
}

#[tokio::test]
async fn admin_sees_all_orders_and_sets_status() {
    let shop = shop_with_orders().await;

    let orders = shop.app.get("/admin/orders", Some(&shop.admin)).await.json();
    assert_eq!(orders.as_array().unwrap().len(), 2);
    assert_eq!(shop.delivered["status"], "DELIVERED");

    let uri = format!("/admin/orders/{}/status", shop.pending["id"].as_str().unwrap());
    let invalid = shop
        .app
        .json(Method::PUT, &uri, &json!({ "status": "LOST" }), Some(&shop.admin))
        .await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);

    let cancelled = shop
        .app
        .json(
            Method::PUT,
            &uri,
            &json!({ "status": "CANCELLED" }),
            Some(&shop.admin),
        )
        .await;
    assert_eq!(cancelled.status, StatusCode::OK);

    // The shopper sees the change.
    let order = shop
        .app
        .get(
            &format!("/orders/{}", shop.pending["id"].as_str().unwrap()),
            Some(&shop.shopper),
        )
        .await
        .json();
    assert_eq!(order["status"], "CANCELLED");

    let missing = shop
        .app
        .json(
            Method::PUT,
            "/admin/orders/00000000-0000-4000-8000-000000000000/status",
            &json!({ "status": "CONFIRMED" }),
            Some(&shop.admin),
        )
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_records_payment() {
    let shop = shop_with_orders().await;
    let uri = format!("/admin/orders/{}/payment", shop.pending["id"].as_str().unwrap());

    let response = shop
        .app
        .json(
            Method::PUT,
            &uri,
            &json!({ "status": "paid", "transaction_id": "CASH-0042" }),
            Some(&shop.admin),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let order = response.json();
    assert_eq!(order["payment_status"], "paid");
    assert_eq!(order["transaction_id"], "CASH-0042");
}

#[tokio::test]
async fn admin_orders_stream_sends_all_orders() {
    let shop = shop_with_orders().await;

    let (status, event) = shop
        .app
        .first_event("/admin/orders/stream", Some(&shop.admin))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(event.starts_with("event: snapshot"), "{event}");
    assert!(event.contains(shop.delivered["id"].as_str().unwrap()));
    assert!(event.contains(shop.pending["id"].as_str().unwrap()));
}

#[tokio::test]
async fn admin_manages_roles() {
    let shop = shop_with_orders().await;

    let users = shop.app.get("/admin/users", Some(&shop.admin)).await.json();
    assert_eq!(users.as_array().unwrap().len(), 2);

    let shopper_id = shop.app.user_id("shopper@example.com").await;
    let promoted = shop
        .app
        .json(
            Method::PUT,
            &format!("/admin/users/{shopper_id}/role"),
            &json!({ "role": "admin" }),
            Some(&shop.admin),
        )
        .await;
    assert_eq!(promoted.status, StatusCode::OK);
    assert_eq!(promoted.json()["role"], "admin");

    // Takes effect on the shopper's existing session.
    let dashboard = shop.app.get("/admin/dashboard", Some(&shop.shopper)).await;
    assert_eq!(dashboard.status, StatusCode::OK);
}

#[tokio::test]
async fn public_profile_hides_private_fields() {
    let shop = shop_with_orders().await;

    let updated = shop
        .app
        .json(
            Method::PUT,
            "/account",
            &json!({ "name": "Trang", "phone": "0901234567", "address": "3 Lý Tự Trọng" }),
            Some(&shop.shopper),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.json()["phone"], "0901234567");

    let shopper_id = shop.app.user_id("shopper@example.com").await;
    let card = shop.app.get(&format!("/users/{shopper_id}"), None).await;
    assert_eq!(card.status, StatusCode::OK);
    let card = card.json();
    assert_eq!(card["name"], "Trang");
    assert!(card.get("email").is_none());
    assert!(card.get("phone").is_none());
}
