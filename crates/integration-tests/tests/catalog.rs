//! Browsing, reviews and catalog administration.

#![allow(clippy::unwrap_used)]

use axum::http::{Method, StatusCode};
use serde_json::{Value, json};

use solestore_core::vnd;
use solestore_integration_tests::{TestApp, money, multipart_body};

fn shoe(name: &str, brand: &str, price: i64) -> Value {
    json!({
        "name": name,
        "brand": brand,
        "price": price.to_string(),
        "sizes": ["39", "40", "41"],
        "quantity": 10,
    })
}

fn names(response: &Value) -> Vec<String> {
    let mut names: Vec<String> = response
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap().to_string())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn list_filters_by_search_brand_and_price() {
    let app = TestApp::new();
    let admin = app.admin("admin@example.com").await;
    app.create_product_with(&admin, &shoe("Air Max 90", "Nike", 3_500_000)).await;
    app.create_product_with(&admin, &shoe("Samba OG", "Adidas", 2_600_000)).await;
    app.create_product_with(&admin, &shoe("Air Jordan 1", "Nike", 4_200_000)).await;

    let all = app.get("/products", None).await;
    assert_eq!(all.status, StatusCode::OK);
    assert_eq!(all.json().as_array().unwrap().len(), 3);

    let search = app.get("/products?search=air", None).await;
    assert_eq!(names(&search.json()), ["Air Jordan 1", "Air Max 90"]);

    let brand = app.get("/products?brand=adidas", None).await;
    assert_eq!(names(&brand.json()), ["Samba OG"]);

    let range = app
        .get("/products?min_price=3000000&max_price=4000000", None)
        .await;
    assert_eq!(names(&range.json()), ["Air Max 90"]);

    let combined = app.get("/products?search=nike&max_price=4000000", None).await;
    assert_eq!(names(&combined.json()), ["Air Max 90"]);
}

#[tokio::test]
async fn show_returns_product_or_404() {
    let app = TestApp::new();
    let admin = app.admin("admin@example.com").await;
    let product = app.create_product(&admin, "Gazelle", 2_300_000, 5).await;
    let id = product["id"].as_str().unwrap();

    let found = app.get(&format!("/products/{id}"), None).await;
    assert_eq!(found.status, StatusCode::OK);
    let body = found.json();
    assert_eq!(body["name"], "Gazelle");
    assert_eq!(money(&body["price"]), vnd(2_300_000));
    assert_eq!(body["rating"], 0.0);

    let missing = app
        .get("/products/00000000-0000-4000-8000-000000000000", None)
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reviews_update_rating() {
    let app = TestApp::new();
    let admin = app.admin("admin@example.com").await;
    let product = app.create_product(&admin, "Stan Smith", 2_400_000, 5).await;
    let uri = format!("/products/{}/reviews", product["id"].as_str().unwrap());

    let alice = app.register("alice@example.com").await;
    let bob = app.register("bob@example.com").await;

    let first = app
        .json(
            Method::POST,
            &uri,
            &json!({ "rating": 5, "comment": "Perfect fit" }),
            Some(&alice),
        )
        .await;
    assert_eq!(first.status, StatusCode::CREATED);
    assert_eq!(first.json()["rating"], 5.0);

    let second = app
        .json(Method::POST, &uri, &json!({ "rating": 2 }), Some(&bob))
        .await;
    assert_eq!(second.status, StatusCode::CREATED);
    let body = second.json();
    assert_eq!(body["rating"], 3.5);
    assert_eq!(body["reviews"].as_array().unwrap().len(), 2);

    let again = app
        .json(Method::POST, &uri, &json!({ "rating": 4 }), Some(&alice))
        .await;
    assert_eq!(again.status, StatusCode::CONFLICT);

    let edited = app
        .json(
            Method::PUT,
            &uri,
            &json!({ "rating": 4, "comment": "Runs small" }),
            Some(&bob),
        )
        .await;
    assert_eq!(edited.status, StatusCode::OK);
    assert_eq!(edited.json()["rating"], 4.5);
}

#[tokio::test]
async fn review_rules() {
    let app = TestApp::new();
    let admin = app.admin("admin@example.com").await;
    let product = app.create_product(&admin, "Forum Low", 2_700_000, 5).await;
    let uri = format!("/products/{}/reviews", product["id"].as_str().unwrap());
    let user = app.register("critic@example.com").await;

    let anonymous = app.json(Method::POST, &uri, &json!({ "rating": 4 }), None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let out_of_range = app
        .json(Method::POST, &uri, &json!({ "rating": 6 }), Some(&user))
        .await;
    assert_eq!(out_of_range.status, StatusCode::BAD_REQUEST);

    let no_review_yet = app
        .json(Method::PUT, &uri, &json!({ "rating": 3 }), Some(&user))
        .await;
    assert_eq!(no_review_yet.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn catalog_admin_requires_admin_role() {
    let app = TestApp::new();
    let shopper = app.register("shopper@example.com").await;
    let body = shoe("Bootleg", "Nike", 1);

    let guest = app.json(Method::POST, "/admin/products", &body, None).await;
    assert_eq!(guest.status, StatusCode::UNAUTHORIZED);

    let user = app
        .json(Method::POST, "/admin/products", &body, Some(&shopper))
        .await;
    assert_eq!(user.status, StatusCode::FORBIDDEN);

    assert!(app.get("/products", None).await.json().as_array().unwrap().is_empty());
}

#[tokio::test]
async fn admin_updates_and_deletes_products() {
    let app = TestApp::new();
    let admin = app.admin("admin@example.com").await;
    let product = app.create_product(&admin, "Cortez", 2_000_000, 8).await;
    let uri = format!("/admin/products/{}", product["id"].as_str().unwrap());

    let updated = app
        .json(
            Method::PUT,
            &uri,
            &json!({
                "name": "Cortez Leather",
                "brand": "Nike",
                "price": "2100000",
                "sizes": ["42"],
                "image_url": "https://cdn.test/cortez.png",
                "quantity": 3,
            }),
            Some(&admin),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    let body = updated.json();
    assert_eq!(body["name"], "Cortez Leather");
    assert_eq!(body["quantity"], 3);
    assert_eq!(body["image"], "https://cdn.test/cortez.png");

    let invalid = app
        .json(
            Method::PUT,
            &uri,
            &json!({ "name": " ", "brand": "Nike", "price": "1" }),
            Some(&admin),
        )
        .await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);

    let deleted = app.delete(&uri, Some(&admin)).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let gone = app
        .get(&format!("/products/{}", product["id"].as_str().unwrap()), None)
        .await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_creates_product_from_multipart_upload() {
    let app = TestApp::new();
    let admin = app.admin("admin@example.com").await;

    let body = multipart_body(
        &[
            ("name", "Old Skool"),
            ("brand", "Vans"),
            ("price", "1850000"),
            ("sizes", "38, 39,40"),
            ("quantity", "12"),
        ],
        &[("image", "old-skool.png", b"\x89PNG fake image".as_slice())],
    );
    let response = app
        .multipart(Method::POST, "/admin/products", body, Some(&admin))
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());

    let product = response.json();
    assert_eq!(product["sizes"], json!(["38", "39", "40"]));
    assert_eq!(product["quantity"], 12);
    assert_eq!(
        product["image"],
        "https://media.test/solestore/products/old-skool.png"
    );
    assert_eq!(app.media.upload_count(), 1);
}

#[tokio::test]
async fn admin_media_upload_returns_url() {
    let app = TestApp::new();
    let admin = app.admin("admin@example.com").await;

    let body = multipart_body(&[], &[("file", "banner.png", b"png bytes".as_slice())]);
    let response = app
        .multipart(Method::POST, "/admin/media", body, Some(&admin))
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(
        response.json()["url"],
        "https://media.test/solestore/products/banner.png"
    );

    let empty = multipart_body(&[("note", "no file")], &[]);
    let missing = app
        .multipart(Method::POST, "/admin/media", empty, Some(&admin))
        .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn product_stream_starts_with_snapshot() {
    let app = TestApp::new();
    let admin = app.admin("admin@example.com").await;
    app.create_product(&admin, "Chuck 70", 2_100_000, 4).await;

    let (status, event) = app.first_event("/products/stream", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(event.starts_with("event: snapshot"), "{event}");
    assert!(event.contains("Chuck 70"));
}
