//! HTTP route handlers for the API.
//!
//! All bodies are JSON; errors are `{"error": "..."}`. `stream` routes are
//! Server-Sent Events that push a fresh snapshot on every change.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                      - Liveness
//! GET  /health/ready                - Readiness (database)
//!
//! # Auth (rate limited)
//! POST /auth/register               - Create account, sign in
//! POST /auth/login                  - Email + password
//! POST /auth/google                 - Google ID token
//! POST /auth/logout                 - End session
//! GET  /auth/role                   - Caller's role (`user` when signed out)
//! POST /auth/password/forgot        - Mail a reset code
//! POST /auth/password/verify        - Check a reset code
//! POST /auth/password/reset         - Set a new password with a code
//!
//! # Catalog
//! GET  /products                    - List (?search&brand&min_price&max_price)
//! GET  /products/stream             - Live list (SSE)
//! GET  /products/{id}               - Detail
//! POST /products/{id}/reviews       - Add review (auth)
//! PUT  /products/{id}/reviews       - Edit own review (auth)
//!
//! # Cart (auth)
//! GET    /cart                      - Lines, total, count
//! POST   /cart                      - Add line
//! DELETE /cart                      - Empty cart
//! GET    /cart/stream               - Live cart (SSE)
//! PATCH  /cart/{item_id}            - Set quantity (<= 0 removes)
//! DELETE /cart/{item_id}            - Remove line
//!
//! # Orders (auth)
//! POST /orders                      - Check out
//! GET  /orders                      - Own orders
//! GET  /orders/{id}                 - Detail
//! GET  /orders/{id}/tracking        - Timeline
//! GET  /orders/{id}/stream          - Live order (SSE)
//! POST /orders/{id}/payment         - VNPay checkout URL
//! GET  /payments/vnpay/return       - VNPay redirect target
//!
//! # Account
//! GET  /account                     - Own profile (auth)
//! PUT  /account                     - Edit profile (auth)
//! POST /account/photo               - Upload avatar (auth, multipart)
//! GET  /users/{id}                  - Public user card
//!
//! # Admin (admin role)
//! GET    /admin/dashboard           - Totals
//! GET    /admin/reports/sales       - Sales chart (?period=)
//! GET    /admin/reports/orders      - Order stats
//! GET    /admin/reports/products    - Best sellers (?limit=)
//! POST   /admin/products            - Create (JSON or multipart)
//! PUT    /admin/products/{id}       - Update (JSON or multipart)
//! DELETE /admin/products/{id}       - Delete
//! POST   /admin/media               - Upload image (multipart)
//! GET    /admin/orders              - All orders
//! GET    /admin/orders/stream       - Live orders (SSE)
//! PUT    /admin/orders/{id}/status  - Set status
//! PUT    /admin/orders/{id}/payment - Set payment status
//! GET    /admin/users               - All users
//! PUT    /admin/users/{id}/role     - Set role
//! ```

pub mod account;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod live;
pub mod orders;
pub mod payments;
pub mod products;
pub mod upload;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, patch, post, put},
};

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::services::media::MAX_UPLOAD_BYTES;
use crate::state::AppState;

/// Body limit for upload routes: one image plus room for multipart framing
/// and text fields.
fn upload_limit() -> DefaultBodyLimit {
    DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 1024 * 1024)
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/google", post(auth::google))
        .route("/logout", post(auth::logout))
        .route("/role", get(auth::role))
        .route("/password/forgot", post(auth::forgot_password))
        .route("/password/verify", post(auth::verify_reset_code))
        .route("/password/reset", post(auth::reset_password))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/stream", get(products::stream))
        .route("/{id}", get(products::show))
        .route(
            "/{id}/reviews",
            post(products::add_review).put(products::update_review),
        )
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).post(cart::add).delete(cart::clear))
        .route("/stream", get(cart::stream))
        .route("/{item_id}", patch(cart::update).delete(cart::remove))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index).post(orders::create))
        .route("/{id}", get(orders::show))
        .route("/{id}/tracking", get(orders::tracking))
        .route("/{id}/stream", get(orders::stream))
        .route("/{id}/payment", post(orders::start_payment))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::show).put(account::update))
        .route(
            "/photo",
            post(account::upload_photo).layer(upload_limit()),
        )
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(admin::dashboard))
        .route("/reports/sales", get(admin::sales_report))
        .route("/reports/orders", get(admin::order_report))
        .route("/reports/products", get(admin::product_report))
        .route(
            "/products",
            post(admin::create_product).layer(upload_limit()),
        )
        .route(
            "/products/{id}",
            put(admin::update_product)
                .delete(admin::delete_product)
                .layer(upload_limit()),
        )
        .route("/media", post(admin::upload_media).layer(upload_limit()))
        .route("/orders", get(admin::list_orders))
        .route("/orders/stream", get(admin::orders_stream))
        .route("/orders/{id}/status", put(admin::update_order_status))
        .route("/orders/{id}/payment", put(admin::update_payment_status))
        .route("/users", get(admin::list_users))
        .route("/users/{id}/role", put(admin::set_role))
}

/// Create all API routes.
///
/// With `rate_limit` set, `/auth` gets the strict limiter and everything
/// else the relaxed one. Both key on the client IP, so the server must be
/// run with connect info or behind a proxy that sets forwarding headers.
pub fn routes(rate_limit: bool) -> Router<AppState> {
    let mut auth = auth_routes();
    if rate_limit {
        auth = auth.layer(auth_rate_limiter());
    }

    let mut api = Router::new()
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/orders", order_routes())
        .route("/payments/vnpay/return", get(payments::vnpay_return))
        .nest("/account", account_routes())
        .route("/users/{id}", get(account::public_profile))
        .nest("/admin", admin_routes());
    if rate_limit {
        api = api.layer(api_rate_limiter());
    }

    Router::new().nest("/auth", auth).merge(api)
}
