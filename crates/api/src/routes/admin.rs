//! Admin route handlers.
//!
//! Every handler takes [`RequireAdmin`], which re-reads the caller's role
//! from the user store on each request.

use axum::{
    Json,
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::{StatusCode, header::CONTENT_TYPE},
    response::IntoResponse,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use solestore_core::reports::{OrderStats, ProductStats, SalesPeriod};
use solestore_core::{
    Money, Order, OrderId, OrderStatus, PaymentStatus, Product, ProductId, Role, User, UserId,
};

use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::routes::live::snapshot_stream;
use crate::routes::upload::MultipartForm;
use crate::services::catalog::ProductInput;
use crate::services::dashboard::{DEFAULT_TOP_PRODUCTS, DashboardTotals, SalesReport};
use crate::services::events::ChangeEvent;
use crate::services::media::{ImageInput, MediaFolder};
use crate::state::AppState;

/// Upper bound for the best-sellers table.
const MAX_TOP_PRODUCTS: usize = 100;

// =============================================================================
// Dashboard
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SalesParams {
    pub period: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TopProductsParams {
    pub limit: Option<usize>,
}

/// GET /admin/dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<DashboardTotals>> {
    Ok(Json(state.dashboard().totals().await?))
}

/// Delivered sales for `daily`, `weekly`, `monthly` or `yearly`. Anything
/// else gets the monthly window grouped by day.
///
/// GET /admin/reports/sales?period=
pub async fn sales_report(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(params): Query<SalesParams>,
) -> Result<Json<SalesReport>> {
    let period = params
        .period
        .as_deref()
        .and_then(|p| p.parse::<SalesPeriod>().ok());
    Ok(Json(state.dashboard().sales(period, Utc::now()).await?))
}

/// GET /admin/reports/orders
pub async fn order_report(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<OrderStats>> {
    Ok(Json(state.dashboard().order_stats().await?))
}

/// GET /admin/reports/products?limit=
pub async fn product_report(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(params): Query<TopProductsParams>,
) -> Result<Json<Vec<ProductStats>>> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_TOP_PRODUCTS)
        .clamp(1, MAX_TOP_PRODUCTS);
    Ok(Json(state.dashboard().top_products(limit).await?))
}

// =============================================================================
// Products
// =============================================================================

/// JSON body for a product. The image must already be hosted.
#[derive(Debug, Deserialize)]
pub struct ProductJson {
    pub name: String,
    pub brand: String,
    pub price: Money,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub description: String,
}

impl From<ProductJson> for ProductInput {
    fn from(body: ProductJson) -> Self {
        Self {
            name: body.name,
            brand: body.brand,
            price: body.price,
            sizes: body.sizes,
            image: ImageInput::Url(body.image_url),
            quantity: body.quantity,
            description: body.description,
        }
    }
}

/// Product fields from either a JSON body or a multipart form.
///
/// Multipart forms carry `name`, `brand`, `price`, `sizes` (comma
/// separated), `quantity`, `description`, and either an `image` file or an
/// `image_url` field.
pub struct ProductForm(pub ProductInput);

impl FromRequest<AppState> for ProductForm {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            let form = MultipartForm::read(multipart).await?;
            Ok(Self(product_from_form(form)?))
        } else {
            let Json(body) = Json::<ProductJson>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            Ok(Self(body.into()))
        }
    }
}

fn product_from_form(mut form: MultipartForm) -> Result<ProductInput> {
    let required = |name: &str| {
        form.text(name)
            .map(str::to_string)
            .ok_or_else(|| AppError::BadRequest(format!("Missing field: {name}")))
    };

    let name = required("name")?;
    let brand = required("brand")?;
    let price = required("price")?
        .parse::<Money>()
        .map_err(|_| AppError::BadRequest("Invalid price".to_string()))?;
    let quantity = match form.text("quantity") {
        Some(raw) => raw
            .parse::<u32>()
            .map_err(|_| AppError::BadRequest("Invalid quantity".to_string()))?,
        None => 0,
    };
    let sizes = form
        .text("sizes")
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let description = form.text("description").unwrap_or_default().to_string();
    let image_url = form.text("image_url").unwrap_or_default().to_string();

    let image = match form.take_file("image") {
        Some(file) => ImageInput::Upload {
            bytes: file.bytes,
            filename: file.filename,
        },
        None => ImageInput::Url(image_url),
    };

    Ok(ProductInput {
        name,
        brand,
        price,
        sizes,
        image,
        quantity,
        description,
    })
}

/// POST /admin/products
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create_product(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ProductForm(input): ProductForm,
) -> Result<impl IntoResponse> {
    let product = state.catalog().add(input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /admin/products/{id}
#[instrument(skip_all, fields(admin_id = %admin.id, product_id = %id))]
pub async fn update_product(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    ProductForm(input): ProductForm,
) -> Result<Json<Product>> {
    Ok(Json(state.catalog().update(id, input).await?))
}

/// DELETE /admin/products/{id}
pub async fn delete_product(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    state.catalog().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct MediaResponse {
    pub url: String,
}

/// Host an image and return its public URL. Expects a `file` part.
///
/// POST /admin/media
pub async fn upload_media(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let mut form = MultipartForm::read(multipart).await?;
    let file = form
        .take_file("file")
        .ok_or_else(|| AppError::BadRequest("Missing file".to_string()))?;

    let url = state
        .media()
        .upload(file.bytes, &file.filename, MediaFolder::Products)
        .await?;
    Ok((StatusCode::CREATED, Json(MediaResponse { url })))
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    /// Any status name, case-insensitive.
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePaymentRequest {
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
}

/// Every order, newest first.
///
/// GET /admin/orders
pub async fn list_orders(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(state.orders().all_orders().await?))
}

/// Live version of [`list_orders`].
///
/// GET /admin/orders/stream
pub async fn orders_stream(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> impl IntoResponse {
    snapshot_stream(
        state,
        |event| matches!(event, ChangeEvent::OrderChanged(_)),
        |state| async move { Ok::<_, AppError>(state.orders().all_orders().await?) },
    )
}

/// PUT /admin/orders/{id}/status
#[instrument(skip(state, admin, req), fields(admin_id = %admin.id))]
pub async fn update_order_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<Order>> {
    let status = req
        .status
        .parse::<OrderStatus>()
        .map_err(AppError::BadRequest)?;
    Ok(Json(state.orders().update_status(id, status).await?))
}

/// Record a payment settled outside the gateway redirect.
///
/// PUT /admin/orders/{id}/payment
#[instrument(skip(state, admin, req), fields(admin_id = %admin.id))]
pub async fn update_payment_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(req): Json<UpdatePaymentRequest>,
) -> Result<Json<Order>> {
    let order = state
        .orders()
        .update_payment_status(id, req.status, req.transaction_id.as_deref())
        .await?;
    Ok(Json(order))
}

// =============================================================================
// Users
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: Role,
}

/// GET /admin/users
pub async fn list_users(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<User>>> {
    Ok(Json(state.profiles().list_users().await?))
}

/// PUT /admin/users/{id}/role
#[instrument(skip(state, admin, req), fields(admin_id = %admin.id))]
pub async fn set_role(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<UserId>,
    Json(req): Json<SetRoleRequest>,
) -> Result<Json<User>> {
    Ok(Json(state.profiles().set_role(id, req.role).await?))
}
