//! Product catalog route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use solestore_core::{Product, ProductFilter, ProductId};

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::routes::live::snapshot_stream;
use crate::services::events::ChangeEvent;
use crate::state::AppState;

/// A star rating with an optional comment.
#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub rating: f32,
    #[serde(default)]
    pub comment: String,
}

/// Products matching the query, ordered by name.
///
/// GET /products?search=&brand=&min_price=&max_price=
pub async fn index(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<Vec<Product>>> {
    Ok(Json(state.catalog().list(&filter).await?))
}

/// Live version of [`index`].
///
/// GET /products/stream
pub async fn stream(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> impl IntoResponse {
    snapshot_stream(
        state,
        |event| matches!(event, ChangeEvent::ProductsChanged),
        move |state| {
            let filter = filter.clone();
            async move { Ok::<_, AppError>(state.catalog().list(&filter).await?) }
        },
    )
}

/// GET /products/{id}
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    Ok(Json(state.catalog().get(id).await?))
}

/// Review a product. One review per user.
///
/// POST /products/{id}/reviews
pub async fn add_review(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<ProductId>,
    Json(req): Json<ReviewRequest>,
) -> Result<impl IntoResponse> {
    let product = state
        .catalog()
        .add_review(id, user.id, req.rating, &req.comment)
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// Edit the caller's review.
///
/// PUT /products/{id}/reviews
pub async fn update_review(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<ProductId>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<Product>> {
    let product = state
        .catalog()
        .update_review(id, user.id, req.rating, &req.comment)
        .await?;
    Ok(Json(product))
}
