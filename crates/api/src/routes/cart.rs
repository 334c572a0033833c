//! Cart route handlers.
//!
//! Every cart belongs to the signed-in user; guests get `401`.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::instrument;

use solestore_core::{CartItemId, ProductId};

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::routes::live::snapshot_stream;
use crate::services::cart::CartSummary;
use crate::services::events::ChangeEvent;
use crate::state::AppState;

const fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    pub size: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    /// Zero or less removes the line.
    pub quantity: i64,
}

/// Cart lines, total and item count.
///
/// GET /cart
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<CartSummary>> {
    Ok(Json(state.cart().summary(user.id).await?))
}

/// Live version of [`show`].
///
/// GET /cart/stream
pub async fn stream(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> impl IntoResponse {
    let user_id = user.id;
    snapshot_stream(
        state,
        move |event| *event == ChangeEvent::CartChanged(user_id),
        move |state| async move { Ok::<_, AppError>(state.cart().summary(user_id).await?) },
    )
}

/// Add a product in one size, merging with an existing line.
///
/// POST /cart
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(req): Json<AddToCartRequest>,
) -> Result<impl IntoResponse> {
    let item = state
        .cart()
        .add(user.id, req.product_id, req.quantity, &req.size)
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// PATCH /cart/{item_id}
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(item_id): Path<CartItemId>,
    Json(req): Json<UpdateQuantityRequest>,
) -> Result<Json<CartSummary>> {
    let cart = state.cart();
    cart.update_quantity(user.id, item_id, req.quantity).await?;
    Ok(Json(cart.summary(user.id).await?))
}

/// DELETE /cart/{item_id}
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(item_id): Path<CartItemId>,
) -> Result<StatusCode> {
    state.cart().remove(user.id, item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /cart
pub async fn clear(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<StatusCode> {
    state.cart().clear(user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
