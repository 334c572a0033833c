//! Order route handlers for shoppers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use solestore_core::{Order, OrderId, OrderStatus, PaymentMethod, TimelineStep};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{ClientIp, RequireAuth};
use crate::models::CurrentUser;
use crate::routes::live::snapshot_stream;
use crate::services::events::ChangeEvent;
use crate::services::orders::Viewer;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub shipping_address: String,
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

/// Tracking view of one order.
#[derive(Debug, Serialize)]
pub struct TrackingResponse {
    pub order_id: OrderId,
    pub tracking_number: String,
    pub status: OrderStatus,
    pub steps: Vec<TimelineStep>,
}

#[derive(Debug, Serialize)]
pub struct PaymentUrlResponse {
    pub payment_url: String,
}

pub(crate) const fn viewer(user: &CurrentUser) -> Viewer {
    Viewer {
        user_id: user.id,
        is_admin: user.role.is_admin(),
    }
}

/// Check out the caller's cart.
///
/// POST /orders
#[instrument(skip(state, user, req), fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(req): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse> {
    let order = state
        .orders()
        .create_order(user.id, &req.shipping_address, req.payment_method)
        .await?;

    let order_id = order.id.to_string();
    add_breadcrumb("checkout", "Order placed", Some(&[("order_id", &order_id)]));

    Ok((StatusCode::CREATED, Json(order)))
}

/// The caller's orders, newest first.
///
/// GET /orders
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(state.orders().user_orders(user.id).await?))
}

/// GET /orders/{id}
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    Ok(Json(state.orders().get(id, viewer(&user)).await?))
}

/// GET /orders/{id}/tracking
pub async fn tracking(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<TrackingResponse>> {
    let order = state.orders().get(id, viewer(&user)).await?;
    Ok(Json(TrackingResponse {
        order_id: order.id,
        steps: order.timeline(),
        tracking_number: order.tracking_number,
        status: order.status,
    }))
}

/// Live version of [`show`].
///
/// GET /orders/{id}/stream
pub async fn stream(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<impl IntoResponse> {
    let viewer = viewer(&user);
    // Refuse up front rather than streaming errors.
    state.orders().get(id, viewer).await?;

    Ok(snapshot_stream(
        state,
        move |event| *event == ChangeEvent::OrderChanged(id),
        move |state| async move { Ok::<_, AppError>(state.orders().get(id, viewer).await?) },
    ))
}

/// Signed VNPay checkout URL for an unpaid VNPay order.
///
/// POST /orders/{id}/payment
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn start_payment(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ClientIp(ip): ClientIp,
    Path(id): Path<OrderId>,
) -> Result<Json<PaymentUrlResponse>> {
    let payment_url = state
        .orders()
        .start_vnpay_payment(id, viewer(&user), &ip.to_string())
        .await?;
    Ok(Json(PaymentUrlResponse { payment_url }))
}
