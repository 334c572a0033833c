//! Payment gateway callbacks.

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Serialize;

use solestore_core::Order;

use crate::error::Result;
use crate::services::payment::PaymentResult;
use crate::state::AppState;

/// Outcome of a VNPay redirect.
#[derive(Debug, Serialize)]
pub struct PaymentReturnResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_no: Option<String>,
    pub order: Order,
}

/// VNPay sends the shopper back here after paying.
///
/// The query is verified against its `vnp_SecureHash`; forged or tampered
/// parameters are rejected with `400` and change nothing.
///
/// GET /payments/vnpay/return
pub async fn vnpay_return(
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Json<PaymentReturnResponse>> {
    let (order, result) = state.orders().handle_vnpay_return(&params).await?;

    let response = match result {
        PaymentResult::Success { transaction_no } => PaymentReturnResponse {
            success: true,
            message: "Payment successful".to_string(),
            transaction_no: Some(transaction_no),
            order,
        },
        PaymentResult::Failed { message } => PaymentReturnResponse {
            success: false,
            message,
            transaction_no: None,
            order,
        },
    };
    Ok(Json(response))
}
