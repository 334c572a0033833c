//! Payment gateway integration.
//!
//! Only VNPay is supported. The gateway is redirect based: we sign a
//! payment URL, the shopper pays on VNPay's page, and VNPay redirects back
//! with signed result parameters.

pub mod vnpay;

use thiserror::Error;

pub use vnpay::{PaymentReturn, VnpayGateway};

/// Outcome of a payment attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentResult {
    /// The gateway captured the payment.
    Success { transaction_no: String },
    /// The payment did not go through.
    Failed { message: String },
}

impl PaymentResult {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Errors from payment URL construction or return verification.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The gateway is not configured.
    #[error("payment gateway not configured")]
    NotConfigured,

    /// The amount cannot be charged.
    #[error("invalid payment amount")]
    InvalidAmount,

    /// A required return parameter is absent.
    #[error("missing payment parameter: {0}")]
    MissingParameter(&'static str),

    /// The return parameters were not signed by the gateway.
    #[error("invalid payment signature")]
    InvalidSignature,
}
