//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Responses carry a JSON body of the form `{"error": "<message>"}`. Server
//! side details never reach the client.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::cart::CartError;
use crate::services::catalog::CatalogError;
use crate::services::identity::IdentityError;
use crate::services::media::MediaError;
use crate::services::orders::OrderError;
use crate::services::payment::PaymentError;
use crate::services::profile::ProfileError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User is authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

const INTERNAL: &str = "Internal server error";

impl AppError {
    /// Status code and client-facing message.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::Database(err) => repository(err),
            Self::Auth(err) => auth(err),
            Self::Catalog(err) => match err {
                CatalogError::NotFound | CatalogError::ReviewNotFound => {
                    (StatusCode::NOT_FOUND, err.to_string())
                }
                CatalogError::InvalidInput(_) | CatalogError::InvalidRating => {
                    (StatusCode::BAD_REQUEST, err.to_string())
                }
                CatalogError::AlreadyReviewed => (StatusCode::CONFLICT, err.to_string()),
                CatalogError::Media(e) => media(e),
                CatalogError::Repository(e) => repository(e),
            },
            Self::Cart(err) => match err {
                CartError::ProductNotFound | CartError::ItemNotFound => {
                    (StatusCode::NOT_FOUND, err.to_string())
                }
                CartError::InvalidSize(_) | CartError::InvalidQuantity => {
                    (StatusCode::BAD_REQUEST, err.to_string())
                }
                CartError::InsufficientStock { .. } => (StatusCode::CONFLICT, err.to_string()),
                CartError::Repository(e) => repository(e),
            },
            Self::Order(err) => match err {
                OrderError::NotFound => (StatusCode::NOT_FOUND, err.to_string()),
                OrderError::EmptyCart | OrderError::MissingAddress => {
                    (StatusCode::BAD_REQUEST, err.to_string())
                }
                OrderError::InsufficientStock(product) => (
                    StatusCode::CONFLICT,
                    format!("Insufficient stock for {product}"),
                ),
                OrderError::PaymentNotApplicable(_) => (StatusCode::CONFLICT, err.to_string()),
                OrderError::Payment(e) => payment(e),
                OrderError::Repository(e) => repository(e),
            },
            Self::Profile(err) => match err {
                ProfileError::NotFound => (StatusCode::NOT_FOUND, err.to_string()),
                ProfileError::InvalidInput(_) => (StatusCode::BAD_REQUEST, err.to_string()),
                ProfileError::Media(e) => media(e),
                ProfileError::Repository(e) => repository(e),
            },
            Self::Media(err) => media(err),
            Self::NotFound(what) => (StatusCode::NOT_FOUND, format!("Not found: {what}")),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests".to_string(),
            ),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string()),
        }
    }
}

fn repository(err: &RepositoryError) -> (StatusCode, String) {
    match err {
        RepositoryError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
        RepositoryError::Conflict(_) => (StatusCode::CONFLICT, "Already exists".to_string()),
        RepositoryError::InsufficientStock(product) => (
            StatusCode::CONFLICT,
            format!("Insufficient stock for {product}"),
        ),
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string())
        }
    }
}

fn auth(err: &AuthError) -> (StatusCode, String) {
    match err {
        AuthError::InvalidCredentials | AuthError::UserNotFound => {
            (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string())
        }
        AuthError::UserAlreadyExists => (
            StatusCode::CONFLICT,
            "An account with this email already exists".to_string(),
        ),
        AuthError::WeakPassword(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        AuthError::InvalidEmail(_) => (StatusCode::BAD_REQUEST, "Invalid email address".to_string()),
        AuthError::InvalidResetCode => (
            StatusCode::BAD_REQUEST,
            "Invalid or expired reset code".to_string(),
        ),
        AuthError::Identity(IdentityError::NotConfigured) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Google sign-in is not available".to_string(),
        ),
        AuthError::Identity(IdentityError::InvalidToken(_) | IdentityError::InvalidEmail(_)) => (
            StatusCode::UNAUTHORIZED,
            "Invalid identity token".to_string(),
        ),
        AuthError::Identity(IdentityError::Request(_)) | AuthError::Mail(_) => (
            StatusCode::BAD_GATEWAY,
            "External service error".to_string(),
        ),
        AuthError::Repository(e) => repository(e),
        AuthError::PasswordHash => (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string()),
    }
}

fn media(err: &MediaError) -> (StatusCode, String) {
    match err {
        MediaError::NotConfigured => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Image uploads are not available".to_string(),
        ),
        MediaError::InvalidUpload(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        MediaError::Rejected(_) | MediaError::Request(_) => (
            StatusCode::BAD_GATEWAY,
            "Image upload failed".to_string(),
        ),
    }
}

fn payment(err: &PaymentError) -> (StatusCode, String) {
    match err {
        PaymentError::NotConfigured => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Online payment is not available".to_string(),
        ),
        PaymentError::InvalidAmount
        | PaymentError::MissingParameter(_)
        | PaymentError::InvalidSignature => (StatusCode::BAD_REQUEST, err.to_string()),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "Order placed", Some(&[("order_id", "…")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use http_body_util::BodyExt;

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    async fn body_json(err: AppError) -> serde_json::Value {
        let bytes = err.into_response().into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(AuthError::UserAlreadyExists.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(OrderError::EmptyCart.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(MediaError::NotConfigured.into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn test_body_is_json_error() {
        let body = body_json(OrderError::InsufficientStock("Air Max 90".to_string()).into()).await;
        assert_eq!(body["error"], "Insufficient stock for Air Max 90");
    }

    #[tokio::test]
    async fn test_internal_details_do_not_leak() {
        let body = body_json(AppError::Internal("pool exhausted at 10.0.0.3".to_string())).await;
        assert_eq!(body["error"], "Internal server error");

        let body = body_json(
            RepositoryError::DataCorruption("bad email in row 7".to_string()).into(),
        )
        .await;
        assert_eq!(body["error"], "Internal server error");
    }
}
