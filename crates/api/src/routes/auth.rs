//! Authentication route handlers.
//!
//! Email/password accounts, Google sign-in and password reset codes. A
//! successful sign-in stores a [`CurrentUser`] in the session cookie.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_sessions::Session;
use tracing::instrument;

use solestore_core::{Role, User};

use crate::error::{AppError, Result, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::middleware::{OptionalAuth, clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::services::auth::AuthError;
use crate::state::AppState;

// =============================================================================
// Request / Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct GoogleSignInRequest {
    pub id_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyCodeRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub code: String,
    pub new_password: String,
}

/// The signed-in user and their role.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub role: Role,
}

// =============================================================================
// Session Helpers
// =============================================================================

async fn start_session(session: &Session, user: User, method: &str) -> Result<AuthResponse> {
    let current = CurrentUser::from(&user);
    set_current_user(session, &current).await.map_err(|e| {
        tracing::error!(error = %e, "failed to set session");
        AppError::Internal("session write failed".to_string())
    })?;

    set_sentry_user(&user.id, Some(user.email.as_str()));
    add_breadcrumb("auth", "Signed in", Some(&[("method", method)]));
    tracing::info!(user_id = %user.id, method, "user signed in");

    Ok(AuthResponse {
        role: user.role,
        user,
    })
}

// =============================================================================
// Handlers
// =============================================================================

/// Create an account and sign it in.
///
/// POST /auth/register
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<CredentialsRequest>,
) -> Result<impl IntoResponse> {
    let user = state.auth().register(&req.email, &req.password).await?;
    let body = start_session(&session, user, "password").await?;
    Ok((StatusCode::CREATED, Json(body)))
}

/// POST /auth/login
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<AuthResponse>> {
    let user = state.auth().login(&req.email, &req.password).await?;
    Ok(Json(start_session(&session, user, "password").await?))
}

/// Exchange a Google ID token for a session, creating the account on first
/// sign-in.
///
/// POST /auth/google
#[instrument(skip_all)]
pub async fn google(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<GoogleSignInRequest>,
) -> Result<Json<AuthResponse>> {
    let user = state.auth().sign_in_with_google(&req.id_token).await?;
    Ok(Json(start_session(&session, user, "google").await?))
}

/// POST /auth/logout
pub async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_user(&session).await.map_err(|e| {
        tracing::error!(error = %e, "failed to clear session");
        AppError::Internal("session flush failed".to_string())
    })?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// Role of the caller; `user` when signed out.
///
/// GET /auth/role
pub async fn role(
    State(state): State<AppState>,
    OptionalAuth(current): OptionalAuth,
) -> Result<Json<serde_json::Value>> {
    let role = match current {
        Some(current) => match state.auth().get_user(current.id).await {
            Ok(user) => user.role,
            Err(AuthError::UserNotFound) => Role::User,
            Err(e) => return Err(e.into()),
        },
        None => Role::User,
    };
    Ok(Json(json!({ "role": role })))
}

/// Mail a reset code. Answers the same whether or not the account exists.
///
/// POST /auth/password/forgot
#[instrument(skip_all)]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<impl IntoResponse> {
    state.auth().send_reset_code(&req.email).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "message": "If an account exists, a reset code has been sent" })),
    ))
}

/// POST /auth/password/verify
pub async fn verify_reset_code(
    State(state): State<AppState>,
    Json(req): Json<VerifyCodeRequest>,
) -> Result<Json<serde_json::Value>> {
    let email = state.auth().verify_reset_code(&req.code).await?;
    Ok(Json(json!({ "email": email })))
}

/// POST /auth/password/reset
#[instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<StatusCode> {
    state
        .auth()
        .confirm_reset(&req.code, &req.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
