//! Sign-in, registration and password reset failures.

use thiserror::Error;

use solestore_core::EmailError;

use crate::db::RepositoryError;
use crate::services::email::MailError;
use crate::services::identity::IdentityError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Wrong password or unknown email. The two are deliberately
    /// indistinguishable to callers.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("user not found")]
    UserNotFound,

    #[error("an account with this email already exists")]
    UserAlreadyExists,

    #[error("{0}")]
    WeakPassword(String),

    /// Unknown, consumed or expired.
    #[error("invalid or expired reset code")]
    InvalidResetCode,

    #[error("identity provider: {0}")]
    Identity(#[from] IdentityError),

    #[error("reset mail: {0}")]
    Mail(#[from] MailError),

    #[error("store: {0}")]
    Repository(#[from] RepositoryError),

    #[error("password hashing failed")]
    PasswordHash,
}
