//! User role management commands.
//!
//! # Usage
//!
//! ```bash
//! # Give an existing account access to the admin endpoints
//! solestore-cli admin promote -e owner@example.com
//!
//! # Take it away again
//! solestore-cli admin demote -e owner@example.com
//! ```
//!
//! The account must already exist; sign up through the app first.

use solestore_api::db::UserStore;
use solestore_api::db::postgres::PgUserStore;
use solestore_core::{Email, Role};

use super::{CliError, connect};

/// Set the role of the account registered under `email`.
///
/// # Errors
///
/// Returns `CliError::InvalidEmail` for malformed addresses and
/// `CliError::UserNotFound` if no account uses the address.
pub async fn set_role(email: &str, role: Role) -> Result<(), CliError> {
    let email = Email::parse(email).map_err(|_| CliError::InvalidEmail(email.to_owned()))?;

    let pool = connect().await?;
    let users = PgUserStore::new(pool);

    let user = users
        .get_by_email(&email)
        .await?
        .ok_or_else(|| CliError::UserNotFound(email.to_string()))?;

    if user.role == role {
        tracing::info!("{} already has role {}", email, role);
        return Ok(());
    }

    users.set_role(user.id, role).await?;
    tracing::info!("{} is now {} (id {})", email, role, user.id);
    Ok(())
}
