//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! solestore-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `SOLESTORE_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//!
//! # Migration Files
//!
//! Schema migrations live in `crates/api/migrations/`. The session table is
//! created by the session store's own migration, run afterwards.

use tower_sessions_sqlx_store::PostgresStore;

use super::{CliError, connect};

/// Run the API schema migrations, then the session store migration.
///
/// # Errors
///
/// Returns `CliError` if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CliError> {
    let pool = connect().await?;

    tracing::info!("Running schema migrations...");
    sqlx::migrate!("../api/migrations").run(&pool).await?;

    tracing::info!("Running session store migration...");
    PostgresStore::new(pool.clone()).migrate().await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
