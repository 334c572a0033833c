//! SoleStore CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! solestore-cli migrate
//!
//! # Insert the demo catalog, or products from a JSON file
//! solestore-cli seed
//! solestore-cli seed --file products.json
//!
//! # Grant or revoke admin access
//! solestore-cli admin promote -e owner@example.com
//! solestore-cli admin demote -e owner@example.com
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use solestore_core::Role;

mod commands;

#[derive(Parser)]
#[command(name = "solestore-cli")]
#[command(author, version, about = "SoleStore CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the product catalog
    Seed {
        /// JSON file with an array of products (defaults to a demo catalog)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Manage admin users
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Give an existing account the admin role
    Promote {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
    /// Return an admin account to the user role
    Demote {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { file } => commands::seed::run(file.as_deref()).await?,
        Commands::Admin { action } => match action {
            AdminAction::Promote { email } => commands::admin::set_role(&email, Role::Admin).await?,
            AdminAction::Demote { email } => commands::admin::set_role(&email, Role::User).await?,
        },
    }
    Ok(())
}
