//! Account settings CLI - database migrations and user management.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! account-settings-cli migrate
//!
//! # Create a customer account (password read from stdin)
//! echo "$PASSWORD" | account-settings-cli user create -e kunde@example.com -n "Erika Mustermann"
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "account-settings-cli")]
#[command(author, version, about = "Account settings CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage customer accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new customer account. The password is read from stdin.
    Create {
        /// Login email address
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        name: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Command failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::User {
            action: UserAction::Create { email, name },
        } => {
            let password = commands::user::read_password()?;
            commands::user::create(&email, &name, &password).await?;
        }
    }
    Ok(())
}
