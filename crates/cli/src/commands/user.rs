//! Customer account management commands.
//!
//! # Usage
//!
//! ```bash
//! echo "$PASSWORD" | account-settings-cli user create -e kunde@example.com -n "Erika Mustermann"
//! ```
//!
//! # Environment Variables
//!
//! - `ACCOUNT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)

use std::io::BufRead;
use std::sync::Arc;

use secrecy::SecretString;

use account_settings::db::{PgAccountDirectory, create_pool};
use account_settings::services::{AuthError, AuthService};

use super::{MissingDatabaseUrl, database_url};

/// Errors that can occur during user operations.
#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error(transparent)]
    MissingEnvVar(#[from] MissingDatabaseUrl),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Could not read password from stdin: {0}")]
    Stdin(#[from] std::io::Error),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Read the password from the first line of stdin.
///
/// # Errors
///
/// Returns `UserError::Stdin` if stdin cannot be read.
pub fn read_password() -> Result<SecretString, UserError> {
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(SecretString::from(line.trim_end_matches(['\r', '\n']).to_owned()))
}

/// Create a customer account with default billing and shipping records.
///
/// # Errors
///
/// Returns `UserError::Auth` for an invalid email, weak password or an
/// existing account.
pub async fn create(email: &str, name: &str, password: &SecretString) -> Result<(), UserError> {
    let url = database_url()?;

    tracing::info!("Connecting to account database...");
    let pool = create_pool(&url).await?;
    let auth = AuthService::new(Arc::new(PgAccountDirectory::new(pool)));

    let account = auth.register(email, name, password).await?;

    tracing::info!(
        "Account created successfully! ID: {}, Email: {}",
        account.id,
        account.email
    );
    Ok(())
}
