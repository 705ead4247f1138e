//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! account-settings-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `ACCOUNT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! `crates/account/migrations/`, embedded at build time:
//! ```
//! migrations/
//! ├── 20260301000001_create_accounts.sql
//! ├── 20260301000002_create_settings.sql
//! ├── 20260301000003_create_addresses.sql
//! └── 20260301000004_create_orders.sql
//! ```

use account_settings::db::create_pool;

use super::{MissingDatabaseUrl, database_url};

/// Errors that can occur while migrating.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error(transparent)]
    MissingEnvVar(#[from] MissingDatabaseUrl),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run the account settings migrations.
///
/// # Errors
///
/// Returns `MigrationError` if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), MigrationError> {
    let url = database_url()?;

    tracing::info!("Connecting to account database...");
    let pool = create_pool(&url).await?;

    tracing::info!("Running account settings migrations...");
    sqlx::migrate!("../account/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
