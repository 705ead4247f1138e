//! CLI subcommands.

pub mod migrate;
pub mod user;

use secrecy::SecretString;

/// Error for a missing database URL.
#[derive(Debug, thiserror::Error)]
#[error("Missing environment variable: ACCOUNT_DATABASE_URL (or DATABASE_URL)")]
pub struct MissingDatabaseUrl;

/// Database URL from `ACCOUNT_DATABASE_URL`, falling back to `DATABASE_URL`.
fn database_url() -> Result<SecretString, MissingDatabaseUrl> {
    dotenvy::dotenv().ok();

    std::env::var("ACCOUNT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| MissingDatabaseUrl)
}
