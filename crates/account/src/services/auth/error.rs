//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors from registration, login and password re-verification.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] account_settings_core::EmailError),

    /// Wrong password, unknown email or unreadable stored hash. Callers
    /// cannot tell these apart.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("an account with this email already exists")]
    UserAlreadyExists,

    #[error("password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("account directory error: {0}")]
    Repository(#[from] RepositoryError),

    /// Argon2 failed to produce a hash.
    #[error("password hashing failed")]
    PasswordHash,
}
