//! Authentication service.
//!
//! Password login and registration over the [`AccountDirectory`], plus
//! password re-verification for sensitive operations.

mod error;

pub use error::AuthError;

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use secrecy::{ExposeSecret, SecretString};

use account_settings_core::{Email, UserId};

use crate::db::{AccountDirectory, RepositoryError};
use crate::models::Account;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Authentication service.
#[derive(Clone)]
pub struct AuthService {
    accounts: Arc<dyn AccountDirectory>,
}

impl AuthService {
    /// Create a new authentication service.
    #[must_use]
    pub fn new(accounts: Arc<dyn AccountDirectory>) -> Self {
        Self { accounts }
    }

    /// Register a new account with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::PasswordTooShort` for passwords under 8 characters.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(
        &self,
        email: &str,
        display_name: &str,
        password: &SecretString,
    ) -> Result<Account, AuthError> {
        let email = Email::parse(email)?;
        validate_password(password.expose_secret())?;
        let password_hash = hash_password(password.expose_secret())?;

        self.accounts
            .create(&email, display_name.trim(), &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<Account, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let account = self
            .accounts
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        self.verify(account.id, password).await?;

        Ok(account)
    }

    /// Check a password against the account's stored hash.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` on mismatch or unknown account.
    pub async fn verify(&self, user_id: UserId, password: &SecretString) -> Result<(), AuthError> {
        let hash = self
            .accounts
            .password_hash(user_id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        verify_password(password.expose_secret(), &hash)
    }
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::PasswordTooShort {
            min: MIN_PASSWORD_LENGTH,
        });
    }
    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::MemoryAccountDirectory;

    fn service() -> AuthService {
        AuthService::new(Arc::new(MemoryAccountDirectory::new()))
    }

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_owned())
    }

    #[test]
    fn test_hash_roundtrip() {
        let hash = hash_password("korrekt-pferd").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("korrekt-pferd", &hash).is_ok());
        assert!(matches!(
            verify_password("falsch", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let auth = service();
        let account = auth
            .register("kunde@shop.de", "Kunde", &secret("korrekt-pferd"))
            .await
            .unwrap();

        let logged_in = auth.login("KUNDE@shop.de", &secret("korrekt-pferd")).await.unwrap();
        assert_eq!(logged_in.id, account.id);

        assert!(matches!(
            auth.login("kunde@shop.de", &secret("wrong-password")).await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_register_rejects_short_password_and_duplicates() {
        let auth = service();
        assert!(matches!(
            auth.register("kunde@shop.de", "Kunde", &secret("kurz")).await,
            Err(AuthError::PasswordTooShort { min: 8 })
        ));

        auth.register("kunde@shop.de", "Kunde", &secret("korrekt-pferd"))
            .await
            .unwrap();
        assert!(matches!(
            auth.register("kunde@shop.de", "Kunde", &secret("korrekt-pferd")).await,
            Err(AuthError::UserAlreadyExists)
        ));
    }
}
