//! Account directory: login identities and their password hashes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use account_settings_core::{Email, UserId};

use super::RepositoryError;
use crate::models::Account;

/// Lookup and maintenance of customer accounts.
///
/// Password hashes are produced and checked by the auth service; the
/// directory only stores them.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn find(&self, id: UserId) -> Result<Option<Account>, RepositoryError>;

    /// Case-insensitive lookup by login email.
    async fn find_by_email(&self, email: &Email) -> Result<Option<Account>, RepositoryError>;

    async fn password_hash(&self, id: UserId) -> Result<Option<String>, RepositoryError>;

    /// Whether `email` belongs to an account other than `except`.
    async fn email_taken(&self, email: &Email, except: UserId) -> Result<bool, RepositoryError>;

    /// Change the login email and reset its verified state.
    ///
    /// Returns `RepositoryError::Conflict` if another account holds the address.
    async fn update_email(&self, id: UserId, email: &Email) -> Result<Account, RepositoryError>;

    /// Returns `RepositoryError::Conflict` if the email already exists.
    async fn create(
        &self,
        email: &Email,
        display_name: &str,
        password_hash: &str,
    ) -> Result<Account, RepositoryError>;

    /// Returns `RepositoryError::NotFound` if there is no such account.
    async fn delete(&self, id: UserId) -> Result<(), RepositoryError>;
}

/// Account directory backed by `account.user`.
#[derive(Clone)]
pub struct PgAccountDirectory {
    pool: PgPool,
}

impl PgAccountDirectory {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: UserId,
    email: String,
    display_name: String,
    email_verified: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = RepositoryError;

    fn try_from(r: AccountRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&r.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        Ok(Self {
            id: r.id,
            email,
            display_name: r.display_name,
            email_verified: r.email_verified,
            created_at: r.created_at,
        })
    }
}

fn map_unique_violation(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict("email already exists".to_owned());
    }
    RepositoryError::Database(e)
}

#[async_trait]
impl AccountDirectory for PgAccountDirectory {
    async fn find(&self, id: UserId) -> Result<Option<Account>, RepositoryError> {
        sqlx::query_as::<_, AccountRow>(
            r"
            SELECT id, email, display_name, email_verified, created_at
            FROM account.user
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Account::try_from)
        .transpose()
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<Account>, RepositoryError> {
        sqlx::query_as::<_, AccountRow>(
            r"
            SELECT id, email, display_name, email_verified, created_at
            FROM account.user
            WHERE lower(email) = lower($1)
            ",
        )
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?
        .map(Account::try_from)
        .transpose()
    }

    async fn password_hash(&self, id: UserId) -> Result<Option<String>, RepositoryError> {
        let hash = sqlx::query_scalar::<_, String>(
            "SELECT password_hash FROM account.user WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(hash)
    }

    async fn email_taken(&self, email: &Email, except: UserId) -> Result<bool, RepositoryError> {
        let taken = sqlx::query_scalar::<_, bool>(
            r"
            SELECT EXISTS (
                SELECT 1 FROM account.user WHERE lower(email) = lower($1) AND id <> $2
            )
            ",
        )
        .bind(email.as_str())
        .bind(except)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    async fn update_email(&self, id: UserId, email: &Email) -> Result<Account, RepositoryError> {
        sqlx::query_as::<_, AccountRow>(
            r"
            UPDATE account.user
            SET email = $2, email_verified = FALSE, updated_at = now()
            WHERE id = $1
            RETURNING id, email, display_name, email_verified, created_at
            ",
        )
        .bind(id)
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_unique_violation)?
        .ok_or(RepositoryError::NotFound)
        .and_then(Account::try_from)
    }

    async fn create(
        &self,
        email: &Email,
        display_name: &str,
        password_hash: &str,
    ) -> Result<Account, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, AccountRow>(
            r"
            INSERT INTO account.user (email, display_name, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, email, display_name, email_verified, created_at
            ",
        )
        .bind(email.as_str())
        .bind(display_name)
        .bind(password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_unique_violation)?;

        // New accounts start with the default country on both addresses.
        sqlx::query("INSERT INTO account.billing_address (user_id) VALUES ($1)")
            .bind(row.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO account.shipping_address (user_id) VALUES ($1)")
            .bind(row.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Account::try_from(row)
    }

    async fn delete(&self, id: UserId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM account.user WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
