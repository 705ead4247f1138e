//! Persistence for account settings.
//!
//! # Database
//!
//! ## Tables
//!
//! - `account.user` - Customer accounts (owned by [`AccountDirectory`])
//! - `account.personal_data`, `account.notification_settings`,
//!   `account.privacy_settings` - One row per user
//! - `account.payment_methods` - Tokenized payment methods, at most one default
//! - `account.billing_address`, `account.shipping_address` - One row per user
//! - `account.additional_address` - Labelled extra shipping addresses
//! - `account.default_shipping_address` - Weak reference to the default extra address
//! - `account.billing_email_verification` - Pending alternate billing email reject tokens
//! - `shop.orders`, `shop.order_items` - Read-only order history ([`OrderLookup`])
//! - `tower_sessions.session` - Session storage
//!
//! # Migrations
//!
//! Migrations are stored in `crates/account/migrations/` and run via:
//! ```bash
//! cargo run -p account-settings-cli -- migrate
//! ```
//!
//! Every record is keyed by user. Multi-step changes (clear-then-set of a
//! default, the cascading purge) happen inside one transaction per call.

pub mod accounts;
pub mod memory;
pub mod orders;
pub mod settings;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use account_settings_core::selection::{NotInCollection, RemovePlan};
use account_settings_core::{
    BillingAddress, NewPaymentMethod, NewShippingAddress, NotificationSettings, PaymentMethod,
    PaymentMethodId, PersonalData, PersonalDataChanges, PrimaryShippingAddress, PrivacySettings,
    ShippingAddress, ShippingAddressBook, ShippingAddressFields, ShippingAddressId, UserId,
};

use crate::models::{BillingEmailChange, BillingEmailVerification};

pub use accounts::{AccountDirectory, PgAccountDirectory};
pub use memory::{MemoryAccountDirectory, MemoryOrderLookup, MemorySettingsStore};
pub use orders::{OrderLookup, PgOrderLookup};
pub use settings::PgSettingsStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl From<NotInCollection> for RepositoryError {
    fn from(_: NotInCollection) -> Self {
        Self::NotFound
    }
}

/// Per-user settings records.
///
/// Every method is scoped to one user; ids belonging to another user behave
/// exactly like ids that do not exist.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn personal_data(&self, user_id: UserId) -> Result<Option<PersonalData>, RepositoryError>;

    /// Upsert personal data.
    ///
    /// Submitted names are mirrored into the billing and primary shipping
    /// addresses, a submitted phone into the billing address.
    async fn save_personal_data(
        &self,
        user_id: UserId,
        changes: PersonalDataChanges,
    ) -> Result<PersonalData, RepositoryError>;

    async fn billing_address(&self, user_id: UserId)
    -> Result<Option<BillingAddress>, RepositoryError>;

    /// Upsert the billing address and apply the pending verification change in
    /// the same transaction.
    async fn save_billing_address(
        &self,
        user_id: UserId,
        billing: &BillingAddress,
        email_change: BillingEmailChange,
    ) -> Result<(), RepositoryError>;

    async fn pending_billing_email(
        &self,
        user_id: UserId,
    ) -> Result<Option<BillingEmailVerification>, RepositoryError>;

    /// Consume a reject token.
    ///
    /// When `token` matches the stored one, the verification is deleted and
    /// the alternate billing email removed. Returns the consumed verification,
    /// or `None` (with nothing changed) when there is no match.
    async fn reject_billing_email(
        &self,
        user_id: UserId,
        token: &str,
    ) -> Result<Option<BillingEmailVerification>, RepositoryError>;

    async fn shipping_address(
        &self,
        user_id: UserId,
    ) -> Result<Option<PrimaryShippingAddress>, RepositoryError>;

    async fn save_shipping_address(
        &self,
        user_id: UserId,
        shipping: &PrimaryShippingAddress,
    ) -> Result<(), RepositoryError>;

    async fn shipping_address_book(
        &self,
        user_id: UserId,
    ) -> Result<ShippingAddressBook, RepositoryError>;

    /// Insert an additional address, making it the default when requested.
    async fn add_additional_address(
        &self,
        user_id: UserId,
        address: NewShippingAddress,
        requested_default: bool,
    ) -> Result<ShippingAddress, RepositoryError>;

    /// Returns `RepositoryError::NotFound` if the address is not the user's.
    async fn update_additional_address(
        &self,
        user_id: UserId,
        id: ShippingAddressId,
        fields: ShippingAddressFields,
    ) -> Result<ShippingAddress, RepositoryError>;

    /// Returns `RepositoryError::NotFound` if the address is not the user's.
    async fn remove_additional_address(
        &self,
        user_id: UserId,
        id: ShippingAddressId,
    ) -> Result<RemovePlan<ShippingAddressId>, RepositoryError>;

    /// Returns `RepositoryError::NotFound` if the address is not the user's.
    async fn set_default_additional_address(
        &self,
        user_id: UserId,
        id: ShippingAddressId,
    ) -> Result<(), RepositoryError>;

    /// Payment methods ordered by creation.
    async fn payment_methods(&self, user_id: UserId) -> Result<Vec<PaymentMethod>, RepositoryError>;

    /// Insert a payment method. The first method of a user always becomes the default.
    async fn add_payment_method(
        &self,
        user_id: UserId,
        method: NewPaymentMethod,
        requested_default: bool,
    ) -> Result<PaymentMethod, RepositoryError>;

    /// Returns `RepositoryError::NotFound` if the method is not the user's.
    async fn set_default_payment_method(
        &self,
        user_id: UserId,
        id: PaymentMethodId,
    ) -> Result<(), RepositoryError>;

    /// Delete a payment method, promoting the most recent remaining one if it
    /// was the default.
    ///
    /// Returns `RepositoryError::NotFound` if the method is not the user's.
    async fn remove_payment_method(
        &self,
        user_id: UserId,
        id: PaymentMethodId,
    ) -> Result<RemovePlan<PaymentMethodId>, RepositoryError>;

    async fn notification_settings(
        &self,
        user_id: UserId,
    ) -> Result<Option<NotificationSettings>, RepositoryError>;

    async fn save_notification_settings(
        &self,
        user_id: UserId,
        settings: NotificationSettings,
    ) -> Result<(), RepositoryError>;

    async fn privacy_settings(
        &self,
        user_id: UserId,
    ) -> Result<Option<PrivacySettings>, RepositoryError>;

    async fn save_privacy_settings(
        &self,
        user_id: UserId,
        settings: PrivacySettings,
    ) -> Result<(), RepositoryError>;

    /// Remove every per-user row in one transaction.
    async fn delete_user_data(&self, user_id: UserId) -> Result<(), RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
