//! Settings error types.

use thiserror::Error;

use account_settings_core::payment::PaymentValidationError;

use crate::db::RepositoryError;
use crate::services::email::DeliveryError;
use crate::services::tokenizer::TokenizerError;

/// Errors that can occur during settings operations.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// No authenticated caller, or the caller's account no longer exists.
    #[error("authentication required")]
    AuthRequired,

    /// The referenced record does not exist for this user.
    #[error("not found")]
    NotFound,

    /// A submitted field failed validation.
    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// The email address belongs to another account.
    #[error("email address already in use")]
    EmailInUse,

    /// Password re-verification failed.
    #[error("invalid password")]
    InvalidPassword,

    /// The account still has orders in progress.
    #[error("account has open orders")]
    OpenOrders,

    /// The payment method type is not supported.
    #[error("unsupported payment method: {0}")]
    UnsupportedInstrument(String),

    /// Persistence failure.
    #[error("persistence error: {0}")]
    Persistence(#[source] RepositoryError),

    /// Message delivery failure.
    #[error("delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// The payment processor refused or could not be reached.
    #[error("payment processor error: {0}")]
    PaymentProcessor(#[from] TokenizerError),
}

impl SettingsError {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}

impl From<RepositoryError> for SettingsError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound,
            other => Self::Persistence(other),
        }
    }
}

impl From<PaymentValidationError> for SettingsError {
    fn from(err: PaymentValidationError) -> Self {
        match err {
            PaymentValidationError::Field { field, message } => Self::validation(field, message),
            PaymentValidationError::Unsupported(kind) => Self::UnsupportedInstrument(kind),
        }
    }
}
