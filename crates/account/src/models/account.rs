//! Account domain type.

use chrono::{DateTime, Utc};
use serde::Serialize;

use account_settings_core::{Email, UserId};

/// A customer account as held by the account directory.
///
/// The password hash never leaves the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    /// Unique account ID.
    pub id: UserId,
    /// Login email address.
    pub email: Email,
    /// Name shown in greetings and order confirmations.
    pub display_name: String,
    /// Whether the login email has been verified.
    pub email_verified: bool,
    /// When the account was registered.
    pub created_at: DateTime<Utc>,
}
