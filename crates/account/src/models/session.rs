//! Identity kept in the customer's session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use account_settings_core::{Email, UserId};

use super::Account;

/// The logged-in customer as remembered between requests.
///
/// Only the id is authoritative. The email is a snapshot from login and goes
/// stale when the account email changes, which is why that change ends the
/// session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: Email,
    pub logged_in_at: DateTime<Utc>,
}

impl CurrentUser {
    /// Session key the identity is stored under.
    pub const SESSION_KEY: &'static str = "account.current_user";

    #[must_use]
    pub fn from_account(account: &Account) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            logged_in_at: Utc::now(),
        }
    }
}
