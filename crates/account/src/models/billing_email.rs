//! Pending alternate billing email designations.

use chrono::{DateTime, Utc};

use account_settings_core::{Email, UserId};

/// A reject token issued when an alternate billing email is installed.
///
/// At most one exists per user; a newer designation replaces it and a
/// rejection consumes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingEmailVerification {
    pub user_id: UserId,
    pub pending_alt_email: Email,
    pub token: String,
    pub created_at: DateTime<Utc>,
}

impl BillingEmailVerification {
    /// Compare a presented token against the stored one in constant time.
    #[must_use]
    pub fn matches(&self, presented: &str) -> bool {
        let stored = self.token.as_bytes();
        let presented = presented.as_bytes();
        if stored.len() != presented.len() {
            return false;
        }
        stored
            .iter()
            .zip(presented)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

/// What to do with the pending verification when billing is saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingEmailChange {
    /// The alternate address is unchanged.
    Keep,
    /// A new alternate address was installed with this token.
    Replace(BillingEmailVerification),
    /// The alternate address was removed.
    Remove,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn verification(token: &str) -> BillingEmailVerification {
        BillingEmailVerification {
            user_id: UserId::new(1),
            pending_alt_email: Email::parse("invoices@firma.de").unwrap(),
            token: token.to_owned(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_token_match() {
        let v = verification("Ab3dEf6hIj9kLm2nOp5qRs8tUv1wXy4z");
        assert!(v.matches("Ab3dEf6hIj9kLm2nOp5qRs8tUv1wXy4z"));
        assert!(!v.matches("Ab3dEf6hIj9kLm2nOp5qRs8tUv1wXy4Z"));
        assert!(!v.matches("Ab3dEf6h"));
        assert!(!v.matches(""));
    }
}
