//! Per-user settings records.
//!
//! Each record is one row per user, created lazily on first write.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::id::UserId;

/// Personal data shown on the "personal" tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalData {
    pub user_id: UserId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields submitted for personal data. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonalDataChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub phone: Option<String>,
}

impl PersonalDataChanges {
    /// True when no field would be written.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.birthdate.is_none()
            && self.phone.is_none()
    }

    /// Apply the changes on top of an existing record (or a fresh one).
    #[must_use]
    pub fn apply(self, user_id: UserId, existing: Option<PersonalData>, now: DateTime<Utc>) -> PersonalData {
        let mut record = existing.unwrap_or(PersonalData {
            user_id,
            first_name: None,
            last_name: None,
            birthdate: None,
            phone: None,
            created_at: now,
            updated_at: now,
        });
        if let Some(v) = self.first_name {
            record.first_name = Some(v);
        }
        if let Some(v) = self.last_name {
            record.last_name = Some(v);
        }
        if let Some(v) = self.birthdate {
            record.birthdate = Some(v);
        }
        if let Some(v) = self.phone {
            record.phone = Some(v);
        }
        record.updated_at = now;
        record
    }
}

/// Notification channel preferences.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSettings {
    pub email_orders: bool,
    pub email_marketing: bool,
    pub email_news: bool,
    pub sms_orders: bool,
    pub sms_marketing: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            email_orders: true,
            email_marketing: true,
            email_news: true,
            sms_orders: false,
            sms_marketing: false,
        }
    }
}

/// Privacy/consent preferences.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivacySettings {
    pub data_sharing: bool,
    pub data_collection: bool,
    pub personalized_ads: bool,
    pub preferences_analysis: bool,
}

impl Default for PrivacySettings {
    fn default() -> Self {
        Self {
            data_sharing: true,
            data_collection: true,
            personalized_ads: true,
            preferences_analysis: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_defaults() {
        let s = NotificationSettings::default();
        assert!(s.email_orders && s.email_marketing && s.email_news);
        assert!(!s.sms_orders && !s.sms_marketing);
    }

    #[test]
    fn test_privacy_defaults_are_all_on() {
        let s = PrivacySettings::default();
        assert!(s.data_sharing && s.data_collection && s.personalized_ads && s.preferences_analysis);
    }

    #[test]
    fn test_changes_only_overwrite_submitted_fields() {
        let now = Utc::now();
        let existing = PersonalData {
            user_id: UserId::new(1),
            first_name: Some("Anna".to_owned()),
            last_name: Some("Schmidt".to_owned()),
            birthdate: None,
            phone: Some("0301234".to_owned()),
            created_at: now,
            updated_at: now,
        };
        let changes = PersonalDataChanges {
            last_name: Some("Weber".to_owned()),
            ..PersonalDataChanges::default()
        };

        let updated = changes.apply(UserId::new(1), Some(existing), now);

        assert_eq!(updated.first_name.as_deref(), Some("Anna"));
        assert_eq!(updated.last_name.as_deref(), Some("Weber"));
        assert_eq!(updated.phone.as_deref(), Some("0301234"));
    }

    #[test]
    fn test_changes_create_fresh_record() {
        let now = Utc::now();
        let changes = PersonalDataChanges {
            phone: Some("0171".to_owned()),
            ..PersonalDataChanges::default()
        };
        assert!(!changes.is_empty());
        let record = changes.apply(UserId::new(9), None, now);
        assert_eq!(record.user_id, UserId::new(9));
        assert_eq!(record.created_at, now);
        assert!(record.first_name.is_none());
    }
}
