//! Submitted settings forms.
//!
//! Text fields are trimmed on the way in. Checkboxes that are absent from a
//! submission count as unchecked.

use serde::Deserialize;

use account_settings_core::{
    NotificationSettings, PostalAddress, PrivacySettings, ShippingAddressFields,
};

/// Personal tab. Empty fields leave stored values untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonalDataForm {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// New login email.
    pub email: Option<String>,
    /// `YYYY-MM-DD`.
    pub birthdate: Option<String>,
    pub phone: Option<String>,
}

/// Postal fields shared by the billing and primary shipping forms.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostalAddressForm {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub address_1: Option<String>,
    pub address_2: Option<String>,
    pub postcode: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

impl PostalAddressForm {
    /// Build the stored address. The company is dropped unless `is_company`,
    /// an empty country becomes the default one.
    #[must_use]
    pub fn into_address(self, is_company: bool) -> PostalAddress {
        let defaults = PostalAddress::default();
        PostalAddress {
            first_name: text(self.first_name),
            last_name: text(self.last_name),
            company: if is_company {
                text(self.company)
            } else {
                String::new()
            },
            address_1: text(self.address_1),
            address_2: text(self.address_2),
            postcode: text(self.postcode),
            city: text(self.city),
            country: non_empty(self.country).unwrap_or(defaults.country),
        }
    }
}

/// Billing tab.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BillingAddressForm {
    #[serde(flatten)]
    pub address: PostalAddressForm,
    pub vat_id: Option<String>,
    /// Absent keeps the stored phone.
    pub phone: Option<String>,
    #[serde(default)]
    pub is_company: bool,
    /// Whether invoices go to a different address than the login email.
    #[serde(default)]
    pub different_billing_email: bool,
    pub alt_billing_email: Option<String>,
}

/// Primary shipping address.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShippingAddressForm {
    #[serde(flatten)]
    pub address: PostalAddressForm,
    #[serde(default)]
    pub is_company: bool,
}

/// A new additional shipping address.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdditionalAddressForm {
    #[serde(flatten)]
    pub fields: ShippingAddressFields,
    #[serde(default)]
    pub set_default: bool,
}

#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct NotificationSettingsForm {
    pub email_orders: bool,
    pub email_marketing: bool,
    pub email_news: bool,
    pub sms_orders: bool,
    pub sms_marketing: bool,
}

impl From<NotificationSettingsForm> for NotificationSettings {
    fn from(f: NotificationSettingsForm) -> Self {
        Self {
            email_orders: f.email_orders,
            email_marketing: f.email_marketing,
            email_news: f.email_news,
            sms_orders: f.sms_orders,
            sms_marketing: f.sms_marketing,
        }
    }
}

#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct PrivacySettingsForm {
    pub data_sharing: bool,
    pub data_collection: bool,
    pub personalized_ads: bool,
    pub preferences_analysis: bool,
}

impl From<PrivacySettingsForm> for PrivacySettings {
    fn from(f: PrivacySettingsForm) -> Self {
        Self {
            data_sharing: f.data_sharing,
            data_collection: f.data_collection,
            personalized_ads: f.personalized_ads,
            preferences_analysis: f.preferences_analysis,
        }
    }
}

/// Account deletion confirmation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteAccountForm {
    #[serde(default)]
    pub password: String,
}

/// Trimmed value, empty when absent.
pub(crate) fn text(value: Option<String>) -> String {
    value.map(|v| v.trim().to_owned()).unwrap_or_default()
}

/// Trimmed value, `None` when absent or blank.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}
