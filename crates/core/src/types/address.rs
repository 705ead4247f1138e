//! Billing and shipping address records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::email::Email;
use super::id::{ShippingAddressId, UserId};
use crate::selection::Slot;

/// Country assigned to new accounts and to addresses submitted without one.
pub const DEFAULT_COUNTRY: &str = "DE";

/// Label given to additional addresses saved without a name.
pub const DEFAULT_ADDRESS_LABEL: &str = "Neue Adresse";

/// The postal part shared by every address kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostalAddress {
    pub first_name: String,
    pub last_name: String,
    pub company: String,
    pub address_1: String,
    pub address_2: String,
    pub postcode: String,
    pub city: String,
    pub country: String,
}

impl Default for PostalAddress {
    fn default() -> Self {
        Self {
            first_name: String::new(),
            last_name: String::new(),
            company: String::new(),
            address_1: String::new(),
            address_2: String::new(),
            postcode: String::new(),
            city: String::new(),
            country: DEFAULT_COUNTRY.to_owned(),
        }
    }
}

/// Billing address plus invoice-related settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BillingAddress {
    #[serde(flatten)]
    pub address: PostalAddress,
    pub vat_id: String,
    pub phone: String,
    pub is_company: bool,
    /// Invoice recipient that differs from the login email.
    pub alt_billing_email: Option<Email>,
}

impl BillingAddress {
    /// The address invoices go to: the alternate recipient if set, else the login email.
    #[must_use]
    pub fn effective_email<'a>(&'a self, primary: &'a Email) -> &'a Email {
        self.alt_billing_email.as_ref().unwrap_or(primary)
    }
}

/// The primary shipping address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PrimaryShippingAddress {
    #[serde(flatten)]
    pub address: PostalAddress,
    pub is_company: bool,
}

/// An additional, user-labelled shipping address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub id: ShippingAddressId,
    pub user_id: UserId,
    pub label: String,
    #[serde(flatten)]
    pub address: PostalAddress,
    pub is_company: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user's additional addresses together with the chosen default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct ShippingAddressBook {
    /// Ordered by creation.
    pub addresses: Vec<ShippingAddress>,
    pub default_id: Option<ShippingAddressId>,
}

impl ShippingAddressBook {
    /// The address selected as default, if it still exists.
    #[must_use]
    pub fn default_address(&self) -> Option<&ShippingAddress> {
        let id = self.default_id?;
        self.addresses.iter().find(|a| a.id == id)
    }

    #[must_use]
    pub fn get(&self, id: ShippingAddressId) -> Option<&ShippingAddress> {
        self.addresses.iter().find(|a| a.id == id)
    }

    /// Selection view of the book: the default is a flag on one slot.
    #[must_use]
    pub fn slots(&self) -> Vec<Slot<ShippingAddressId>> {
        self.addresses
            .iter()
            .map(|a| Slot {
                id: a.id,
                is_default: self.default_id == Some(a.id),
                created_at: a.created_at,
            })
            .collect()
    }
}

/// Submitted fields for an additional shipping address.
///
/// On create, missing fields fall back to empty values (country `DE`, label
/// [`DEFAULT_ADDRESS_LABEL`]); on edit they keep the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddressFields {
    pub label: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub address_1: Option<String>,
    pub address_2: Option<String>,
    pub postcode: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    #[serde(default)]
    pub is_company: bool,
}

/// Values for inserting a new additional address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewShippingAddress {
    pub label: String,
    pub address: PostalAddress,
    pub is_company: bool,
}

impl ShippingAddressFields {
    /// Resolve the fields for a brand new address.
    #[must_use]
    pub fn into_new(self) -> NewShippingAddress {
        let defaults = PostalAddress::default();
        NewShippingAddress {
            label: non_empty(self.label).unwrap_or_else(|| DEFAULT_ADDRESS_LABEL.to_owned()),
            address: PostalAddress {
                first_name: self.first_name.unwrap_or_default(),
                last_name: self.last_name.unwrap_or_default(),
                company: self.company.unwrap_or_default(),
                address_1: self.address_1.unwrap_or_default(),
                address_2: self.address_2.unwrap_or_default(),
                postcode: self.postcode.unwrap_or_default(),
                city: self.city.unwrap_or_default(),
                country: non_empty(self.country).unwrap_or(defaults.country),
            },
            is_company: self.is_company,
        }
    }

    /// Apply the fields over a stored address. The company flag always follows the submission.
    pub fn apply_to(self, target: &mut ShippingAddress) {
        let a = &mut target.address;
        if let Some(v) = self.label {
            target.label = v;
        }
        if let Some(v) = self.first_name {
            a.first_name = v;
        }
        if let Some(v) = self.last_name {
            a.last_name = v;
        }
        if let Some(v) = self.company {
            a.company = v;
        }
        if let Some(v) = self.address_1 {
            a.address_1 = v;
        }
        if let Some(v) = self.address_2 {
            a.address_2 = v;
        }
        if let Some(v) = self.postcode {
            a.postcode = v;
        }
        if let Some(v) = self.city {
            a.city = v;
        }
        if let Some(v) = self.country {
            a.country = v;
        }
        target.is_company = self.is_company;
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_new_address_defaults() {
        let new = ShippingAddressFields {
            city: Some("Berlin".to_owned()),
            label: Some("   ".to_owned()),
            ..ShippingAddressFields::default()
        }
        .into_new();

        assert_eq!(new.label, DEFAULT_ADDRESS_LABEL);
        assert_eq!(new.address.country, "DE");
        assert_eq!(new.address.city, "Berlin");
        assert!(!new.is_company);
    }

    #[test]
    fn test_edit_keeps_unsubmitted_fields() {
        let now = Utc::now();
        let mut stored = ShippingAddress {
            id: ShippingAddressId::new(1),
            user_id: UserId::new(1),
            label: "Büro".to_owned(),
            address: PostalAddress {
                city: "Hamburg".to_owned(),
                postcode: "20095".to_owned(),
                ..PostalAddress::default()
            },
            is_company: true,
            created_at: now,
            updated_at: now,
        };

        ShippingAddressFields {
            city: Some("Bremen".to_owned()),
            ..ShippingAddressFields::default()
        }
        .apply_to(&mut stored);

        assert_eq!(stored.label, "Büro");
        assert_eq!(stored.address.city, "Bremen");
        assert_eq!(stored.address.postcode, "20095");
        assert!(!stored.is_company);
    }

    #[test]
    fn test_book_slots_flag_only_the_default() {
        let now = Utc::now();
        let address = |id| ShippingAddress {
            id: ShippingAddressId::new(id),
            user_id: UserId::new(1),
            label: DEFAULT_ADDRESS_LABEL.to_owned(),
            address: PostalAddress::default(),
            is_company: false,
            created_at: now,
            updated_at: now,
        };
        let book = ShippingAddressBook {
            addresses: vec![address(1), address(2)],
            default_id: Some(ShippingAddressId::new(2)),
        };

        let slots = book.slots();
        assert!(!slots[0].is_default);
        assert!(slots[1].is_default);
        assert_eq!(book.default_address().unwrap().id, ShippingAddressId::new(2));

        let dangling = ShippingAddressBook {
            default_id: Some(ShippingAddressId::new(9)),
            ..book
        };
        assert!(dangling.default_address().is_none());
    }

    #[test]
    fn test_effective_billing_email() {
        let primary = Email::parse("login@shop.de").unwrap();
        let mut billing = BillingAddress::default();
        assert_eq!(billing.effective_email(&primary), &primary);

        billing.alt_billing_email = Some(Email::parse("invoices@firma.de").unwrap());
        assert_eq!(billing.effective_email(&primary).as_str(), "invoices@firma.de");
    }
}
