//! Core types for account settings.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod address;
pub mod email;
pub mod id;
pub mod payment_method;
pub mod settings;
pub mod status;

pub use address::{
    BillingAddress, DEFAULT_ADDRESS_LABEL, DEFAULT_COUNTRY, NewShippingAddress, PostalAddress,
    PrimaryShippingAddress, ShippingAddress, ShippingAddressBook, ShippingAddressFields,
};
pub use email::{Email, EmailError};
pub use id::*;
pub use payment_method::{NewPaymentMethod, PaymentMethod};
pub use settings::{NotificationSettings, PersonalData, PersonalDataChanges, PrivacySettings};
pub use status::*;
