//! Domain models for the account settings service.
//!
//! These are owned by the collaborators around the settings store (accounts,
//! orders) or live only in this crate (session identity, pending billing
//! email verifications). Settings records themselves are defined in
//! `account_settings_core`.

pub mod account;
pub mod billing_email;
pub mod order;
pub mod session;

pub use account::Account;
pub use billing_email::{BillingEmailChange, BillingEmailVerification};
pub use order::{Order, OrderItem};
pub use session::CurrentUser;
