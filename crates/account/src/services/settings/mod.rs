//! Account settings service.
//!
//! Every operation is scoped to the authenticated user and goes through the
//! injected collaborators:
//!
//! - [`SettingsStore`] - per-user records
//! - [`AccountDirectory`] - login email and password
//! - [`OrderLookup`] - order history (deletion guard and export)
//! - [`MessageDelivery`] - alternate billing email notices
//! - [`PaymentTokenizer`] - exchanges instrument data for a processor reference
//!
//! # Email changes
//!
//! Changing the login email resets its verified state and requires the caller
//! to be logged out ([`PersonalOutcome::logout_required`]).
//!
//! Designating an alternate billing email installs it right away and sends the
//! recipient a reject link. Delivery failure does not undo the installation;
//! the outcome then carries a warning instead.
//!
//! # Account deletion
//!
//! `Requested -> PasswordVerified -> NoOpenOrders -> Deleted`. Any failing
//! stage leaves every record in place.

mod error;
mod forms;

pub use error::SettingsError;
pub use forms::{
    AdditionalAddressForm, BillingAddressForm, DeleteAccountForm, NotificationSettingsForm,
    PersonalDataForm, PostalAddressForm, PrivacySettingsForm, ShippingAddressForm,
};

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use account_settings_core::payment::{self, PaymentMethodForm};
use account_settings_core::{
    BillingAddress, Email, NewPaymentMethod, NotificationSettings, PaymentMethod, PaymentMethodId,
    PersonalData, PersonalDataChanges, PrimaryShippingAddress, PrivacySettings, ShippingAddress,
    ShippingAddressBook, ShippingAddressFields, ShippingAddressId, UserId,
};

use crate::db::{AccountDirectory, OrderLookup, RepositoryError, SettingsStore};
use crate::models::{Account, BillingEmailChange, BillingEmailVerification, Order};
use crate::services::auth::{AuthError, AuthService};
use crate::services::email::{
    MessageDelivery, alternate_billing_email_notice, billing_email_rejected_notice,
};
use crate::services::tokenizer::PaymentTokenizer;

use forms::non_empty;

/// Length of alternate billing email reject tokens.
const REJECT_TOKEN_LENGTH: usize = 32;

/// Path of the public reject endpoint, relative to the base URL.
const REJECT_PATH: &str = "/api/account/billing-email/reject";

/// The collaborators the service works with.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn SettingsStore>,
    pub accounts: Arc<dyn AccountDirectory>,
    pub orders: Arc<dyn OrderLookup>,
    pub mailer: Arc<dyn MessageDelivery>,
    pub tokenizer: Arc<dyn PaymentTokenizer>,
}

/// Deployment-specific settings.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Public base URL without trailing slash, used for reject links.
    pub base_url: String,
    /// Receives a notice when an alternate billing email is rejected.
    pub operator_email: Option<Email>,
}

/// Result of saving personal data.
#[derive(Debug, Clone, Serialize)]
pub struct PersonalOutcome {
    pub personal_data: Option<PersonalData>,
    pub email: Email,
    /// The login email changed; the session must be terminated.
    #[serde(skip)]
    pub logout_required: bool,
}

/// Billing address as shown to the user.
#[derive(Debug, Clone, Serialize)]
pub struct BillingView {
    #[serde(flatten)]
    pub billing: BillingAddress,
    /// Where invoices actually go.
    pub billing_email: Email,
}

/// Result of saving the billing address.
#[derive(Debug, Clone, Serialize)]
pub struct BillingOutcome {
    #[serde(flatten)]
    pub view: BillingView,
    /// Set when the change was saved but the notice could not be delivered.
    #[serde(skip)]
    pub warning: Option<String>,
}

/// Everything shown on the settings tabs.
#[derive(Debug, Clone, Serialize)]
pub struct SettingsOverview {
    pub account: Account,
    pub personal_data: Option<PersonalData>,
    pub billing: BillingView,
    pub shipping: PrimaryShippingAddress,
    pub additional_addresses: ShippingAddressBook,
    pub payment_methods: Vec<PaymentMethod>,
    pub notification_settings: NotificationSettings,
    pub privacy_settings: PrivacySettings,
}

/// Exported user data, ready to be served as an attachment.
#[derive(Debug, Clone)]
pub struct UserDataExport {
    pub filename: String,
    pub document: UserDataDocument,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountInfo {
    pub id: UserId,
    pub email: Email,
    pub display_name: String,
    pub registered: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportedAddresses {
    pub billing: BillingView,
    pub shipping: PrimaryShippingAddress,
    pub additional: Vec<ShippingAddress>,
    pub default_additional_id: Option<ShippingAddressId>,
}

/// The export document. Payment methods carry display details only.
#[derive(Debug, Clone, Serialize)]
pub struct UserDataDocument {
    pub account_info: AccountInfo,
    pub personal_data: Option<PersonalData>,
    pub addresses: ExportedAddresses,
    pub payment_methods: Vec<PaymentMethod>,
    pub notification_settings: NotificationSettings,
    pub privacy_settings: PrivacySettings,
    pub orders: Vec<Order>,
    pub exported_at: DateTime<Utc>,
}

/// Stages of an account deletion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeletionStage {
    Requested,
    PasswordVerified,
    NoOpenOrders,
    Deleted,
}

/// Account settings service.
#[derive(Clone)]
pub struct SettingsService {
    inner: Arc<SettingsServiceInner>,
}

struct SettingsServiceInner {
    store: Arc<dyn SettingsStore>,
    accounts: Arc<dyn AccountDirectory>,
    orders: Arc<dyn OrderLookup>,
    mailer: Arc<dyn MessageDelivery>,
    tokenizer: Arc<dyn PaymentTokenizer>,
    auth: AuthService,
    settings: ServiceSettings,
}

impl SettingsService {
    #[must_use]
    pub fn new(collaborators: Collaborators, settings: ServiceSettings) -> Self {
        let auth = AuthService::new(Arc::clone(&collaborators.accounts));
        Self {
            inner: Arc::new(SettingsServiceInner {
                store: collaborators.store,
                accounts: collaborators.accounts,
                orders: collaborators.orders,
                mailer: collaborators.mailer,
                tokenizer: collaborators.tokenizer,
                auth,
                settings,
            }),
        }
    }

    /// Password authentication over the same account directory.
    #[must_use]
    pub fn auth(&self) -> &AuthService {
        &self.inner.auth
    }

    async fn account(&self, user_id: UserId) -> Result<Account, SettingsError> {
        self.inner
            .accounts
            .find(user_id)
            .await?
            .ok_or(SettingsError::AuthRequired)
    }

    async fn billing_view(&self, account: &Account) -> Result<BillingView, SettingsError> {
        let billing = self
            .inner
            .store
            .billing_address(account.id)
            .await?
            .unwrap_or_default();
        let billing_email = billing.effective_email(&account.email).clone();
        Ok(BillingView {
            billing,
            billing_email,
        })
    }

    // =========================================================================
    // Read side
    // =========================================================================

    /// All settings of the user, with defaults for records never saved.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::AuthRequired` if the account no longer exists.
    pub async fn overview(&self, user_id: UserId) -> Result<SettingsOverview, SettingsError> {
        let account = self.account(user_id).await?;
        let store = &self.inner.store;

        Ok(SettingsOverview {
            personal_data: store.personal_data(user_id).await?,
            billing: self.billing_view(&account).await?,
            shipping: store.shipping_address(user_id).await?.unwrap_or_default(),
            additional_addresses: store.shipping_address_book(user_id).await?,
            payment_methods: store.payment_methods(user_id).await?,
            notification_settings: store
                .notification_settings(user_id)
                .await?
                .unwrap_or_default(),
            privacy_settings: store.privacy_settings(user_id).await?.unwrap_or_default(),
            account,
        })
    }

    /// Notification preferences, or the defaults if never saved.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Persistence` if the store fails.
    pub async fn notification_settings(
        &self,
        user_id: UserId,
    ) -> Result<NotificationSettings, SettingsError> {
        Ok(self
            .inner
            .store
            .notification_settings(user_id)
            .await?
            .unwrap_or_default())
    }

    /// Privacy preferences, or the defaults if never saved.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Persistence` if the store fails.
    pub async fn privacy_settings(&self, user_id: UserId) -> Result<PrivacySettings, SettingsError> {
        Ok(self
            .inner
            .store
            .privacy_settings(user_id)
            .await?
            .unwrap_or_default())
    }

    // =========================================================================
    // Personal data
    // =========================================================================

    /// Save personal data and, if it differs, the login email.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Validation` for a malformed email or birthdate.
    /// Returns `SettingsError::EmailInUse` if another account holds the new
    /// email; nothing is saved in that case. Returns
    /// `SettingsError::Persistence` if a write fails; the login email is
    /// written last, so it is unchanged whenever an error is returned.
    pub async fn save_personal_data(
        &self,
        user_id: UserId,
        form: PersonalDataForm,
    ) -> Result<PersonalOutcome, SettingsError> {
        let account = self.account(user_id).await?;

        let new_email = match non_empty(form.email) {
            Some(raw) => {
                let email = Email::parse(&raw).map_err(|_| {
                    SettingsError::validation("email", "Please enter a valid email address.")
                })?;
                (!email.same_address(&account.email)).then_some(email)
            }
            None => None,
        };
        let birthdate = non_empty(form.birthdate)
            .map(|raw| NaiveDate::parse_from_str(&raw, "%Y-%m-%d"))
            .transpose()
            .map_err(|_| {
                SettingsError::validation("birthdate", "Please enter a date as YYYY-MM-DD.")
            })?;

        if let Some(email) = &new_email
            && self.inner.accounts.email_taken(email, user_id).await?
        {
            return Err(SettingsError::EmailInUse);
        }

        let changes = PersonalDataChanges {
            first_name: non_empty(form.first_name),
            last_name: non_empty(form.last_name),
            birthdate,
            phone: non_empty(form.phone),
        };
        let personal_data = if changes.is_empty() {
            self.inner.store.personal_data(user_id).await?
        } else {
            Some(self.inner.store.save_personal_data(user_id, changes).await?)
        };

        // The login email goes last: once it has changed, the caller must be
        // told to end the session.
        let mut email = account.email;
        let mut logout_required = false;
        if let Some(new_email) = new_email {
            let updated = self
                .inner
                .accounts
                .update_email(user_id, &new_email)
                .await
                .map_err(|e| match e {
                    RepositoryError::Conflict(_) => SettingsError::EmailInUse,
                    other => SettingsError::Persistence(other),
                })?;
            tracing::info!(user_id = %user_id, "Login email changed, session must end");
            email = updated.email;
            logout_required = true;
        }

        Ok(PersonalOutcome {
            personal_data,
            email,
            logout_required,
        })
    }

    // =========================================================================
    // Billing address and alternate billing email
    // =========================================================================

    /// Save the billing address.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Validation` for a malformed alternate email.
    pub async fn save_billing_address(
        &self,
        user_id: UserId,
        form: BillingAddressForm,
    ) -> Result<BillingOutcome, SettingsError> {
        let account = self.account(user_id).await?;
        let existing = self
            .inner
            .store
            .billing_address(user_id)
            .await?
            .unwrap_or_default();

        let mut billing = BillingAddress {
            address: form.address.into_address(form.is_company),
            vat_id: if form.is_company {
                forms::text(form.vat_id)
            } else {
                String::new()
            },
            phone: form
                .phone
                .map_or(existing.phone, |p| p.trim().to_owned()),
            is_company: form.is_company,
            alt_billing_email: existing.alt_billing_email.clone(),
        };

        let mut notice = None;
        let change = if form.different_billing_email {
            match non_empty(form.alt_billing_email) {
                Some(raw) => {
                    let alt = Email::parse(&raw).map_err(|_| {
                        SettingsError::validation(
                            "alt_billing_email",
                            "Please enter a valid billing email address.",
                        )
                    })?;
                    if existing
                        .alt_billing_email
                        .as_ref()
                        .is_some_and(|current| current.same_address(&alt))
                    {
                        BillingEmailChange::Keep
                    } else {
                        let verification = BillingEmailVerification {
                            user_id,
                            pending_alt_email: alt.clone(),
                            token: generate_reject_token(),
                            created_at: Utc::now(),
                        };
                        notice = Some(alternate_billing_email_notice(
                            &alt,
                            &account.email,
                            &self.reject_url(&verification),
                        ));
                        billing.alt_billing_email = Some(alt);
                        BillingEmailChange::Replace(verification)
                    }
                }
                None => BillingEmailChange::Keep,
            }
        } else {
            billing.alt_billing_email = None;
            BillingEmailChange::Remove
        };

        self.inner
            .store
            .save_billing_address(user_id, &billing, change)
            .await?;

        let mut warning = None;
        if let Some(message) = notice {
            match self.inner.mailer.send(&message).await {
                Ok(()) => {
                    tracing::info!(user_id = %user_id, "Alternate billing email installed");
                }
                Err(e) => {
                    tracing::warn!(
                        user_id = %user_id,
                        error = %e,
                        "Alternate billing email installed but notice not delivered"
                    );
                    warning = Some(
                        "Your billing address was saved, but the confirmation email to the \
                         billing email address could not be sent."
                            .to_owned(),
                    );
                }
            }
        }

        let billing_email = billing.effective_email(&account.email).clone();
        Ok(BillingOutcome {
            view: BillingView {
                billing,
                billing_email,
            },
            warning,
        })
    }

    fn reject_url(&self, verification: &BillingEmailVerification) -> String {
        format!(
            "{}{REJECT_PATH}?token={}&user_id={}",
            self.inner.settings.base_url, verification.token, verification.user_id
        )
    }

    /// Consume a reject token: the alternate billing email is removed and the
    /// operator notified.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::NotFound` for an unknown, stale or already
    /// consumed token. Nothing changes in that case.
    pub async fn reject_alternate_billing_email(
        &self,
        user_id: UserId,
        token: &str,
    ) -> Result<(), SettingsError> {
        if token.is_empty() {
            return Err(SettingsError::NotFound);
        }
        let consumed = self
            .inner
            .store
            .reject_billing_email(user_id, token)
            .await?
            .ok_or(SettingsError::NotFound)?;

        tracing::info!(user_id = %user_id, "Alternate billing email rejected by recipient");

        let Some(operator) = &self.inner.settings.operator_email else {
            return Ok(());
        };
        let account = match self.inner.accounts.find(user_id).await {
            Ok(Some(account)) => account,
            Ok(None) => return Ok(()),
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Could not load account for operator notice");
                return Ok(());
            }
        };
        let message =
            billing_email_rejected_notice(operator, &account.email, &consumed.pending_alt_email);
        if let Err(e) = self.inner.mailer.send(&message).await {
            tracing::error!(user_id = %user_id, error = %e, "Failed to notify operator of rejection");
        }
        Ok(())
    }

    // =========================================================================
    // Shipping addresses
    // =========================================================================

    /// Save the primary shipping address.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Persistence` if the store fails.
    pub async fn save_shipping_address(
        &self,
        user_id: UserId,
        form: ShippingAddressForm,
    ) -> Result<PrimaryShippingAddress, SettingsError> {
        let shipping = PrimaryShippingAddress {
            address: form.address.into_address(form.is_company),
            is_company: form.is_company,
        };
        self.inner
            .store
            .save_shipping_address(user_id, &shipping)
            .await?;
        Ok(shipping)
    }

    /// Add an additional shipping address.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Persistence` if the store fails.
    pub async fn add_shipping_address(
        &self,
        user_id: UserId,
        form: AdditionalAddressForm,
    ) -> Result<ShippingAddress, SettingsError> {
        let address = self
            .inner
            .store
            .add_additional_address(user_id, form.fields.into_new(), form.set_default)
            .await?;
        tracing::debug!(user_id = %user_id, address_id = %address.id, "Shipping address added");
        Ok(address)
    }

    /// Edit an additional shipping address. Fields not supplied keep their value.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::NotFound` if the address is not the user's.
    pub async fn edit_shipping_address(
        &self,
        user_id: UserId,
        id: ShippingAddressId,
        fields: ShippingAddressFields,
    ) -> Result<ShippingAddress, SettingsError> {
        Ok(self
            .inner
            .store
            .update_additional_address(user_id, id, fields)
            .await?)
    }

    /// Delete an additional shipping address. Deleting the default clears it.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::NotFound` if the address is not the user's.
    pub async fn delete_shipping_address(
        &self,
        user_id: UserId,
        id: ShippingAddressId,
    ) -> Result<(), SettingsError> {
        let plan = self
            .inner
            .store
            .remove_additional_address(user_id, id)
            .await?;
        tracing::debug!(
            user_id = %user_id,
            address_id = %id,
            was_default = plan.was_default,
            "Shipping address deleted"
        );
        Ok(())
    }

    /// Make an additional shipping address the default.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::NotFound` if the address is not the user's.
    pub async fn set_default_shipping_address(
        &self,
        user_id: UserId,
        id: ShippingAddressId,
    ) -> Result<(), SettingsError> {
        Ok(self
            .inner
            .store
            .set_default_additional_address(user_id, id)
            .await?)
    }

    // =========================================================================
    // Payment methods
    // =========================================================================

    /// Validate, tokenize and store a payment method.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Validation` naming the first invalid field.
    /// Returns `SettingsError::UnsupportedInstrument` for unknown types.
    /// Returns `SettingsError::PaymentProcessor` if tokenization fails.
    pub async fn save_payment_method(
        &self,
        user_id: UserId,
        form: PaymentMethodForm,
    ) -> Result<PaymentMethod, SettingsError> {
        let instrument = payment::validate(&form)?;
        let processor_token = self.inner.tokenizer.tokenize(user_id, &instrument).await?;

        let method = self
            .inner
            .store
            .add_payment_method(
                user_id,
                NewPaymentMethod {
                    details: instrument.details(),
                    processor_token,
                },
                form.set_default,
            )
            .await?;

        tracing::info!(
            user_id = %user_id,
            method_id = %method.id,
            method_type = %method.method_type,
            is_default = method.is_default,
            "Payment method added"
        );
        Ok(method)
    }

    /// Delete a payment method. If it was the default, the most recent
    /// remaining method takes over.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::NotFound` if the method is not the user's.
    pub async fn delete_payment_method(
        &self,
        user_id: UserId,
        id: PaymentMethodId,
    ) -> Result<(), SettingsError> {
        let plan = self.inner.store.remove_payment_method(user_id, id).await?;
        tracing::info!(
            user_id = %user_id,
            method_id = %id,
            promoted = ?plan.promote,
            "Payment method deleted"
        );
        Ok(())
    }

    /// Make a payment method the default.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::NotFound` if the method is not the user's.
    pub async fn set_default_payment_method(
        &self,
        user_id: UserId,
        id: PaymentMethodId,
    ) -> Result<(), SettingsError> {
        Ok(self
            .inner
            .store
            .set_default_payment_method(user_id, id)
            .await?)
    }

    // =========================================================================
    // Preferences
    // =========================================================================

    /// Replace the notification preferences.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Persistence` if the store fails.
    pub async fn save_notification_settings(
        &self,
        user_id: UserId,
        form: NotificationSettingsForm,
    ) -> Result<NotificationSettings, SettingsError> {
        let settings = NotificationSettings::from(form);
        self.inner
            .store
            .save_notification_settings(user_id, settings)
            .await?;
        Ok(settings)
    }

    /// Replace the privacy preferences.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Persistence` if the store fails.
    pub async fn save_privacy_settings(
        &self,
        user_id: UserId,
        form: PrivacySettingsForm,
    ) -> Result<PrivacySettings, SettingsError> {
        let settings = PrivacySettings::from(form);
        self.inner
            .store
            .save_privacy_settings(user_id, settings)
            .await?;
        Ok(settings)
    }

    // =========================================================================
    // Account deletion
    // =========================================================================

    /// Delete the account and every per-user record.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::AuthRequired` without a caller.
    /// Returns `SettingsError::Validation` for an empty password.
    /// Returns `SettingsError::InvalidPassword` on mismatch.
    /// Returns `SettingsError::OpenOrders` while an order is in progress.
    pub async fn request_account_deletion(
        &self,
        caller: Option<UserId>,
        password: &SecretString,
    ) -> Result<(), SettingsError> {
        let user_id = caller.ok_or(SettingsError::AuthRequired)?;
        log_stage(user_id, DeletionStage::Requested);

        if password.expose_secret().is_empty() {
            return Err(SettingsError::validation(
                "password",
                "Please enter your password to confirm.",
            ));
        }

        self.inner
            .auth
            .verify(user_id, password)
            .await
            .map_err(|e| match e {
                AuthError::Repository(r) => SettingsError::Persistence(r),
                _ => SettingsError::InvalidPassword,
            })?;
        log_stage(user_id, DeletionStage::PasswordVerified);

        if self.inner.orders.has_open_orders(user_id).await? {
            return Err(SettingsError::OpenOrders);
        }
        log_stage(user_id, DeletionStage::NoOpenOrders);

        self.inner.accounts.delete(user_id).await.map_err(|e| match e {
            RepositoryError::NotFound => SettingsError::AuthRequired,
            other => SettingsError::Persistence(other),
        })?;
        if let Err(e) = self.inner.store.delete_user_data(user_id).await {
            tracing::error!(user_id = %user_id, error = %e, "Account deleted but settings purge failed");
            return Err(SettingsError::Persistence(e));
        }
        log_stage(user_id, DeletionStage::Deleted);

        tracing::info!(user_id = %user_id, "Account deleted");
        Ok(())
    }

    // =========================================================================
    // Export
    // =========================================================================

    /// Collect everything stored about the user.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::AuthRequired` if the account no longer exists.
    pub async fn export_user_data(&self, user_id: UserId) -> Result<UserDataExport, SettingsError> {
        let overview = self.overview(user_id).await?;
        let orders = self.inner.orders.orders_for(user_id).await?;
        let exported_at = Utc::now();

        let filename = format!("user-data-{user_id}-{}.json", exported_at.format("%Y%m%d"));
        let document = UserDataDocument {
            account_info: AccountInfo {
                id: overview.account.id,
                email: overview.account.email,
                display_name: overview.account.display_name,
                registered: overview.account.created_at,
            },
            personal_data: overview.personal_data,
            addresses: ExportedAddresses {
                billing: overview.billing,
                shipping: overview.shipping,
                additional: overview.additional_addresses.addresses,
                default_additional_id: overview.additional_addresses.default_id,
            },
            payment_methods: overview.payment_methods,
            notification_settings: overview.notification_settings,
            privacy_settings: overview.privacy_settings,
            orders,
            exported_at,
        };

        tracing::info!(user_id = %user_id, "User data exported");
        Ok(UserDataExport { filename, document })
    }
}

fn log_stage(user_id: UserId, stage: DeletionStage) {
    tracing::debug!(user_id = %user_id, stage = ?stage, "Account deletion");
}

fn generate_reject_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(REJECT_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::db::{MemoryAccountDirectory, MemoryOrderLookup, MemorySettingsStore};
    use crate::services::email::MemoryMailer;
    use crate::services::tokenizer::OfflineTokenizer;

    struct Fixture {
        service: SettingsService,
        mailer: Arc<MemoryMailer>,
        store: Arc<MemorySettingsStore>,
        user: UserId,
    }

    async fn fixture() -> Fixture {
        let accounts = Arc::new(MemoryAccountDirectory::new());
        let store = Arc::new(MemorySettingsStore::new(accounts.clone()));
        let mailer = Arc::new(MemoryMailer::new());
        let service = SettingsService::new(
            Collaborators {
                store: store.clone(),
                accounts,
                orders: Arc::new(MemoryOrderLookup::new()),
                mailer: mailer.clone(),
                tokenizer: Arc::new(OfflineTokenizer),
            },
            ServiceSettings {
                base_url: "https://shop.example.de".to_owned(),
                operator_email: Some(Email::parse("ops@shop.example.de").unwrap()),
            },
        );
        let account = service
            .auth()
            .register(
                "kunde@shop.example.de",
                "Kunde",
                &SecretString::from("korrekt-pferd".to_owned()),
            )
            .await
            .unwrap();
        Fixture {
            service,
            mailer,
            store,
            user: account.id,
        }
    }

    fn alt_billing(email: &str) -> BillingAddressForm {
        BillingAddressForm {
            different_billing_email: true,
            alt_billing_email: Some(email.to_owned()),
            ..BillingAddressForm::default()
        }
    }

    #[test]
    fn test_reject_token_shape() {
        let token = generate_reject_token();
        assert_eq!(token.len(), REJECT_TOKEN_LENGTH);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[tokio::test]
    async fn test_alternate_billing_email_sends_reject_link() {
        let f = fixture().await;
        let outcome = f
            .service
            .save_billing_address(f.user, alt_billing("invoices@firma.de"))
            .await
            .unwrap();

        assert!(outcome.warning.is_none());
        assert_eq!(outcome.view.billing_email.as_str(), "invoices@firma.de");

        let pending = f.store.pending_billing_email(f.user).await.unwrap().unwrap();
        let sent = f.mailer.sent().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body.contains(&format!(
            "https://shop.example.de/api/account/billing-email/reject?token={}&user_id={}",
            pending.token, f.user
        )));
    }

    #[tokio::test]
    async fn test_same_alternate_email_is_not_resent() {
        let f = fixture().await;
        f.service
            .save_billing_address(f.user, alt_billing("invoices@firma.de"))
            .await
            .unwrap();
        f.service
            .save_billing_address(f.user, alt_billing("Invoices@Firma.de"))
            .await
            .unwrap();
        assert_eq!(f.mailer.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn test_vat_id_only_kept_for_companies() {
        let f = fixture().await;
        let outcome = f
            .service
            .save_billing_address(
                f.user,
                BillingAddressForm {
                    vat_id: Some("DE123456789".to_owned()),
                    ..BillingAddressForm::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.view.billing.vat_id, "");
        assert_eq!(outcome.view.billing_email.as_str(), "kunde@shop.example.de");
    }

    #[tokio::test]
    async fn test_malformed_birthdate_is_rejected() {
        let f = fixture().await;
        let err = f
            .service
            .save_personal_data(
                f.user,
                PersonalDataForm {
                    birthdate: Some("31.12.1990".to_owned()),
                    ..PersonalDataForm::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SettingsError::Validation { field: "birthdate", .. }));
    }

    #[tokio::test]
    async fn test_empty_reject_token_is_not_found() {
        let f = fixture().await;
        assert!(matches!(
            f.service.reject_alternate_billing_email(f.user, "").await,
            Err(SettingsError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_export_filename() {
        let f = fixture().await;
        let export = f.service.export_user_data(f.user).await.unwrap();
        let date = Utc::now().format("%Y%m%d").to_string();
        assert_eq!(export.filename, format!("user-data-{}-{date}.json", f.user));
        assert!(export.document.orders.is_empty());
    }
}
