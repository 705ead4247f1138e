//! In-memory implementations of the persistence traits.
//!
//! Used by tests and local experiments. Each store holds one
//! `tokio::sync::Mutex` for the whole dataset, held across every operation,
//! which gives the same per-call atomicity as the `PostgreSQL` transactions.
//!
//! Both stores can be switched to unavailable, after which their writes fail
//! the way a lost database connection does.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, MutexGuard};

use account_settings_core::selection::{
    self, RemovePlan, SelectionPolicy, clear_defaults, mark_default, slots_of,
};
use account_settings_core::{
    BillingAddress, Email, NewPaymentMethod, NewShippingAddress, NotificationSettings, OrderStatus,
    PaymentMethod, PaymentMethodId, PersonalData, PersonalDataChanges, PrimaryShippingAddress,
    PrivacySettings, ShippingAddress, ShippingAddressBook, ShippingAddressFields,
    ShippingAddressId, UserId,
};

use super::{AccountDirectory, OrderLookup, RepositoryError, SettingsStore};
use crate::models::{Account, BillingEmailChange, BillingEmailVerification, Order};

// =============================================================================
// Settings store
// =============================================================================

#[derive(Debug, Default, Clone)]
struct UserRecords {
    personal: Option<PersonalData>,
    billing: Option<BillingAddress>,
    shipping: Option<PrimaryShippingAddress>,
    book: ShippingAddressBook,
    payments: Vec<PaymentMethod>,
    notifications: Option<NotificationSettings>,
    privacy: Option<PrivacySettings>,
    verification: Option<BillingEmailVerification>,
}

impl UserRecords {
    fn is_empty(&self) -> bool {
        self.personal.is_none()
            && self.billing.is_none()
            && self.shipping.is_none()
            && self.book.addresses.is_empty()
            && self.payments.is_empty()
            && self.notifications.is_none()
            && self.privacy.is_none()
            && self.verification.is_none()
    }
}

#[derive(Debug, Default)]
struct StoreData {
    users: HashMap<UserId, UserRecords>,
    next_payment_id: i64,
    next_address_id: i64,
}

impl StoreData {
    fn user(&mut self, user_id: UserId) -> &mut UserRecords {
        self.users.entry(user_id).or_default()
    }

    fn existing(&self, user_id: UserId) -> Option<&UserRecords> {
        self.users.get(&user_id)
    }
}

/// Settings store kept entirely in memory.
///
/// Writes for a user the account directory does not know fail with
/// `RepositoryError::NotFound`, as the `account.user` foreign keys make them
/// fail in `PostgreSQL`.
pub struct MemorySettingsStore {
    data: Mutex<StoreData>,
    accounts: Arc<dyn AccountDirectory>,
    unavailable: AtomicBool,
}

fn unavailable_error() -> RepositoryError {
    RepositoryError::Database(sqlx::Error::PoolTimedOut)
}

impl MemorySettingsStore {
    #[must_use]
    pub fn new(accounts: Arc<dyn AccountDirectory>) -> Self {
        Self {
            data: Mutex::default(),
            accounts,
            unavailable: AtomicBool::new(false),
        }
    }

    /// Make every subsequent write fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Lock the dataset for a write on behalf of an existing account.
    async fn writable(&self, user_id: UserId) -> Result<MutexGuard<'_, StoreData>, RepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(unavailable_error());
        }
        let data = self.data.lock().await;
        self.accounts
            .find(user_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        Ok(data)
    }

    /// Whether any record at all is held for the user.
    pub async fn has_records(&self, user_id: UserId) -> bool {
        self.data
            .lock()
            .await
            .existing(user_id)
            .is_some_and(|r| !r.is_empty())
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn personal_data(&self, user_id: UserId) -> Result<Option<PersonalData>, RepositoryError> {
        let data = self.data.lock().await;
        Ok(data.existing(user_id).and_then(|r| r.personal.clone()))
    }

    async fn save_personal_data(
        &self,
        user_id: UserId,
        changes: PersonalDataChanges,
    ) -> Result<PersonalData, RepositoryError> {
        let mut data = self.writable(user_id).await?;
        let records = data.user(user_id);

        if changes.first_name.is_some() || changes.last_name.is_some() || changes.phone.is_some() {
            let billing = records.billing.get_or_insert_with(BillingAddress::default);
            if let Some(v) = &changes.first_name {
                billing.address.first_name.clone_from(v);
            }
            if let Some(v) = &changes.last_name {
                billing.address.last_name.clone_from(v);
            }
            if let Some(v) = &changes.phone {
                billing.phone.clone_from(v);
            }
        }
        if changes.first_name.is_some() || changes.last_name.is_some() {
            let shipping = records
                .shipping
                .get_or_insert_with(PrimaryShippingAddress::default);
            if let Some(v) = &changes.first_name {
                shipping.address.first_name.clone_from(v);
            }
            if let Some(v) = &changes.last_name {
                shipping.address.last_name.clone_from(v);
            }
        }

        let record = changes.apply(user_id, records.personal.take(), Utc::now());
        records.personal = Some(record.clone());
        Ok(record)
    }

    async fn billing_address(
        &self,
        user_id: UserId,
    ) -> Result<Option<BillingAddress>, RepositoryError> {
        let data = self.data.lock().await;
        Ok(data.existing(user_id).and_then(|r| r.billing.clone()))
    }

    async fn save_billing_address(
        &self,
        user_id: UserId,
        billing: &BillingAddress,
        email_change: BillingEmailChange,
    ) -> Result<(), RepositoryError> {
        let mut data = self.writable(user_id).await?;
        let records = data.user(user_id);
        records.billing = Some(billing.clone());
        match email_change {
            BillingEmailChange::Keep => {}
            BillingEmailChange::Replace(v) => records.verification = Some(v),
            BillingEmailChange::Remove => records.verification = None,
        }
        Ok(())
    }

    async fn pending_billing_email(
        &self,
        user_id: UserId,
    ) -> Result<Option<BillingEmailVerification>, RepositoryError> {
        let data = self.data.lock().await;
        Ok(data.existing(user_id).and_then(|r| r.verification.clone()))
    }

    async fn reject_billing_email(
        &self,
        user_id: UserId,
        token: &str,
    ) -> Result<Option<BillingEmailVerification>, RepositoryError> {
        let mut data = self.data.lock().await;
        let Some(records) = data.users.get_mut(&user_id) else {
            return Ok(None);
        };
        if !records.verification.as_ref().is_some_and(|v| v.matches(token)) {
            return Ok(None);
        }

        let consumed = records.verification.take();
        if let Some(billing) = records.billing.as_mut() {
            billing.alt_billing_email = None;
        }
        Ok(consumed)
    }

    async fn shipping_address(
        &self,
        user_id: UserId,
    ) -> Result<Option<PrimaryShippingAddress>, RepositoryError> {
        let data = self.data.lock().await;
        Ok(data.existing(user_id).and_then(|r| r.shipping.clone()))
    }

    async fn save_shipping_address(
        &self,
        user_id: UserId,
        shipping: &PrimaryShippingAddress,
    ) -> Result<(), RepositoryError> {
        let mut data = self.writable(user_id).await?;
        data.user(user_id).shipping = Some(shipping.clone());
        Ok(())
    }

    async fn shipping_address_book(
        &self,
        user_id: UserId,
    ) -> Result<ShippingAddressBook, RepositoryError> {
        let data = self.data.lock().await;
        Ok(data
            .existing(user_id)
            .map(|r| r.book.clone())
            .unwrap_or_default())
    }

    async fn add_additional_address(
        &self,
        user_id: UserId,
        address: NewShippingAddress,
        requested_default: bool,
    ) -> Result<ShippingAddress, RepositoryError> {
        let mut data = self.writable(user_id).await?;
        data.next_address_id += 1;
        let id = ShippingAddressId::new(data.next_address_id);
        let book = &mut data.user(user_id).book;

        let plan = selection::plan_add(
            SelectionPolicy::SHIPPING_ADDRESSES,
            &book.slots(),
            requested_default,
        );

        let now = Utc::now();
        let stored = ShippingAddress {
            id,
            user_id,
            label: address.label,
            address: address.address,
            is_company: address.is_company,
            created_at: now,
            updated_at: now,
        };
        book.addresses.push(stored.clone());
        if plan.new_is_default {
            book.default_id = Some(id);
        }
        Ok(stored)
    }

    async fn update_additional_address(
        &self,
        user_id: UserId,
        id: ShippingAddressId,
        fields: ShippingAddressFields,
    ) -> Result<ShippingAddress, RepositoryError> {
        let mut data = self.writable(user_id).await?;
        let address = data
            .users
            .get_mut(&user_id)
            .and_then(|r| r.book.addresses.iter_mut().find(|a| a.id == id))
            .ok_or(RepositoryError::NotFound)?;

        fields.apply_to(address);
        address.updated_at = Utc::now();
        Ok(address.clone())
    }

    async fn remove_additional_address(
        &self,
        user_id: UserId,
        id: ShippingAddressId,
    ) -> Result<RemovePlan<ShippingAddressId>, RepositoryError> {
        let mut data = self.writable(user_id).await?;
        let book = &mut data
            .users
            .get_mut(&user_id)
            .ok_or(RepositoryError::NotFound)?
            .book;

        let plan = selection::plan_remove(SelectionPolicy::SHIPPING_ADDRESSES, &book.slots(), id)?;
        book.addresses.retain(|a| a.id != id);
        if plan.was_default {
            book.default_id = plan.promote;
        }
        Ok(plan)
    }

    async fn set_default_additional_address(
        &self,
        user_id: UserId,
        id: ShippingAddressId,
    ) -> Result<(), RepositoryError> {
        let mut data = self.writable(user_id).await?;
        let book = &mut data
            .users
            .get_mut(&user_id)
            .ok_or(RepositoryError::NotFound)?
            .book;

        let plan = selection::plan_set_default(&book.slots(), id)?;
        book.default_id = Some(plan.set);
        Ok(())
    }

    async fn payment_methods(&self, user_id: UserId) -> Result<Vec<PaymentMethod>, RepositoryError> {
        let data = self.data.lock().await;
        Ok(data
            .existing(user_id)
            .map(|r| r.payments.clone())
            .unwrap_or_default())
    }

    async fn add_payment_method(
        &self,
        user_id: UserId,
        method: NewPaymentMethod,
        requested_default: bool,
    ) -> Result<PaymentMethod, RepositoryError> {
        let mut data = self.writable(user_id).await?;
        data.next_payment_id += 1;
        let id = PaymentMethodId::new(data.next_payment_id);
        let payments = &mut data.user(user_id).payments;

        let plan = selection::plan_add(
            SelectionPolicy::PAYMENT_METHODS,
            &slots_of(payments),
            requested_default,
        );
        clear_defaults(payments, &plan.clear);

        let now = Utc::now();
        let stored = PaymentMethod {
            id,
            user_id,
            method_type: method.method_type(),
            details: method.details,
            processor_token: method.processor_token,
            is_default: plan.new_is_default,
            created_at: now,
            updated_at: now,
        };
        payments.push(stored.clone());
        Ok(stored)
    }

    async fn set_default_payment_method(
        &self,
        user_id: UserId,
        id: PaymentMethodId,
    ) -> Result<(), RepositoryError> {
        let mut data = self.writable(user_id).await?;
        let payments = &mut data
            .users
            .get_mut(&user_id)
            .ok_or(RepositoryError::NotFound)?
            .payments;

        let plan = selection::plan_set_default(&slots_of(payments), id)?;
        clear_defaults(payments, &plan.clear);
        mark_default(payments, plan.set);
        Ok(())
    }

    async fn remove_payment_method(
        &self,
        user_id: UserId,
        id: PaymentMethodId,
    ) -> Result<RemovePlan<PaymentMethodId>, RepositoryError> {
        let mut data = self.writable(user_id).await?;
        let payments = &mut data
            .users
            .get_mut(&user_id)
            .ok_or(RepositoryError::NotFound)?
            .payments;

        let plan = selection::plan_remove(SelectionPolicy::PAYMENT_METHODS, &slots_of(payments), id)?;
        payments.retain(|p| p.id != id);
        if let Some(promoted) = plan.promote {
            mark_default(payments, promoted);
        }
        Ok(plan)
    }

    async fn notification_settings(
        &self,
        user_id: UserId,
    ) -> Result<Option<NotificationSettings>, RepositoryError> {
        let data = self.data.lock().await;
        Ok(data.existing(user_id).and_then(|r| r.notifications))
    }

    async fn save_notification_settings(
        &self,
        user_id: UserId,
        settings: NotificationSettings,
    ) -> Result<(), RepositoryError> {
        let mut data = self.writable(user_id).await?;
        data.user(user_id).notifications = Some(settings);
        Ok(())
    }

    async fn privacy_settings(
        &self,
        user_id: UserId,
    ) -> Result<Option<PrivacySettings>, RepositoryError> {
        let data = self.data.lock().await;
        Ok(data.existing(user_id).and_then(|r| r.privacy))
    }

    async fn save_privacy_settings(
        &self,
        user_id: UserId,
        settings: PrivacySettings,
    ) -> Result<(), RepositoryError> {
        let mut data = self.writable(user_id).await?;
        data.user(user_id).privacy = Some(settings);
        Ok(())
    }

    async fn delete_user_data(&self, user_id: UserId) -> Result<(), RepositoryError> {
        let mut data = self.data.lock().await;
        data.users.remove(&user_id);
        Ok(())
    }
}

// =============================================================================
// Account directory
// =============================================================================

#[derive(Debug, Clone)]
struct AccountEntry {
    account: Account,
    password_hash: String,
}

#[derive(Debug, Default)]
struct DirectoryData {
    accounts: HashMap<UserId, AccountEntry>,
    next_id: i64,
}

/// Account directory kept in memory.
#[derive(Debug, Default)]
pub struct MemoryAccountDirectory {
    data: Mutex<DirectoryData>,
    unavailable: AtomicBool,
}

impl MemoryAccountDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), RepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(unavailable_error());
        }
        Ok(())
    }
}

#[async_trait]
impl AccountDirectory for MemoryAccountDirectory {
    async fn find(&self, id: UserId) -> Result<Option<Account>, RepositoryError> {
        let data = self.data.lock().await;
        Ok(data.accounts.get(&id).map(|e| e.account.clone()))
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<Account>, RepositoryError> {
        let data = self.data.lock().await;
        Ok(data
            .accounts
            .values()
            .find(|e| e.account.email.same_address(email))
            .map(|e| e.account.clone()))
    }

    async fn password_hash(&self, id: UserId) -> Result<Option<String>, RepositoryError> {
        let data = self.data.lock().await;
        Ok(data.accounts.get(&id).map(|e| e.password_hash.clone()))
    }

    async fn email_taken(&self, email: &Email, except: UserId) -> Result<bool, RepositoryError> {
        let data = self.data.lock().await;
        Ok(data
            .accounts
            .values()
            .any(|e| e.account.id != except && e.account.email.same_address(email)))
    }

    async fn update_email(&self, id: UserId, email: &Email) -> Result<Account, RepositoryError> {
        self.check_available()?;
        let mut data = self.data.lock().await;
        if data
            .accounts
            .values()
            .any(|e| e.account.id != id && e.account.email.same_address(email))
        {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }
        let entry = data.accounts.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        entry.account.email = email.clone();
        entry.account.email_verified = false;
        Ok(entry.account.clone())
    }

    async fn create(
        &self,
        email: &Email,
        display_name: &str,
        password_hash: &str,
    ) -> Result<Account, RepositoryError> {
        self.check_available()?;
        let mut data = self.data.lock().await;
        if data
            .accounts
            .values()
            .any(|e| e.account.email.same_address(email))
        {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }
        data.next_id += 1;
        let account = Account {
            id: UserId::new(data.next_id),
            email: email.clone(),
            display_name: display_name.to_owned(),
            email_verified: false,
            created_at: Utc::now(),
        };
        data.accounts.insert(
            account.id,
            AccountEntry {
                account: account.clone(),
                password_hash: password_hash.to_owned(),
            },
        );
        Ok(account)
    }

    async fn delete(&self, id: UserId) -> Result<(), RepositoryError> {
        self.check_available()?;
        let mut data = self.data.lock().await;
        data.accounts
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}

// =============================================================================
// Order lookup
// =============================================================================

/// Order history kept in memory.
#[derive(Debug, Default)]
pub struct MemoryOrderLookup {
    orders: Mutex<Vec<Order>>,
}

impl MemoryOrderLookup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an order, as the order system would.
    pub async fn insert(&self, order: Order) {
        self.orders.lock().await.push(order);
    }

    /// Change the status of an existing order.
    pub async fn set_status(&self, number: &str, status: OrderStatus) {
        let mut orders = self.orders.lock().await;
        if let Some(order) = orders.iter_mut().find(|o| o.number == number) {
            order.status = status;
        }
    }
}

#[async_trait]
impl OrderLookup for MemoryOrderLookup {
    async fn has_open_orders(&self, user_id: UserId) -> Result<bool, RepositoryError> {
        let orders = self.orders.lock().await;
        Ok(orders
            .iter()
            .any(|o| o.user_id == user_id && o.status.is_open()))
    }

    async fn orders_for(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.lock().await;
        let mut mine: Vec<Order> = orders
            .iter()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(mine)
    }
}
