//! `PostgreSQL` settings store.
//!
//! Queries are checked at runtime. Every multi-step change first locks the
//! owning `account.user` row, so concurrent requests for one user serialize
//! even while the user's collection is still empty.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use account_settings_core::payment::{PaymentDetails, PaymentMethodType};
use account_settings_core::selection::{self, RemovePlan, SelectionPolicy, Slot};
use account_settings_core::{
    BillingAddress, Email, NewPaymentMethod, NewShippingAddress, NotificationSettings,
    PaymentMethod, PaymentMethodId, PersonalData, PersonalDataChanges, PostalAddress,
    PrimaryShippingAddress, PrivacySettings, ShippingAddress, ShippingAddressBook,
    ShippingAddressFields, ShippingAddressId, UserId,
};

use super::{RepositoryError, SettingsStore};
use crate::models::{BillingEmailChange, BillingEmailVerification};

const ADDITIONAL_ADDRESS_COLUMNS: &str = "id, user_id, label, first_name, last_name, company, \
     address_1, address_2, postcode, city, country, is_company, created_at, updated_at";

const PAYMENT_METHOD_COLUMNS: &str =
    "id, user_id, method_type, details, processor_token, is_default, created_at, updated_at";

/// Settings store backed by the `account` schema.
#[derive(Clone)]
pub struct PgSettingsStore {
    pool: PgPool,
}

impl PgSettingsStore {
    /// Create a new store over a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// =============================================================================
// Row types
// =============================================================================

#[derive(sqlx::FromRow)]
struct PersonalRow {
    user_id: UserId,
    first_name: Option<String>,
    last_name: Option<String>,
    birthdate: Option<NaiveDate>,
    phone: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PersonalRow> for PersonalData {
    fn from(r: PersonalRow) -> Self {
        Self {
            user_id: r.user_id,
            first_name: r.first_name,
            last_name: r.last_name,
            birthdate: r.birthdate,
            phone: r.phone,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BillingRow {
    first_name: String,
    last_name: String,
    company: String,
    vat_id: String,
    address_1: String,
    address_2: String,
    postcode: String,
    city: String,
    country: String,
    phone: String,
    is_company: bool,
    alt_billing_email: Option<String>,
}

impl TryFrom<BillingRow> for BillingAddress {
    type Error = RepositoryError;

    fn try_from(r: BillingRow) -> Result<Self, Self::Error> {
        let alt_billing_email = r
            .alt_billing_email
            .as_deref()
            .map(parse_stored_email)
            .transpose()?;
        Ok(Self {
            address: PostalAddress {
                first_name: r.first_name,
                last_name: r.last_name,
                company: r.company,
                address_1: r.address_1,
                address_2: r.address_2,
                postcode: r.postcode,
                city: r.city,
                country: r.country,
            },
            vat_id: r.vat_id,
            phone: r.phone,
            is_company: r.is_company,
            alt_billing_email,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ShippingRow {
    first_name: String,
    last_name: String,
    company: String,
    address_1: String,
    address_2: String,
    postcode: String,
    city: String,
    country: String,
    is_company: bool,
}

impl From<ShippingRow> for PrimaryShippingAddress {
    fn from(r: ShippingRow) -> Self {
        Self {
            address: PostalAddress {
                first_name: r.first_name,
                last_name: r.last_name,
                company: r.company,
                address_1: r.address_1,
                address_2: r.address_2,
                postcode: r.postcode,
                city: r.city,
                country: r.country,
            },
            is_company: r.is_company,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AdditionalAddressRow {
    id: ShippingAddressId,
    user_id: UserId,
    label: String,
    first_name: String,
    last_name: String,
    company: String,
    address_1: String,
    address_2: String,
    postcode: String,
    city: String,
    country: String,
    is_company: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AdditionalAddressRow> for ShippingAddress {
    fn from(r: AdditionalAddressRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            label: r.label,
            address: PostalAddress {
                first_name: r.first_name,
                last_name: r.last_name,
                company: r.company,
                address_1: r.address_1,
                address_2: r.address_2,
                postcode: r.postcode,
                city: r.city,
                country: r.country,
            },
            is_company: r.is_company,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PaymentMethodRow {
    id: PaymentMethodId,
    user_id: UserId,
    method_type: String,
    details: Json<PaymentDetails>,
    processor_token: String,
    is_default: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentMethodRow> for PaymentMethod {
    type Error = RepositoryError;

    fn try_from(r: PaymentMethodRow) -> Result<Self, Self::Error> {
        let method_type: PaymentMethodType = r.method_type.parse().map_err(|_| {
            RepositoryError::DataCorruption(format!("unknown payment method type: {}", r.method_type))
        })?;
        let details = r.details.0;
        if details.method_type() != method_type {
            return Err(RepositoryError::DataCorruption(format!(
                "payment method {} has {} details but type {method_type}",
                r.id,
                details.method_type()
            )));
        }
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            method_type,
            details,
            processor_token: r.processor_token,
            is_default: r.is_default,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SlotRow<Id> {
    id: Id,
    is_default: bool,
    created_at: DateTime<Utc>,
}

impl<Id> From<SlotRow<Id>> for Slot<Id> {
    fn from(r: SlotRow<Id>) -> Self {
        Self {
            id: r.id,
            is_default: r.is_default,
            created_at: r.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
#[allow(clippy::struct_excessive_bools)]
struct NotificationRow {
    email_orders: bool,
    email_marketing: bool,
    email_news: bool,
    sms_orders: bool,
    sms_marketing: bool,
}

#[derive(sqlx::FromRow)]
#[allow(clippy::struct_excessive_bools)]
struct PrivacyRow {
    data_sharing: bool,
    data_collection: bool,
    personalized_ads: bool,
    preferences_analysis: bool,
}

#[derive(sqlx::FromRow)]
struct VerificationRow {
    user_id: UserId,
    pending_alt_email: String,
    token: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<VerificationRow> for BillingEmailVerification {
    type Error = RepositoryError;

    fn try_from(r: VerificationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: r.user_id,
            pending_alt_email: parse_stored_email(&r.pending_alt_email)?,
            token: r.token,
            created_at: r.created_at,
        })
    }
}

fn parse_stored_email(value: &str) -> Result<Email, RepositoryError> {
    Email::parse(value)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid email in database: {e}")))
}

// =============================================================================
// Transaction helpers
// =============================================================================

/// Take the per-user lock for the rest of the transaction.
async fn lock_user(conn: &mut PgConnection, user_id: UserId) -> Result<(), RepositoryError> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM account.user WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(RepositoryError::NotFound)?;
    Ok(())
}

async fn payment_slots(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<Vec<Slot<PaymentMethodId>>, RepositoryError> {
    let rows = sqlx::query_as::<_, SlotRow<PaymentMethodId>>(
        r"
        SELECT id, is_default, created_at
        FROM account.payment_methods
        WHERE user_id = $1
        ORDER BY created_at, id
        ",
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().map(Slot::from).collect())
}

async fn address_slots(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<Vec<Slot<ShippingAddressId>>, RepositoryError> {
    let rows = sqlx::query_as::<_, SlotRow<ShippingAddressId>>(
        r"
        SELECT a.id, (d.address_id IS NOT NULL) AS is_default, a.created_at
        FROM account.additional_address a
        LEFT JOIN account.default_shipping_address d
               ON d.user_id = a.user_id AND d.address_id = a.id
        WHERE a.user_id = $1
        ORDER BY a.created_at, a.id
        ",
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().map(Slot::from).collect())
}

async fn clear_payment_defaults(
    conn: &mut PgConnection,
    user_id: UserId,
    ids: &[PaymentMethodId],
) -> Result<(), RepositoryError> {
    if ids.is_empty() {
        return Ok(());
    }
    let ids: Vec<i64> = ids.iter().map(|id| id.as_i64()).collect();
    sqlx::query(
        r"
        UPDATE account.payment_methods
        SET is_default = FALSE, updated_at = now()
        WHERE user_id = $1 AND id = ANY($2)
        ",
    )
    .bind(user_id)
    .bind(&ids)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn mark_payment_default(
    conn: &mut PgConnection,
    user_id: UserId,
    id: PaymentMethodId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE account.payment_methods
        SET is_default = TRUE, updated_at = now()
        WHERE user_id = $1 AND id = $2
        ",
    )
    .bind(user_id)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn point_default_address(
    conn: &mut PgConnection,
    user_id: UserId,
    id: ShippingAddressId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO account.default_shipping_address (user_id, address_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id) DO UPDATE SET address_id = EXCLUDED.address_id
        ",
    )
    .bind(user_id)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

// =============================================================================
// SettingsStore
// =============================================================================

#[async_trait]
impl SettingsStore for PgSettingsStore {
    async fn personal_data(&self, user_id: UserId) -> Result<Option<PersonalData>, RepositoryError> {
        let row = sqlx::query_as::<_, PersonalRow>(
            r"
            SELECT user_id, first_name, last_name, birthdate, phone, created_at, updated_at
            FROM account.personal_data
            WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(PersonalData::from))
    }

    async fn save_personal_data(
        &self,
        user_id: UserId,
        changes: PersonalDataChanges,
    ) -> Result<PersonalData, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let first_name = changes.first_name.clone();
        let last_name = changes.last_name.clone();
        let phone = changes.phone.clone();

        let row = sqlx::query_as::<_, PersonalRow>(
            r"
            INSERT INTO account.personal_data (user_id, first_name, last_name, birthdate, phone)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id) DO UPDATE SET
                first_name = COALESCE(EXCLUDED.first_name, account.personal_data.first_name),
                last_name  = COALESCE(EXCLUDED.last_name, account.personal_data.last_name),
                birthdate  = COALESCE(EXCLUDED.birthdate, account.personal_data.birthdate),
                phone      = COALESCE(EXCLUDED.phone, account.personal_data.phone),
                updated_at = now()
            RETURNING user_id, first_name, last_name, birthdate, phone, created_at, updated_at
            ",
        )
        .bind(user_id)
        .bind(changes.first_name)
        .bind(changes.last_name)
        .bind(changes.birthdate)
        .bind(changes.phone)
        .fetch_one(&mut *tx)
        .await?;

        if first_name.is_some() || last_name.is_some() || phone.is_some() {
            sqlx::query(
                r"
                INSERT INTO account.billing_address (user_id, first_name, last_name, phone)
                VALUES ($1, COALESCE($2, ''), COALESCE($3, ''), COALESCE($4, ''))
                ON CONFLICT (user_id) DO UPDATE SET
                    first_name = COALESCE($2, account.billing_address.first_name),
                    last_name  = COALESCE($3, account.billing_address.last_name),
                    phone      = COALESCE($4, account.billing_address.phone),
                    updated_at = now()
                ",
            )
            .bind(user_id)
            .bind(&first_name)
            .bind(&last_name)
            .bind(&phone)
            .execute(&mut *tx)
            .await?;
        }

        if first_name.is_some() || last_name.is_some() {
            sqlx::query(
                r"
                INSERT INTO account.shipping_address (user_id, first_name, last_name)
                VALUES ($1, COALESCE($2, ''), COALESCE($3, ''))
                ON CONFLICT (user_id) DO UPDATE SET
                    first_name = COALESCE($2, account.shipping_address.first_name),
                    last_name  = COALESCE($3, account.shipping_address.last_name),
                    updated_at = now()
                ",
            )
            .bind(user_id)
            .bind(&first_name)
            .bind(&last_name)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(row.into())
    }

    async fn billing_address(
        &self,
        user_id: UserId,
    ) -> Result<Option<BillingAddress>, RepositoryError> {
        let row = sqlx::query_as::<_, BillingRow>(
            r"
            SELECT first_name, last_name, company, vat_id, address_1, address_2,
                   postcode, city, country, phone, is_company, alt_billing_email
            FROM account.billing_address
            WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(BillingAddress::try_from).transpose()
    }

    async fn save_billing_address(
        &self,
        user_id: UserId,
        billing: &BillingAddress,
        email_change: BillingEmailChange,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let a = &billing.address;

        sqlx::query(
            r"
            INSERT INTO account.billing_address (
                user_id, first_name, last_name, company, vat_id, address_1, address_2,
                postcode, city, country, phone, is_company, alt_billing_email
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (user_id) DO UPDATE SET
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                company = EXCLUDED.company,
                vat_id = EXCLUDED.vat_id,
                address_1 = EXCLUDED.address_1,
                address_2 = EXCLUDED.address_2,
                postcode = EXCLUDED.postcode,
                city = EXCLUDED.city,
                country = EXCLUDED.country,
                phone = EXCLUDED.phone,
                is_company = EXCLUDED.is_company,
                alt_billing_email = EXCLUDED.alt_billing_email,
                updated_at = now()
            ",
        )
        .bind(user_id)
        .bind(&a.first_name)
        .bind(&a.last_name)
        .bind(&a.company)
        .bind(&billing.vat_id)
        .bind(&a.address_1)
        .bind(&a.address_2)
        .bind(&a.postcode)
        .bind(&a.city)
        .bind(&a.country)
        .bind(&billing.phone)
        .bind(billing.is_company)
        .bind(billing.alt_billing_email.as_ref().map(Email::as_str))
        .execute(&mut *tx)
        .await?;

        match email_change {
            BillingEmailChange::Keep => {}
            BillingEmailChange::Replace(v) => {
                sqlx::query(
                    r"
                    INSERT INTO account.billing_email_verification
                        (user_id, pending_alt_email, token, created_at)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (user_id) DO UPDATE SET
                        pending_alt_email = EXCLUDED.pending_alt_email,
                        token = EXCLUDED.token,
                        created_at = EXCLUDED.created_at
                    ",
                )
                .bind(user_id)
                .bind(v.pending_alt_email.as_str())
                .bind(&v.token)
                .bind(v.created_at)
                .execute(&mut *tx)
                .await?;
            }
            BillingEmailChange::Remove => {
                sqlx::query("DELETE FROM account.billing_email_verification WHERE user_id = $1")
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn pending_billing_email(
        &self,
        user_id: UserId,
    ) -> Result<Option<BillingEmailVerification>, RepositoryError> {
        let row = sqlx::query_as::<_, VerificationRow>(
            r"
            SELECT user_id, pending_alt_email, token, created_at
            FROM account.billing_email_verification
            WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(BillingEmailVerification::try_from).transpose()
    }

    async fn reject_billing_email(
        &self,
        user_id: UserId,
        token: &str,
    ) -> Result<Option<BillingEmailVerification>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, VerificationRow>(
            r"
            SELECT user_id, pending_alt_email, token, created_at
            FROM account.billing_email_verification
            WHERE user_id = $1
            FOR UPDATE
            ",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(verification) = row.map(BillingEmailVerification::try_from).transpose()? else {
            return Ok(None);
        };
        if !verification.matches(token) {
            return Ok(None);
        }

        sqlx::query("DELETE FROM account.billing_email_verification WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            r"
            UPDATE account.billing_address
            SET alt_billing_email = NULL, updated_at = now()
            WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(verification))
    }

    async fn shipping_address(
        &self,
        user_id: UserId,
    ) -> Result<Option<PrimaryShippingAddress>, RepositoryError> {
        let row = sqlx::query_as::<_, ShippingRow>(
            r"
            SELECT first_name, last_name, company, address_1, address_2,
                   postcode, city, country, is_company
            FROM account.shipping_address
            WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(PrimaryShippingAddress::from))
    }

    async fn save_shipping_address(
        &self,
        user_id: UserId,
        shipping: &PrimaryShippingAddress,
    ) -> Result<(), RepositoryError> {
        let a = &shipping.address;
        sqlx::query(
            r"
            INSERT INTO account.shipping_address (
                user_id, first_name, last_name, company, address_1, address_2,
                postcode, city, country, is_company
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (user_id) DO UPDATE SET
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                company = EXCLUDED.company,
                address_1 = EXCLUDED.address_1,
                address_2 = EXCLUDED.address_2,
                postcode = EXCLUDED.postcode,
                city = EXCLUDED.city,
                country = EXCLUDED.country,
                is_company = EXCLUDED.is_company,
                updated_at = now()
            ",
        )
        .bind(user_id)
        .bind(&a.first_name)
        .bind(&a.last_name)
        .bind(&a.company)
        .bind(&a.address_1)
        .bind(&a.address_2)
        .bind(&a.postcode)
        .bind(&a.city)
        .bind(&a.country)
        .bind(shipping.is_company)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn shipping_address_book(
        &self,
        user_id: UserId,
    ) -> Result<ShippingAddressBook, RepositoryError> {
        let rows = sqlx::query_as::<_, AdditionalAddressRow>(&format!(
            "SELECT {ADDITIONAL_ADDRESS_COLUMNS} FROM account.additional_address \
             WHERE user_id = $1 ORDER BY created_at, id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let default_id = sqlx::query_scalar::<_, ShippingAddressId>(
            "SELECT address_id FROM account.default_shipping_address WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(ShippingAddressBook {
            addresses: rows.into_iter().map(ShippingAddress::from).collect(),
            default_id,
        })
    }

    async fn add_additional_address(
        &self,
        user_id: UserId,
        address: NewShippingAddress,
        requested_default: bool,
    ) -> Result<ShippingAddress, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_user(&mut tx, user_id).await?;

        let slots = address_slots(&mut tx, user_id).await?;
        let plan = selection::plan_add(SelectionPolicy::SHIPPING_ADDRESSES, &slots, requested_default);

        let a = &address.address;
        let row = sqlx::query_as::<_, AdditionalAddressRow>(&format!(
            "INSERT INTO account.additional_address (
                user_id, label, first_name, last_name, company, address_1, address_2,
                postcode, city, country, is_company
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {ADDITIONAL_ADDRESS_COLUMNS}"
        ))
        .bind(user_id)
        .bind(&address.label)
        .bind(&a.first_name)
        .bind(&a.last_name)
        .bind(&a.company)
        .bind(&a.address_1)
        .bind(&a.address_2)
        .bind(&a.postcode)
        .bind(&a.city)
        .bind(&a.country)
        .bind(address.is_company)
        .fetch_one(&mut *tx)
        .await?;

        // The reference row holds a single id, so re-pointing it clears the old default.
        if plan.new_is_default {
            point_default_address(&mut tx, user_id, row.id).await?;
        }

        tx.commit().await?;
        Ok(row.into())
    }

    async fn update_additional_address(
        &self,
        user_id: UserId,
        id: ShippingAddressId,
        fields: ShippingAddressFields,
    ) -> Result<ShippingAddress, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, AdditionalAddressRow>(&format!(
            "SELECT {ADDITIONAL_ADDRESS_COLUMNS} FROM account.additional_address \
             WHERE id = $1 AND user_id = $2 FOR UPDATE"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let mut address = ShippingAddress::from(row);
        fields.apply_to(&mut address);
        let a = &address.address;

        let row = sqlx::query_as::<_, AdditionalAddressRow>(&format!(
            "UPDATE account.additional_address SET
                label = $3, first_name = $4, last_name = $5, company = $6,
                address_1 = $7, address_2 = $8, postcode = $9, city = $10,
                country = $11, is_company = $12, updated_at = now()
            WHERE id = $1 AND user_id = $2
            RETURNING {ADDITIONAL_ADDRESS_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .bind(&address.label)
        .bind(&a.first_name)
        .bind(&a.last_name)
        .bind(&a.company)
        .bind(&a.address_1)
        .bind(&a.address_2)
        .bind(&a.postcode)
        .bind(&a.city)
        .bind(&a.country)
        .bind(address.is_company)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn remove_additional_address(
        &self,
        user_id: UserId,
        id: ShippingAddressId,
    ) -> Result<RemovePlan<ShippingAddressId>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_user(&mut tx, user_id).await?;

        let slots = address_slots(&mut tx, user_id).await?;
        let plan = selection::plan_remove(SelectionPolicy::SHIPPING_ADDRESSES, &slots, id)?;

        // Deleting the address cascades to its default reference.
        sqlx::query("DELETE FROM account.additional_address WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        if let Some(promoted) = plan.promote {
            point_default_address(&mut tx, user_id, promoted).await?;
        }

        tx.commit().await?;
        Ok(plan)
    }

    async fn set_default_additional_address(
        &self,
        user_id: UserId,
        id: ShippingAddressId,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_user(&mut tx, user_id).await?;

        let slots = address_slots(&mut tx, user_id).await?;
        let plan = selection::plan_set_default(&slots, id)?;
        point_default_address(&mut tx, user_id, plan.set).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn payment_methods(&self, user_id: UserId) -> Result<Vec<PaymentMethod>, RepositoryError> {
        let rows = sqlx::query_as::<_, PaymentMethodRow>(&format!(
            "SELECT {PAYMENT_METHOD_COLUMNS} FROM account.payment_methods \
             WHERE user_id = $1 ORDER BY created_at, id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(PaymentMethod::try_from).collect()
    }

    async fn add_payment_method(
        &self,
        user_id: UserId,
        method: NewPaymentMethod,
        requested_default: bool,
    ) -> Result<PaymentMethod, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_user(&mut tx, user_id).await?;

        let slots = payment_slots(&mut tx, user_id).await?;
        let plan = selection::plan_add(SelectionPolicy::PAYMENT_METHODS, &slots, requested_default);
        clear_payment_defaults(&mut tx, user_id, &plan.clear).await?;

        let row = sqlx::query_as::<_, PaymentMethodRow>(&format!(
            "INSERT INTO account.payment_methods
                (user_id, method_type, details, processor_token, is_default)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {PAYMENT_METHOD_COLUMNS}"
        ))
        .bind(user_id)
        .bind(method.method_type().as_str())
        .bind(Json(&method.details))
        .bind(&method.processor_token)
        .bind(plan.new_is_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        PaymentMethod::try_from(row)
    }

    async fn set_default_payment_method(
        &self,
        user_id: UserId,
        id: PaymentMethodId,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_user(&mut tx, user_id).await?;

        let slots = payment_slots(&mut tx, user_id).await?;
        let plan = selection::plan_set_default(&slots, id)?;
        clear_payment_defaults(&mut tx, user_id, &plan.clear).await?;
        mark_payment_default(&mut tx, user_id, plan.set).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn remove_payment_method(
        &self,
        user_id: UserId,
        id: PaymentMethodId,
    ) -> Result<RemovePlan<PaymentMethodId>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_user(&mut tx, user_id).await?;

        let slots = payment_slots(&mut tx, user_id).await?;
        let plan = selection::plan_remove(SelectionPolicy::PAYMENT_METHODS, &slots, id)?;

        sqlx::query("DELETE FROM account.payment_methods WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        if let Some(promoted) = plan.promote {
            mark_payment_default(&mut tx, user_id, promoted).await?;
        }

        tx.commit().await?;
        Ok(plan)
    }

    async fn notification_settings(
        &self,
        user_id: UserId,
    ) -> Result<Option<NotificationSettings>, RepositoryError> {
        let row = sqlx::query_as::<_, NotificationRow>(
            r"
            SELECT email_orders, email_marketing, email_news, sms_orders, sms_marketing
            FROM account.notification_settings
            WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| NotificationSettings {
            email_orders: r.email_orders,
            email_marketing: r.email_marketing,
            email_news: r.email_news,
            sms_orders: r.sms_orders,
            sms_marketing: r.sms_marketing,
        }))
    }

    async fn save_notification_settings(
        &self,
        user_id: UserId,
        settings: NotificationSettings,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO account.notification_settings
                (user_id, email_orders, email_marketing, email_news, sms_orders, sms_marketing)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id) DO UPDATE SET
                email_orders = EXCLUDED.email_orders,
                email_marketing = EXCLUDED.email_marketing,
                email_news = EXCLUDED.email_news,
                sms_orders = EXCLUDED.sms_orders,
                sms_marketing = EXCLUDED.sms_marketing,
                updated_at = now()
            ",
        )
        .bind(user_id)
        .bind(settings.email_orders)
        .bind(settings.email_marketing)
        .bind(settings.email_news)
        .bind(settings.sms_orders)
        .bind(settings.sms_marketing)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn privacy_settings(
        &self,
        user_id: UserId,
    ) -> Result<Option<PrivacySettings>, RepositoryError> {
        let row = sqlx::query_as::<_, PrivacyRow>(
            r"
            SELECT data_sharing, data_collection, personalized_ads, preferences_analysis
            FROM account.privacy_settings
            WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| PrivacySettings {
            data_sharing: r.data_sharing,
            data_collection: r.data_collection,
            personalized_ads: r.personalized_ads,
            preferences_analysis: r.preferences_analysis,
        }))
    }

    async fn save_privacy_settings(
        &self,
        user_id: UserId,
        settings: PrivacySettings,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO account.privacy_settings
                (user_id, data_sharing, data_collection, personalized_ads, preferences_analysis)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id) DO UPDATE SET
                data_sharing = EXCLUDED.data_sharing,
                data_collection = EXCLUDED.data_collection,
                personalized_ads = EXCLUDED.personalized_ads,
                preferences_analysis = EXCLUDED.preferences_analysis,
                updated_at = now()
            ",
        )
        .bind(user_id)
        .bind(settings.data_sharing)
        .bind(settings.data_collection)
        .bind(settings.personalized_ads)
        .bind(settings.preferences_analysis)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_user_data(&self, user_id: UserId) -> Result<(), RepositoryError> {
        const TABLES: [&str; 9] = [
            "account.billing_email_verification",
            "account.default_shipping_address",
            "account.additional_address",
            "account.shipping_address",
            "account.billing_address",
            "account.payment_methods",
            "account.privacy_settings",
            "account.notification_settings",
            "account.personal_data",
        ];

        let mut tx = self.pool.begin().await?;
        for table in TABLES {
            sqlx::query(&format!("DELETE FROM {table} WHERE user_id = $1"))
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        tracing::debug!(user_id = %user_id, "Per-user settings rows deleted");
        Ok(())
    }
}
