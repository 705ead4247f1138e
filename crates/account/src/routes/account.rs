//! Account settings route handlers.
//!
//! Thin JSON adapters over [`SettingsService`](crate::services::settings::SettingsService):
//! each handler takes the session user, calls one operation and wraps the
//! result in the response envelope.

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use secrecy::SecretString;
use serde::Deserialize;
use tower_sessions::Session;

use account_settings_core::payment::PaymentMethodForm;
use account_settings_core::{
    NotificationSettings, PaymentMethod, PaymentMethodId, PrimaryShippingAddress, PrivacySettings,
    ShippingAddress, ShippingAddressFields, ShippingAddressId, UserId,
};

use crate::error::{AppError, Envelope, Result, clear_sentry_user};
use crate::middleware::{OptionalAuth, RequireAuth, end_session};
use crate::routes::ApiJson;
use crate::services::settings::{
    AdditionalAddressForm, BillingAddressForm, BillingView, DeleteAccountForm,
    NotificationSettingsForm, PersonalDataForm, PersonalOutcome, PrivacySettingsForm,
    SettingsError, SettingsOverview, ShippingAddressForm,
};
use crate::state::AppState;

/// Settings overview.
///
/// GET /api/account
pub async fn overview(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Envelope<SettingsOverview>> {
    let overview = state.settings().overview(user.id).await?;
    Ok(Envelope::ok("", overview))
}

// =============================================================================
// Personal data
// =============================================================================

/// Save personal data. A changed login email ends the session.
///
/// POST /api/account/personal
pub async fn save_personal_data(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    ApiJson(form): ApiJson<PersonalDataForm>,
) -> Result<Envelope<PersonalOutcome>> {
    let outcome = state.settings().save_personal_data(user.id, form).await?;

    if outcome.logout_required {
        end_session(&session).await?;
        clear_sentry_user();
        return Ok(Envelope::ok(
            "Your email address was changed. Please log in again with the new address.",
            outcome,
        )
        .with_logout(true));
    }

    Ok(Envelope::ok("Your personal data was saved.", outcome))
}

// =============================================================================
// Billing
// =============================================================================

/// Save the billing address.
///
/// POST /api/account/billing
pub async fn save_billing_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(form): ApiJson<BillingAddressForm>,
) -> Result<Envelope<BillingView>> {
    let outcome = state.settings().save_billing_address(user.id, form).await?;
    Ok(Envelope::ok("Your billing address was saved.", outcome.view).with_warning(outcome.warning))
}

/// Query of the reject link sent to an alternate billing email.
#[derive(Debug, Deserialize)]
pub struct RejectQuery {
    pub token: Option<String>,
    pub user_id: Option<String>,
}

/// Reject being the billing email address of an account. No session needed.
///
/// GET /api/account/billing-email/reject?token=...&user_id=...
pub async fn reject_billing_email(
    State(state): State<AppState>,
    Query(query): Query<RejectQuery>,
) -> Result<Envelope<()>> {
    let user_id = query
        .user_id
        .as_deref()
        .and_then(|id| id.parse::<UserId>().ok())
        .ok_or(SettingsError::NotFound)?;
    let token = query.token.unwrap_or_default();

    state
        .settings()
        .reject_alternate_billing_email(user_id, token.trim())
        .await?;

    Ok(Envelope::message(
        "The billing email address was removed. Invoices go to the account holder again.",
    ))
}

// =============================================================================
// Shipping
// =============================================================================

/// Save the primary shipping address.
///
/// POST /api/account/shipping
pub async fn save_shipping_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(form): ApiJson<ShippingAddressForm>,
) -> Result<Envelope<PrimaryShippingAddress>> {
    let shipping = state.settings().save_shipping_address(user.id, form).await?;
    Ok(Envelope::ok("Your shipping address was saved.", shipping))
}

/// Add an additional shipping address.
///
/// POST /api/account/shipping/addresses
pub async fn add_shipping_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(form): ApiJson<AdditionalAddressForm>,
) -> Result<Envelope<ShippingAddress>> {
    let address = state.settings().add_shipping_address(user.id, form).await?;
    Ok(Envelope::ok("The address was added.", address))
}

/// Edit an additional shipping address.
///
/// PUT /api/account/shipping/addresses/{id}
pub async fn edit_shipping_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<ShippingAddressId>,
    ApiJson(fields): ApiJson<ShippingAddressFields>,
) -> Result<Envelope<ShippingAddress>> {
    let address = state
        .settings()
        .edit_shipping_address(user.id, id, fields)
        .await?;
    Ok(Envelope::ok("The address was updated.", address))
}

/// Delete an additional shipping address.
///
/// DELETE /api/account/shipping/addresses/{id}
pub async fn delete_shipping_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<ShippingAddressId>,
) -> Result<Envelope<()>> {
    state.settings().delete_shipping_address(user.id, id).await?;
    Ok(Envelope::message("The address was deleted."))
}

/// Make an additional shipping address the default.
///
/// POST /api/account/shipping/addresses/{id}/default
pub async fn set_default_shipping_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<ShippingAddressId>,
) -> Result<Envelope<()>> {
    state
        .settings()
        .set_default_shipping_address(user.id, id)
        .await?;
    Ok(Envelope::message("The default address was changed."))
}

// =============================================================================
// Payment methods
// =============================================================================

/// Add a payment method.
///
/// POST /api/account/payment-methods
pub async fn save_payment_method(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(form): ApiJson<PaymentMethodForm>,
) -> Result<Envelope<PaymentMethod>> {
    let method = state.settings().save_payment_method(user.id, form).await?;
    Ok(Envelope::ok("The payment method was saved.", method))
}

/// Delete a payment method.
///
/// DELETE /api/account/payment-methods/{id}
pub async fn delete_payment_method(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<PaymentMethodId>,
) -> Result<Envelope<()>> {
    state.settings().delete_payment_method(user.id, id).await?;
    Ok(Envelope::message("The payment method was deleted."))
}

/// Make a payment method the default.
///
/// POST /api/account/payment-methods/{id}/default
pub async fn set_default_payment_method(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<PaymentMethodId>,
) -> Result<Envelope<()>> {
    state
        .settings()
        .set_default_payment_method(user.id, id)
        .await?;
    Ok(Envelope::message("The default payment method was changed."))
}

// =============================================================================
// Preferences
// =============================================================================

/// POST /api/account/notifications
pub async fn save_notification_settings(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(form): ApiJson<NotificationSettingsForm>,
) -> Result<Envelope<NotificationSettings>> {
    let settings = state
        .settings()
        .save_notification_settings(user.id, form)
        .await?;
    Ok(Envelope::ok("Your notification settings were saved.", settings))
}

/// POST /api/account/privacy
pub async fn save_privacy_settings(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(form): ApiJson<PrivacySettingsForm>,
) -> Result<Envelope<PrivacySettings>> {
    let settings = state.settings().save_privacy_settings(user.id, form).await?;
    Ok(Envelope::ok("Your privacy settings were saved.", settings))
}

// =============================================================================
// Deletion and export
// =============================================================================

/// Delete the account after password confirmation.
///
/// POST /api/account/delete
pub async fn request_account_deletion(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    ApiJson(form): ApiJson<DeleteAccountForm>,
) -> Result<Envelope<()>> {
    let password = SecretString::from(form.password);
    state
        .settings()
        .request_account_deletion(user.map(|u| u.id), &password)
        .await?;

    end_session(&session).await?;
    clear_sentry_user();
    Ok(Envelope::message("Your account was deleted.").with_logout(true))
}

/// Download everything stored about the user as a JSON attachment.
///
/// GET /api/account/export
pub async fn export_user_data(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Response> {
    let export = state.settings().export_user_data(user.id).await?;
    let body = serde_json::to_vec_pretty(&export.document)
        .map_err(|e| AppError::Internal(format!("export serialization: {e}")))?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_owned()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", export.filename),
            ),
        ],
        body,
    )
        .into_response())
}
