//! Service-level flows across the settings tabs.
//!
//! These run against the in-memory collaborators and need no database.
//!
//! Run with: cargo test -p account-settings-integration-tests --test settings_flows

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use account_settings::db::SettingsStore;
use account_settings::services::SettingsError;
use account_settings::services::settings::{
    AdditionalAddressForm, BillingAddressForm, NotificationSettingsForm, PersonalDataForm,
    PostalAddressForm, ShippingAddressForm,
};
use account_settings_core::payment::{PaymentMethodForm, PaymentMethodType};
use account_settings_core::{
    NotificationSettings, OrderStatus, PaymentMethod, PrivacySettings, ShippingAddressFields,
};
use account_settings_integration_tests::{
    BASE_URL, CUSTOMER_EMAIL, CUSTOMER_PASSWORD, OPERATOR_EMAIL, TestContext, password,
};

fn paypal(email: &str, set_default: bool) -> PaymentMethodForm {
    PaymentMethodForm {
        method_type: "paypal".to_owned(),
        paypal_email: Some(email.to_owned()),
        set_default,
        ..PaymentMethodForm::default()
    }
}

fn visa() -> PaymentMethodForm {
    PaymentMethodForm {
        method_type: "card".to_owned(),
        card_number: Some("4111 1111 1111 1111".to_owned()),
        card_name: Some("Erika Mustermann".to_owned()),
        card_expiry: Some("12/29".to_owned()),
        card_cvv: Some("123".to_owned()),
        ..PaymentMethodForm::default()
    }
}

fn labelled(label: &str, set_default: bool) -> AdditionalAddressForm {
    AdditionalAddressForm {
        fields: ShippingAddressFields {
            label: Some(label.to_owned()),
            first_name: Some("Erika".to_owned()),
            last_name: Some("Mustermann".to_owned()),
            city: Some("Berlin".to_owned()),
            ..ShippingAddressFields::default()
        },
        set_default,
    }
}

/// Give the test customer a payment method, an address and saved preferences.
async fn seed_records(ctx: &TestContext) {
    ctx.service
        .save_payment_method(ctx.user, visa())
        .await
        .unwrap();
    ctx.service
        .add_shipping_address(ctx.user, labelled("Büro", true))
        .await
        .unwrap();
    ctx.service
        .save_notification_settings(
            ctx.user,
            NotificationSettingsForm {
                email_orders: true,
                ..NotificationSettingsForm::default()
            },
        )
        .await
        .unwrap();
    assert!(ctx.store.has_records(ctx.user).await);
}

fn alt_billing(email: &str) -> BillingAddressForm {
    BillingAddressForm {
        different_billing_email: true,
        alt_billing_email: Some(email.to_owned()),
        ..BillingAddressForm::default()
    }
}

// ============================================================================
// Defaults
// ============================================================================

#[tokio::test]
async fn test_fresh_account_reads_defaults() {
    let ctx = TestContext::new().await;
    let overview = ctx.service.overview(ctx.user).await.unwrap();

    assert_eq!(overview.account.email.as_str(), CUSTOMER_EMAIL);
    assert!(overview.personal_data.is_none());
    assert_eq!(overview.billing.billing_email.as_str(), CUSTOMER_EMAIL);
    assert!(overview.payment_methods.is_empty());
    assert!(overview.additional_addresses.addresses.is_empty());
    assert_eq!(overview.notification_settings, NotificationSettings::default());
    assert_eq!(overview.privacy_settings, PrivacySettings::default());
}

#[tokio::test]
async fn test_unchecked_boxes_turn_preferences_off() {
    let ctx = TestContext::new().await;
    let saved = ctx
        .service
        .save_notification_settings(
            ctx.user,
            NotificationSettingsForm {
                email_marketing: true,
                ..NotificationSettingsForm::default()
            },
        )
        .await
        .unwrap();

    assert!(saved.email_marketing);
    assert!(!saved.email_orders);
    assert_eq!(
        ctx.service.notification_settings(ctx.user).await.unwrap(),
        saved
    );
}

// ============================================================================
// Personal data
// ============================================================================

#[tokio::test]
async fn test_taken_email_changes_nothing() {
    let ctx = TestContext::new().await;
    ctx.register("vergeben@shop.example.de").await;

    let err = ctx
        .service
        .save_personal_data(
            ctx.user,
            PersonalDataForm {
                first_name: Some("Erika".to_owned()),
                email: Some("vergeben@shop.example.de".to_owned()),
                ..PersonalDataForm::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, SettingsError::EmailInUse));
    let overview = ctx.service.overview(ctx.user).await.unwrap();
    assert_eq!(overview.account.email.as_str(), CUSTOMER_EMAIL);
    assert!(overview.personal_data.is_none());
}

#[tokio::test]
async fn test_email_change_requires_logout() {
    let ctx = TestContext::new().await;
    let outcome = ctx
        .service
        .save_personal_data(
            ctx.user,
            PersonalDataForm {
                email: Some("neu@shop.example.de".to_owned()),
                ..PersonalDataForm::default()
            },
        )
        .await
        .unwrap();
    assert!(outcome.logout_required);
    assert_eq!(outcome.email.as_str(), "neu@shop.example.de");

    // Same address with different case is not a change
    let outcome = ctx
        .service
        .save_personal_data(
            ctx.user,
            PersonalDataForm {
                email: Some("NEU@shop.example.de".to_owned()),
                ..PersonalDataForm::default()
            },
        )
        .await
        .unwrap();
    assert!(!outcome.logout_required);
}

#[tokio::test]
async fn test_failed_personal_data_write_keeps_login_email() {
    let ctx = TestContext::new().await;
    let form = PersonalDataForm {
        email: Some("neu@shop.example.de".to_owned()),
        first_name: Some("Erika".to_owned()),
        ..PersonalDataForm::default()
    };

    ctx.store.set_unavailable(true);
    let err = ctx
        .service
        .save_personal_data(ctx.user, form.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, SettingsError::Persistence(_)));

    let overview = ctx.service.overview(ctx.user).await.unwrap();
    assert_eq!(overview.account.email.as_str(), CUSTOMER_EMAIL);
    assert!(overview.personal_data.is_none());

    ctx.store.set_unavailable(false);
    let outcome = ctx.service.save_personal_data(ctx.user, form).await.unwrap();
    assert!(outcome.logout_required);
    assert_eq!(outcome.email.as_str(), "neu@shop.example.de");
}

#[tokio::test]
async fn test_names_are_mirrored_into_addresses() {
    let ctx = TestContext::new().await;
    ctx.service
        .save_personal_data(
            ctx.user,
            PersonalDataForm {
                first_name: Some("Erika".to_owned()),
                last_name: Some("Mustermann".to_owned()),
                birthdate: Some("1990-12-31".to_owned()),
                ..PersonalDataForm::default()
            },
        )
        .await
        .unwrap();

    let overview = ctx.service.overview(ctx.user).await.unwrap();
    assert_eq!(overview.billing.billing.address.first_name, "Erika");
    assert_eq!(overview.shipping.address.last_name, "Mustermann");
}

#[tokio::test]
async fn test_private_shipping_address_drops_company() {
    let ctx = TestContext::new().await;
    let saved = ctx
        .service
        .save_shipping_address(
            ctx.user,
            ShippingAddressForm {
                address: PostalAddressForm {
                    first_name: Some("Erika".to_owned()),
                    company: Some("Firma GmbH".to_owned()),
                    city: Some("Köln".to_owned()),
                    ..PostalAddressForm::default()
                },
                is_company: false,
            },
        )
        .await
        .unwrap();
    assert_eq!(saved.address.company, "");
    assert_eq!(saved.address.country, "DE");

    let overview = ctx.service.overview(ctx.user).await.unwrap();
    assert_eq!(overview.shipping, saved);
}

// ============================================================================
// Alternate billing email
// ============================================================================

#[tokio::test]
async fn test_failed_notice_keeps_address_and_warns() {
    let ctx = TestContext::new().await;
    ctx.mailer.set_failing(true);

    let outcome = ctx
        .service
        .save_billing_address(ctx.user, alt_billing("rechnung@firma.de"))
        .await
        .unwrap();

    assert!(outcome.warning.is_some());
    assert_eq!(outcome.view.billing_email.as_str(), "rechnung@firma.de");
    assert!(ctx.store.pending_billing_email(ctx.user).await.unwrap().is_some());
}

#[tokio::test]
async fn test_reject_token_is_single_use() {
    let ctx = TestContext::new().await;
    ctx.service
        .save_billing_address(ctx.user, alt_billing("rechnung@firma.de"))
        .await
        .unwrap();
    let token = ctx
        .store
        .pending_billing_email(ctx.user)
        .await
        .unwrap()
        .unwrap()
        .token;

    assert!(matches!(
        ctx.service
            .reject_alternate_billing_email(ctx.user, "falsch")
            .await,
        Err(SettingsError::NotFound)
    ));

    ctx.service
        .reject_alternate_billing_email(ctx.user, &token)
        .await
        .unwrap();

    let overview = ctx.service.overview(ctx.user).await.unwrap();
    assert!(overview.billing.billing.alt_billing_email.is_none());
    assert_eq!(overview.billing.billing_email.as_str(), CUSTOMER_EMAIL);

    assert!(matches!(
        ctx.service
            .reject_alternate_billing_email(ctx.user, &token)
            .await,
        Err(SettingsError::NotFound)
    ));

    let sent = ctx.mailer.sent().await;
    assert_eq!(sent.len(), 2);
    assert!(sent[0].body.contains(BASE_URL));
    assert_eq!(sent[1].to.as_str(), OPERATOR_EMAIL);
}

#[tokio::test]
async fn test_unchecking_billing_email_drops_pending_token() {
    let ctx = TestContext::new().await;
    ctx.service
        .save_billing_address(ctx.user, alt_billing("rechnung@firma.de"))
        .await
        .unwrap();

    let outcome = ctx
        .service
        .save_billing_address(ctx.user, BillingAddressForm::default())
        .await
        .unwrap();

    assert_eq!(outcome.view.billing_email.as_str(), CUSTOMER_EMAIL);
    assert!(ctx.store.pending_billing_email(ctx.user).await.unwrap().is_none());
}

// ============================================================================
// Default selection
// ============================================================================

#[tokio::test]
async fn test_payment_methods_keep_exactly_one_default() {
    let ctx = TestContext::new().await;

    let first = ctx
        .service
        .save_payment_method(ctx.user, paypal("erika@paypal.example", false))
        .await
        .unwrap();
    assert!(first.is_default);

    let card = ctx.service.save_payment_method(ctx.user, visa()).await.unwrap();
    assert!(!card.is_default);
    assert_eq!(card.method_type, PaymentMethodType::Card);

    let second_paypal = ctx
        .service
        .save_payment_method(ctx.user, paypal("firma@paypal.example", true))
        .await
        .unwrap();
    assert!(second_paypal.is_default);

    let defaults = |methods: &[PaymentMethod]| {
        methods.iter().filter(|m| m.is_default).count()
    };
    let overview = ctx.service.overview(ctx.user).await.unwrap();
    assert_eq!(defaults(&overview.payment_methods), 1);

    // Deleting the default promotes a remaining method
    ctx.service
        .delete_payment_method(ctx.user, second_paypal.id)
        .await
        .unwrap();
    let overview = ctx.service.overview(ctx.user).await.unwrap();
    assert_eq!(overview.payment_methods.len(), 2);
    assert_eq!(defaults(&overview.payment_methods), 1);

    ctx.service
        .set_default_payment_method(ctx.user, first.id)
        .await
        .unwrap();
    let overview = ctx.service.overview(ctx.user).await.unwrap();
    let default = overview.payment_methods.iter().find(|m| m.is_default).unwrap();
    assert_eq!(default.id, first.id);
}

#[tokio::test]
async fn test_foreign_payment_method_is_not_found() {
    let ctx = TestContext::new().await;
    let other = ctx.register("andere@shop.example.de").await;
    let method = ctx
        .service
        .save_payment_method(other, paypal("andere@paypal.example", false))
        .await
        .unwrap();

    assert!(matches!(
        ctx.service.delete_payment_method(ctx.user, method.id).await,
        Err(SettingsError::NotFound)
    ));
    assert!(matches!(
        ctx.service
            .set_default_payment_method(ctx.user, method.id)
            .await,
        Err(SettingsError::NotFound)
    ));
}

#[tokio::test]
async fn test_deleting_default_shipping_address_clears_default() {
    let ctx = TestContext::new().await;
    let office = ctx
        .service
        .add_shipping_address(ctx.user, labelled("Büro", true))
        .await
        .unwrap();
    let home = ctx
        .service
        .add_shipping_address(ctx.user, labelled("Eltern", false))
        .await
        .unwrap();

    let book = ctx.service.overview(ctx.user).await.unwrap().additional_addresses;
    assert_eq!(book.default_id, Some(office.id));

    ctx.service
        .delete_shipping_address(ctx.user, office.id)
        .await
        .unwrap();

    let book = ctx.service.overview(ctx.user).await.unwrap().additional_addresses;
    assert_eq!(book.addresses.len(), 1);
    assert_eq!(book.addresses[0].id, home.id);
    assert_eq!(book.default_id, None);
}

#[tokio::test]
async fn test_edit_keeps_fields_not_supplied() {
    let ctx = TestContext::new().await;
    let address = ctx
        .service
        .add_shipping_address(ctx.user, labelled("Büro", false))
        .await
        .unwrap();

    let edited = ctx
        .service
        .edit_shipping_address(
            ctx.user,
            address.id,
            ShippingAddressFields {
                city: Some("Hamburg".to_owned()),
                ..ShippingAddressFields::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(edited.label, "Büro");
    assert_eq!(edited.address.first_name, "Erika");
    assert_eq!(edited.address.city, "Hamburg");
}

// ============================================================================
// Account deletion
// ============================================================================

#[tokio::test]
async fn test_deletion_blocked_by_open_order() {
    let ctx = TestContext::new().await;
    seed_records(&ctx).await;
    ctx.place_order("1001", OrderStatus::OnHold).await;

    let err = ctx
        .service
        .request_account_deletion(Some(ctx.user), &password(CUSTOMER_PASSWORD))
        .await
        .unwrap_err();
    assert!(matches!(err, SettingsError::OpenOrders));
    assert!(ctx.store.has_records(ctx.user).await);
    let overview = ctx.service.overview(ctx.user).await.unwrap();
    assert_eq!(overview.payment_methods.len(), 1);
    assert_eq!(overview.additional_addresses.addresses.len(), 1);

    ctx.orders.set_status("1001", OrderStatus::Completed).await;
    ctx.service
        .request_account_deletion(Some(ctx.user), &password(CUSTOMER_PASSWORD))
        .await
        .unwrap();
    assert!(!ctx.store.has_records(ctx.user).await);
}

#[tokio::test]
async fn test_wrong_password_keeps_account() {
    let ctx = TestContext::new().await;
    seed_records(&ctx).await;

    let err = ctx
        .service
        .request_account_deletion(Some(ctx.user), &password("falsches-pferd"))
        .await
        .unwrap_err();
    assert!(matches!(err, SettingsError::InvalidPassword));
    assert!(ctx.store.has_records(ctx.user).await);

    let err = ctx
        .service
        .request_account_deletion(None, &password(CUSTOMER_PASSWORD))
        .await
        .unwrap_err();
    assert!(matches!(err, SettingsError::AuthRequired));
    assert!(ctx.store.has_records(ctx.user).await);

    let overview = ctx.service.overview(ctx.user).await.unwrap();
    assert_eq!(overview.payment_methods.len(), 1);
    assert!(overview.notification_settings.email_orders);
}

#[tokio::test]
async fn test_failed_account_delete_keeps_settings() {
    let ctx = TestContext::new().await;
    seed_records(&ctx).await;

    ctx.accounts.set_unavailable(true);
    let err = ctx
        .service
        .request_account_deletion(Some(ctx.user), &password(CUSTOMER_PASSWORD))
        .await
        .unwrap_err();
    assert!(matches!(err, SettingsError::Persistence(_)));
    assert!(ctx.store.has_records(ctx.user).await);

    ctx.accounts.set_unavailable(false);
    assert!(ctx.service.overview(ctx.user).await.is_ok());
    assert!(
        ctx.service
            .auth()
            .login(CUSTOMER_EMAIL, &password(CUSTOMER_PASSWORD))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_deletion_purges_every_record() {
    let ctx = TestContext::new().await;
    ctx.service
        .save_payment_method(ctx.user, visa())
        .await
        .unwrap();
    ctx.service
        .add_shipping_address(ctx.user, labelled("Büro", true))
        .await
        .unwrap();
    ctx.service
        .save_billing_address(ctx.user, alt_billing("rechnung@firma.de"))
        .await
        .unwrap();
    assert!(ctx.store.has_records(ctx.user).await);

    ctx.service
        .request_account_deletion(Some(ctx.user), &password(CUSTOMER_PASSWORD))
        .await
        .unwrap();

    assert!(!ctx.store.has_records(ctx.user).await);
    assert!(matches!(
        ctx.service.overview(ctx.user).await,
        Err(SettingsError::AuthRequired)
    ));
    assert!(
        ctx.service
            .auth()
            .login(CUSTOMER_EMAIL, &password(CUSTOMER_PASSWORD))
            .await
            .is_err()
    );
}

// ============================================================================
// Export
// ============================================================================

#[tokio::test]
async fn test_export_contains_orders_and_masked_payments() {
    let ctx = TestContext::new().await;
    ctx.service
        .save_payment_method(ctx.user, visa())
        .await
        .unwrap();
    ctx.place_order("1002", OrderStatus::Completed).await;

    let export = ctx.service.export_user_data(ctx.user).await.unwrap();
    assert_eq!(export.document.orders.len(), 1);

    let json = serde_json::to_string(&export.document).unwrap();
    assert!(json.contains("1111"));
    assert!(!json.contains("4111111111111111"));
    assert!(!json.contains("processor_token"));
}
