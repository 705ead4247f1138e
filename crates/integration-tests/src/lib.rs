//! Integration tests for the account settings service.
//!
//! # Running Tests
//!
//! ```bash
//! # In-process tests (memory collaborators, no database)
//! cargo test -p account-settings-integration-tests
//!
//! # Tests against a running server
//! cargo test -p account-settings-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `settings_flows` - Service-level flows across the settings tabs
//! - `account_api` - The HTTP surface, driven in-process
//! - `live_server` - A deployed server with a database behind it

use std::sync::Arc;

use axum::Router;
use secrecy::SecretString;
use tower_sessions::MemoryStore;

use account_settings::db::{MemoryAccountDirectory, MemoryOrderLookup, MemorySettingsStore};
use account_settings::middleware::session_layer;
use account_settings::models::{Order, OrderItem};
use account_settings::routes;
use account_settings::services::{
    Collaborators, MemoryMailer, OfflineTokenizer, ServiceSettings, SettingsService,
};
use account_settings::state::AppState;
use account_settings_core::{Email, OrderId, OrderStatus, UserId};

/// Login email of the registered test customer.
pub const CUSTOMER_EMAIL: &str = "kunde@shop.example.de";

/// Password of the registered test customer.
pub const CUSTOMER_PASSWORD: &str = "korrekt-pferd";

/// Public base URL used for reject links.
pub const BASE_URL: &str = "https://shop.example.de";

/// Operator address notified of rejected billing emails.
pub const OPERATOR_EMAIL: &str = "ops@shop.example.de";

/// A settings service over in-memory collaborators, with handles to inspect them.
pub struct TestContext {
    pub service: SettingsService,
    pub store: Arc<MemorySettingsStore>,
    pub accounts: Arc<MemoryAccountDirectory>,
    pub orders: Arc<MemoryOrderLookup>,
    pub mailer: Arc<MemoryMailer>,
    pub user: UserId,
}

impl TestContext {
    /// Build the collaborators and register the test customer.
    ///
    /// # Panics
    ///
    /// Panics if the test customer cannot be registered.
    #[allow(clippy::expect_used)]
    pub async fn new() -> Self {
        let accounts = Arc::new(MemoryAccountDirectory::new());
        let store = Arc::new(MemorySettingsStore::new(accounts.clone()));
        let orders = Arc::new(MemoryOrderLookup::new());
        let mailer = Arc::new(MemoryMailer::new());

        let service = SettingsService::new(
            Collaborators {
                store: store.clone(),
                accounts: accounts.clone(),
                orders: orders.clone(),
                mailer: mailer.clone(),
                tokenizer: Arc::new(OfflineTokenizer),
            },
            ServiceSettings {
                base_url: BASE_URL.to_owned(),
                operator_email: Email::parse(OPERATOR_EMAIL).ok(),
            },
        );

        let account = service
            .auth()
            .register(CUSTOMER_EMAIL, "Kunde", &password(CUSTOMER_PASSWORD))
            .await
            .expect("Failed to register test customer");

        Self {
            service,
            store,
            accounts,
            orders,
            mailer,
            user: account.id,
        }
    }

    /// Register another customer on the same collaborators.
    ///
    /// # Panics
    ///
    /// Panics if the customer cannot be registered.
    #[allow(clippy::expect_used)]
    pub async fn register(&self, email: &str) -> UserId {
        self.service
            .auth()
            .register(email, "Andere Kundin", &password(CUSTOMER_PASSWORD))
            .await
            .expect("Failed to register customer")
            .id
    }

    /// Record an order for the test customer with the given status.
    pub async fn place_order(&self, number: &str, status: OrderStatus) {
        self.orders
            .insert(Order {
                id: OrderId::new(number.parse().unwrap_or(1)),
                user_id: self.user,
                number: number.to_owned(),
                status,
                total: rust_decimal::Decimal::new(4999, 2),
                currency: "EUR".to_owned(),
                payment_method_title: "PayPal".to_owned(),
                created_at: chrono::Utc::now(),
                items: vec![OrderItem {
                    name: "Ananas".to_owned(),
                    quantity: 1,
                    total: rust_decimal::Decimal::new(4999, 2),
                }],
            })
            .await;
    }

    /// The full application router with an in-memory session store and no
    /// rate limiting.
    #[must_use]
    pub fn router(&self) -> Router {
        routes::routes(false)
            .layer(session_layer(MemoryStore::default(), false))
            .with_state(AppState::from_service(self.service.clone()))
    }
}

/// Wrap a test password.
#[must_use]
pub fn password(raw: &str) -> SecretString {
    SecretString::from(raw.to_owned())
}
