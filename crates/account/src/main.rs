//! Account settings service.
//!
//! Serves the account self-service settings API on port 3000.
//!
//! # Architecture
//!
//! - Axum JSON API with `PostgreSQL`-backed sessions
//! - `PostgreSQL` for accounts, settings records and the order history view
//! - SMTP for alternate billing email notices (logged only when unconfigured)
//! - Payment processor API for tokenizing payment methods (offline tokens
//!   when unconfigured)

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use sentry::integrations::tracing as sentry_tracing;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use account_settings::config::AccountConfig;
use account_settings::db::{self, PgAccountDirectory, PgOrderLookup, PgSettingsStore};
use account_settings::middleware::create_session_layer;
use account_settings::routes;
use account_settings::services::{
    Collaborators, HttpTokenizer, LogMailer, MessageDelivery, OfflineTokenizer, PaymentTokenizer,
    ServiceSettings, SmtpMailer,
};
use account_settings::state::AppState;

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &AccountConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn mailer(config: &AccountConfig) -> Arc<dyn MessageDelivery> {
    match &config.email {
        Some(email) => match SmtpMailer::new(email) {
            Ok(mailer) => Arc::new(mailer),
            Err(e) => {
                tracing::error!(error = %e, "SMTP setup failed, emails will only be logged");
                Arc::new(LogMailer)
            }
        },
        None => {
            tracing::warn!("SMTP not configured, emails will only be logged");
            Arc::new(LogMailer)
        }
    }
}

fn tokenizer(config: &AccountConfig) -> Result<Arc<dyn PaymentTokenizer>, String> {
    match &config.payment_processor {
        Some(processor) => HttpTokenizer::new(processor)
            .map(|t| Arc::new(t) as Arc<dyn PaymentTokenizer>)
            .map_err(|e| format!("Failed to create payment processor client: {e}")),
        None => {
            tracing::warn!("Payment processor not configured, issuing offline references");
            Ok(Arc::new(OfflineTokenizer))
        }
    }
}

#[tokio::main]
#[allow(clippy::print_stderr)]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = match AccountConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "account_settings=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "account-settings exited with error");
        std::process::exit(1);
    }
}

async fn run(config: AccountConfig) -> Result<(), String> {
    let pool = db::create_pool(&config.database_url)
        .await
        .map_err(|e| format!("Failed to create database pool: {e}"))?;
    tracing::info!("Database pool created");

    // NOTE: Migrations are NOT run automatically on startup.
    // Run them explicitly via: cargo run -p account-settings-cli -- migrate

    let collaborators = Collaborators {
        store: Arc::new(PgSettingsStore::new(pool.clone())),
        accounts: Arc::new(PgAccountDirectory::new(pool.clone())),
        orders: Arc::new(PgOrderLookup::new(pool.clone())),
        mailer: mailer(&config),
        tokenizer: tokenizer(&config)?,
    };
    let state = AppState::new(
        collaborators,
        ServiceSettings {
            base_url: config.base_url.clone(),
            operator_email: config.operator_email.clone(),
        },
    )
    .with_pool(pool.clone());

    let session_layer = create_session_layer(&pool, &config);

    let app = routes::routes(true)
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    let addr = config.socket_addr();
    tracing::info!("account-settings listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind to {addr}: {e}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("Server error: {e}"))
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
