//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                                    - Liveness
//! GET    /health/ready                              - Readiness (database)
//!
//! # Auth
//! POST   /auth/login                                - Password login
//! POST   /auth/logout                               - End the session
//!
//! # Account settings (requires auth)
//! GET    /api/account                               - Settings overview
//! POST   /api/account/personal                      - Personal data and login email
//! POST   /api/account/billing                       - Billing address
//! POST   /api/account/shipping                      - Primary shipping address
//! POST   /api/account/shipping/addresses            - Add shipping address
//! PUT    /api/account/shipping/addresses/{id}       - Edit shipping address
//! DELETE /api/account/shipping/addresses/{id}       - Delete shipping address
//! POST   /api/account/shipping/addresses/{id}/default
//! POST   /api/account/payment-methods               - Add payment method
//! DELETE /api/account/payment-methods/{id}          - Delete payment method
//! POST   /api/account/payment-methods/{id}/default
//! POST   /api/account/notifications                 - Notification preferences
//! POST   /api/account/privacy                       - Privacy preferences
//! POST   /api/account/delete                        - Delete account
//! GET    /api/account/export                        - Download user data
//!
//! # Public
//! GET    /api/account/billing-email/reject          - Reject alternate billing email
//! ```

pub mod account;
pub mod auth;

use axum::{
    Router,
    extract::{FromRequest, State},
    http::StatusCode,
    routing::{get, post},
};

use crate::error::AppError;
use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// JSON body extractor whose rejections use the response envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Create the authenticated account settings router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::overview))
        .route("/personal", post(account::save_personal_data))
        .route("/billing", post(account::save_billing_address))
        .route("/shipping", post(account::save_shipping_address))
        .route("/shipping/addresses", post(account::add_shipping_address))
        .route(
            "/shipping/addresses/{id}",
            axum::routing::put(account::edit_shipping_address)
                .delete(account::delete_shipping_address),
        )
        .route(
            "/shipping/addresses/{id}/default",
            post(account::set_default_shipping_address),
        )
        .route("/payment-methods", post(account::save_payment_method))
        .route(
            "/payment-methods/{id}",
            axum::routing::delete(account::delete_payment_method),
        )
        .route(
            "/payment-methods/{id}/default",
            post(account::set_default_payment_method),
        )
        .route("/notifications", post(account::save_notification_settings))
        .route("/privacy", post(account::save_privacy_settings))
        .route("/delete", post(account::request_account_deletion))
        .route("/export", get(account::export_user_data))
}

/// Routes reachable without a session that are worth guessing at.
fn sensitive_public_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(auth::login))
        .route(
            "/api/account/billing-email/reject",
            get(account::reject_billing_email),
        )
}

/// Create all routes.
///
/// With `rate_limited`, login and the reject link get the strict limiter and
/// the settings API the relaxed one. Limits are keyed by the client IP from
/// proxy headers, so requests without them are refused.
pub fn routes(rate_limited: bool) -> Router<AppState> {
    let mut sensitive = sensitive_public_routes();
    let mut api = Router::new().nest("/api/account", account_routes());
    if rate_limited {
        sensitive = sensitive.route_layer(auth_rate_limiter());
        api = api.route_layer(api_rate_limiter());
    }

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .route("/auth/logout", post(auth::logout))
        .merge(sensitive)
        .merge(api)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.is_ready().await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
