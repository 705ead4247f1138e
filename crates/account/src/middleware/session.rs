//! Cookie sessions for logged-in customers.
//!
//! The cookie carries only the session id. The identity behind it lives in
//! `tower_sessions.session`, created by the migrations.

use sqlx::PgPool;
use tower_sessions::cookie::{SameSite, time::Duration};
use tower_sessions::{Expiry, SessionManagerLayer, SessionStore};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::AccountConfig;

pub const SESSION_COOKIE_NAME: &str = "account_session";

/// Idle time after which a session expires.
const IDLE_TIMEOUT: Duration = Duration::days(7);

/// Session layer backed by `PostgreSQL`.
#[must_use]
pub fn create_session_layer(
    pool: &PgPool,
    config: &AccountConfig,
) -> SessionManagerLayer<PostgresStore> {
    let secure = config.base_url.starts_with("https://");
    session_layer(PostgresStore::new(pool.clone()), secure)
}

/// Session layer over any store.
///
/// `secure` marks the cookie HTTPS-only; tests and local HTTP setups pass `false`.
#[must_use]
pub fn session_layer<S: SessionStore + Clone>(store: S, secure: bool) -> SessionManagerLayer<S> {
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_http_only(true)
        .with_secure(secure)
        .with_same_site(SameSite::Lax)
        .with_path("/")
        .with_expiry(Expiry::OnInactivity(IDLE_TIMEOUT))
}
