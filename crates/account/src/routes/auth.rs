//! Authentication route handlers.
//!
//! Password login stores the user in the session; logout flushes it.

use axum::extract::State;
use secrecy::SecretString;
use serde::Deserialize;
use tower_sessions::Session;

use crate::error::{Envelope, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{end_session, set_current_user};
use crate::models::{Account, CurrentUser};
use crate::routes::ApiJson;
use crate::state::AppState;

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Log in with email and password.
///
/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Envelope<Account>> {
    let password = SecretString::from(request.password);
    let account = state
        .settings()
        .auth()
        .login(&request.email, &password)
        .await
        .inspect_err(|_| tracing::info!("Failed login attempt"))?;

    set_current_user(&session, &CurrentUser::from_account(&account)).await?;
    set_sentry_user(&account.id);

    tracing::info!(user_id = %account.id, "User logged in");
    Ok(Envelope::ok("You are logged in.", account))
}

/// Log out.
///
/// POST /auth/logout
pub async fn logout(session: Session) -> Result<Envelope<()>> {
    end_session(&session).await?;
    clear_sentry_user();
    Ok(Envelope::message("You are logged out."))
}
