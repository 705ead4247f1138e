//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers return `Result<T, AppError>`.
//!
//! Every response, successful or not, uses the same JSON envelope:
//!
//! ```json
//! { "success": false, "message": "...", "logout_required": true, "warning": "...", "data": {} }
//! ```
//!
//! The optional keys are omitted when unset.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::settings::SettingsError;

/// Response body shared by every account endpoint.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logout_required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> Envelope<T> {
    /// A successful response carrying `data`.
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            logout_required: None,
            warning: None,
            data: Some(data),
        }
    }

    #[must_use]
    pub const fn with_logout(mut self, logout_required: bool) -> Self {
        if logout_required {
            self.logout_required = Some(true);
        }
        self
    }

    #[must_use]
    pub fn with_warning(mut self, warning: Option<String>) -> Self {
        self.warning = warning;
        self
    }
}

impl Envelope<()> {
    /// A successful response without data.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            logout_required: None,
            warning: None,
            data: None,
        }
    }

    /// A failed response.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            logout_required: None,
            warning: None,
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Settings operation failed.
    #[error("{0}")]
    Settings(#[from] SettingsError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        Self::Settings(err.into())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(err: tower_sessions::session::Error) -> Self {
        Self::Internal(format!("session error: {err}"))
    }
}

impl AppError {
    const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Internal(_)
                | Self::Auth(AuthError::Repository(_) | AuthError::PasswordHash)
                | Self::Settings(
                    SettingsError::Persistence(_)
                        | SettingsError::Delivery(_)
                        | SettingsError::PaymentProcessor(_)
                )
        )
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Settings(err) => match err {
                SettingsError::AuthRequired => StatusCode::UNAUTHORIZED,
                SettingsError::NotFound => StatusCode::NOT_FOUND,
                SettingsError::Validation { .. } | SettingsError::UnsupportedInstrument(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                SettingsError::EmailInUse | SettingsError::OpenOrders => StatusCode::CONFLICT,
                SettingsError::InvalidPassword => StatusCode::FORBIDDEN,
                SettingsError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
                SettingsError::Delivery(_) | SettingsError::PaymentProcessor(_) => {
                    StatusCode::BAD_GATEWAY
                }
            },
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::PasswordTooShort { .. } | AuthError::InvalidEmail(_) => {
                    StatusCode::BAD_REQUEST
                }
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// User-facing message. Internal details are never exposed.
    fn user_message(&self) -> String {
        match self {
            Self::Settings(err) => match err {
                SettingsError::AuthRequired => "Please log in to change your settings.".to_owned(),
                SettingsError::NotFound => "The requested entry was not found.".to_owned(),
                SettingsError::Validation { message, .. } => message.clone(),
                SettingsError::EmailInUse => "This email address is already in use.".to_owned(),
                SettingsError::InvalidPassword => "The password is incorrect.".to_owned(),
                SettingsError::OpenOrders => {
                    "Your account cannot be deleted while orders are still in progress."
                        .to_owned()
                }
                SettingsError::UnsupportedInstrument(_) => {
                    "This payment method is not supported.".to_owned()
                }
                SettingsError::Persistence(_) => {
                    "Your changes could not be saved. Please try again.".to_owned()
                }
                SettingsError::Delivery(_) => "The email could not be sent.".to_owned(),
                SettingsError::PaymentProcessor(_) => {
                    "The payment provider could not process this payment method.".to_owned()
                }
            },
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Invalid email or password.".to_owned(),
                AuthError::UserAlreadyExists => {
                    "An account with this email already exists.".to_owned()
                }
                AuthError::PasswordTooShort { min } => {
                    format!("The password must be at least {min} characters long.")
                }
                AuthError::InvalidEmail(_) => "Invalid email address.".to_owned(),
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    "Internal server error".to_owned()
                }
            },
            Self::BadRequest(msg) => msg.clone(),
            Self::Internal(_) => "Internal server error".to_owned(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (self.status(), Envelope::failure(self.user_message())).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_settings_error_status_codes() {
        assert_eq!(
            get_status(SettingsError::AuthRequired.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(get_status(SettingsError::NotFound.into()), StatusCode::NOT_FOUND);
        assert_eq!(
            get_status(SettingsError::EmailInUse.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(SettingsError::OpenOrders.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(SettingsError::InvalidPassword.into()),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(SettingsError::validation("card_cvv", "Invalid security code.").into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(AppError::BadRequest("expected JSON".to_owned())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = AppError::from(RepositoryError::DataCorruption("bad row 17".to_owned()));
        assert!(!err.user_message().contains("row 17"));
    }

    #[test]
    fn test_envelope_omits_unset_keys() {
        let json = serde_json::to_value(Envelope::message("Saved")).unwrap();
        assert_eq!(json, serde_json::json!({ "success": true, "message": "Saved" }));

        let json = serde_json::to_value(
            Envelope::ok("Saved", 7)
                .with_logout(true)
                .with_warning(Some("not sent".to_owned())),
        )
        .unwrap();
        assert_eq!(json["logout_required"], true);
        assert_eq!(json["warning"], "not sent");
        assert_eq!(json["data"], 7);
    }
}
