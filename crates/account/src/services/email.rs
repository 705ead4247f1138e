//! Outgoing email.
//!
//! Messages are plain text. [`SmtpMailer`] delivers them over SMTP via
//! lettre; [`LogMailer`] only logs them (development without SMTP);
//! [`MemoryMailer`] keeps them for inspection.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType,
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;
use tokio::sync::Mutex;

use account_settings_core::Email;

use crate::config::EmailConfig;

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Delivery refused without reaching a transport.
    #[error("Delivery unavailable: {0}")]
    Unavailable(String),
}

/// A plain-text message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub to: Email,
    pub subject: String,
    pub body: String,
}

/// Something that can deliver an [`OutgoingMessage`].
#[async_trait]
pub trait MessageDelivery: Send + Sync {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), DeliveryError>;
}

/// SMTP delivery.
#[derive(Clone)]
pub struct SmtpMailer {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailer {
    /// Create a new mailer from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl MessageDelivery for SmtpMailer {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), DeliveryError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| DeliveryError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(message
                .to
                .as_str()
                .parse()
                .map_err(|_| DeliveryError::InvalidAddress(message.to.to_string()))?)
            .subject(&message.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())?;

        self.mailer.send(email).await?;

        tracing::info!(to = %message.to, subject = %message.subject, "Email sent successfully");
        Ok(())
    }
}

/// Logs messages instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl MessageDelivery for LogMailer {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), DeliveryError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.body,
            "SMTP not configured, email logged only"
        );
        Ok(())
    }
}

/// Keeps sent messages in memory. Can be switched to fail every delivery.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<OutgoingMessage>>,
    failing: AtomicBool,
}

impl MemoryMailer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent deliveries fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Messages delivered so far.
    pub async fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl MessageDelivery for MemoryMailer {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), DeliveryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DeliveryError::Unavailable("mail relay refused the message".to_owned()));
        }
        self.sent.lock().await.push(message.clone());
        Ok(())
    }
}

// =============================================================================
// Messages
// =============================================================================

/// Sent to a newly designated alternate billing address.
#[must_use]
pub fn alternate_billing_email_notice(
    to: &Email,
    account_email: &Email,
    reject_url: &str,
) -> OutgoingMessage {
    OutgoingMessage {
        to: to.clone(),
        subject: "You were added as billing email address".to_owned(),
        body: format!(
            "Hello,\n\n\
             the customer account {account_email} has designated this address to receive \
             its invoices.\n\n\
             If you did not agree to this, you can reject it here:\n{reject_url}\n\n\
             If everything is in order, no action is needed.\n"
        ),
    }
}

/// Sent to the site operator when an alternate billing address was rejected.
#[must_use]
pub fn billing_email_rejected_notice(
    operator: &Email,
    account_email: &Email,
    rejected: &Email,
) -> OutgoingMessage {
    OutgoingMessage {
        to: operator.clone(),
        subject: "Billing email address rejected".to_owned(),
        body: format!(
            "The recipient {rejected} rejected being the billing email address of the \
             customer account {account_email}.\n\n\
             Invoices for this account go to the account email again.\n"
        ),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn email(s: &str) -> Email {
        Email::parse(s).unwrap()
    }

    #[test]
    fn test_notice_contains_reject_link() {
        let msg = alternate_billing_email_notice(
            &email("invoices@firma.de"),
            &email("kunde@shop.de"),
            "https://shop.de/api/account/billing-email/reject?token=abc&user_id=7",
        );
        assert_eq!(msg.to.as_str(), "invoices@firma.de");
        assert!(msg.body.contains("token=abc&user_id=7"));
        assert!(msg.body.contains("kunde@shop.de"));
    }

    #[tokio::test]
    async fn test_memory_mailer_records_and_fails_on_demand() {
        let mailer = MemoryMailer::new();
        let msg = billing_email_rejected_notice(
            &email("ops@shop.de"),
            &email("kunde@shop.de"),
            &email("invoices@firma.de"),
        );

        mailer.send(&msg).await.unwrap();
        mailer.set_failing(true);
        assert!(mailer.send(&msg).await.is_err());

        assert_eq!(mailer.sent().await, vec![msg]);
    }
}
