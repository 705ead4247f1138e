//! Payment tokenization.
//!
//! Sensitive instrument data (card number, security code, IBAN) is handed to
//! the payment processor, which returns an opaque reference. Only that
//! reference and display details are stored.

use async_trait::async_trait;
use rand::Rng;
use rand::distr::Alphanumeric;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use account_settings_core::UserId;
use account_settings_core::payment::ValidatedInstrument;

use crate::config::PaymentProcessorConfig;

/// Length of the random part of offline references.
const OFFLINE_REFERENCE_LENGTH: usize = 24;

/// Errors that can occur when tokenizing an instrument.
#[derive(Debug, Error)]
pub enum TokenizerError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Processor refused the instrument.
    #[error("processor error: {status} - {message}")]
    Rejected { status: u16, message: String },

    /// Failed to build the request or parse the response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Exchanges validated instrument data for a processor reference.
#[async_trait]
pub trait PaymentTokenizer: Send + Sync {
    async fn tokenize(
        &self,
        user_id: UserId,
        instrument: &ValidatedInstrument,
    ) -> Result<String, TokenizerError>;
}

/// Tokenizer backed by the processor's HTTP API.
#[derive(Clone)]
pub struct HttpTokenizer {
    client: reqwest::Client,
    endpoint: Url,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum TokenRequest<'a> {
    Card {
        customer_reference: String,
        number: &'a str,
        cvv: &'a str,
        expiry: &'a str,
        holder_name: &'a str,
    },
    Paypal {
        customer_reference: String,
        email: &'a str,
    },
    Sepa {
        customer_reference: String,
        iban: &'a str,
        bic: &'a str,
        holder_name: &'a str,
        mandate_accepted: bool,
    },
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

impl HttpTokenizer {
    /// Create a new processor client.
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint URL or API key is unusable, or the HTTP
    /// client fails to build.
    pub fn new(config: &PaymentProcessorConfig) -> Result<Self, TokenizerError> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", config.api_key.expose_secret());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value)
                .map_err(|e| TokenizerError::Parse(format!("Invalid API key format: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;
        let endpoint = config
            .base_url
            .join("tokens")
            .map_err(|e| TokenizerError::Parse(format!("Invalid processor URL: {e}")))?;

        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl PaymentTokenizer for HttpTokenizer {
    async fn tokenize(
        &self,
        user_id: UserId,
        instrument: &ValidatedInstrument,
    ) -> Result<String, TokenizerError> {
        let customer_reference = user_id.to_string();
        let body = match instrument {
            ValidatedInstrument::Card {
                number,
                cvv,
                holder_name,
                expiry,
                ..
            } => TokenRequest::Card {
                customer_reference,
                number: number.expose_secret(),
                cvv: cvv.expose_secret(),
                expiry,
                holder_name,
            },
            ValidatedInstrument::Paypal { email } => TokenRequest::Paypal {
                customer_reference,
                email: email.as_str(),
            },
            ValidatedInstrument::Sepa {
                holder_name,
                iban,
                bic,
                ..
            } => TokenRequest::Sepa {
                customer_reference,
                iban: iban.expose_secret(),
                bic,
                holder_name,
                mandate_accepted: true,
            },
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TokenizerError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| TokenizerError::Parse(e.to_string()))?;

        tracing::debug!(
            user_id = %user_id,
            method = %instrument.method_type(),
            "Payment instrument tokenized"
        );
        Ok(parsed.token)
    }
}

/// Issues local random references without contacting a processor.
///
/// For development and tests only; the references are not chargeable.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineTokenizer;

#[async_trait]
impl PaymentTokenizer for OfflineTokenizer {
    async fn tokenize(
        &self,
        _user_id: UserId,
        instrument: &ValidatedInstrument,
    ) -> Result<String, TokenizerError> {
        let suffix: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(OFFLINE_REFERENCE_LENGTH)
            .map(char::from)
            .collect();
        Ok(format!("pm_{}_{suffix}", instrument.method_type()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use account_settings_core::payment::{PaymentMethodForm, validate};

    use super::*;

    #[tokio::test]
    async fn test_offline_reference_shape() {
        let instrument = validate(&PaymentMethodForm {
            method_type: "paypal".to_owned(),
            paypal_email: Some("buyer@paypal.example".to_owned()),
            ..PaymentMethodForm::default()
        })
        .unwrap();

        let token = OfflineTokenizer
            .tokenize(UserId::new(1), &instrument)
            .await
            .unwrap();
        assert!(token.starts_with("pm_paypal_"));
        assert_eq!(token.len(), "pm_paypal_".len() + OFFLINE_REFERENCE_LENGTH);
    }

    #[test]
    fn test_card_request_never_serializes_display_only_fields() {
        let body = TokenRequest::Card {
            customer_reference: "7".to_owned(),
            number: "4111111111111111",
            cvv: "123",
            expiry: "12/27",
            holder_name: "Erika Mustermann",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["type"], "card");
        assert_eq!(json["customer_reference"], "7");
        assert!(json.get("last4").is_none());
    }
}
