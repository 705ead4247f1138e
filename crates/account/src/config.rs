//! Account settings configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ACCOUNT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `ACCOUNT_BASE_URL` - Public URL of the service, used to build reject links
//! - `ACCOUNT_SESSION_SECRET` - Session secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `ACCOUNT_HOST` - Bind address (default: 127.0.0.1)
//! - `ACCOUNT_PORT` - Listen port (default: 3000)
//! - `ACCOUNT_OPERATOR_EMAIL` - Site operator address for rejection notices
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag
//!
//! ## Optional (SMTP - all or nothing; without it messages are only logged)
//! - `SMTP_HOST` - SMTP server hostname
//! - `SMTP_PORT` - SMTP port (default: 587)
//! - `SMTP_USERNAME` - SMTP authentication username
//! - `SMTP_PASSWORD` - SMTP authentication password
//! - `EMAIL_FROM` - Email sender address
//!
//! ## Optional (payment processor - without it an offline tokenizer is used)
//! - `PAYMENT_PROCESSOR_URL` - Base URL of the tokenization endpoint
//! - `PAYMENT_PROCESSOR_API_KEY` - Processor API key

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use account_settings_core::Email;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Fragments that mark a value copied from a sample `.env` (matched lowercase).
const PLACEHOLDER_FRAGMENTS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(&'static str, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(&'static str, String),
}

/// Account settings service configuration.
#[derive(Debug, Clone)]
pub struct AccountConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    pub host: IpAddr,
    pub port: u16,
    /// Public base URL, without trailing slash
    pub base_url: String,
    /// Checked at startup; cookies carry only the opaque session id.
    pub session_secret: SecretString,
    /// Recipient of operator notifications
    pub operator_email: Option<Email>,
    pub email: Option<EmailConfig>,
    pub payment_processor: Option<PaymentProcessorConfig>,
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
}

/// Email (SMTP) configuration.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: SecretString,
    /// Email sender address (From header)
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

/// Payment processor tokenization endpoint.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct PaymentProcessorConfig {
    pub base_url: Url,
    pub api_key: SecretString,
}

impl std::fmt::Debug for PaymentProcessorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentProcessorConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl AccountConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value.
    ///
    /// # Errors
    ///
    /// See [`AccountConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars(lookup);

        let database_url = vars
            .optional("ACCOUNT_DATABASE_URL")
            .or_else(|| vars.optional("DATABASE_URL"))
            .map(SecretString::from)
            .ok_or(ConfigError::MissingEnvVar("ACCOUNT_DATABASE_URL"))?;

        let session_secret = vars.required("ACCOUNT_SESSION_SECRET")?;
        check_secret("ACCOUNT_SESSION_SECRET", &session_secret, MIN_SESSION_SECRET_LENGTH)?;

        Ok(Self {
            database_url,
            host: vars.parsed_or("ACCOUNT_HOST", IpAddr::from([127, 0, 0, 1]))?,
            port: vars.parsed_or("ACCOUNT_PORT", 3000)?,
            base_url: parse_base_url(&vars.required("ACCOUNT_BASE_URL")?)?,
            session_secret: SecretString::from(session_secret),
            operator_email: vars
                .optional("ACCOUNT_OPERATOR_EMAIL")
                .map(|v| {
                    Email::parse(&v).map_err(|e| {
                        ConfigError::InvalidEnvVar("ACCOUNT_OPERATOR_EMAIL", e.to_string())
                    })
                })
                .transpose()?,
            email: EmailConfig::from_vars(&vars)?,
            payment_processor: PaymentProcessorConfig::from_vars(&vars)?,
            sentry_dsn: vars.optional("SENTRY_DSN"),
            sentry_environment: vars.optional("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl EmailConfig {
    fn from_vars<F: Fn(&str) -> Option<String>>(vars: &Vars<F>) -> Result<Option<Self>, ConfigError> {
        match (
            vars.optional("SMTP_HOST"),
            vars.optional("SMTP_USERNAME"),
            vars.optional("SMTP_PASSWORD"),
            vars.optional("EMAIL_FROM"),
        ) {
            (Some(smtp_host), Some(smtp_username), Some(password), Some(from_address)) => {
                Ok(Some(Self {
                    smtp_host,
                    smtp_port: vars.parsed_or("SMTP_PORT", 587)?,
                    smtp_username,
                    smtp_password: SecretString::from(password),
                    from_address,
                }))
            }
            (None, None, None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "SMTP_HOST",
                "SMTP_HOST, SMTP_USERNAME, SMTP_PASSWORD and EMAIL_FROM must be set together"
                    .to_string(),
            )),
        }
    }
}

impl PaymentProcessorConfig {
    fn from_vars<F: Fn(&str) -> Option<String>>(vars: &Vars<F>) -> Result<Option<Self>, ConfigError> {
        match (
            vars.optional("PAYMENT_PROCESSOR_URL"),
            vars.optional("PAYMENT_PROCESSOR_API_KEY"),
        ) {
            (Some(url), Some(key)) => {
                let base_url = Url::parse(&url)
                    .map_err(|e| ConfigError::InvalidEnvVar("PAYMENT_PROCESSOR_URL", e.to_string()))?;
                check_secret("PAYMENT_PROCESSOR_API_KEY", &key, 0)?;
                Ok(Some(Self {
                    base_url,
                    api_key: SecretString::from(key),
                }))
            }
            (None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "PAYMENT_PROCESSOR_URL",
                "PAYMENT_PROCESSOR_URL and PAYMENT_PROCESSOR_API_KEY must be set together"
                    .to_string(),
            )),
        }
    }
}

// =============================================================================
// Variable access
// =============================================================================

/// Typed access to a variable source.
struct Vars<F>(F);

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    /// Empty values count as unset.
    fn optional(&self, key: &'static str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.optional(key).ok_or(ConfigError::MissingEnvVar(key))
    }

    fn parsed_or<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key).map_or(Ok(default), |raw| {
            raw.trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key, e.to_string()))
        })
    }
}

/// Validate the base URL and strip any trailing slash.
fn parse_base_url(value: &str) -> Result<String, ConfigError> {
    let url =
        Url::parse(value).map_err(|e| ConfigError::InvalidEnvVar("ACCOUNT_BASE_URL", e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            "ACCOUNT_BASE_URL",
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(value.trim_end_matches('/').to_string())
}

// =============================================================================
// Secret checks
// =============================================================================

/// Shannon entropy in bits per character.
fn bits_per_char(s: &str) -> f64 {
    let mut counts: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *counts.entry(c).or_default() += 1;
    }
    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    counts
        .values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Reject placeholders, short values and low-entropy values.
fn check_secret(var: &'static str, secret: &str, min_length: usize) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();
    if let Some(fragment) = PLACEHOLDER_FRAGMENTS.iter().find(|f| lower.contains(*f)) {
        return Err(ConfigError::InsecureSecret(
            var,
            format!("appears to be a placeholder (contains '{fragment}')"),
        ));
    }

    let length = secret.chars().count();
    if length < min_length {
        return Err(ConfigError::InsecureSecret(
            var,
            format!("must be at least {min_length} characters (got {length})"),
        ));
    }

    let entropy = bits_per_char(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var,
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}
