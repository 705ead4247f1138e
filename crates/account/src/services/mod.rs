//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Password login, registration and re-verification (argon2)
//! - `settings` - The account settings operations
//! - `email` - Outgoing notices (SMTP, log-only, in-memory)
//! - `tokenizer` - Payment instrument tokenization (processor API, offline)

pub mod auth;
pub mod email;
pub mod settings;
pub mod tokenizer;

pub use auth::{AuthError, AuthService};
pub use email::{LogMailer, MemoryMailer, MessageDelivery, SmtpMailer};
pub use settings::{Collaborators, ServiceSettings, SettingsError, SettingsService};
pub use tokenizer::{HttpTokenizer, OfflineTokenizer, PaymentTokenizer};
