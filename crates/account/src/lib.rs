//! Account settings service library.
//!
//! Self-service settings for shop customers: personal data, billing and
//! shipping addresses, payment methods, notification and privacy
//! preferences, plus the email-change and account-deletion flows.
//!
//! The binary wires the `PostgreSQL`, SMTP and payment processor
//! implementations; everything is exposed as a library so the flows and the
//! HTTP API can be tested over in-memory collaborators.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
