//! Account Settings Core - Shared types and invariant logic.
//!
//! This crate provides the pieces used by every account settings component:
//! - `account` - The settings service and its JSON HTTP API
//! - `cli` - Command-line tools for migrations and management
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP clients. Stores apply the plans computed here inside their
//! own transactions.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, order statuses, and typed settings records
//! - [`selection`] - The "at most one default" rules for payment methods and addresses
//! - [`payment`] - Structural validation of payment instruments

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod payment;
pub mod selection;
pub mod types;

pub use types::*;
