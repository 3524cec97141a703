//! Core domain types and shared logic for PWA account management.
//!
//! This crate defines the pieces every other crate builds on:
//! - Password creation, XOR obfuscation, hashing and verification
//! - User-agent similarity used to recognise re-installed devices
//! - ISO-8601 durations for the configurable age windows
//! - Application configuration

pub mod config;
pub mod duration;
pub mod error;
pub mod passwd;
pub mod user_agent;

pub use duration::IsoDuration;
pub use error::{Error, Result};
pub use passwd::{ObfuscatedPasswd, PasswdTransformer};
pub use user_agent::is_similar_user_agent;

/// Length in bytes of a freshly created password.
pub const PASSWD_LENGTH: usize = 16;

/// Default bcrypt cost for new password hashes.
pub const DEFAULT_HASH_COST: u32 = 10;

/// Smallest bcrypt cost accepted.
pub const MIN_HASH_COST: u32 = 4;

/// Largest bcrypt cost accepted.
pub const MAX_HASH_COST: u32 = 31;
