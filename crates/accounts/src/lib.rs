//! Account management for progressive web app installations.
//!
//! A user is onboarded with an open installation: a one-time password that
//! is handed out in obfuscated form. The client later presents it together
//! with its instance id and device metadata, and [`AccountMgr`] binds it to
//! an installation, refreshes an existing one, or recognises a re-installed
//! device by its user agent.

pub mod account;
pub mod error;
pub mod inst;
pub mod mailer;
pub mod manager;
pub mod open_inst;

pub use account::AccountAccessor;
pub use error::{AccountError, AccountResult};
pub use inst::{Credentials, InstAccessor};
pub use mailer::{LogMailer, Mailer, SendmailMailer};
pub use manager::{AccountMgr, Reconciliation};
pub use open_inst::OpenInstAccessor;
