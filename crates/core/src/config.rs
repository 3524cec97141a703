//! Configuration types shared across crates.

use crate::duration::IsoDuration;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use time::Duration;

/// Upper bound for every configured age window.
pub const MAX_AGE: Duration = Duration::days(100 * 365);

/// Database configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DbConfig {
    /// SQLite database file path (":memory:" for an in-memory database).
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// Prefix prepended to every table name.
    #[serde(default)]
    pub table_prefix: Option<String>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/pwa.db")
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            table_prefix: None,
        }
    }
}

impl DbConfig {
    /// Table prefix, empty when none is configured.
    pub fn prefix(&self) -> &str {
        self.table_prefix.as_deref().unwrap_or("")
    }

    /// Validate database configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(prefix) = &self.table_prefix
            && !prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(format!(
                "db.table_prefix {prefix:?} may only contain ASCII letters, digits and '_'"
            ));
        }
        Ok(())
    }
}

/// Outgoing mail configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MailConfig {
    /// Only log outgoing mail (development).
    #[default]
    Log,
    /// Pipe messages into a sendmail-compatible command.
    Sendmail {
        /// Command to run; receives the full message on stdin.
        #[serde(default = "default_sendmail_command")]
        command: Vec<String>,
        /// Sender address.
        from: String,
    },
}

fn default_sendmail_command() -> Vec<String> {
    vec![
        "/usr/sbin/sendmail".to_string(),
        "-t".to_string(),
        "-i".to_string(),
    ]
}

impl MailConfig {
    /// Validate mail configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            MailConfig::Log => Ok(()),
            MailConfig::Sendmail { command, from } => {
                if command.is_empty() {
                    return Err("mail.command must name a program".to_string());
                }
                if !from.contains('@') {
                    return Err(format!("mail.from {from:?} is not an address"));
                }
                Ok(())
            }
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    #[serde(default)]
    pub db: DbConfig,
    /// Shared key used to obfuscate passwords (its UTF-8 bytes).
    pub passwd_key: String,
    /// How long an open installation may wait before it is bound to a device.
    pub max_open_inst_age: IsoDuration,
    /// How recently a previous installation must have been modified to be
    /// re-bound under a new instance id.
    #[serde(default = "default_max_prev_inst_age")]
    pub max_prev_inst_age: IsoDuration,
    /// Minimum age after which an installation may silently take over a new
    /// instance id. Disabled when absent.
    #[serde(default)]
    pub min_replaceable_inst_age: Option<IsoDuration>,
    /// Bcrypt cost for password hashes.
    #[serde(default = "default_hash_cost")]
    pub hash_cost: u32,
    /// Outgoing mail.
    #[serde(default)]
    pub mail: MailConfig,
    /// Base URL of the web app, used in onboarding links.
    #[serde(default = "default_app_url")]
    pub app_url: String,
}

fn default_max_prev_inst_age() -> IsoDuration {
    IsoDuration::from_secs(30 * 24 * 3600)
}

fn default_hash_cost() -> u32 {
    crate::DEFAULT_HASH_COST
}

fn default_app_url() -> String {
    "http://localhost/".to_string()
}

impl AppConfig {
    /// Validate the complete configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.passwd_key.is_empty() {
            return Err("passwd_key must not be empty".to_string());
        }
        if !(crate::MIN_HASH_COST..=crate::MAX_HASH_COST).contains(&self.hash_cost) {
            return Err(format!(
                "hash_cost {} outside {}..={}",
                self.hash_cost,
                crate::MIN_HASH_COST,
                crate::MAX_HASH_COST
            ));
        }
        check_age("max_open_inst_age", &self.max_open_inst_age)?;
        check_age("max_prev_inst_age", &self.max_prev_inst_age)?;
        if let Some(age) = &self.min_replaceable_inst_age {
            check_age("min_replaceable_inst_age", age)?;
        }
        self.db.validate()?;
        self.mail.validate()
    }

    /// Create a test configuration with an in-memory database.
    ///
    /// **For testing only.** Uses the cheapest bcrypt cost.
    pub fn for_testing() -> Self {
        Self {
            db: DbConfig {
                path: PathBuf::from(":memory:"),
                table_prefix: None,
            },
            passwd_key: "test-passwd-key".to_string(),
            max_open_inst_age: IsoDuration::from_secs(4),
            max_prev_inst_age: default_max_prev_inst_age(),
            min_replaceable_inst_age: None,
            hash_cost: crate::MIN_HASH_COST,
            mail: MailConfig::Log,
            app_url: default_app_url(),
        }
    }
}

fn check_age(name: &str, age: &IsoDuration) -> Result<(), String> {
    if !age.duration().is_positive() {
        return Err(format!("{name} must be positive"));
    }
    if age.duration() > MAX_AGE {
        return Err(format!(
            "{name} {age} exceeds maximum of {} days",
            MAX_AGE.whole_days()
        ));
    }
    Ok(())
}
