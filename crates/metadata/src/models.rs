//! Database models mapping to the account schema.

use sqlx::FromRow;
use time::OffsetDateTime;

/// Account record. Exists while the user has any installation or open
/// installation.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct AccountRow {
    pub username: String,
    pub created: OffsetDateTime,
    pub modified: OffsetDateTime,
}

/// Open installation: a bootstrap credential not yet bound to a device,
/// keyed by the hash of its password.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct OpenInstRow {
    pub passwd_hash: String,
    pub username: String,
    pub created: OffsetDateTime,
}

/// Installation: a device bound to an account.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct InstRow {
    pub inst_id: String,
    pub username: String,
    /// Same credential material as the open installation it came from.
    pub passwd_hash: String,
    pub user_agent: String,
    pub app_version: String,
    pub launcher: Option<String>,
    /// Number of metadata updates since creation.
    pub update_count: i64,
    pub created: OffsetDateTime,
    pub modified: OffsetDateTime,
}

impl InstRow {
    /// First six characters of the instance id, for display.
    pub fn short_inst_id(&self) -> &str {
        match self.inst_id.char_indices().nth(6) {
            Some((idx, _)) => &self.inst_id[..idx],
            None => &self.inst_id,
        }
    }
}
