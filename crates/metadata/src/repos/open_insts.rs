//! Open installation repository.

use crate::error::MetadataResult;
use crate::models::OpenInstRow;
use async_trait::async_trait;
use time::OffsetDateTime;

/// Repository for open (not yet bound) installations.
#[async_trait]
pub trait OpenInstRepo: Send + Sync {
    /// Store a pending credential under its password hash.
    async fn create_open_inst(
        &self,
        passwd_hash: &str,
        username: &str,
        now: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// Open installations of a user, oldest first.
    async fn list_user_open_insts(&self, username: &str) -> MetadataResult<Vec<OpenInstRow>>;

    /// Delete an open installation. Fails with `NotFound` if absent.
    async fn delete_open_inst(&self, passwd_hash: &str) -> MetadataResult<()>;

    /// List open installations by username then age, bounded by `LIST_LIMIT`.
    async fn list_open_insts(&self) -> MetadataResult<Vec<OpenInstRow>>;

    /// Count all open installations.
    async fn count_open_insts(&self) -> MetadataResult<u64>;
}
