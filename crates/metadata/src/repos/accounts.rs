//! Account repository.

use crate::error::MetadataResult;
use crate::models::AccountRow;
use async_trait::async_trait;
use time::OffsetDateTime;

/// Repository for account records.
#[async_trait]
pub trait AccountRepo: Send + Sync {
    /// Get an account by username.
    async fn get_account(&self, username: &str) -> MetadataResult<Option<AccountRow>>;

    /// Create an account with `created = modified = now`.
    /// Fails with `AlreadyExists` on a duplicate username.
    async fn create_account(&self, username: &str, now: OffsetDateTime) -> MetadataResult<()>;

    /// Delete an account. Fails with `NotFound` if absent.
    async fn delete_account(&self, username: &str) -> MetadataResult<()>;

    /// List accounts in username order, bounded by `LIST_LIMIT`.
    async fn list_accounts(&self) -> MetadataResult<Vec<AccountRow>>;

    /// Count all accounts.
    async fn count_accounts(&self) -> MetadataResult<u64>;
}
