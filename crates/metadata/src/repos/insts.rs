//! Installation repository.

use crate::error::MetadataResult;
use crate::models::InstRow;
use async_trait::async_trait;
use time::OffsetDateTime;

/// Repository for installations bound to devices.
#[async_trait]
pub trait InstRepo: Send + Sync {
    /// Get an installation by instance id.
    async fn get_inst(&self, inst_id: &str) -> MetadataResult<Option<InstRow>>;

    /// Installations of a user, least recently modified first.
    async fn list_user_insts(&self, username: &str) -> MetadataResult<Vec<InstRow>>;

    /// Installations of a user with exactly this user agent, least recently
    /// modified first.
    async fn list_user_user_agent_insts(
        &self,
        username: &str,
        user_agent: &str,
    ) -> MetadataResult<Vec<InstRow>>;

    /// Create an installation.
    async fn create_inst(&self, inst: &InstRow) -> MetadataResult<()>;

    /// Update user agent and launcher, leaving app version and update count.
    /// Fails with `NotFound` if absent.
    async fn modify_inst(
        &self,
        inst_id: &str,
        user_agent: &str,
        launcher: Option<&str>,
        now: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// Update user agent, app version and launcher and bump the update count.
    /// Fails with `NotFound` if absent.
    async fn update_inst(
        &self,
        inst_id: &str,
        user_agent: &str,
        app_version: &str,
        launcher: Option<&str>,
        now: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// Move an installation to a new instance id, keeping `created`.
    /// Fails with `NotFound` if `old_inst_id` is absent.
    async fn rename_inst(
        &self,
        old_inst_id: &str,
        new_inst_id: &str,
        now: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// Delete an installation. Fails with `NotFound` if absent.
    async fn delete_inst(&self, inst_id: &str) -> MetadataResult<()>;

    /// List installations by username, most recently modified first,
    /// bounded by `LIST_LIMIT`.
    async fn list_insts(&self) -> MetadataResult<Vec<InstRow>>;

    /// Count all installations.
    async fn count_insts(&self) -> MetadataResult<u64>;
}
