//! Installation accessor: devices bound to accounts.

use crate::error::{AccountError, AccountResult};
use pwa_core::{ObfuscatedPasswd, PasswdTransformer};
use pwa_metadata::{InstRow, MetadataStore};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};

/// Username and obfuscated password presented by a client.
#[derive(Clone, Copy, Debug)]
pub struct Credentials<'a> {
    pub username: &'a str,
    pub obfuscated: &'a ObfuscatedPasswd,
}

impl<'a> Credentials<'a> {
    pub fn new(username: &'a str, obfuscated: &'a ObfuscatedPasswd) -> Self {
        Self {
            username,
            obfuscated,
        }
    }
}

/// Installations keyed by instance id.
#[derive(Clone)]
pub struct InstAccessor {
    store: Arc<dyn MetadataStore>,
    transformer: Arc<PasswdTransformer>,
    min_replaceable_age: Option<Duration>,
}

impl InstAccessor {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        transformer: Arc<PasswdTransformer>,
        min_replaceable_age: Option<Duration>,
    ) -> Self {
        Self {
            store,
            transformer,
            min_replaceable_age,
        }
    }

    pub fn transformer(&self) -> &PasswdTransformer {
        &self.transformer
    }

    pub fn min_replaceable_age(&self) -> Option<Duration> {
        self.min_replaceable_age
    }

    /// Look up an installation by instance id.
    ///
    /// Without credentials an unknown id yields `None`. With credentials the
    /// stored username and password must match, otherwise the call fails with
    /// `NotFound`; a mismatch is an authentication failure, not a missing
    /// record.
    ///
    /// When the id is unknown, credentials are given and a minimum
    /// replaceable age is configured, the user's oldest-modified installation
    /// that was created before that age and whose password verifies is moved
    /// to `inst_id` and returned.
    pub async fn get(
        &self,
        inst_id: &str,
        credentials: Option<Credentials<'_>>,
    ) -> AccountResult<Option<InstRow>> {
        if let Some(record) = self.store.get_inst(inst_id).await? {
            if let Some(creds) = credentials {
                if record.username != creds.username {
                    return Err(AccountError::NotFound(format!(
                        "inst {inst_id} for user {}",
                        creds.username
                    )));
                }
                if !self.transformer.verify(creds.obfuscated, &record.passwd_hash) {
                    return Err(AccountError::NotFound(format!(
                        "inst {inst_id} for user {} with given password",
                        creds.username
                    )));
                }
            }
            return Ok(Some(record));
        }

        match (credentials, self.min_replaceable_age) {
            (Some(creds), Some(min_age)) => self.replace(inst_id, creds, min_age).await,
            _ => Ok(None),
        }
    }

    async fn replace(
        &self,
        inst_id: &str,
        creds: Credentials<'_>,
        min_age: Duration,
    ) -> AccountResult<Option<InstRow>> {
        let now = OffsetDateTime::now_utc();
        let Some(max_created) = now.checked_sub(min_age) else {
            return Ok(None);
        };

        let candidates = self.store.list_user_insts(creds.username).await?;
        let Some(old) = candidates.into_iter().find(|record| {
            record.created < max_created
                && self.transformer.verify(creds.obfuscated, &record.passwd_hash)
        }) else {
            return Ok(None);
        };

        self.store.rename_inst(&old.inst_id, inst_id, now).await?;
        tracing::info!(
            username = %creds.username,
            old_inst_id = %old.short_inst_id(),
            new_inst_id = %inst_id,
            "Installation moved to new instance id"
        );

        match self.store.get_inst(inst_id).await? {
            Some(record) => Ok(Some(record)),
            None => Err(AccountError::NotFound(format!("inst {inst_id}"))),
        }
    }

    /// Installations of `username`, least recently modified first.
    pub async fn get_user_insts(&self, username: &str) -> AccountResult<Vec<InstRow>> {
        Ok(self.store.list_user_insts(username).await?)
    }

    /// Installations of `username` with exactly `user_agent`, least recently
    /// modified first.
    pub async fn get_user_user_agent_insts(
        &self,
        username: &str,
        user_agent: &str,
    ) -> AccountResult<Vec<InstRow>> {
        Ok(self
            .store
            .list_user_user_agent_insts(username, user_agent)
            .await?)
    }

    /// Create an installation with an update count of zero.
    pub async fn add(
        &self,
        inst_id: &str,
        username: &str,
        passwd_hash: &str,
        user_agent: &str,
        app_version: &str,
        launcher: Option<&str>,
    ) -> AccountResult<()> {
        let now = OffsetDateTime::now_utc();
        let record = InstRow {
            inst_id: inst_id.to_string(),
            username: username.to_string(),
            passwd_hash: passwd_hash.to_string(),
            user_agent: user_agent.to_string(),
            app_version: app_version.to_string(),
            launcher: launcher.map(str::to_string),
            update_count: 0,
            created: now,
            modified: now,
        };
        self.store.create_inst(&record).await?;
        tracing::info!(
            username = %username,
            inst_id = %record.short_inst_id(),
            app_version = %app_version,
            "Installation created"
        );
        Ok(())
    }

    /// Update user agent and launcher. Fails with `NotFound` if absent.
    pub async fn modify(
        &self,
        inst_id: &str,
        user_agent: &str,
        launcher: Option<&str>,
    ) -> AccountResult<()> {
        self.store
            .modify_inst(inst_id, user_agent, launcher, OffsetDateTime::now_utc())
            .await?;
        Ok(())
    }

    /// Update user agent, app version and launcher and bump the update
    /// count. Fails with `NotFound` if absent.
    pub async fn update_inst(
        &self,
        inst_id: &str,
        user_agent: &str,
        app_version: &str,
        launcher: Option<&str>,
    ) -> AccountResult<()> {
        self.store
            .update_inst(
                inst_id,
                user_agent,
                app_version,
                launcher,
                OffsetDateTime::now_utc(),
            )
            .await?;
        Ok(())
    }

    /// Delete an installation. Fails with `NotFound` if absent.
    pub async fn remove(&self, inst_id: &str) -> AccountResult<()> {
        self.store.delete_inst(inst_id).await?;
        Ok(())
    }

    /// All installations by username, most recently modified first, bounded
    /// to one listing page.
    pub async fn list(&self) -> AccountResult<Vec<InstRow>> {
        Ok(self.store.list_insts().await?)
    }

    pub async fn count(&self) -> AccountResult<u64> {
        Ok(self.store.count_insts().await?)
    }
}
