//! Open installation accessor: pending credentials awaiting a device.

use crate::error::AccountResult;
use pwa_core::{ObfuscatedPasswd, PasswdTransformer};
use pwa_metadata::{MetadataStore, OpenInstRow};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};

/// Open installations keyed by password hash, expiring after `max_age`.
#[derive(Clone)]
pub struct OpenInstAccessor {
    store: Arc<dyn MetadataStore>,
    transformer: Arc<PasswdTransformer>,
    max_age: Duration,
}

impl OpenInstAccessor {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        transformer: Arc<PasswdTransformer>,
        max_age: Duration,
    ) -> Self {
        Self {
            store,
            transformer,
            max_age,
        }
    }

    pub fn transformer(&self) -> &PasswdTransformer {
        &self.transformer
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Issue a new open installation for `username`.
    ///
    /// Only the hash is stored; the returned obfuscated password is the sole
    /// copy of the credential.
    pub async fn add(&self, username: &str) -> AccountResult<ObfuscatedPasswd> {
        let passwd = self.transformer.create_passwd();
        let passwd_hash = self.transformer.create_hash(&passwd)?;

        self.store
            .create_open_inst(&passwd_hash, username, OffsetDateTime::now_utc())
            .await?;
        tracing::info!(username = %username, "Open installation created");

        Ok(self.transformer.obfuscate(&passwd))
    }

    /// Find the open installation of `username` whose password matches.
    ///
    /// An expired match is deleted and reported as absent.
    pub async fn get(
        &self,
        username: &str,
        obfuscated: &ObfuscatedPasswd,
    ) -> AccountResult<Option<OpenInstRow>> {
        let candidates = self.store.list_user_open_insts(username).await?;

        let Some(record) = candidates
            .into_iter()
            .find(|record| self.transformer.verify(obfuscated, &record.passwd_hash))
        else {
            return Ok(None);
        };

        let expired = record
            .created
            .checked_add(self.max_age)
            .is_some_and(|expires| expires < OffsetDateTime::now_utc());
        if expired {
            self.store.delete_open_inst(&record.passwd_hash).await?;
            tracing::info!(
                username = %username,
                created = %record.created,
                "Expired open installation purged"
            );
            return Ok(None);
        }

        Ok(Some(record))
    }

    /// Delete an open installation. Fails with `NotFound` if absent.
    pub async fn remove(&self, passwd_hash: &str) -> AccountResult<()> {
        self.store.delete_open_inst(passwd_hash).await?;
        Ok(())
    }

    /// Open installations of `username`, oldest first.
    pub async fn get_user_insts(&self, username: &str) -> AccountResult<Vec<OpenInstRow>> {
        Ok(self.store.list_user_open_insts(username).await?)
    }

    pub async fn list(&self) -> AccountResult<Vec<OpenInstRow>> {
        Ok(self.store.list_open_insts().await?)
    }

    pub async fn count(&self) -> AccountResult<u64> {
        Ok(self.store.count_open_insts().await?)
    }
}
