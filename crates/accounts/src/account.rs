//! Account accessor.

use crate::error::AccountResult;
use pwa_metadata::{AccountRow, MetadataStore};
use std::sync::Arc;
use time::OffsetDateTime;

/// Accounts keyed by username.
#[derive(Clone)]
pub struct AccountAccessor {
    store: Arc<dyn MetadataStore>,
}

impl AccountAccessor {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, username: &str) -> AccountResult<Option<AccountRow>> {
        Ok(self.store.get_account(username).await?)
    }

    /// Create an account. Fails with `AlreadyExists` on a duplicate username;
    /// callers check with [`get`](Self::get) first.
    pub async fn add(&self, username: &str) -> AccountResult<()> {
        self.store
            .create_account(username, OffsetDateTime::now_utc())
            .await?;
        tracing::info!(username = %username, "Account created");
        Ok(())
    }

    /// Delete an account. Fails with `NotFound` if absent.
    pub async fn remove(&self, username: &str) -> AccountResult<()> {
        self.store.delete_account(username).await?;
        tracing::info!(username = %username, "Account removed");
        Ok(())
    }

    /// All accounts in username order, bounded to one listing page.
    pub async fn list(&self) -> AccountResult<Vec<AccountRow>> {
        Ok(self.store.list_accounts().await?)
    }

    pub async fn count(&self) -> AccountResult<u64> {
        Ok(self.store.count_accounts().await?)
    }
}
