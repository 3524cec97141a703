//! Relational store for PWA account management.
//!
//! This crate provides the persisted data model:
//! - Accounts, keyed by username
//! - Open installations, keyed by password hash
//! - Installations, keyed by instance id
//!
//! The repositories are plain CRUD; credential checks and age policies live
//! in the accessors built on top of them.

pub mod error;
pub mod models;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use models::{AccountRow, InstRow, OpenInstRow};
pub use store::{MetadataStore, SqliteStore};

use pwa_core::config::DbConfig;
use std::sync::Arc;

/// Create a metadata store from configuration.
pub async fn from_config(config: &DbConfig) -> MetadataResult<Arc<dyn MetadataStore>> {
    config.validate().map_err(MetadataError::Config)?;
    let store = SqliteStore::new(&config.path, config.table_prefix.as_deref()).await?;
    Ok(Arc::new(store) as Arc<dyn MetadataStore>)
}
