//! Metadata store trait and the SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::repos::{AccountRepo, InstRepo, LIST_LIMIT, OpenInstRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: AccountRepo + OpenInstRepo + InstRepo + Send + Sync {
    /// Create the account, open installation and installation tables.
    ///
    /// This is a one-time setup step: calling it against an existing schema
    /// fails.
    async fn create_tables(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQL text for every operation, formatted once for a table prefix.
///
/// sqlx prepares each statement on first execution and keeps it in the
/// connection's statement cache afterwards.
#[derive(Debug)]
struct Statements {
    create_account_table: String,
    create_open_inst_table: String,
    create_inst_table: String,

    get_account: String,
    add_account: String,
    remove_account: String,
    list_accounts: String,
    count_accounts: String,

    add_open_inst: String,
    user_open_insts: String,
    remove_open_inst: String,
    list_open_insts: String,
    count_open_insts: String,

    get_inst: String,
    user_insts: String,
    user_user_agent_insts: String,
    add_inst: String,
    modify_inst: String,
    update_inst: String,
    rename_inst: String,
    remove_inst: String,
    list_insts: String,
    count_insts: String,
}

impl Statements {
    fn new(prefix: &str) -> Self {
        let account = format!("{prefix}account");
        let open_inst = format!("{prefix}open_inst");
        let inst = format!("{prefix}inst");

        Self {
            create_account_table: format!(
                r#"
                CREATE TABLE {account} (
                    username TEXT PRIMARY KEY NOT NULL,
                    created TEXT NOT NULL,
                    modified TEXT NOT NULL
                )
                "#
            ),
            create_open_inst_table: format!(
                r#"
                CREATE TABLE {open_inst} (
                    passwd_hash TEXT PRIMARY KEY NOT NULL,
                    username TEXT NOT NULL REFERENCES {account}(username),
                    created TEXT NOT NULL
                );
                CREATE INDEX {open_inst}_username ON {open_inst}(username, created);
                "#
            ),
            create_inst_table: format!(
                r#"
                CREATE TABLE {inst} (
                    inst_id TEXT PRIMARY KEY NOT NULL,
                    username TEXT NOT NULL REFERENCES {account}(username),
                    passwd_hash TEXT NOT NULL,
                    user_agent TEXT NOT NULL,
                    app_version TEXT NOT NULL,
                    launcher TEXT,
                    update_count INTEGER NOT NULL DEFAULT 0,
                    created TEXT NOT NULL,
                    modified TEXT NOT NULL
                );
                CREATE INDEX {inst}_username ON {inst}(username, modified);
                "#
            ),

            get_account: format!("SELECT * FROM {account} WHERE username = ?"),
            add_account: format!(
                "INSERT INTO {account} (username, created, modified) VALUES (?, ?, ?)"
            ),
            remove_account: format!("DELETE FROM {account} WHERE username = ?"),
            list_accounts: format!("SELECT * FROM {account} ORDER BY username LIMIT {LIST_LIMIT}"),
            count_accounts: format!("SELECT COUNT(*) FROM {account}"),

            add_open_inst: format!(
                "INSERT INTO {open_inst} (passwd_hash, username, created) VALUES (?, ?, ?)"
            ),
            user_open_insts: format!(
                "SELECT * FROM {open_inst} WHERE username = ? ORDER BY created"
            ),
            remove_open_inst: format!("DELETE FROM {open_inst} WHERE passwd_hash = ?"),
            list_open_insts: format!(
                "SELECT * FROM {open_inst} ORDER BY username, created LIMIT {LIST_LIMIT}"
            ),
            count_open_insts: format!("SELECT COUNT(*) FROM {open_inst}"),

            get_inst: format!("SELECT * FROM {inst} WHERE inst_id = ?"),
            user_insts: format!("SELECT * FROM {inst} WHERE username = ? ORDER BY modified"),
            user_user_agent_insts: format!(
                "SELECT * FROM {inst} WHERE username = ? AND user_agent = ? ORDER BY modified"
            ),
            add_inst: format!(
                r#"
                INSERT INTO {inst} (
                    inst_id, username, passwd_hash, user_agent, app_version,
                    launcher, update_count, created, modified
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#
            ),
            modify_inst: format!(
                "UPDATE {inst} SET user_agent = ?, launcher = ?, modified = ? WHERE inst_id = ?"
            ),
            update_inst: format!(
                r#"
                UPDATE {inst} SET
                    user_agent = ?,
                    app_version = ?,
                    launcher = ?,
                    update_count = update_count + 1,
                    modified = ?
                WHERE inst_id = ?
                "#
            ),
            rename_inst: format!("UPDATE {inst} SET inst_id = ?, modified = ? WHERE inst_id = ?"),
            remove_inst: format!("DELETE FROM {inst} WHERE inst_id = ?"),
            list_insts: format!(
                "SELECT * FROM {inst} ORDER BY username, modified DESC LIMIT {LIST_LIMIT}"
            ),
            count_insts: format!("SELECT COUNT(*) FROM {inst}"),
        }
    }
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    sql: Statements,
}

impl SqliteStore {
    /// Open a SQLite store at `path` (":memory:" for an in-memory database).
    ///
    /// Tables are not created here; see [`MetadataStore::create_tables`].
    pub async fn new(path: impl AsRef<Path>, table_prefix: Option<&str>) -> MetadataResult<Self> {
        let path = path.as_ref();

        let base = if path == Path::new(":memory:") {
            SqliteConnectOptions::from_str("sqlite::memory:")?
        } else {
            // Ensure parent directory exists
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
        };
        let opts = base
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // A single long-lived connection: an in-memory database lives and
            // dies with its connection, and SQLite serialises writers anyway.
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;

        let prefix = table_prefix.unwrap_or("");
        tracing::debug!(path = %path.display(), table_prefix = %prefix, "Opened SQLite store");

        Ok(Self {
            pool,
            sql: Statements::new(prefix),
        })
    }

    /// Open an in-memory store.
    pub async fn in_memory(table_prefix: Option<&str>) -> MetadataResult<Self> {
        Self::new(":memory:", table_prefix).await
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn create_tables(&self) -> MetadataResult<()> {
        for ddl in [
            &self.sql.create_account_table,
            &self.sql.create_open_inst_table,
            &self.sql.create_inst_table,
        ] {
            sqlx::raw_sql(ddl).execute(&self.pool).await?;
        }
        tracing::info!("Created account tables");
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// Implement the repository traits for SqliteStore
mod sqlite_impl {
    use super::*;
    use crate::models::*;
    use time::OffsetDateTime;

    #[async_trait]
    impl AccountRepo for SqliteStore {
        async fn get_account(&self, username: &str) -> MetadataResult<Option<AccountRow>> {
            let row = sqlx::query_as::<_, AccountRow>(&self.sql.get_account)
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn create_account(&self, username: &str, now: OffsetDateTime) -> MetadataResult<()> {
            sqlx::query(&self.sql.add_account)
                .bind(username)
                .bind(now)
                .bind(now)
                .execute(&self.pool)
                .await
                .map_err(|e| MetadataError::from_insert(e, format!("account {username}")))?;
            Ok(())
        }

        async fn delete_account(&self, username: &str) -> MetadataResult<()> {
            let result = sqlx::query(&self.sql.remove_account)
                .bind(username)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!("account {username}")));
            }
            Ok(())
        }

        async fn list_accounts(&self) -> MetadataResult<Vec<AccountRow>> {
            let rows = sqlx::query_as::<_, AccountRow>(&self.sql.list_accounts)
                .fetch_all(&self.pool)
                .await?;
            Ok(rows)
        }

        async fn count_accounts(&self) -> MetadataResult<u64> {
            let count: i64 = sqlx::query_scalar(&self.sql.count_accounts)
                .fetch_one(&self.pool)
                .await?;
            Ok(count as u64)
        }
    }

    #[async_trait]
    impl OpenInstRepo for SqliteStore {
        async fn create_open_inst(
            &self,
            passwd_hash: &str,
            username: &str,
            now: OffsetDateTime,
        ) -> MetadataResult<()> {
            sqlx::query(&self.sql.add_open_inst)
                .bind(passwd_hash)
                .bind(username)
                .bind(now)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    MetadataError::from_insert(e, format!("open installation for {username}"))
                })?;
            Ok(())
        }

        async fn list_user_open_insts(&self, username: &str) -> MetadataResult<Vec<OpenInstRow>> {
            let rows = sqlx::query_as::<_, OpenInstRow>(&self.sql.user_open_insts)
                .bind(username)
                .fetch_all(&self.pool)
                .await?;
            Ok(rows)
        }

        async fn delete_open_inst(&self, passwd_hash: &str) -> MetadataResult<()> {
            let result = sqlx::query(&self.sql.remove_open_inst)
                .bind(passwd_hash)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                // The hash is credential material; keep it out of the message.
                return Err(MetadataError::NotFound("open installation".to_string()));
            }
            Ok(())
        }

        async fn list_open_insts(&self) -> MetadataResult<Vec<OpenInstRow>> {
            let rows = sqlx::query_as::<_, OpenInstRow>(&self.sql.list_open_insts)
                .fetch_all(&self.pool)
                .await?;
            Ok(rows)
        }

        async fn count_open_insts(&self) -> MetadataResult<u64> {
            let count: i64 = sqlx::query_scalar(&self.sql.count_open_insts)
                .fetch_one(&self.pool)
                .await?;
            Ok(count as u64)
        }
    }

    #[async_trait]
    impl InstRepo for SqliteStore {
        async fn get_inst(&self, inst_id: &str) -> MetadataResult<Option<InstRow>> {
            let row = sqlx::query_as::<_, InstRow>(&self.sql.get_inst)
                .bind(inst_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn list_user_insts(&self, username: &str) -> MetadataResult<Vec<InstRow>> {
            let rows = sqlx::query_as::<_, InstRow>(&self.sql.user_insts)
                .bind(username)
                .fetch_all(&self.pool)
                .await?;
            Ok(rows)
        }

        async fn list_user_user_agent_insts(
            &self,
            username: &str,
            user_agent: &str,
        ) -> MetadataResult<Vec<InstRow>> {
            let rows = sqlx::query_as::<_, InstRow>(&self.sql.user_user_agent_insts)
                .bind(username)
                .bind(user_agent)
                .fetch_all(&self.pool)
                .await?;
            Ok(rows)
        }

        async fn create_inst(&self, inst: &InstRow) -> MetadataResult<()> {
            sqlx::query(&self.sql.add_inst)
                .bind(&inst.inst_id)
                .bind(&inst.username)
                .bind(&inst.passwd_hash)
                .bind(&inst.user_agent)
                .bind(&inst.app_version)
                .bind(&inst.launcher)
                .bind(inst.update_count)
                .bind(inst.created)
                .bind(inst.modified)
                .execute(&self.pool)
                .await
                .map_err(|e| MetadataError::from_insert(e, format!("inst {}", inst.inst_id)))?;
            Ok(())
        }

        async fn modify_inst(
            &self,
            inst_id: &str,
            user_agent: &str,
            launcher: Option<&str>,
            now: OffsetDateTime,
        ) -> MetadataResult<()> {
            let result = sqlx::query(&self.sql.modify_inst)
                .bind(user_agent)
                .bind(launcher)
                .bind(now)
                .bind(inst_id)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!("inst {inst_id}")));
            }
            Ok(())
        }

        async fn update_inst(
            &self,
            inst_id: &str,
            user_agent: &str,
            app_version: &str,
            launcher: Option<&str>,
            now: OffsetDateTime,
        ) -> MetadataResult<()> {
            let result = sqlx::query(&self.sql.update_inst)
                .bind(user_agent)
                .bind(app_version)
                .bind(launcher)
                .bind(now)
                .bind(inst_id)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!("inst {inst_id}")));
            }
            Ok(())
        }

        async fn rename_inst(
            &self,
            old_inst_id: &str,
            new_inst_id: &str,
            now: OffsetDateTime,
        ) -> MetadataResult<()> {
            let result = sqlx::query(&self.sql.rename_inst)
                .bind(new_inst_id)
                .bind(now)
                .bind(old_inst_id)
                .execute(&self.pool)
                .await
                .map_err(|e| MetadataError::from_insert(e, format!("inst {new_inst_id}")))?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!("inst {old_inst_id}")));
            }
            Ok(())
        }

        async fn delete_inst(&self, inst_id: &str) -> MetadataResult<()> {
            let result = sqlx::query(&self.sql.remove_inst)
                .bind(inst_id)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!("inst {inst_id}")));
            }
            Ok(())
        }

        async fn list_insts(&self) -> MetadataResult<Vec<InstRow>> {
            let rows = sqlx::query_as::<_, InstRow>(&self.sql.list_insts)
                .fetch_all(&self.pool)
                .await?;
            Ok(rows)
        }

        async fn count_insts(&self) -> MetadataResult<u64> {
            let count: i64 = sqlx::query_scalar(&self.sql.count_insts)
                .fetch_one(&self.pool)
                .await?;
            Ok(count as u64)
        }
    }
}
