//! Account manager test utilities.

use pwa_accounts::AccountMgr;
use pwa_core::PasswdTransformer;
use pwa_metadata::{MetadataStore, SqliteStore};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use tempfile::TempDir;
use time::{Duration, OffsetDateTime};

/// Maximum open installation age used unless a test overrides it.
pub const MAX_OPEN_INST_AGE: Duration = Duration::seconds(4);

/// Maximum previous installation age used unless a test overrides it.
pub const MAX_PREV_INST_AGE: Duration = Duration::days(30);

/// Age windows for a test manager.
#[derive(Clone, Copy, Debug)]
pub struct TestAges {
    pub max_open_inst_age: Duration,
    pub max_prev_inst_age: Duration,
    pub min_replaceable_inst_age: Option<Duration>,
}

impl Default for TestAges {
    fn default() -> Self {
        Self {
            max_open_inst_age: MAX_OPEN_INST_AGE,
            max_prev_inst_age: MAX_PREV_INST_AGE,
            min_replaceable_inst_age: None,
        }
    }
}

/// A manager over a fresh file-backed SQLite store that cleans up on drop.
#[allow(dead_code)]
pub struct TestAccounts {
    pub mgr: AccountMgr,
    sqlite_store: Arc<SqliteStore>,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestAccounts {
    /// Create a manager with default age windows and tables in place.
    pub async fn new() -> Self {
        Self::with_ages(TestAges::default()).await
    }

    /// Create a manager with the given age windows and tables in place.
    pub async fn with_ages(ages: TestAges) -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test.db");
        let store = Arc::new(
            SqliteStore::new(&db_path, None)
                .await
                .expect("Failed to open store"),
        );

        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut key = [0u8; 8];
        rng.fill_bytes(&mut key);
        let transformer = Arc::new(
            PasswdTransformer::with_rng(key.to_vec(), pwa_core::MIN_HASH_COST, rng)
                .expect("Failed to create transformer"),
        );

        let mgr = AccountMgr::new(
            store.clone() as Arc<dyn MetadataStore>,
            transformer,
            ages.max_open_inst_age,
            ages.max_prev_inst_age,
            ages.min_replaceable_inst_age,
        );
        mgr.create_tables().await.expect("Failed to create tables");

        Self {
            mgr,
            sqlite_store: store,
            _temp_dir: temp_dir,
        }
    }

    /// Get the SQLite connection pool for raw queries.
    pub fn pool(&self) -> &Pool<Sqlite> {
        self.sqlite_store.pool()
    }

    /// Move an installation's timestamps into the past.
    pub async fn backdate_inst(&self, inst_id: &str, created_ago: Duration, modified_ago: Duration) {
        let now = OffsetDateTime::now_utc();
        let result = sqlx::query("UPDATE inst SET created = ?, modified = ? WHERE inst_id = ?")
            .bind(now - created_ago)
            .bind(now - modified_ago)
            .bind(inst_id)
            .execute(self.pool())
            .await
            .expect("Failed to backdate installation");
        assert_eq!(result.rows_affected(), 1);
    }

    /// Move the creation time of all open installations of a user into the
    /// past.
    pub async fn backdate_open_insts(&self, username: &str, ago: Duration) {
        sqlx::query("UPDATE open_inst SET created = ? WHERE username = ?")
            .bind(OffsetDateTime::now_utc() - ago)
            .bind(username)
            .execute(self.pool())
            .await
            .expect("Failed to backdate open installations");
    }

    pub async fn account_count(&self) -> u64 {
        self.mgr.account_accessor().count().await.unwrap()
    }

    pub async fn open_inst_count(&self) -> u64 {
        self.mgr.open_inst_accessor().count().await.unwrap()
    }

    pub async fn inst_count(&self) -> u64 {
        self.mgr.inst_accessor().count().await.unwrap()
    }

    pub async fn user_open_inst_count(&self, username: &str) -> usize {
        self.mgr
            .open_inst_accessor()
            .get_user_insts(username)
            .await
            .unwrap()
            .len()
    }
}
