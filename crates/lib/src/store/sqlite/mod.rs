//! SQLite-backed store implementation using sqlx.
//!
//! Two row-oriented tables with autoincrement primary keys hold accounts
//! and entries; rowids are normalized to decimal-string [`Id`]s at the API
//! boundary. The UNIQUE constraint on `accounts.username` is the
//! authoritative duplicate-registration guard — the SELECT pre-check in
//! [`SqliteStore::create_account`] only gives a friendlier fast path and is
//! never trusted alone.

/// Schema definition and migration system.
pub mod schema;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::store::errors::StoreError;
use crate::store::DataStore;
use crate::types::{
    Account, AccountProfile, AccountSummary, DataEntry, Id, StoreStats, summarize_sorted,
};
use crate::Result;

/// Extension trait for sqlx Result types to simplify error handling.
///
/// Adds a method to convert sqlx errors to `StoreError::Sqlx` with a
/// context message.
pub(crate) trait SqlxResultExt<T> {
    /// Convert sqlx error to StoreError with context message.
    fn sql_context(self, context: &str) -> Result<T>;
}

impl<T> SqlxResultExt<T> for std::result::Result<T, sqlx::Error> {
    fn sql_context(self, context: &str) -> Result<T> {
        self.map_err(|e| {
            StoreError::Sqlx {
                reason: format!("{context}: {e}"),
                source: Some(e),
            }
            .into()
        })
    }
}

/// A store backed by an embedded SQLite database.
///
/// Tie order for equal `created_at` values is higher rowid first
/// (`ORDER BY created_at DESC, id DESC`), i.e. later-inserted entries sort
/// earlier.
pub struct SqliteStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteStore {
    /// Open (creating if missing) the database file at `path`.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        Self::connect_with_clock(path, Arc::new(SystemClock)).await
    }

    /// Open the database file at `path` with an injected clock.
    pub async fn connect_with_clock(
        path: impl AsRef<Path>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .sql_context("Failed to open SQLite database")?;

        let store = Self::from_pool(pool, clock).await?;
        info!(path = %path.as_ref().display(), "SQLite store initialized");
        Ok(store)
    }

    /// Open an in-memory database, for tests and throwaway usage.
    ///
    /// The pool is capped at a single connection; each SQLite connection
    /// gets its own private in-memory database.
    pub async fn connect_memory() -> Result<Self> {
        Self::connect_memory_with_clock(Arc::new(SystemClock)).await
    }

    /// Open an in-memory database with an injected clock.
    pub async fn connect_memory_with_clock(clock: Arc<dyn Clock>) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .sql_context("Failed to open in-memory SQLite database")?;

        Self::from_pool(pool, clock).await
    }

    async fn from_pool(pool: SqlitePool, clock: Arc<dyn Clock>) -> Result<Self> {
        schema::initialize(&pool).await?;
        Ok(Self { pool, clock })
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Parse a normalized account id back to a rowid.
///
/// Ids from other backends (or garbage input) don't parse; lookups treat
/// that as a miss rather than an error.
fn parse_rowid(id: &Id) -> Option<i64> {
    id.as_str().parse().ok()
}

fn datetime_from_millis(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        StoreError::Sqlx {
            reason: format!("Stored timestamp out of range: {millis}"),
            source: None,
        }
        .into()
    })
}

type AccountRow = (i64, String, String, i64);

fn account_from_row((id, username, credential, created_at): AccountRow) -> Result<Account> {
    Ok(Account {
        id: Id::new(id.to_string()),
        username,
        credential,
        created_at: datetime_from_millis(created_at)?,
    })
}

type EntryRow = (i64, i64, String, String, i64);

fn entry_from_row((id, owner_id, category, payload, created_at): EntryRow) -> Result<DataEntry> {
    let payload: Value = serde_json::from_str(&payload)
        .map_err(|e| StoreError::DeserializationFailed { source: e })?;
    Ok(DataEntry {
        id: Id::new(id.to_string()),
        owner_id: Id::new(owner_id.to_string()),
        category,
        payload,
        created_at: datetime_from_millis(created_at)?,
    })
}

#[async_trait]
impl DataStore for SqliteStore {
    async fn create_account(&self, username: &str, credential: &str) -> Result<Account> {
        // Fast path for a friendly error; the UNIQUE constraint below is
        // what actually prevents the race.
        let existing: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM accounts WHERE username = $1")
                .bind(username)
                .fetch_optional(&self.pool)
                .await
                .sql_context("Failed to check existing username")?;
        if existing.is_some() {
            return Err(StoreError::DuplicateUsername {
                username: username.to_string(),
            }
            .into());
        }

        let created_at = self.clock.now();
        let result = sqlx::query(
            "INSERT INTO accounts (username, credential, created_at) VALUES ($1, $2, $3)",
        )
        .bind(username)
        .bind(credential)
        .bind(created_at.timestamp_millis())
        .execute(&self.pool)
        .await;

        let result = match result {
            Ok(result) => result,
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                return Err(StoreError::DuplicateUsername {
                    username: username.to_string(),
                }
                .into());
            }
            Err(e) => {
                return Err(StoreError::Sqlx {
                    reason: format!("Failed to insert account: {e}"),
                    source: Some(e),
                }
                .into());
            }
        };

        let id = result.last_insert_rowid();
        info!(username, id, "Created account");
        Ok(Account {
            id: Id::new(id.to_string()),
            username: username.to_string(),
            credential: credential.to_string(),
            created_at: datetime_from_millis(created_at.timestamp_millis())?,
        })
    }

    async fn find_account_by_username(&self, username: &str) -> Result<Option<Account>> {
        let row: Option<AccountRow> = sqlx::query_as(
            "SELECT id, username, credential, created_at FROM accounts WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .sql_context("Failed to find account by username")?;

        row.map(account_from_row).transpose()
    }

    async fn find_account_by_id(&self, id: &Id) -> Result<Option<Account>> {
        let Some(rowid) = parse_rowid(id) else {
            return Ok(None);
        };

        let row: Option<AccountRow> = sqlx::query_as(
            "SELECT id, username, credential, created_at FROM accounts WHERE id = $1",
        )
        .bind(rowid)
        .fetch_optional(&self.pool)
        .await
        .sql_context("Failed to find account by id")?;

        row.map(account_from_row).transpose()
    }

    async fn save_entry(&self, owner: &Id, category: &str, payload: Value) -> Result<DataEntry> {
        // Owner existence is deliberately not checked; the FK is declared
        // but unenforced. An owner id that doesn't parse as a rowid can
        // only come from another backend; it is stored as -1 and never
        // matches a real account.
        let owner_rowid = parse_rowid(owner).unwrap_or(-1);
        let payload_text = serde_json::to_string(&payload)
            .map_err(|e| StoreError::SerializationFailed { source: e })?;
        let created_at = self.clock.now();

        let result = sqlx::query(
            "INSERT INTO entries (owner_id, category, payload, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(owner_rowid)
        .bind(category)
        .bind(&payload_text)
        .bind(created_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .sql_context("Failed to insert entry")?;

        let id = result.last_insert_rowid();
        debug!(owner = %owner, category, id, "Saved entry");
        Ok(DataEntry {
            id: Id::new(id.to_string()),
            owner_id: owner.clone(),
            category: category.to_string(),
            payload,
            created_at: datetime_from_millis(created_at.timestamp_millis())?,
        })
    }

    async fn list_entries(&self, owner: &Id, category: &str) -> Result<Vec<DataEntry>> {
        let Some(owner_rowid) = parse_rowid(owner) else {
            return Ok(Vec::new());
        };

        let rows: Vec<EntryRow> = sqlx::query_as(
            "SELECT id, owner_id, category, payload, created_at FROM entries
             WHERE owner_id = $1 AND category = $2
             ORDER BY created_at DESC, id DESC",
        )
        .bind(owner_rowid)
        .bind(category)
        .fetch_all(&self.pool)
        .await
        .sql_context("Failed to list entries")?;

        rows.into_iter().map(entry_from_row).collect()
    }

    async fn list_all_entries(&self, owner: &Id) -> Result<Vec<DataEntry>> {
        let Some(owner_rowid) = parse_rowid(owner) else {
            return Ok(Vec::new());
        };

        let rows: Vec<EntryRow> = sqlx::query_as(
            "SELECT id, owner_id, category, payload, created_at FROM entries
             WHERE owner_id = $1
             ORDER BY created_at DESC, id DESC",
        )
        .bind(owner_rowid)
        .fetch_all(&self.pool)
        .await
        .sql_context("Failed to list all entries")?;

        rows.into_iter().map(entry_from_row).collect()
    }

    async fn summarize(&self, owner: &Id) -> Result<Option<AccountSummary>> {
        let Some(account) = self.find_account_by_id(owner).await? else {
            return Ok(None);
        };

        // Entries arrive pre-sorted newest-first, so grouping preserves the
        // most-recently-active-category-first order.
        let entries = self.list_all_entries(owner).await?;
        Ok(Some(AccountSummary {
            account: AccountProfile::from(&account),
            categories: summarize_sorted(&entries),
        }))
    }

    async fn stats(&self) -> Result<StoreStats> {
        let (account_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM accounts")
            .fetch_one(&self.pool)
            .await
            .sql_context("Failed to count accounts")?;
        let (entry_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM entries")
            .fetch_one(&self.pool)
            .await
            .sql_context("Failed to count entries")?;

        Ok(StoreStats {
            account_count: account_count as u64,
            entry_count: entry_count as u64,
        })
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        info!("SQLite store closed");
        Ok(())
    }
}
