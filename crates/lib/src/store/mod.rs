//! Storage backends for datastash accounts and data entries.
//!
//! This module provides the core [`DataStore`] trait and the backend
//! implementations behind it. The trait defines the full persistence
//! contract; callers pick a backend once at startup via [`open`] and share
//! the resulting handle for the life of the process.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::clock::{Clock, SystemClock};
use crate::settings::StoreSettings;
use crate::types::{Account, AccountSummary, DataEntry, Id, StoreStats};
use crate::Result;

pub mod errors;
pub mod file;
#[cfg(feature = "mongodb")]
pub mod mongo;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use errors::StoreError;
pub use file::FileStore;
#[cfg(feature = "mongodb")]
pub use mongo::MongoStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

/// The persistence contract every backend implements.
///
/// All operations behave identically across backends:
///
/// * Account creation is atomic with respect to username uniqueness — under
///   concurrent calls with the same username exactly one succeeds and the
///   rest fail with [`StoreError::DuplicateUsername`].
/// * Lookup misses are `Ok(None)`, never errors. An id whose shape the
///   backend cannot parse is a miss.
/// * Listings are ordered by `created_at` descending. Tie order for equal
///   timestamps is stable within a backend and documented on each
///   implementation, but not guaranteed identical across backends.
/// * Entries are immutable once written; no update or delete is exposed.
/// * Within one store instance, a create followed by a read always observes
///   the write.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Create a new account with a unique username.
    ///
    /// `credential` is an already-hashed secret; it is stored verbatim.
    /// Fails with [`StoreError::DuplicateUsername`] if the username is
    /// taken. The account is persisted durably (per backend semantics)
    /// before this returns.
    async fn create_account(&self, username: &str, credential: &str) -> Result<Account>;

    /// Exact-match lookup by username (case-sensitive).
    async fn find_account_by_username(&self, username: &str) -> Result<Option<Account>>;

    /// Exact-match lookup by account id.
    async fn find_account_by_id(&self, id: &Id) -> Result<Option<Account>>;

    /// Persist a new immutable entry for `owner`.
    ///
    /// Owner existence is not checked; the reference is weak by design.
    /// Assigns the entry's id and `created_at`.
    async fn save_entry(&self, owner: &Id, category: &str, payload: Value) -> Result<DataEntry>;

    /// All of `owner`'s entries in `category`, newest first.
    async fn list_entries(&self, owner: &Id, category: &str) -> Result<Vec<DataEntry>>;

    /// All of `owner`'s entries across categories, newest first.
    async fn list_all_entries(&self, owner: &Id) -> Result<Vec<DataEntry>>;

    /// Group all of `owner`'s entries by category.
    ///
    /// Returns `None` if the account does not exist. Categories are ordered
    /// most-recently-active first; each reports its entry count and latest
    /// entry.
    async fn summarize(&self, owner: &Id) -> Result<Option<AccountSummary>>;

    /// Aggregate account and entry counts.
    ///
    /// The two counts are read independently and may reflect slightly
    /// different moments under concurrent writes.
    async fn stats(&self) -> Result<StoreStats>;

    /// Release the backend handle after a final flush / clean disconnect.
    ///
    /// Called exactly once at graceful shutdown.
    async fn close(&self) -> Result<()>;
}

/// Open the backend selected by `settings` with the system clock.
pub async fn open(settings: StoreSettings) -> Result<Arc<dyn DataStore>> {
    open_with_clock(settings, Arc::new(SystemClock)).await
}

/// Open the backend selected by `settings` with an injected clock.
///
/// Production callers want [`open`]; tests inject a controllable clock to
/// pin `created_at` timestamps.
pub async fn open_with_clock(
    settings: StoreSettings,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn DataStore>> {
    match settings {
        StoreSettings::File {
            path,
            flush_interval_secs,
        } => {
            let store =
                FileStore::open_with_clock(path, flush_interval_secs, clock).await?;
            Ok(Arc::new(store))
        }
        #[cfg(feature = "sqlite")]
        StoreSettings::Sqlite { path } => {
            let store = SqliteStore::connect_with_clock(path, clock).await?;
            Ok(Arc::new(store))
        }
        #[cfg(feature = "mongodb")]
        StoreSettings::Mongodb { uri, database } => {
            let store = MongoStore::connect_with_clock(&uri, &database, clock).await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(all(feature = "sqlite", feature = "mongodb")))]
        #[allow(unreachable_patterns)]
        other => Err(crate::Error::Config(format!(
            "backend {other:?} requested but the corresponding feature is not enabled"
        ))),
    }
}
