//! File-backed store implementation.
//!
//! Holds the entire dataset in memory and mirrors it to a single JSON
//! document on disk. Every mutating call flushes before returning, and a
//! background timer additionally flushes periodically to bound data loss on
//! abnormal termination. Saving is O(total size) per save, not incremental.

mod persistence;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::store::errors::StoreError;
use crate::store::DataStore;
use crate::types::{
    Account, AccountProfile, AccountSummary, DataEntry, Id, StoreStats, summarize_sorted,
};
use crate::Result;

/// In-memory dataset mirrored to disk.
///
/// Vectors preserve insertion order, which doubles as the tie-break order
/// for entries with equal `created_at` (stable sort keeps earlier-inserted
/// entries later in the newest-first listing).
#[derive(Debug, Default, Clone)]
pub(crate) struct FileState {
    pub(crate) accounts: Vec<Account>,
    pub(crate) entries: Vec<DataEntry>,
}

struct Shared {
    path: PathBuf,
    state: RwLock<FileState>,
    clock: Arc<dyn Clock>,
}

impl Shared {
    /// Serialize the current state and overwrite the on-disk document.
    ///
    /// Callers must hold the write lock (or otherwise guarantee exclusive
    /// access) so file writes stay ordered with mutations.
    async fn write_snapshot(&self, state: &FileState) -> Result<()> {
        persistence::save_to_file(&self.path, state, self.clock.now()).await?;
        debug!(
            accounts = state.accounts.len(),
            entries = state.entries.len(),
            path = %self.path.display(),
            "Saved file store state"
        );
        Ok(())
    }

    /// Flush the current state to disk (used by the background timer).
    async fn flush(&self) -> Result<()> {
        // Write lock, not read: serializes the file write against mutating
        // calls so the document never goes backwards.
        let state = self.state.write().await;
        self.write_snapshot(&state).await
    }
}

/// A store keeping all data in memory, persisted wholesale to a JSON file.
///
/// Duplicate-username prevention is serialized through the state write lock,
/// which is the single mutual-exclusion point for all mutations.
///
/// If the persisted document exists but cannot be parsed, the store starts
/// from an empty dataset and logs a warning. Operators should treat that
/// warning as a data-loss signal: the corrupt file is overwritten on the
/// next save.
pub struct FileStore {
    shared: Arc<Shared>,
    shutdown: watch::Sender<bool>,
    flush_task: Mutex<Option<JoinHandle<()>>>,
}

impl FileStore {
    /// Open a file store at `path` with the system clock.
    ///
    /// `flush_interval_secs` controls the periodic background flush; zero
    /// disables the timer (mutations still flush synchronously).
    pub async fn open(path: impl AsRef<Path>, flush_interval_secs: u64) -> Result<Self> {
        Self::open_with_clock(path, flush_interval_secs, Arc::new(SystemClock)).await
    }

    /// Open a file store with an injected clock.
    pub async fn open_with_clock(
        path: impl AsRef<Path>,
        flush_interval_secs: u64,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = persistence::load_from_file(&path).await?;
        info!(
            accounts = state.accounts.len(),
            entries = state.entries.len(),
            path = %path.display(),
            "File store initialized"
        );

        let shared = Arc::new(Shared {
            path,
            state: RwLock::new(state),
            clock,
        });

        let (shutdown, shutdown_rx) = watch::channel(false);
        let flush_task = if flush_interval_secs > 0 {
            Some(tokio::spawn(run_flush_loop(
                Arc::clone(&shared),
                flush_interval_secs,
                shutdown_rx,
            )))
        } else {
            None
        };

        Ok(Self {
            shared,
            shutdown,
            flush_task: Mutex::new(flush_task),
        })
    }

    /// The path of the on-disk document.
    pub fn path(&self) -> &Path {
        &self.shared.path
    }
}

/// Periodic flush loop, cancelled via the shutdown channel.
async fn run_flush_loop(
    shared: Arc<Shared>,
    interval_secs: u64,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(Duration::from_secs(interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; consume it so the loop only
    // flushes after a full interval has elapsed.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = shared.flush().await {
                    warn!(error = %err, "Periodic flush failed");
                }
            }
            _ = shutdown.changed() => {
                debug!("Flush loop shutting down");
                break;
            }
        }
    }
}

#[async_trait]
impl DataStore for FileStore {
    async fn create_account(&self, username: &str, credential: &str) -> Result<Account> {
        let mut state = self.shared.state.write().await;

        // The write lock is the uniqueness guard: no two creations can
        // interleave between this check and the push below.
        if state.accounts.iter().any(|a| a.username == username) {
            return Err(StoreError::DuplicateUsername {
                username: username.to_string(),
            }
            .into());
        }

        let account = Account {
            id: Id::new(Uuid::new_v4().to_string()),
            username: username.to_string(),
            credential: credential.to_string(),
            created_at: self.shared.clock.now(),
        };
        state.accounts.push(account.clone());
        self.shared.write_snapshot(&state).await?;

        info!(username, id = %account.id, "Created account");
        Ok(account)
    }

    async fn find_account_by_username(&self, username: &str) -> Result<Option<Account>> {
        let state = self.shared.state.read().await;
        Ok(state
            .accounts
            .iter()
            .find(|a| a.username == username)
            .cloned())
    }

    async fn find_account_by_id(&self, id: &Id) -> Result<Option<Account>> {
        let state = self.shared.state.read().await;
        Ok(state.accounts.iter().find(|a| &a.id == id).cloned())
    }

    async fn save_entry(&self, owner: &Id, category: &str, payload: Value) -> Result<DataEntry> {
        let mut state = self.shared.state.write().await;

        let entry = DataEntry {
            id: Id::new(Uuid::new_v4().to_string()),
            owner_id: owner.clone(),
            category: category.to_string(),
            payload,
            created_at: self.shared.clock.now(),
        };
        state.entries.push(entry.clone());
        self.shared.write_snapshot(&state).await?;

        debug!(owner = %owner, category, id = %entry.id, "Saved entry");
        Ok(entry)
    }

    async fn list_entries(&self, owner: &Id, category: &str) -> Result<Vec<DataEntry>> {
        let state = self.shared.state.read().await;
        let mut entries: Vec<DataEntry> = state
            .entries
            .iter()
            .filter(|e| &e.owner_id == owner && e.category == category)
            .cloned()
            .collect();
        sort_newest_first(&mut entries);
        Ok(entries)
    }

    async fn list_all_entries(&self, owner: &Id) -> Result<Vec<DataEntry>> {
        let state = self.shared.state.read().await;
        let mut entries: Vec<DataEntry> = state
            .entries
            .iter()
            .filter(|e| &e.owner_id == owner)
            .cloned()
            .collect();
        sort_newest_first(&mut entries);
        Ok(entries)
    }

    async fn summarize(&self, owner: &Id) -> Result<Option<AccountSummary>> {
        let state = self.shared.state.read().await;
        let Some(account) = state.accounts.iter().find(|a| &a.id == owner) else {
            return Ok(None);
        };
        let profile = AccountProfile::from(account);

        let mut entries: Vec<DataEntry> = state
            .entries
            .iter()
            .filter(|e| &e.owner_id == owner)
            .cloned()
            .collect();
        sort_newest_first(&mut entries);

        Ok(Some(AccountSummary {
            account: profile,
            categories: summarize_sorted(&entries),
        }))
    }

    async fn stats(&self) -> Result<StoreStats> {
        let state = self.shared.state.read().await;
        Ok(StoreStats {
            account_count: state.accounts.len() as u64,
            entry_count: state.entries.len() as u64,
        })
    }

    async fn close(&self) -> Result<()> {
        // Stop the periodic flush first so it cannot race the final save.
        let _ = self.shutdown.send(true);
        if let Some(task) = self.flush_task.lock().await.take() {
            let _ = task.await;
        }
        self.shared.flush().await?;
        info!(path = %self.shared.path.display(), "File store closed");
        Ok(())
    }
}

/// Newest first; stable, so equal timestamps keep insertion order.
fn sort_newest_first(entries: &mut [DataEntry]) {
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
