//! Serialization and file I/O for the file-backed store.
//!
//! The on-disk layout is a single JSON document with two arrays, `users`
//! and `userData`, plus `version` and `last_saved` metadata. Older files
//! without the metadata fields load fine; the markers are rewritten on the
//! next save.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::FileState;
use crate::store::errors::StoreError;
use crate::types::{Account, DataEntry};
use crate::Result;

/// Current on-disk document version.
const PERSISTENCE_VERSION: u8 = 1;

fn current_version() -> u8 {
    PERSISTENCE_VERSION
}

/// Wire form of the persisted document.
#[derive(Serialize, Deserialize)]
struct PersistedState {
    /// Format marker; tolerated when absent in older files.
    #[serde(default = "current_version")]
    version: u8,
    /// When the document was last flushed; informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_saved: Option<DateTime<Utc>>,
    users: Vec<Account>,
    #[serde(rename = "userData")]
    entries: Vec<DataEntry>,
}

/// Serializes the full state and overwrites the file at `path`.
pub(super) async fn save_to_file(
    path: &Path,
    state: &FileState,
    now: DateTime<Utc>,
) -> Result<()> {
    let persisted = PersistedState {
        version: PERSISTENCE_VERSION,
        last_saved: Some(now),
        users: state.accounts.clone(),
        entries: state.entries.clone(),
    };

    let json = serde_json::to_string_pretty(&persisted)
        .map_err(|e| StoreError::SerializationFailed { source: e })?;
    tokio::fs::write(path, json)
        .await
        .map_err(|e| StoreError::FileIo { source: e }.into())
}

/// Loads the persisted state from `path`.
///
/// A missing file yields an empty state. An unparseable file also yields an
/// empty state with a warning rather than failing startup; the corrupt
/// document will be overwritten by the next save, so the warning is the only
/// trace operators get of the lost data. Other I/O failures propagate.
pub(super) async fn load_from_file(path: &Path) -> Result<FileState> {
    let json = match tokio::fs::read_to_string(path).await {
        Ok(json) => json,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "No existing data file, starting empty");
            return Ok(FileState::default());
        }
        Err(e) => return Err(StoreError::FileIo { source: e }.into()),
    };

    match serde_json::from_str::<PersistedState>(&json) {
        Ok(persisted) => Ok(FileState {
            accounts: persisted.users,
            entries: persisted.entries,
        }),
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "Persisted data file is corrupt; continuing with an empty state. \
                 Existing contents will be lost on the next save."
            );
            Ok(FileState::default())
        }
    }
}
