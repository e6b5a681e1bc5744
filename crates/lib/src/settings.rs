//! Backend selection configuration.
//!
//! The backend is chosen once at process start, either by deserializing a
//! [`StoreSettings`] value from a config file or by reading `DATASTASH_*`
//! environment variables. Selection is purely data-driven; there is no
//! runtime type inspection anywhere downstream.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default path for the file backend's on-disk document.
pub const DEFAULT_FILE_PATH: &str = "./datastash-data.json";

/// Default path for the SQLite database file.
pub const DEFAULT_SQLITE_PATH: &str = "./datastash.db";

/// Default interval between background flushes of the file backend.
pub const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 30;

fn default_flush_interval() -> u64 {
    DEFAULT_FLUSH_INTERVAL_SECS
}

/// Which storage backend to open, plus its connection parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StoreSettings {
    /// Whole-state JSON document on local disk.
    File {
        path: PathBuf,
        /// Seconds between periodic background flushes.
        #[serde(default = "default_flush_interval")]
        flush_interval_secs: u64,
    },
    /// Embedded SQLite database.
    Sqlite { path: PathBuf },
    /// Remote MongoDB deployment.
    Mongodb { uri: String, database: String },
}

impl StoreSettings {
    /// Build settings from `DATASTASH_*` environment variables.
    ///
    /// `DATASTASH_BACKEND` selects the backend (`file`, `sqlite`, or
    /// `mongodb`; defaults to `file`). Per-backend variables:
    ///
    /// * `DATASTASH_FILE_PATH`, `DATASTASH_FLUSH_INTERVAL_SECS`
    /// * `DATASTASH_SQLITE_PATH`
    /// * `DATASTASH_MONGODB_URI`, `DATASTASH_MONGODB_DB`
    pub fn from_env() -> Result<Self> {
        let backend = std::env::var("DATASTASH_BACKEND").unwrap_or_else(|_| "file".to_string());
        match backend.as_str() {
            "file" => {
                let path = std::env::var("DATASTASH_FILE_PATH")
                    .unwrap_or_else(|_| DEFAULT_FILE_PATH.to_string());
                let flush_interval_secs = match std::env::var("DATASTASH_FLUSH_INTERVAL_SECS") {
                    Ok(raw) => raw.parse().map_err(|_| {
                        Error::Config(format!(
                            "DATASTASH_FLUSH_INTERVAL_SECS must be an integer, got '{raw}'"
                        ))
                    })?,
                    Err(_) => DEFAULT_FLUSH_INTERVAL_SECS,
                };
                Ok(StoreSettings::File {
                    path: PathBuf::from(path),
                    flush_interval_secs,
                })
            }
            "sqlite" => {
                let path = std::env::var("DATASTASH_SQLITE_PATH")
                    .unwrap_or_else(|_| DEFAULT_SQLITE_PATH.to_string());
                Ok(StoreSettings::Sqlite {
                    path: PathBuf::from(path),
                })
            }
            "mongodb" => {
                let uri = std::env::var("DATASTASH_MONGODB_URI")
                    .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
                let database =
                    std::env::var("DATASTASH_MONGODB_DB").unwrap_or_else(|_| "datastash".to_string());
                Ok(StoreSettings::Mongodb { uri, database })
            }
            other => Err(Error::Config(format!(
                "unknown DATASTASH_BACKEND '{other}' (expected file, sqlite, or mongodb)"
            ))),
        }
    }
}
