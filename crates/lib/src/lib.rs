//! Datastash: multi-tenant typed data storage with interchangeable backends.
//!
//! The crate persists two entity kinds — [`Account`](types::Account) and
//! [`DataEntry`](types::DataEntry) — behind a single async contract, the
//! [`DataStore`](store::DataStore) trait, with three conforming backends:
//!
//! * **[`FileStore`](store::FileStore)**: whole-state JSON document on local
//!   disk with a periodic background flush. Simplest backend; suitable for
//!   development and single-node deployments.
//! * **[`SqliteStore`](store::SqliteStore)** (feature `sqlite`): embedded
//!   relational storage via sqlx, autoincrement keys, username uniqueness
//!   enforced by the database constraint.
//! * **[`MongoStore`](store::MongoStore)** (feature `mongodb`): remote
//!   document store with a unique username index and compound indexes for
//!   the listing queries.
//!
//! The backend is selected once at startup from [`settings::StoreSettings`]
//! via [`store::open`]; request handlers share the resulting
//! `Arc<dyn DataStore>` for the life of the process and call
//! [`close`](store::DataStore::close) exactly once on graceful shutdown.
//!
//! Credential hashing/verification, token issuance, and request validation
//! are external collaborators; the store only persists what it is handed.

pub mod clock;
pub mod settings;
pub mod store;
pub mod types;

pub use clock::{Clock, SystemClock};
pub use settings::StoreSettings;
pub use store::{DataStore, StoreError};
pub use types::{Account, AccountSummary, CategorySummary, DataEntry, Id, StoreStats};

/// Result type used throughout the datastash library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the datastash library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Structured storage errors from the store module
    #[error(transparent)]
    Store(store::StoreError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::Serialize(_) => "serialize",
            Error::Config(_) => "config",
            Error::Store(_) => "store",
        }
    }

    /// Check if this error indicates a username collision at create time.
    pub fn is_duplicate_username(&self) -> bool {
        match self {
            Error::Store(err) => err.is_duplicate_username(),
            _ => false,
        }
    }

    /// Check if this error indicates the backend was unreachable.
    pub fn is_unavailable(&self) -> bool {
        match self {
            Error::Store(err) => err.is_unavailable(),
            _ => false,
        }
    }

    /// Check if this error is related to I/O or (de)serialization.
    pub fn is_io_error(&self) -> bool {
        match self {
            Error::Io(_) | Error::Serialize(_) => true,
            Error::Store(err) => err.is_io_error(),
            Error::Config(_) => false,
        }
    }
}
