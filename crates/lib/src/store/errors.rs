//! Storage error types shared by all backends.
//!
//! This module defines structured error types for store operations,
//! providing error context and type safety instead of string-based errors.
//! Lookup misses are not errors — every lookup returns `Option`.

use thiserror::Error;

/// Errors that can occur during store operations.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Existing variants will not be removed in minor versions
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StoreError {
    /// An account with this username already exists.
    ///
    /// Signaled by the backend's own uniqueness guard (write lock, unique
    /// constraint, or unique index), never by an application-level pre-check
    /// alone.
    #[error("Username already exists: {username}")]
    DuplicateUsername {
        /// The username that collided
        username: String,
    },

    /// Backend unreachable or refusing work.
    #[error("Storage unavailable: {reason}")]
    Unavailable {
        /// Description of why the backend is unavailable
        reason: String,
    },

    /// File I/O error (file backend).
    #[error("File I/O error")]
    FileIo {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Payload or state could not be represented in the storage format.
    #[error("Serialization failed")]
    SerializationFailed {
        /// The underlying serialization error
        #[source]
        source: serde_json::Error,
    },

    /// Persisted payload or state could not be read back.
    #[error("Deserialization failed")]
    DeserializationFailed {
        /// The underlying deserialization error
        #[source]
        source: serde_json::Error,
    },

    /// SQL backend operation failed.
    #[cfg(feature = "sqlite")]
    #[error("SQL error: {reason}")]
    Sqlx {
        /// Context message describing the failed operation
        reason: String,
        /// The underlying sqlx error, if available
        #[source]
        source: Option<sqlx::Error>,
    },

    /// Document store operation failed.
    #[cfg(feature = "mongodb")]
    #[error("MongoDB error: {reason}")]
    Mongo {
        /// Context message describing the failed operation
        reason: String,
        /// The underlying driver error, if available
        #[source]
        source: Option<mongodb::error::Error>,
    },
}

impl StoreError {
    /// Check if this error indicates a username collision at create time.
    pub fn is_duplicate_username(&self) -> bool {
        matches!(self, StoreError::DuplicateUsername { .. })
    }

    /// Check if this error indicates the backend was unreachable.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable { .. })
    }

    /// Check if this error is related to I/O or (de)serialization.
    pub fn is_io_error(&self) -> bool {
        matches!(
            self,
            StoreError::FileIo { .. }
                | StoreError::SerializationFailed { .. }
                | StoreError::DeserializationFailed { .. }
        )
    }
}

// Conversion from StoreError to the main Error type
impl From<StoreError> for crate::Error {
    fn from(err: StoreError) -> Self {
        crate::Error::Store(err)
    }
}
