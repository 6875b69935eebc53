//! Storage error types for incgraph-storage.
//!
//! [`StorageError`] separates the "store is unusable" family (backend,
//! migration and I/O failures, all reported as unavailable) from
//! serialization problems and from detected index inconsistencies.

use thiserror::Error;

use incgraph_core::CoreError;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The SQLite backend failed to open, read, write or commit.
    #[error("storage unavailable: {0}")]
    Unavailable(#[from] rusqlite::Error),

    /// Schema migration failed while opening a database.
    #[error("storage unavailable: migration failed: {0}")]
    Migration(#[from] rusqlite_migration::Error),

    /// File-system failure around the database file.
    #[error("storage unavailable: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization of a stored value failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored key could not be decoded back into its typed form.
    #[error("invalid key in map `{map}`: {reason}")]
    InvalidKey { map: String, reason: String },

    /// A stored identifier failed validation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The graph indices disagree with each other.
    #[error("index inconsistency: {reason}")]
    IndexInconsistency { reason: String },
}

impl StorageError {
    /// Returns `true` for failures of the underlying store itself.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            StorageError::Unavailable(_) | StorageError::Migration(_) | StorageError::Io(_)
        )
    }

    pub(crate) fn inconsistent(reason: impl Into<String>) -> Self {
        StorageError::IndexInconsistency {
            reason: reason.into(),
        }
    }
}
