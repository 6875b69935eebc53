//! Error types for incgraph-session.

use std::path::PathBuf;

use thiserror::Error;

use incgraph_diff::DiffError;
use incgraph_storage::StorageError;

/// Why a path or source id could not be translated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathMappingError {
    /// The path lies under none of the configured roots.
    #[error("path {} is outside every source root", path.display())]
    OutsideRoots { path: PathBuf },

    /// The path climbs out of its root with `..`.
    #[error("path {} contains a parent-directory component", path.display())]
    ParentTraversal { path: PathBuf },

    /// The relative part of the path is not valid UTF-8.
    #[error("path {} is not valid UTF-8", path.display())]
    NonUtf8 { path: PathBuf },

    /// The source id names a namespace no root is registered under.
    #[error("source id {id:?} uses unknown namespace {namespace:?}")]
    UnknownNamespace { id: String, namespace: String },

    /// The source id is not of the form `$NS$/relative/path`.
    #[error("malformed source id {id:?}")]
    MalformedId { id: String },

    /// A root was registered with an unusable namespace.
    #[error("invalid namespace {namespace:?}: {reason}")]
    InvalidNamespace { namespace: String, reason: String },
}

/// Errors surfaced to the build driver by a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The graph store failed and could not be recovered.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A source could not be translated by the path mapper.
    #[error("unmappable path: {0}")]
    UnmappablePath(#[from] PathMappingError),

    /// Differencing failed inside the session.
    #[error(transparent)]
    Diff(#[from] DiffError),

    /// File-system failure while managing the graph file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid settings.
    #[error("invalid configuration: {reason}")]
    Config { reason: String },
}

impl SessionError {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        SessionError::Config {
            reason: reason.into(),
        }
    }
}
