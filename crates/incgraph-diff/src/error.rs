//! Differencing error types.

use std::collections::BTreeSet;

use incgraph_core::{CoreError, SourceId};
use incgraph_storage::StorageError;

/// Errors that can end a differencing round or an incremental build.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// The graph store failed; no partial affected set is reported.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The supplied facts were malformed (duplicate node, bad digest).
    #[error("invalid facts: {0}")]
    InvalidFacts(#[from] CoreError),

    /// No fixpoint was reached within the round cap. `pending` is the last
    /// affected set, which the driver should treat as needing recompilation.
    #[error("no fixpoint after {rounds} round(s), {} source(s) still pending", .pending.len())]
    NonTerminatingPropagation {
        rounds: usize,
        pending: BTreeSet<SourceId>,
    },

    /// The recompile callback failed.
    #[error("recompilation failed: {0}")]
    Recompile(String),
}

impl DiffError {
    /// Sources the driver must rebuild to stay safe, if this error carries any.
    pub fn pending_sources(&self) -> Option<&BTreeSet<SourceId>> {
        match self {
            DiffError::NonTerminatingPropagation { pending, .. } => Some(pending),
            _ => None,
        }
    }
}
