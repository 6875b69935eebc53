//! Core error types for incgraph-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering the
//! failure modes of the data model itself (not storage or differencing).

use thiserror::Error;

use crate::digest::Digest;
use crate::id::NodeId;

/// Errors produced by the incgraph-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A node id was empty or contained a NUL byte.
    #[error("invalid node id: {name:?}")]
    InvalidNodeId { name: String },

    /// A source id was empty or contained a NUL byte.
    #[error("invalid source id: {id:?}")]
    InvalidSourceId { id: String },

    /// A collaborator-supplied digest does not match the node's shape.
    #[error("digest mismatch for node {node}: supplied {supplied}, computed {computed}")]
    DigestMismatch {
        node: NodeId,
        supplied: Digest,
        computed: Digest,
    },

    /// The same node id appears more than once in one source's facts.
    #[error("node {node} listed twice in facts for source {source_id}")]
    DuplicateNode { node: NodeId, source_id: String },

    /// The same source has more than one entry in a change set's updates.
    #[error("source {source_id} listed twice in one change set")]
    DuplicateSource { source_id: String },
}
