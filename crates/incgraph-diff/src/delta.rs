//! Node-level delta between the stored and the freshly compiled facts.
//!
//! Compares old and new node sets by id and digest. Only digest
//! inequality marks a common node as changed, so a recompiled source whose
//! dependent-visible shape is unchanged contributes nothing downstream.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use incgraph_core::{Digest, Node, NodeId, SourceId};

use crate::shape::ShapeDiff;

/// A common node whose digest changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeChange {
    pub old_digest: Digest,
    pub new_digest: Digest,
    pub diff: ShapeDiff,
}

/// Result of one differencing round.
///
/// Tracks four node categories (added, removed, changed, stable) and the
/// sources that must be recompiled because of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Delta {
    /// Nodes that did not exist before this round.
    pub added: BTreeSet<NodeId>,
    /// Nodes that no source owns any more.
    pub removed: BTreeSet<NodeId>,
    /// Nodes present before and after with different digests.
    pub changed: BTreeMap<NodeId, NodeChange>,
    /// Nodes present before and after with equal digests.
    pub stable: BTreeSet<NodeId>,
    /// Sources to recompile next, excluding everything already processed.
    pub affected_sources: BTreeSet<SourceId>,
}

impl Delta {
    /// Returns true if no node was added, removed or changed.
    pub fn is_clean(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    /// Ids whose users must be checked: changed and removed nodes.
    pub fn propagating(&self) -> impl Iterator<Item = &NodeId> {
        self.changed.keys().chain(&self.removed)
    }

    /// Total count of added, removed and changed nodes.
    pub fn total(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len()
    }
}

/// Classifies nodes by comparing the stored set against the new one.
///
/// `old` must already exclude nodes that survive through an owner outside
/// this round; everything in `old` but not in `new` is reported removed.
pub fn classify_nodes(old: &BTreeMap<NodeId, Node>, new: &BTreeMap<NodeId, Node>) -> Delta {
    let mut delta = Delta::default();

    for (id, node) in new {
        match old.get(id) {
            None => {
                delta.added.insert(id.clone());
            }
            Some(previous) if previous.digest == node.digest => {
                delta.stable.insert(id.clone());
            }
            Some(previous) => {
                delta.changed.insert(
                    id.clone(),
                    NodeChange {
                        old_digest: previous.digest,
                        new_digest: node.digest,
                        diff: ShapeDiff::between(&previous.shape, &node.shape),
                    },
                );
            }
        }
    }

    delta.removed = old
        .keys()
        .filter(|id| !new.contains_key(id))
        .cloned()
        .collect();

    delta
}
