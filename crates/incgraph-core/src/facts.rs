//! Per-source facts handed over by the compiler driver.
//!
//! A [`SourceFacts`] says "this source produced exactly these nodes"; a
//! [`ChangeSet`] bundles the facts of every recompiled source with the set
//! of sources deleted since the previous round.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::SourceId;
use crate::node::Node;

/// The nodes a single source produced in its latest compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFacts {
    pub source: SourceId,
    #[serde(default)]
    pub nodes: Vec<Node>,
}

impl SourceFacts {
    pub fn new(source: SourceId, nodes: Vec<Node>) -> Self {
        SourceFacts { source, nodes }
    }

    /// Rejects facts listing the same node id twice and nodes whose digest
    /// does not match their shape.
    pub fn validate(&self) -> Result<(), CoreError> {
        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(&node.id) {
                return Err(CoreError::DuplicateNode {
                    node: node.id.clone(),
                    source_id: self.source.to_string(),
                });
            }
            node.verify_digest()?;
        }
        Ok(())
    }
}

/// Input of one differencing round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Fresh facts for recompiled (changed or added) sources.
    #[serde(default)]
    pub updated: Vec<SourceFacts>,
    /// Sources that no longer exist.
    #[serde(default)]
    pub deleted: BTreeSet<SourceId>,
}

impl ChangeSet {
    pub fn new() -> Self {
        ChangeSet::default()
    }

    pub fn with_updated(mut self, facts: SourceFacts) -> Self {
        self.updated.push(facts);
        self
    }

    pub fn with_deleted(mut self, source: SourceId) -> Self {
        self.deleted.insert(source);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.deleted.is_empty()
    }

    /// Every source touched by this change set.
    pub fn sources(&self) -> BTreeSet<SourceId> {
        self.updated
            .iter()
            .map(|f| f.source.clone())
            .chain(self.deleted.iter().cloned())
            .collect()
    }

    /// Validates every contained [`SourceFacts`] and rejects a source that
    /// is updated more than once.
    pub fn validate(&self) -> Result<(), CoreError> {
        let mut seen = HashSet::new();
        for facts in &self.updated {
            if !seen.insert(&facts.source) {
                return Err(CoreError::DuplicateSource {
                    source_id: facts.source.to_string(),
                });
            }
            facts.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::NodeId;
    use crate::node::NodeShape;

    fn node(name: &str) -> Node {
        Node::new(NodeId::new(name).unwrap(), NodeShape::class(), [])
    }

    fn source(name: &str) -> SourceId {
        SourceId::new(name).unwrap()
    }

    #[test]
    fn duplicate_node_rejected() {
        let facts = SourceFacts::new(source("A.java"), vec![node("p/A"), node("p/A")]);
        assert!(matches!(
            facts.validate(),
            Err(CoreError::DuplicateNode { .. })
        ));
    }

    #[test]
    fn sources_covers_updated_and_deleted() {
        let changes = ChangeSet::new()
            .with_updated(SourceFacts::new(source("A.java"), vec![node("p/A")]))
            .with_deleted(source("B.java"));

        let sources = changes.sources();
        assert_eq!(sources.len(), 2);
        assert!(sources.contains(&source("A.java")));
        assert!(sources.contains(&source("B.java")));
        assert!(changes.validate().is_ok());
        assert!(!changes.is_empty());
    }

    #[test]
    fn source_updated_twice_rejected() {
        let changes = ChangeSet::new()
            .with_updated(SourceFacts::new(source("A.java"), vec![node("p/A"), node("p/A$H")]))
            .with_updated(SourceFacts::new(source("A.java"), vec![node("p/A")]));
        assert!(matches!(
            changes.validate(),
            Err(CoreError::DuplicateSource { .. })
        ));
    }
}
