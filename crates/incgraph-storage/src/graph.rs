//! The dependency graph: nodes, their owning sources, and the reverse usage
//! index, all kept as [`SwapMap`]s over one [`MapStore`].
//!
//! # Indices
//!
//! | map | key | value |
//! |---|---|---|
//! | `nodes` | `NodeId` | `Node` |
//! | `nodes_by_source` | `SourceId` | `BTreeSet<NodeId>` |
//! | `sources_by_node` | `NodeId` | `BTreeSet<SourceId>` |
//! | `users_of_target` | `(target, owner, usage kind)` | `()` |
//!
//! The reverse index is a set keyed by target first, so the users of one
//! target are a contiguous key range that [`UsersOf`] walks page by page.
//!
//! Every public mutation keeps the indices consistent. Within one mutation
//! the order of index writes is chosen so that an interruption can leave a
//! reverse entry missing but never pointing at a node that lacks the usage;
//! replaying the same mutation repairs it.

use std::collections::{BTreeSet, VecDeque};

use serde::Serialize;
use tracing::{debug, warn};

use incgraph_core::{Node, NodeId, SourceId, Usage, UsageKind};

use crate::error::StorageError;
use crate::memory::MemoryStore;
use crate::swap::SwapMap;
use crate::traits::{Committable, MapKey, MapStore, PersistentMap};
use crate::typed::TypedMap;

pub const NODES_MAP: &str = "nodes";
pub const NODES_BY_SOURCE_MAP: &str = "nodes_by_source";
pub const SOURCES_BY_NODE_MAP: &str = "sources_by_node";
pub const USERS_OF_TARGET_MAP: &str = "users_of_target";
pub const META_MAP: &str = "meta";

/// Number of reverse-index entries fetched per page by [`UsersOf`].
pub const USERS_PAGE: usize = 256;

const SEPARATOR: u8 = 0;

/// Key of the reverse usage index.
///
/// Encoded as `target NUL owner NUL kind-json`. Identifiers never contain
/// NUL and JSON escapes it, so the encoding is unambiguous and sorts by
/// target first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct UserKey {
    pub target: NodeId,
    pub owner: NodeId,
    pub kind: UsageKind,
}

impl UserKey {
    pub fn new(owner: &NodeId, usage: &Usage) -> Self {
        UserKey {
            target: usage.target.clone(),
            owner: owner.clone(),
            kind: usage.kind.clone(),
        }
    }

    /// Encoded prefix shared by every key of `target`.
    pub fn prefix(target: &NodeId) -> Vec<u8> {
        let mut bytes = target.encode();
        bytes.push(SEPARATOR);
        bytes
    }

    pub fn usage(&self) -> Usage {
        Usage::new(self.target.clone(), self.kind.clone())
    }
}

impl MapKey for UserKey {
    fn encode(&self) -> Vec<u8> {
        let mut bytes = UserKey::prefix(&self.target);
        bytes.extend(self.owner.encode());
        bytes.push(SEPARATOR);
        // Serializing a derived enum of strings cannot fail.
        bytes.extend(serde_json::to_vec(&self.kind).unwrap_or_default());
        bytes
    }

    fn decode(bytes: &[u8]) -> Result<Self, String> {
        let mut parts = bytes.splitn(3, |b| *b == SEPARATOR);
        let (Some(target), Some(owner), Some(kind)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err("reverse-index key has fewer than three parts".to_string());
        };
        Ok(UserKey {
            target: NodeId::decode(target)?,
            owner: NodeId::decode(owner)?,
            kind: serde_json::from_slice(kind).map_err(|e| e.to_string())?,
        })
    }
}

/// Entry counts of the graph indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub sources: usize,
    pub usages: usize,
}

/// Persistent dependency graph over a [`MapStore`].
#[derive(Debug)]
pub struct DependencyGraph {
    nodes: SwapMap<TypedMap<NodeId, Node>>,
    nodes_by_source: SwapMap<TypedMap<SourceId, BTreeSet<NodeId>>>,
    sources_by_node: SwapMap<TypedMap<NodeId, BTreeSet<SourceId>>>,
    users_of_target: SwapMap<TypedMap<UserKey, ()>>,
    meta: SwapMap<TypedMap<String, String>>,
    location: String,
    fact_writes: u64,
}

impl DependencyGraph {
    /// Opens the graph indices inside `store`.
    pub fn open(store: &dyn MapStore) -> Result<Self, StorageError> {
        Ok(DependencyGraph {
            nodes: SwapMap::new(TypedMap::open(store, NODES_MAP)?),
            nodes_by_source: SwapMap::new(TypedMap::open(store, NODES_BY_SOURCE_MAP)?),
            sources_by_node: SwapMap::new(TypedMap::open(store, SOURCES_BY_NODE_MAP)?),
            users_of_target: SwapMap::new(TypedMap::open(store, USERS_OF_TARGET_MAP)?),
            meta: SwapMap::new(TypedMap::open(store, META_MAP)?),
            location: store.location(),
            fact_writes: 0,
        })
    }

    /// A graph over a fresh [`MemoryStore`].
    pub fn in_memory() -> Result<Self, StorageError> {
        DependencyGraph::open(&MemoryStore::new())
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    // -------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------

    pub fn get_node(&self, id: &NodeId) -> Result<Option<Node>, StorageError> {
        self.nodes.get(id)
    }

    pub fn contains_node(&self, id: &NodeId) -> Result<bool, StorageError> {
        self.nodes.contains_key(id)
    }

    /// Ids of the nodes `source` currently owns (empty if unknown).
    pub fn nodes_of_source(&self, source: &SourceId) -> Result<BTreeSet<NodeId>, StorageError> {
        Ok(self.nodes_by_source.get(source)?.unwrap_or_default())
    }

    /// Sources owning `id` (empty if the node is unknown).
    pub fn sources_of_node(&self, id: &NodeId) -> Result<BTreeSet<SourceId>, StorageError> {
        Ok(self.sources_by_node.get(id)?.unwrap_or_default())
    }

    pub fn sources(&self) -> Result<Vec<SourceId>, StorageError> {
        self.nodes_by_source.keys()
    }

    pub fn node_ids(&self) -> Result<Vec<NodeId>, StorageError> {
        self.nodes.keys()
    }

    pub fn node_count(&self) -> Result<usize, StorageError> {
        self.nodes.len()
    }

    pub fn source_count(&self) -> Result<usize, StorageError> {
        self.nodes_by_source.len()
    }

    /// Lazily yields every `(owner, usage)` pair whose usage targets `target`.
    pub fn users_of(&self, target: &NodeId) -> UsersOf<'_> {
        UsersOf::new(&self.users_of_target, target.clone())
    }

    pub fn stats(&self) -> Result<GraphStats, StorageError> {
        Ok(GraphStats {
            nodes: self.nodes.len()?,
            sources: self.nodes_by_source.len()?,
            usages: self.users_of_target.len()?,
        })
    }

    pub fn meta(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.meta.get(&key.to_string())
    }

    // -------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------

    /// Replaces everything `source` owns with `nodes`.
    ///
    /// Nodes no longer listed lose their association with `source`; those
    /// left without any owner are deleted along with their usages, and their
    /// ids are returned.
    pub fn put_source_facts(
        &mut self,
        source: &SourceId,
        nodes: &[Node],
    ) -> Result<BTreeSet<NodeId>, StorageError> {
        self.fact_writes += 1;
        let old_ids = self.nodes_of_source(source)?;
        let new_ids: BTreeSet<NodeId> = nodes.iter().map(|n| n.id.clone()).collect();

        for node in nodes {
            self.write_node(source, node)?;
        }

        if new_ids.is_empty() {
            self.nodes_by_source.remove(source)?;
        } else {
            self.nodes_by_source.insert(source.clone(), new_ids.clone())?;
        }

        let mut orphaned = BTreeSet::new();
        for id in old_ids.difference(&new_ids) {
            if self.detach(source, id)?.is_some() {
                orphaned.insert(id.clone());
            }
        }

        debug!(
            source = %source,
            nodes = new_ids.len(),
            orphaned = orphaned.len(),
            "stored source facts"
        );
        Ok(orphaned)
    }

    /// Deletes every node owned only by `source`, returning the distinct
    /// targets that lost a user.
    pub fn remove_source(&mut self, source: &SourceId) -> Result<BTreeSet<NodeId>, StorageError> {
        self.fact_writes += 1;
        let ids = self.nodes_of_source(source)?;
        let mut lost_users = BTreeSet::new();
        for id in &ids {
            if let Some(targets) = self.detach(source, id)? {
                lost_users.extend(targets);
            }
        }
        // Last, so an interrupted removal is retried in full.
        self.nodes_by_source.remove(source)?;

        debug!(source = %source, nodes = ids.len(), "removed source");
        Ok(lost_users)
    }

    /// Calls made through this handle that could change facts, counted
    /// whether or not they succeeded. Meta writes are not counted.
    pub fn fact_writes(&self) -> u64 {
        self.fact_writes
    }

    pub fn set_meta(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.meta.insert(key.to_string(), value.to_string())?;
        Ok(())
    }

    pub fn remove_meta(&mut self, key: &str) -> Result<(), StorageError> {
        self.meta.remove(&key.to_string())?;
        Ok(())
    }

    /// Empties every index.
    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.fact_writes += 1;
        self.users_of_target.clear()?;
        self.nodes_by_source.clear()?;
        self.sources_by_node.clear()?;
        self.nodes.clear()?;
        self.meta.clear()?;
        Ok(())
    }

    /// Commits the underlying store. Every mutation already commits; this
    /// is for callers that wrote through the store directly.
    pub fn commit(&self) -> Result<(), StorageError> {
        self.nodes.commit()
    }

    fn write_node(&mut self, source: &SourceId, node: &Node) -> Result<(), StorageError> {
        let old_usages = self
            .nodes
            .get(&node.id)?
            .map(|previous| previous.usages)
            .unwrap_or_default();

        for usage in old_usages.difference(&node.usages) {
            self.users_of_target.remove(&UserKey::new(&node.id, usage))?;
        }
        self.nodes.insert(node.id.clone(), node.clone())?;
        for usage in node.usages.difference(&old_usages) {
            self.users_of_target
                .insert(UserKey::new(&node.id, usage), ())?;
        }

        self.sources_by_node.merge(
            node.id.clone(),
            BTreeSet::from([source.clone()]),
            |mut current, added| {
                current.extend(added);
                Some(current)
            },
        )?;
        Ok(())
    }

    /// Drops the `source` → `id` association. Deletes the node when it has
    /// no owner left and returns the targets of its usages in that case.
    fn detach(
        &mut self,
        source: &SourceId,
        id: &NodeId,
    ) -> Result<Option<BTreeSet<NodeId>>, StorageError> {
        let remaining = self
            .sources_by_node
            .compute_if_present(id.clone(), |_, mut sources| {
                sources.remove(source);
                (!sources.is_empty()).then_some(sources)
            })?;
        if remaining.is_some() {
            return Ok(None);
        }
        self.delete_node(id).map(Some)
    }

    fn delete_node(&mut self, id: &NodeId) -> Result<BTreeSet<NodeId>, StorageError> {
        let Some(node) = self.nodes.get(id)? else {
            self.sources_by_node.remove(id)?;
            return Ok(BTreeSet::new());
        };
        for usage in &node.usages {
            self.users_of_target.remove(&UserKey::new(id, usage))?;
        }
        self.nodes.remove(id)?;
        self.sources_by_node.remove(id)?;
        Ok(node.targets().into_iter().cloned().collect())
    }

    // -------------------------------------------------------------------
    // Consistency
    // -------------------------------------------------------------------

    /// Cross-checks all four indices, failing with
    /// [`StorageError::IndexInconsistency`] on the first violation.
    pub fn check_consistency(&self) -> Result<(), StorageError> {
        let result = self.check_indices();
        if let Err(StorageError::IndexInconsistency { reason }) = &result {
            warn!(location = %self.location, %reason, "graph index inconsistency");
        }
        result
    }

    fn check_indices(&self) -> Result<(), StorageError> {
        for_each_entry(&self.nodes_by_source, |source: SourceId, ids: BTreeSet<NodeId>| {
            if ids.is_empty() {
                return Err(StorageError::inconsistent(format!(
                    "source {source} owns an empty node set"
                )));
            }
            for id in ids {
                if !self.nodes.contains_key(&id)? {
                    return Err(StorageError::inconsistent(format!(
                        "source {source} owns missing node {id}"
                    )));
                }
                if !self.sources_of_node(&id)?.contains(&source) {
                    return Err(StorageError::inconsistent(format!(
                        "node {id} does not list owning source {source}"
                    )));
                }
            }
            Ok(())
        })?;

        for_each_entry(&self.sources_by_node, |id: NodeId, sources: BTreeSet<SourceId>| {
            if sources.is_empty() {
                return Err(StorageError::inconsistent(format!("node {id} has no source")));
            }
            if !self.nodes.contains_key(&id)? {
                return Err(StorageError::inconsistent(format!(
                    "sources recorded for missing node {id}"
                )));
            }
            for source in sources {
                if !self.nodes_of_source(&source)?.contains(&id) {
                    return Err(StorageError::inconsistent(format!(
                        "source {source} does not list node {id}"
                    )));
                }
            }
            Ok(())
        })?;

        for_each_entry(&self.nodes, |id: NodeId, node: Node| {
            if node.id != id {
                return Err(StorageError::inconsistent(format!(
                    "node stored under {id} is {}",
                    node.id
                )));
            }
            if !self.sources_by_node.contains_key(&id)? {
                return Err(StorageError::inconsistent(format!("node {id} has no source")));
            }
            for usage in &node.usages {
                if !self.users_of_target.contains_key(&UserKey::new(&id, usage))? {
                    return Err(StorageError::inconsistent(format!(
                        "usage {} of {id} on {} missing from reverse index",
                        usage.kind.label(),
                        usage.target
                    )));
                }
            }
            Ok(())
        })?;

        for_each_entry(&self.users_of_target, |key: UserKey, _: ()| {
            let owned = self
                .nodes
                .get(&key.owner)?
                .is_some_and(|owner| owner.usages.contains(&key.usage()));
            if !owned {
                return Err(StorageError::inconsistent(format!(
                    "reverse index entry {} -> {} not owned by a stored node",
                    key.owner, key.target
                )));
            }
            Ok(())
        })
    }
}

impl Committable for DependencyGraph {
    fn commit(&self) -> Result<(), StorageError> {
        DependencyGraph::commit(self)
    }
}

/// Visits every entry of `map` in key order, one page at a time.
fn for_each_entry<M, F>(map: &M, mut f: F) -> Result<(), StorageError>
where
    M: PersistentMap,
    F: FnMut(M::Key, M::Value) -> Result<(), StorageError>,
{
    let mut cursor: Option<Vec<u8>> = None;
    loop {
        let page = map.page(cursor.as_deref(), crate::traits::SNAPSHOT_PAGE)?;
        let full = page.len() == crate::traits::SNAPSHOT_PAGE;
        for (key, value) in page {
            cursor = Some(key.encode());
            f(key, value)?;
        }
        if !full {
            return Ok(());
        }
    }
}

/// Lazy, finite iterator over the users of one target.
///
/// Fetches [`USERS_PAGE`] reverse-index entries at a time, so a caller that
/// stops early never reads the rest of a large fan-in. Cloning copies the
/// current position; [`UsersOf::restart`] starts over from the first user.
#[derive(Clone)]
pub struct UsersOf<'a> {
    index: &'a SwapMap<TypedMap<UserKey, ()>>,
    target: NodeId,
    cursor: Vec<u8>,
    buffer: VecDeque<(NodeId, Usage)>,
    exhausted: bool,
}

impl<'a> UsersOf<'a> {
    fn new(index: &'a SwapMap<TypedMap<UserKey, ()>>, target: NodeId) -> Self {
        UsersOf {
            index,
            cursor: UserKey::prefix(&target),
            target,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    pub fn target(&self) -> &NodeId {
        &self.target
    }

    /// A fresh iterator positioned before the first user.
    pub fn restart(&self) -> Self {
        UsersOf::new(self.index, self.target.clone())
    }

    fn fill(&mut self) -> Result<(), StorageError> {
        let page = self.index.page(Some(self.cursor.as_slice()), USERS_PAGE)?;
        if page.len() < USERS_PAGE {
            self.exhausted = true;
        }
        for (key, ()) in page {
            if key.target != self.target {
                self.exhausted = true;
                break;
            }
            self.cursor = key.encode();
            let usage = key.usage();
            self.buffer.push_back((key.owner, usage));
        }
        Ok(())
    }
}

impl Iterator for UsersOf<'_> {
    type Item = Result<(NodeId, Usage), StorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(err) = self.fill() {
                self.exhausted = true;
                return Some(Err(err));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use incgraph_core::{Member, NodeShape};

    fn id(name: &str) -> NodeId {
        NodeId::new(name).unwrap()
    }

    fn src(name: &str) -> SourceId {
        SourceId::new(name).unwrap()
    }

    fn class(name: &str, usages: Vec<Usage>) -> Node {
        Node::new(
            id(name),
            NodeShape::class().with_member(Member::method("f", "()", "V")),
            usages,
        )
    }

    fn users(graph: &DependencyGraph, target: &str) -> Vec<(NodeId, Usage)> {
        graph
            .users_of(&id(target))
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn put_indexes_nodes_sources_and_users() {
        let mut graph = DependencyGraph::in_memory().unwrap();
        graph.put_source_facts(&src("A.java"), &[class("p/A", vec![])]).unwrap();
        graph
            .put_source_facts(
                &src("B.java"),
                &[class("p/B", vec![Usage::method_call(id("p/A"), "f", "()")])],
            )
            .unwrap();

        assert!(graph.get_node(&id("p/A")).unwrap().is_some());
        assert_eq!(
            graph.nodes_of_source(&src("B.java")).unwrap(),
            BTreeSet::from([id("p/B")])
        );
        assert_eq!(
            graph.sources_of_node(&id("p/B")).unwrap(),
            BTreeSet::from([src("B.java")])
        );

        let users = users(&graph, "p/A");
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].0, id("p/B"));
        graph.check_consistency().unwrap();
    }

    #[test]
    fn replacing_facts_drops_stale_nodes_and_usages() {
        let mut graph = DependencyGraph::in_memory().unwrap();
        graph
            .put_source_facts(
                &src("A.java"),
                &[
                    class("p/A", vec![Usage::class_reference(id("p/X"))]),
                    class("p/A$1", vec![]),
                ],
            )
            .unwrap();

        let orphaned = graph
            .put_source_facts(
                &src("A.java"),
                &[class("p/A", vec![Usage::class_reference(id("p/Y"))])],
            )
            .unwrap();

        assert_eq!(orphaned, BTreeSet::from([id("p/A$1")]));
        assert!(graph.get_node(&id("p/A$1")).unwrap().is_none());
        assert!(users(&graph, "p/X").is_empty());
        assert_eq!(users(&graph, "p/Y").len(), 1);
        graph.check_consistency().unwrap();
    }

    #[test]
    fn shared_node_survives_removal_of_one_owner() {
        let mut graph = DependencyGraph::in_memory().unwrap();
        let shared = class("p/Shared", vec![Usage::supertype(id("p/Base"))]);
        graph.put_source_facts(&src("one.java"), &[shared.clone()]).unwrap();
        graph.put_source_facts(&src("two.java"), &[shared]).unwrap();

        let lost = graph.remove_source(&src("one.java")).unwrap();
        assert!(lost.is_empty());
        assert!(graph.get_node(&id("p/Shared")).unwrap().is_some());
        assert_eq!(
            graph.sources_of_node(&id("p/Shared")).unwrap(),
            BTreeSet::from([src("two.java")])
        );

        let lost = graph.remove_source(&src("two.java")).unwrap();
        assert_eq!(lost, BTreeSet::from([id("p/Base")]));
        assert_eq!(graph.node_count().unwrap(), 0);
        assert_eq!(graph.source_count().unwrap(), 0);
        graph.check_consistency().unwrap();
    }

    #[test]
    fn remove_unknown_source_is_a_no_op() {
        let mut graph = DependencyGraph::in_memory().unwrap();
        assert!(graph.remove_source(&src("ghost.java")).unwrap().is_empty());
        assert_eq!(graph.stats().unwrap().nodes, 0);
    }

    #[test]
    fn users_of_pages_across_large_fan_in() {
        let mut graph = DependencyGraph::in_memory().unwrap();
        graph.put_source_facts(&src("A.java"), &[class("p/A", vec![])]).unwrap();
        // Neighbouring target whose keys sort right after p/A's range.
        graph.put_source_facts(&src("A0.java"), &[class("p/A0", vec![])]).unwrap();

        let count = USERS_PAGE * 2 + 3;
        for i in 0..count {
            let name = format!("p/U{i:04}");
            graph
                .put_source_facts(
                    &src(&format!("U{i:04}.java")),
                    &[class(
                        &name,
                        vec![
                            Usage::class_reference(id("p/A")),
                            Usage::class_reference(id("p/A0")),
                        ],
                    )],
                )
                .unwrap();
        }

        let all = users(&graph, "p/A");
        assert_eq!(all.len(), count);
        assert!(all.iter().all(|(_, usage)| usage.target == id("p/A")));

        let mut iter = graph.users_of(&id("p/A"));
        let first = iter.next().unwrap().unwrap();
        let _ = iter.by_ref().take(10).count();
        let again = iter.restart().next().unwrap().unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn self_usage_is_indexed_once() {
        let mut graph = DependencyGraph::in_memory().unwrap();
        graph
            .put_source_facts(
                &src("A.java"),
                &[class("p/A", vec![Usage::method_call(id("p/A"), "f", "()")])],
            )
            .unwrap();
        graph
            .put_source_facts(
                &src("A.java"),
                &[class("p/A", vec![Usage::method_call(id("p/A"), "f", "()")])],
            )
            .unwrap();
        assert_eq!(users(&graph, "p/A").len(), 1);
        assert_eq!(graph.stats().unwrap().usages, 1);
    }

    #[test]
    fn consistency_check_detects_dangling_reverse_entry() {
        let store = MemoryStore::new();
        let mut graph = DependencyGraph::open(&store).unwrap();
        graph.put_source_facts(&src("A.java"), &[class("p/A", vec![])]).unwrap();

        let mut reverse: TypedMap<UserKey, ()> =
            TypedMap::open(&store, USERS_OF_TARGET_MAP).unwrap();
        reverse
            .insert(
                UserKey::new(&id("p/Ghost"), &Usage::class_reference(id("p/A"))),
                (),
            )
            .unwrap();

        assert!(matches!(
            graph.check_consistency(),
            Err(StorageError::IndexInconsistency { .. })
        ));
    }

    #[test]
    fn user_key_roundtrip() {
        let key = UserKey::new(&id("p/B"), &Usage::method_call(id("p/A"), "f", "(I)"));
        assert_eq!(UserKey::decode(&key.encode()).unwrap(), key);
        assert!(key.encode().starts_with(&UserKey::prefix(&id("p/A"))));
        assert!(!key.encode().starts_with(&UserKey::prefix(&id("p/"))));
    }

    #[test]
    fn meta_and_clear() {
        let mut graph = DependencyGraph::in_memory().unwrap();
        graph.set_meta("state", "open").unwrap();
        graph.put_source_facts(&src("A.java"), &[class("p/A", vec![])]).unwrap();
        assert_eq!(graph.meta("state").unwrap().as_deref(), Some("open"));

        graph.clear().unwrap();
        assert_eq!(graph.meta("state").unwrap(), None);
        assert_eq!(graph.stats().unwrap(), GraphStats { nodes: 0, sources: 0, usages: 0 });
    }

    #[test]
    fn fact_writes_ignore_meta_and_reads() {
        let mut graph = DependencyGraph::in_memory().unwrap();
        graph.set_meta("k", "v").unwrap();
        graph.get_node(&id("p/A")).unwrap();
        assert_eq!(graph.fact_writes(), 0);

        graph.put_source_facts(&src("A.java"), &[class("p/A", vec![])]).unwrap();
        graph.remove_source(&src("A.java")).unwrap();
        assert_eq!(graph.fact_writes(), 2);
    }

    #[test]
    fn stats_snapshot() {
        let mut graph = DependencyGraph::in_memory().unwrap();
        graph.put_source_facts(&src("A.java"), &[class("p/A", vec![])]).unwrap();
        graph
            .put_source_facts(
                &src("B.java"),
                &[class("p/B", vec![Usage::supertype(id("p/A"))])],
            )
            .unwrap();

        insta::assert_json_snapshot!(graph.stats().unwrap(), @r#"
        {
          "nodes": 2,
          "sources": 2,
          "usages": 1
        }
        "#);
    }
}
