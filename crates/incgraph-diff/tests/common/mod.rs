//! Fixture builders shared by the differencing integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};

use incgraph_core::{ChangeSet, Member, Node, NodeId, NodeShape, SourceFacts, SourceId, Usage};
use incgraph_diff::DifferencingEngine;
use incgraph_storage::DependencyGraph;

pub fn id(name: &str) -> NodeId {
    NodeId::new(name).unwrap()
}

pub fn src(name: &str) -> SourceId {
    SourceId::new(format!("$SRC$/{name}")).unwrap()
}

pub fn node(name: &str, shape: NodeShape, usages: Vec<Usage>) -> Node {
    Node::new(id(name), shape, usages)
}

/// A public class declaring `members`.
pub fn class(name: &str, members: Vec<Member>, usages: Vec<Usage>) -> Node {
    let shape = members
        .into_iter()
        .fold(NodeShape::class(), NodeShape::with_member);
    node(name, shape, usages)
}

pub fn facts(source: &str, nodes: Vec<Node>) -> SourceFacts {
    SourceFacts::new(src(source), nodes)
}

pub fn update(facts: Vec<SourceFacts>) -> ChangeSet {
    facts.into_iter().fold(ChangeSet::new(), ChangeSet::with_updated)
}

pub fn delete(sources: &[&str]) -> ChangeSet {
    sources
        .iter()
        .fold(ChangeSet::new(), |changes, s| changes.with_deleted(src(s)))
}

pub fn sources(names: &[&str]) -> BTreeSet<SourceId> {
    names.iter().map(|n| src(n)).collect()
}

/// Runs one round with nothing processed yet and returns the affected set.
pub fn round(graph: &mut DependencyGraph, changes: ChangeSet) -> BTreeSet<SourceId> {
    DifferencingEngine::new(graph)
        .run_round(&changes, &BTreeSet::new())
        .unwrap()
        .affected_sources
}

/// A graph holding `facts`, built by one initial round.
pub fn seeded(facts: Vec<SourceFacts>) -> DependencyGraph {
    let mut graph = DependencyGraph::in_memory().unwrap();
    let affected = round(&mut graph, update(facts));
    assert!(affected.is_empty(), "seeding round affected {affected:?}");
    graph
}

/// Everything observable about a graph, for equality checks.
pub fn snapshot(graph: &DependencyGraph) -> String {
    let mut out = BTreeMap::new();
    for id in graph.node_ids().unwrap() {
        let node = graph.get_node(&id).unwrap().unwrap();
        let users: Vec<_> = graph
            .users_of(&id)
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        let owners = graph.sources_of_node(&id).unwrap();
        out.insert(id.to_string(), format!("{node:?} {users:?} {owners:?}"));
    }
    for source in graph.sources().unwrap() {
        let owned = graph.nodes_of_source(&source).unwrap();
        out.insert(source.to_string(), format!("{owned:?}"));
    }
    format!("{out:#?} {:?}", graph.stats().unwrap())
}
