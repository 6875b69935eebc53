//! One differencing round: compare, propagate, commit.
//!
//! # Round
//!
//! 1. Resolve the stored nodes of every updated or deleted source, plus the
//!    stored version of every incoming node id.
//! 2. Classify nodes into added / removed / changed / stable by id and
//!    digest (see [`crate::delta`]).
//! 3. For every changed or removed node, walk its users in the reverse
//!    index and apply the per-kind predicate from [`crate::compat`].
//!    Member-level usages that reach the node through a subtype are checked
//!    too, unless a type between them redeclares the member.
//! 4. Commit the new facts to the graph.
//! 5. Return the owning sources of every broken usage, minus the sources
//!    processed so far.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::{debug, info};

use incgraph_core::{ChangeSet, MemberKind, Node, NodeId, NodeShape, SourceId, UsageKind};
use incgraph_storage::DependencyGraph;

use crate::compat::{is_incompatible, TargetChange};
use crate::delta::{classify_nodes, Delta};
use crate::error::DiffError;

/// A subtype of a propagating node, with the chain of types between them.
#[derive(Debug)]
struct Subtype {
    id: NodeId,
    /// `id` followed by each intermediate supertype, excluding the root.
    chain: Vec<NodeId>,
}

/// Runs differencing rounds against one graph.
pub struct DifferencingEngine<'g> {
    graph: &'g mut DependencyGraph,
}

impl<'g> DifferencingEngine<'g> {
    pub fn new(graph: &'g mut DependencyGraph) -> Self {
        DifferencingEngine { graph }
    }

    pub fn graph(&self) -> &DependencyGraph {
        &*self.graph
    }

    /// Runs one round for `changes`.
    ///
    /// The new facts are committed before this returns. The affected set in
    /// the returned [`Delta`] never contains a source of `changes` or of
    /// `already_processed`.
    pub fn run_round(
        &mut self,
        changes: &ChangeSet,
        already_processed: &BTreeSet<SourceId>,
    ) -> Result<Delta, DiffError> {
        changes.validate()?;
        let touched = changes.sources();

        let mut new_nodes: BTreeMap<NodeId, Node> = BTreeMap::new();
        for facts in &changes.updated {
            for node in &facts.nodes {
                new_nodes.insert(node.id.clone(), node.clone());
            }
        }
        let old_nodes = self.stored_counterparts(&touched, &new_nodes)?;

        let mut delta = classify_nodes(&old_nodes, &new_nodes);
        let affected = self.collect_affected(&delta, &old_nodes, &new_nodes)?;

        self.commit_facts(changes)?;

        delta.affected_sources = affected
            .into_iter()
            .filter(|s| !touched.contains(s) && !already_processed.contains(s))
            .collect();

        info!(
            sources = touched.len(),
            added = delta.added.len(),
            removed = delta.removed.len(),
            changed = delta.changed.len(),
            stable = delta.stable.len(),
            affected = delta.affected_sources.len(),
            "differencing round complete"
        );
        Ok(delta)
    }

    /// Stored nodes to compare against: whatever the touched sources own,
    /// except nodes kept alive by an untouched owner, plus the stored version
    /// of every incoming id.
    fn stored_counterparts(
        &self,
        touched: &BTreeSet<SourceId>,
        new_nodes: &BTreeMap<NodeId, Node>,
    ) -> Result<BTreeMap<NodeId, Node>, DiffError> {
        let mut old_nodes = BTreeMap::new();

        for source in touched {
            for id in self.graph.nodes_of_source(source)? {
                if old_nodes.contains_key(&id) {
                    continue;
                }
                let kept_elsewhere = self
                    .graph
                    .sources_of_node(&id)?
                    .iter()
                    .any(|owner| !touched.contains(owner));
                if kept_elsewhere && !new_nodes.contains_key(&id) {
                    continue;
                }
                if let Some(node) = self.graph.get_node(&id)? {
                    old_nodes.insert(id, node);
                }
            }
        }

        for id in new_nodes.keys() {
            if !old_nodes.contains_key(id) {
                if let Some(node) = self.graph.get_node(id)? {
                    old_nodes.insert(id.clone(), node);
                }
            }
        }
        Ok(old_nodes)
    }

    fn collect_affected(
        &self,
        delta: &Delta,
        old_nodes: &BTreeMap<NodeId, Node>,
        new_nodes: &BTreeMap<NodeId, Node>,
    ) -> Result<BTreeSet<SourceId>, DiffError> {
        let mut affected = BTreeSet::new();

        for id in &delta.removed {
            self.propagate(id, TargetChange::Removed, new_nodes, &mut affected)?;
        }

        for (id, change) in &delta.changed {
            let (Some(old), Some(new)) = (old_nodes.get(id), new_nodes.get(id)) else {
                continue;
            };
            let target_change = TargetChange::Changed {
                declarer: id,
                old: &old.shape,
                new: &new.shape,
                diff: &change.diff,
            };
            self.propagate(id, target_change, new_nodes, &mut affected)?;
        }

        Ok(affected)
    }

    fn propagate(
        &self,
        id: &NodeId,
        change: TargetChange<'_>,
        new_nodes: &BTreeMap<NodeId, Node>,
        affected: &mut BTreeSet<SourceId>,
    ) -> Result<(), DiffError> {
        for entry in self.graph.users_of(id) {
            let (owner, usage) = entry?;
            if is_incompatible(&usage.kind, &owner, change) {
                self.mark_owner(&owner, id, &usage.kind, affected)?;
            }
        }

        let mut shapes = ShapeCache::new(self.graph(), new_nodes);
        for sub in self.subtypes(id)? {
            for entry in self.graph.users_of(&sub.id) {
                let (owner, usage) = entry?;
                if usage.kind.member_name().is_none() {
                    continue;
                }
                if shapes.redeclared(&sub.chain, &usage.kind)? {
                    continue;
                }
                if is_incompatible(&usage.kind, &owner, change) {
                    self.mark_owner(&owner, &sub.id, &usage.kind, affected)?;
                }
            }
        }
        Ok(())
    }

    fn mark_owner(
        &self,
        owner: &NodeId,
        target: &NodeId,
        kind: &UsageKind,
        affected: &mut BTreeSet<SourceId>,
    ) -> Result<(), DiffError> {
        let sources = self.graph.sources_of_node(owner)?;
        debug!(
            owner = %owner,
            target = %target,
            usage = kind.label(),
            sources = sources.len(),
            "incompatible usage"
        );
        affected.extend(sources);
        Ok(())
    }

    /// Transitive subtypes of `root`, breadth first, via `Supertype` usages.
    fn subtypes(&self, root: &NodeId) -> Result<Vec<Subtype>, DiffError> {
        let mut found = Vec::new();
        let mut visited = BTreeSet::from([root.clone()]);
        let mut queue = VecDeque::from([(root.clone(), Vec::new())]);

        while let Some((current, chain)) = queue.pop_front() {
            for entry in self.graph.users_of(&current) {
                let (owner, usage) = entry?;
                if usage.kind != UsageKind::Supertype || !visited.insert(owner.clone()) {
                    continue;
                }
                let mut sub_chain = vec![owner.clone()];
                sub_chain.extend(chain.iter().cloned());
                queue.push_back((owner.clone(), sub_chain.clone()));
                found.push(Subtype {
                    id: owner,
                    chain: sub_chain,
                });
            }
        }
        Ok(found)
    }

    fn commit_facts(&mut self, changes: &ChangeSet) -> Result<(), DiffError> {
        let updated: BTreeSet<&SourceId> = changes.updated.iter().map(|f| &f.source).collect();

        for source in &changes.deleted {
            if updated.contains(source) {
                continue;
            }
            let lost_users = self.graph.remove_source(source)?;
            debug!(source = %source, lost_users = lost_users.len(), "deleted source");
        }
        for facts in &changes.updated {
            self.graph.put_source_facts(&facts.source, &facts.nodes)?;
        }
        Ok(())
    }
}

/// Shapes of subtype-chain members, preferring this round's new facts.
struct ShapeCache<'a> {
    graph: &'a DependencyGraph,
    new_nodes: &'a BTreeMap<NodeId, Node>,
    stored: BTreeMap<NodeId, Option<NodeShape>>,
}

impl<'a> ShapeCache<'a> {
    fn new(graph: &'a DependencyGraph, new_nodes: &'a BTreeMap<NodeId, Node>) -> Self {
        ShapeCache {
            graph,
            new_nodes,
            stored: BTreeMap::new(),
        }
    }

    fn declares(&mut self, id: &NodeId, kind: &UsageKind) -> Result<bool, DiffError> {
        let shape = match self.new_nodes.get(id) {
            Some(node) => Some(&node.shape),
            None => {
                if !self.stored.contains_key(id) {
                    let shape = self.graph.get_node(id)?.map(|n| n.shape);
                    self.stored.insert(id.clone(), shape);
                }
                self.stored.get(id).and_then(Option::as_ref)
            }
        };
        let Some(shape) = shape else {
            return Ok(false);
        };
        Ok(match kind {
            UsageKind::MethodCall { name, descriptor } => {
                shape.member(MemberKind::Method, name, descriptor).is_some()
            }
            UsageKind::FieldAccess { name, .. } | UsageKind::ConstantInline { name } => {
                shape.members_named(MemberKind::Field, name).next().is_some()
            }
            _ => false,
        })
    }

    /// Whether any type in `chain` declares the member `kind` refers to.
    fn redeclared(&mut self, chain: &[NodeId], kind: &UsageKind) -> Result<bool, DiffError> {
        for id in chain {
            if self.declares(id, kind)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
