//! Multi-round incremental builds driven by a simulated recompiler.
//!
//! The "world" is the set of facts every source would produce if compiled
//! right now; the recompile callback just looks them up.

mod common;

use std::collections::{BTreeMap, BTreeSet};

use incgraph_core::{ChangeSet, Member, SourceFacts, SourceId, Usage};
use incgraph_diff::{DiffError, IncrementalBuild};
use incgraph_storage::DependencyGraph;
use proptest::prelude::*;

use common::*;

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

type World = BTreeMap<SourceId, SourceFacts>;

/// `len` sources where `N{i}.g()` returns whatever `N{i-1}.g()` returns,
/// so a return type change at the root travels one hop per round.
///
/// Each node also exposes `h()`, whose signature never changes, and each
/// bystander `X{j}` calls `h()` on chain node `bystanders[j]`.
fn chain_world(len: usize, version: &str, bystanders: &[usize]) -> World {
    let returned = format!("Lv/{version};");
    let mut world = World::new();
    for i in 0..len {
        let usages = if i == 0 {
            vec![]
        } else {
            vec![Usage::method_call(id(&format!("c/N{}", i - 1)), "g", "()")]
        };
        let node = class(
            &format!("c/N{i}"),
            vec![
                Member::method("g", "()", &returned),
                Member::method("h", "()", "V"),
            ],
            usages,
        );
        let facts = facts(&format!("c/N{i}.java"), vec![node]);
        world.insert(facts.source.clone(), facts);
    }
    for (j, &target) in bystanders.iter().enumerate() {
        let node = class(
            &format!("x/X{j}"),
            vec![],
            vec![Usage::method_call(id(&format!("c/N{target}")), "h", "()")],
        );
        let facts = facts(&format!("x/X{j}.java"), vec![node]);
        world.insert(facts.source.clone(), facts);
    }
    world
}

fn seeded_world(world: &World) -> DependencyGraph {
    seeded(world.values().cloned().collect())
}

fn recompile_from(
    world: &World,
) -> impl FnMut(&BTreeSet<SourceId>) -> Result<ChangeSet, String> + '_ {
    move |requested| {
        let mut changes = ChangeSet::new();
        for source in requested {
            match world.get(source) {
                Some(facts) => changes = changes.with_updated(facts.clone()),
                None => changes = changes.with_deleted(source.clone()),
            }
        }
        Ok(changes)
    }
}

fn root_change(world: &World) -> ChangeSet {
    ChangeSet::new().with_updated(world[&src("c/N0.java")].clone())
}

fn chain_sources(range: std::ops::Range<usize>) -> BTreeSet<SourceId> {
    range.map(|i| src(&format!("c/N{i}.java"))).collect()
}

// ---------------------------------------------------------------------------
// Fixpoint
// ---------------------------------------------------------------------------

#[test]
fn change_travels_the_whole_chain() {
    let mut graph = seeded_world(&chain_world(4, "v1", &[]));
    let world = chain_world(4, "v2", &[]);

    let report = IncrementalBuild::new(&mut graph)
        .run(root_change(&world), recompile_from(&world))
        .unwrap();

    assert_eq!(report.rounds, 4);
    assert_eq!(report.processed, chain_sources(0..4));
    assert_eq!(report.propagated, chain_sources(1..4));
    assert_eq!(report.deltas.len(), 4);
    assert!(report.deltas.last().unwrap().affected_sources.is_empty());
    graph.check_consistency().unwrap();
}

#[test]
fn unchanged_root_stops_after_one_round() {
    let world = chain_world(3, "v1", &[0, 1]);
    let mut graph = seeded_world(&world);

    let report = IncrementalBuild::new(&mut graph)
        .run(root_change(&world), recompile_from(&world))
        .unwrap();

    assert_eq!(report.rounds, 1);
    assert!(report.propagated.is_empty());
}

#[test]
fn round_cap_reports_pending_sources() {
    let mut graph = seeded_world(&chain_world(5, "v1", &[]));
    let world = chain_world(5, "v2", &[]);

    let err = IncrementalBuild::new(&mut graph)
        .with_max_rounds(2)
        .run(root_change(&world), recompile_from(&world))
        .unwrap_err();

    match err {
        DiffError::NonTerminatingPropagation { rounds, ref pending } => {
            assert_eq!(rounds, 2);
            assert_eq!(pending, &chain_sources(2..3));
        }
        other => panic!("expected NonTerminatingPropagation, got {other:?}"),
    }
    assert_eq!(err.pending_sources(), Some(&chain_sources(2..3)));
}

#[test]
fn recompile_failure_aborts_the_build() {
    let mut graph = seeded_world(&chain_world(3, "v1", &[]));
    let world = chain_world(3, "v2", &[]);

    let err = IncrementalBuild::new(&mut graph)
        .run(root_change(&world), |_: &BTreeSet<SourceId>| {
            Err::<ChangeSet, _>("javac exited with status 1")
        })
        .unwrap_err();

    assert!(matches!(err, DiffError::Recompile(ref msg) if msg.contains("status 1")));
    // The first round's facts stay committed.
    let root = graph.get_node(&id("c/N0")).unwrap().unwrap();
    assert_eq!(root.shape.members[0].return_type.as_deref(), Some("Lv/v2;"));
}

#[test]
fn max_rounds_has_a_floor_of_one() {
    let mut graph = DependencyGraph::in_memory().unwrap();
    let build = IncrementalBuild::new(&mut graph).with_max_rounds(0);
    assert_eq!(build.max_rounds(), 1);
}

#[test]
fn deleted_source_on_recompile_is_processed() {
    let mut graph = seeded_world(&chain_world(3, "v1", &[]));
    let mut world = chain_world(3, "v2", &[]);
    world.remove(&src("c/N1.java"));

    let report = IncrementalBuild::new(&mut graph)
        .run(root_change(&world), recompile_from(&world))
        .unwrap();

    assert!(report.processed.contains(&src("c/N1.java")));
    assert!(report.processed.contains(&src("c/N2.java")));
    assert!(graph.get_node(&id("c/N1")).unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Soundness
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Every hop of a changed chain is recompiled, and nobody who only calls
    /// the untouched `h()` is.
    #[test]
    fn every_hop_is_processed(
        len in 1usize..10,
        picks in prop::collection::vec(any::<prop::sample::Index>(), 0..6),
    ) {
        let bystanders: Vec<usize> = picks.iter().map(|p| p.index(len)).collect();
        let mut graph = seeded_world(&chain_world(len, "v1", &bystanders));
        let world = chain_world(len, "v2", &bystanders);

        let report = IncrementalBuild::new(&mut graph)
            .run(root_change(&world), recompile_from(&world))
            .unwrap();

        prop_assert_eq!(report.rounds, len);
        prop_assert_eq!(&report.processed, &chain_sources(0..len));
        for j in 0..bystanders.len() {
            let bystander = src(&format!("x/X{j}.java"));
            prop_assert!(!report.processed.contains(&bystander));
        }
        prop_assert!(graph.check_consistency().is_ok());
    }
}
