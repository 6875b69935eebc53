//! Fixpoint driver: rounds of differencing until nothing new is affected.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

use incgraph_core::{ChangeSet, SourceId};
use incgraph_storage::DependencyGraph;

use crate::delta::Delta;
use crate::engine::DifferencingEngine;
use crate::error::DiffError;

/// Default cap on differencing rounds per build.
pub const DEFAULT_MAX_ROUNDS: usize = 32;

/// Outcome of an incremental build that reached a fixpoint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    /// Number of differencing rounds run.
    pub rounds: usize,
    /// Every source processed: the initial change set plus everything
    /// recompiled because of propagation.
    pub processed: BTreeSet<SourceId>,
    /// Sources recompiled only because of propagation.
    pub propagated: BTreeSet<SourceId>,
    /// Per-round deltas, in order.
    pub deltas: Vec<Delta>,
}

/// Drives [`DifferencingEngine`] rounds to a fixpoint.
pub struct IncrementalBuild<'g> {
    engine: DifferencingEngine<'g>,
    max_rounds: usize,
}

impl<'g> IncrementalBuild<'g> {
    pub fn new(graph: &'g mut DependencyGraph) -> Self {
        IncrementalBuild {
            engine: DifferencingEngine::new(graph),
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    /// Sets the round cap (at least one round always runs).
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    /// Runs rounds starting from `changes`.
    ///
    /// After each round with a non-empty affected set, `recompile` is asked
    /// for fresh facts of exactly those sources and the next round starts
    /// from its answer. Stops when a round affects nothing new. If the cap is
    /// hit first, fails with [`DiffError::NonTerminatingPropagation`]
    /// carrying the last affected set.
    pub fn run<F, E>(
        &mut self,
        changes: ChangeSet,
        mut recompile: F,
    ) -> Result<BuildReport, DiffError>
    where
        F: FnMut(&BTreeSet<SourceId>) -> Result<ChangeSet, E>,
        E: fmt::Display,
    {
        let mut report = BuildReport::default();
        let mut pending = changes;

        loop {
            report.rounds += 1;
            report.processed.extend(pending.sources());

            let delta = self.engine.run_round(&pending, &report.processed)?;
            let affected = delta.affected_sources.clone();
            report.deltas.push(delta);

            if affected.is_empty() {
                info!(
                    rounds = report.rounds,
                    processed = report.processed.len(),
                    propagated = report.propagated.len(),
                    "incremental build reached fixpoint"
                );
                return Ok(report);
            }

            if report.rounds >= self.max_rounds {
                warn!(
                    rounds = report.rounds,
                    pending = affected.len(),
                    "round cap reached before fixpoint"
                );
                return Err(DiffError::NonTerminatingPropagation {
                    rounds: report.rounds,
                    pending: affected,
                });
            }

            pending = recompile(&affected).map_err(|e| DiffError::Recompile(e.to_string()))?;
            report.propagated.extend(affected.iter().cloned());
            // Requested sources count as processed even if the recompiler
            // reported nothing for them.
            report.processed.extend(affected);
        }
    }
}
