//! Differencing engine: from changed per-source facts to the set of sources
//! that must be recompiled.
//!
//! # Architecture
//!
//! - [`delta`]: node classification (added / removed / changed / stable)
//! - [`shape`]: member-level diff of a changed node
//! - [`compat`]: per-[`UsageKind`](incgraph_core::UsageKind) compatibility rules
//! - [`engine`]: one round against a [`DependencyGraph`](incgraph_storage::DependencyGraph)
//! - [`build`]: the fixpoint driver with its round cap

pub mod build;
pub mod compat;
pub mod delta;
pub mod engine;
pub mod error;
pub mod shape;

pub use build::{BuildReport, IncrementalBuild, DEFAULT_MAX_ROUNDS};
pub use compat::{accessible, is_incompatible, TargetChange};
pub use delta::{classify_nodes, Delta, NodeChange};
pub use engine::DifferencingEngine;
pub use error::DiffError;
pub use shape::ShapeDiff;
