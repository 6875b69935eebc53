//! Build-session plumbing around the incgraph dependency graph.
//!
//! # Modules
//!
//! - [`configuration`]: `GraphConfiguration`, the per-build session root
//! - [`mapper`]: `NodeSourcePathMapper` and the namespaced-root mapper
//! - [`config`]: `SessionSettings` from defaults, JSON and environment
//! - [`error`]: `SessionError` / `PathMappingError`

pub mod config;
pub mod configuration;
pub mod error;
pub mod mapper;

// Re-export key types for ergonomic use.
pub use config::{RootSetting, SessionSettings};
pub use configuration::{GraphConfiguration, Staleness};
pub use error::{PathMappingError, SessionError};
pub use mapper::{
    map_changed_paths, NodeSourcePathMapper, PathPartition, RootedPathMapper, SourceRoot,
};
