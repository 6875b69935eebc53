//! Persistent storage for the incgraph dependency graph.
//!
//! Provides the [`MapStore`] / [`PersistentMap`] contracts, the
//! [`MemoryStore`] and [`SqliteStore`] backends, the commit-per-mutation
//! [`SwapMap`] decorator, and the [`DependencyGraph`] built on top of them.
//!
//! # Architecture
//!
//! Every graph index is a `SwapMap<TypedMap<K, V>>` over a named raw map of
//! one shared store. The graph never talks to a backend directly, so the
//! same index code runs against memory (tests) and SQLite (builds).
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`traits`]: MapStore, RawMap, PersistentMap, Committable, MapKey
//! - [`memory`]: MemoryStore with rollback for crash simulation
//! - [`schema`]: SQL migrations and connection setup
//! - [`sqlite`]: SqliteStore implementation
//! - [`typed`]: TypedMap, serde_json values over a raw map
//! - [`swap`]: SwapMap decorator
//! - [`graph`]: DependencyGraph and the lazy users-of iterator

pub mod error;
pub mod graph;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod swap;
pub mod traits;
pub mod typed;

// Re-export key types for ergonomic use.
pub use error::StorageError;
pub use graph::{DependencyGraph, GraphStats, UserKey, UsersOf};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use swap::SwapMap;
pub use traits::{Committable, MapKey, MapStore, PersistentMap, RawMap};
pub use typed::TypedMap;
