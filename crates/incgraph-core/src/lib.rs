//! Data model for the incgraph dependency graph.
//!
//! # Modules
//!
//! - [`id`]: `NodeId` / `SourceId` newtypes
//! - [`node`]: `Node`, `NodeShape`, `Member`, access and class flags
//! - [`usage`]: `Usage` and the closed `UsageKind` enum
//! - [`digest`]: blake3 structural digests over node shapes
//! - [`facts`]: `SourceFacts` / `ChangeSet`, the input contract
//! - [`error`]: `CoreError`

pub mod digest;
pub mod error;
pub mod facts;
pub mod id;
pub mod node;
pub mod usage;

// Re-export commonly used types
pub use digest::{member_digest, structural_digest, Digest};
pub use error::CoreError;
pub use facts::{ChangeSet, SourceFacts};
pub use id::{NodeId, SourceId};
pub use node::{Access, ClassFlags, Member, MemberKind, Node, NodeShape};
pub use usage::{Usage, UsageKind};
