//! Identifier newtypes for graph entities.
//!
//! [`NodeId`] and [`SourceId`] are distinct wrappers over `String`, so a
//! source path can never be passed where a symbol name is expected. Both
//! serialize transparently and order lexicographically, which the storage
//! layer relies on for range scans.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// JVM binary name of a compiled unit, e.g. `com/acme/Foo$Inner`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

/// Graph-internal identifier of a NodeSource, e.g. `$SRC$/com/acme/Foo.java`.
///
/// Produced by a path mapper; the graph never interprets it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl NodeId {
    /// Creates a node id, rejecting empty names and names containing NUL.
    pub fn new(name: impl Into<String>) -> Result<Self, CoreError> {
        let name = name.into();
        if name.is_empty() || name.contains('\0') {
            return Err(CoreError::InvalidNodeId { name });
        }
        Ok(NodeId(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Package part of the binary name (`com/acme` for `com/acme/Foo`).
    /// Empty for the default package.
    pub fn package(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[..idx],
            None => "",
        }
    }

    /// Binary name of the top-level class enclosing this unit
    /// (`com/acme/Foo` for `com/acme/Foo$Inner$Deeper`).
    pub fn outermost(&self) -> &str {
        let start = self.0.rfind('/').map_or(0, |idx| idx + 1);
        match self.0[start..].find('$') {
            Some(offset) => &self.0[..start + offset],
            None => &self.0,
        }
    }

    /// Returns `true` if both ids live in the same runtime package.
    pub fn same_package(&self, other: &NodeId) -> bool {
        self.package() == other.package()
    }
}

impl SourceId {
    /// Creates a source id, rejecting empty identifiers and identifiers
    /// containing NUL.
    pub fn new(id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into();
        if id.is_empty() || id.contains('\0') {
            return Err(CoreError::InvalidSourceId { id });
        }
        Ok(SourceId(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
