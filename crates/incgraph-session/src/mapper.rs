//! Translation between file-system paths and graph source ids.
//!
//! A [`RootedPathMapper`] knows a list of namespaced source roots. A file
//! under root `SRC` at `<root>/com/acme/Foo.java` maps to the id
//! `$SRC$/com/acme/Foo.java`, independent of where the checkout lives.
//! Mapping is purely lexical and never touches the file system.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use tracing::warn;

use incgraph_core::SourceId;

use crate::error::PathMappingError;

/// Bidirectional path ↔ [`SourceId`] translation used by a session.
pub trait NodeSourcePathMapper {
    fn to_node_source(&self, path: &Path) -> Result<SourceId, PathMappingError>;

    fn to_path(&self, source: &SourceId) -> Result<PathBuf, PathMappingError>;
}

/// One namespaced source root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRoot {
    pub namespace: String,
    pub dir: PathBuf,
}

/// Maps paths under a set of namespaced roots; the deepest matching root
/// wins when roots nest.
#[derive(Debug, Clone, Default)]
pub struct RootedPathMapper {
    roots: Vec<SourceRoot>,
}

impl RootedPathMapper {
    pub fn new() -> Self {
        RootedPathMapper::default()
    }

    /// Adds a root. Namespaces must be non-empty, unique and free of `$`
    /// and `/`.
    pub fn with_root(
        mut self,
        namespace: &str,
        dir: impl AsRef<Path>,
    ) -> Result<Self, PathMappingError> {
        let invalid = |reason: &str| PathMappingError::InvalidNamespace {
            namespace: namespace.to_string(),
            reason: reason.to_string(),
        };
        if namespace.is_empty() {
            return Err(invalid("empty"));
        }
        if namespace.contains(['$', '/', '\\']) {
            return Err(invalid("contains a reserved character"));
        }
        if self.roots.iter().any(|r| r.namespace == namespace) {
            return Err(invalid("already registered"));
        }
        let dir = normalize(dir.as_ref())?;
        self.roots.push(SourceRoot {
            namespace: namespace.to_string(),
            dir,
        });
        Ok(self)
    }

    pub fn roots(&self) -> &[SourceRoot] {
        &self.roots
    }

    fn deepest_root<'a>(&'a self, path: &'a Path) -> Option<(&'a SourceRoot, &'a Path)> {
        self.roots
            .iter()
            .filter_map(|root| path.strip_prefix(&root.dir).ok().map(|rest| (root, rest)))
            .max_by_key(|(root, _)| root.dir.components().count())
    }
}

impl NodeSourcePathMapper for RootedPathMapper {
    fn to_node_source(&self, path: &Path) -> Result<SourceId, PathMappingError> {
        let normalized = normalize(path)?;
        let outside = || PathMappingError::OutsideRoots {
            path: path.to_path_buf(),
        };
        let (root, relative) = self.deepest_root(&normalized).ok_or_else(outside)?;

        let mut parts = Vec::new();
        for component in relative.components() {
            let part = component
                .as_os_str()
                .to_str()
                .ok_or_else(|| PathMappingError::NonUtf8 {
                    path: path.to_path_buf(),
                })?;
            parts.push(part);
        }
        // The root itself is a directory, not a source.
        if parts.is_empty() {
            return Err(outside());
        }

        let id = format!("${}$/{}", root.namespace, parts.join("/"));
        SourceId::new(id.clone()).map_err(|_| PathMappingError::MalformedId { id })
    }

    fn to_path(&self, source: &SourceId) -> Result<PathBuf, PathMappingError> {
        let id = source.as_str();
        let malformed = || PathMappingError::MalformedId { id: id.to_string() };

        let rest = id.strip_prefix('$').ok_or_else(malformed)?;
        let (namespace, relative) = rest.split_once("$/").ok_or_else(malformed)?;
        if relative.is_empty() {
            return Err(malformed());
        }

        let root = self
            .roots
            .iter()
            .find(|r| r.namespace == namespace)
            .ok_or_else(|| PathMappingError::UnknownNamespace {
                id: id.to_string(),
                namespace: namespace.to_string(),
            })?;

        let mut path = root.dir.clone();
        for part in relative.split('/') {
            match part {
                "" | "." => return Err(malformed()),
                ".." => {
                    return Err(PathMappingError::ParentTraversal {
                        path: PathBuf::from(relative),
                    })
                }
                _ => path.push(part),
            }
        }
        Ok(path)
    }
}

/// Changed paths split by whether they could be mapped.
#[derive(Debug, Default)]
pub struct PathPartition {
    pub mapped: BTreeSet<SourceId>,
    /// Paths that must be treated as "always recompile" by the driver.
    pub unmappable: Vec<(PathBuf, PathMappingError)>,
}

impl PathPartition {
    pub fn is_fully_mapped(&self) -> bool {
        self.unmappable.is_empty()
    }
}

/// Maps every path, collecting failures instead of dropping them.
pub fn map_changed_paths<I, P>(mapper: &dyn NodeSourcePathMapper, paths: I) -> PathPartition
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut partition = PathPartition::default();
    for path in paths {
        let path = path.as_ref();
        match mapper.to_node_source(path) {
            Ok(source) => {
                partition.mapped.insert(source);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unmappable source path");
                partition.unmappable.push((path.to_path_buf(), e));
            }
        }
    }
    partition
}

/// Drops `.` components and rejects `..`.
fn normalize(path: &Path) -> Result<PathBuf, PathMappingError> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(PathMappingError::ParentTraversal {
                    path: path.to_path_buf(),
                })
            }
            other => out.push(other.as_os_str()),
        }
    }
    Ok(out)
}
