//! The per-build session root handed to the compiler driver.
//!
//! A [`GraphConfiguration`] owns the graph for exactly one build. Opening it
//! recovers from anything that makes the stored graph untrustworthy by
//! starting over empty and reporting `is_graph_updated() == false`, which
//! tells the driver to fall back to a full rebuild. Closing it marks the
//! graph as the result of a completed build; dropping it without closing
//! (an error or a cancelled build) leaves it marked as interrupted.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use incgraph_diff::{DiffError, IncrementalBuild};
use incgraph_storage::{DependencyGraph, SqliteStore, StorageError};

use crate::config::SessionSettings;
use crate::error::SessionError;
use crate::mapper::{map_changed_paths, NodeSourcePathMapper, PathPartition};

/// Meta key present while a session has the graph open.
pub const SESSION_MARKER_KEY: &str = "session.open";
/// Meta key recording the layout version of the stored graph.
pub const FORMAT_KEY: &str = "graph.format";
pub const GRAPH_FORMAT: &str = "1";

/// Why an opened graph does not reflect the last completed build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Staleness {
    /// No graph existed; a new empty one was created.
    Missing,
    /// The file could not be opened as a database and was recreated.
    Unreadable,
    /// The indices disagreed with each other; the graph was emptied.
    Inconsistent,
    /// The graph was written by an incompatible layout; it was emptied.
    FormatChanged,
    /// The previous session never closed. Its committed facts are kept, but
    /// some sources may not have been refreshed.
    Interrupted,
}

impl fmt::Display for Staleness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Staleness::Missing => "graph was missing",
            Staleness::Unreadable => "graph file was unreadable",
            Staleness::Inconsistent => "graph indices were inconsistent",
            Staleness::FormatChanged => "graph format changed",
            Staleness::Interrupted => "previous session was interrupted",
        };
        f.write_str(text)
    }
}

/// Graph, path mapper and freshness flag for one build session.
pub struct GraphConfiguration {
    graph: DependencyGraph,
    path_mapper: Box<dyn NodeSourcePathMapper>,
    is_graph_updated: bool,
    staleness: Option<Staleness>,
    max_rounds: usize,
    db_path: Option<PathBuf>,
    closed: bool,
}

impl GraphConfiguration {
    /// Opens the session described by `settings`.
    pub fn open(settings: &SessionSettings) -> Result<Self, SessionError> {
        let mapper = settings.path_mapper()?;
        let mut session = GraphConfiguration::open_at(&settings.db_path, mapper)?;
        session.max_rounds = settings.max_rounds;
        Ok(session)
    }

    /// Opens the graph file at `db_path`, recovering as needed.
    pub fn open_at(
        db_path: &Path,
        path_mapper: impl NodeSourcePathMapper + 'static,
    ) -> Result<Self, SessionError> {
        let (mut graph, mut staleness) = open_graph(db_path)?;
        staleness = staleness.or(validate(&mut graph)?);
        begin(&mut graph)?;

        info!(
            path = %db_path.display(),
            nodes = graph.node_count()?,
            updated = staleness.is_none(),
            "graph session opened"
        );
        if let Some(reason) = staleness {
            warn!(path = %db_path.display(), %reason, "graph does not reflect the last build");
        }

        Ok(GraphConfiguration {
            graph,
            path_mapper: Box::new(path_mapper),
            is_graph_updated: staleness.is_none(),
            staleness,
            max_rounds: incgraph_diff::DEFAULT_MAX_ROUNDS,
            db_path: Some(db_path.to_path_buf()),
            closed: false,
        })
    }

    /// A session over a private in-memory database. Always reports the
    /// graph as missing.
    pub fn in_memory(
        path_mapper: impl NodeSourcePathMapper + 'static,
    ) -> Result<Self, SessionError> {
        let store = SqliteStore::in_memory()?;
        let mut graph = DependencyGraph::open(&store)?;
        graph.set_meta(FORMAT_KEY, GRAPH_FORMAT)?;
        begin(&mut graph)?;
        Ok(GraphConfiguration {
            graph,
            path_mapper: Box::new(path_mapper),
            is_graph_updated: false,
            staleness: Some(Staleness::Missing),
            max_rounds: incgraph_diff::DEFAULT_MAX_ROUNDS,
            db_path: None,
            closed: false,
        })
    }

    /// Opens a session, runs `f`, and closes the session if `f` succeeds.
    ///
    /// On error the session is released without closing, so the next open
    /// reports [`Staleness::Interrupted`]. Rejected facts are the exception
    /// when nothing was written before the rejection: the graph is unchanged,
    /// so the session is closed and the error returned.
    pub fn with_session<T, F>(settings: &SessionSettings, f: F) -> Result<T, SessionError>
    where
        F: FnOnce(&mut GraphConfiguration) -> Result<T, SessionError>,
    {
        let mut session = GraphConfiguration::open(settings)?;
        let writes_at_open = session.graph.fact_writes();
        match f(&mut session) {
            Ok(value) => {
                session.close()?;
                Ok(value)
            }
            Err(e @ SessionError::Diff(DiffError::InvalidFacts(_)))
                if session.graph.fact_writes() == writes_at_open =>
            {
                warn!(error = %e, "facts rejected before any write, closing session");
                session.close()?;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut DependencyGraph {
        &mut self.graph
    }

    pub fn path_mapper(&self) -> &dyn NodeSourcePathMapper {
        self.path_mapper.as_ref()
    }

    /// `true` when the graph is the committed result of the last completed
    /// build; `false` means the driver should rebuild everything.
    pub fn is_graph_updated(&self) -> bool {
        self.is_graph_updated
    }

    pub fn staleness(&self) -> Option<Staleness> {
        self.staleness
    }

    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Maps changed file paths to source ids, keeping the failures.
    pub fn map_changed_paths<I, P>(&self, paths: I) -> PathPartition
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        map_changed_paths(self.path_mapper.as_ref(), paths)
    }

    /// A fixpoint driver over this session's graph with its round cap.
    pub fn incremental_build(&mut self) -> IncrementalBuild<'_> {
        IncrementalBuild::new(&mut self.graph).with_max_rounds(self.max_rounds)
    }

    /// Ends the session, marking the graph as up to date for the next one.
    pub fn close(mut self) -> Result<(), SessionError> {
        self.graph.remove_meta(SESSION_MARKER_KEY)?;
        self.graph.commit()?;
        self.closed = true;
        info!(location = %self.graph.location(), "graph session closed");
        Ok(())
    }
}

impl Drop for GraphConfiguration {
    fn drop(&mut self) {
        if !self.closed {
            warn!(
                location = %self.graph.location(),
                "graph session released without close"
            );
        }
    }
}

impl fmt::Debug for GraphConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphConfiguration")
            .field("location", &self.graph.location())
            .field("is_graph_updated", &self.is_graph_updated)
            .field("staleness", &self.staleness)
            .field("max_rounds", &self.max_rounds)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Opening and recovery
// ---------------------------------------------------------------------------

fn open_graph(db_path: &Path) -> Result<(DependencyGraph, Option<Staleness>), SessionError> {
    if !db_path.exists() {
        return Ok((create(db_path)?, Some(Staleness::Missing)));
    }

    let store = match SqliteStore::open(db_path) {
        Ok(store) => store,
        Err(e) if e.is_unavailable() => {
            warn!(path = %db_path.display(), error = %e, "cannot open graph, recreating");
            return recreate(db_path);
        }
        Err(e) => return Err(e.into()),
    };
    match store.quick_check() {
        Ok(true) => {}
        Ok(false) => {
            warn!(path = %db_path.display(), "graph failed quick_check, recreating");
            drop(store);
            return recreate(db_path);
        }
        Err(e) => {
            warn!(path = %db_path.display(), error = %e, "quick_check failed, recreating");
            drop(store);
            return recreate(db_path);
        }
    }
    Ok((DependencyGraph::open(&store)?, None))
}

fn recreate(db_path: &Path) -> Result<(DependencyGraph, Option<Staleness>), SessionError> {
    discard_files(db_path)?;
    Ok((create(db_path)?, Some(Staleness::Unreadable)))
}

fn create(db_path: &Path) -> Result<DependencyGraph, SessionError> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let store = SqliteStore::open(db_path)?;
    let mut graph = DependencyGraph::open(&store)?;
    graph.set_meta(FORMAT_KEY, GRAPH_FORMAT)?;
    debug!(path = %db_path.display(), "created empty graph");
    Ok(graph)
}

/// Removes the database file and its WAL side files.
fn discard_files(db_path: &Path) -> Result<(), SessionError> {
    for path in [
        db_path.to_path_buf(),
        with_suffix(db_path, "-wal"),
        with_suffix(db_path, "-shm"),
    ] {
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Checks the format and the indices of an opened graph, emptying it when
/// either cannot be trusted.
fn validate(graph: &mut DependencyGraph) -> Result<Option<Staleness>, SessionError> {
    if graph.meta(FORMAT_KEY)?.as_deref() != Some(GRAPH_FORMAT) {
        warn!(location = %graph.location(), "unknown graph format, clearing");
        reset(graph)?;
        return Ok(Some(Staleness::FormatChanged));
    }

    match graph.check_consistency() {
        Ok(()) => {}
        Err(
            e @ (StorageError::IndexInconsistency { .. }
            | StorageError::Serialization(_)
            | StorageError::InvalidKey { .. }
            | StorageError::Core(_)),
        ) => {
            warn!(location = %graph.location(), error = %e, "clearing inconsistent graph");
            reset(graph)?;
            return Ok(Some(Staleness::Inconsistent));
        }
        Err(e) => return Err(e.into()),
    }

    if graph.meta(SESSION_MARKER_KEY)?.is_some() {
        return Ok(Some(Staleness::Interrupted));
    }
    Ok(None)
}

fn reset(graph: &mut DependencyGraph) -> Result<(), SessionError> {
    graph.clear()?;
    graph.set_meta(FORMAT_KEY, GRAPH_FORMAT)?;
    Ok(())
}

fn begin(graph: &mut DependencyGraph) -> Result<(), SessionError> {
    graph.set_meta(SESSION_MARKER_KEY, &std::process::id().to_string())?;
    Ok(())
}
