//! incgraph command-line driver.
//!
//! Provides the `incgraph` binary for feeding compiler facts into a graph
//! and inspecting it between builds:
//! - `update` runs one differencing round for a JSON change set and prints
//!   the sources that must be recompiled next
//! - `map` translates changed file paths to source ids
//! - `inspect`, `check` and `stats` read an existing graph without opening
//!   a build session
//!
//! Settings come from `--config`, then `INCGRAPH_*` environment variables,
//! then command-line flags. Logs go to stderr (`RUST_LOG`, default `info`);
//! results go to stdout as JSON.

use std::collections::BTreeSet;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use incgraph_core::{ChangeSet, NodeId, SourceId, Usage};
use incgraph_diff::DifferencingEngine;
use incgraph_session::{GraphConfiguration, SessionError, SessionSettings, Staleness};
use incgraph_storage::{DependencyGraph, SqliteStore, StorageError};

/// Exit code for success.
const EXIT_OK: i32 = 0;
/// Exit code for invalid input or settings.
const EXIT_INPUT: i32 = 1;
/// Exit code for an inconsistent graph.
const EXIT_INCONSISTENT: i32 = 2;
/// Exit code for storage and I/O failures.
const EXIT_STORAGE: i32 = 3;

/// Incremental dependency graph for JVM builds.
#[derive(Parser)]
#[command(name = "incgraph", about = "Incremental dependency graph for JVM builds")]
struct Cli {
    /// Graph database file (overrides INCGRAPH_DB_PATH).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// JSON settings file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Run one differencing round for a change set.
    Update {
        /// JSON change set file, or `-` for stdin.
        changes: PathBuf,

        /// Source already processed in this build (repeatable).
        #[arg(long = "processed")]
        processed: Vec<String>,
    },

    /// Map changed file paths to source ids.
    Map {
        /// Paths to map.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Show a node with its owning sources and users.
    Inspect {
        /// Binary name of the node, e.g. `com/acme/Foo`.
        node: String,
    },

    /// Cross-check the graph indices.
    Check,

    /// Print index entry counts.
    Stats,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = match resolve_settings(cli.config.as_deref(), cli.db) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(EXIT_INPUT);
        }
    };
    debug!(
        db = %settings.db_path.display(),
        max_rounds = settings.max_rounds,
        "resolved settings"
    );

    let exit_code = match cli.command {
        Commands::Update { changes, processed } => run_update(&settings, &changes, &processed),
        Commands::Map { paths } => run_map(&settings, &paths),
        Commands::Inspect { node } => run_inspect(&settings, &node),
        Commands::Check => run_check(&settings),
        Commands::Stats => run_stats(&settings),
    };
    process::exit(exit_code);
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_settings(
    config: Option<&Path>,
    db: Option<PathBuf>,
) -> Result<SessionSettings, SessionError> {
    let base = match config {
        Some(path) => SessionSettings::load(path)?,
        None => SessionSettings::default(),
    };
    let mut settings = base.with_overrides(|key| std::env::var(key).ok())?;
    if let Some(db) = db {
        settings.db_path = db;
    }
    Ok(settings)
}

/// Prints `value` as pretty JSON to stdout.
fn print_json<T: Serialize>(value: &T) {
    let json = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize result: {}\"}}", e));
    println!("{}", json);
}

fn session_exit_code(e: &SessionError) -> i32 {
    match e {
        SessionError::Storage(StorageError::IndexInconsistency { .. }) => EXIT_INCONSISTENT,
        SessionError::Storage(_) | SessionError::Io(_) => EXIT_STORAGE,
        SessionError::Diff(diff) => match diff {
            incgraph_diff::DiffError::Storage(StorageError::IndexInconsistency { .. }) => {
                EXIT_INCONSISTENT
            }
            incgraph_diff::DiffError::Storage(_) => EXIT_STORAGE,
            _ => EXIT_INPUT,
        },
        SessionError::UnmappablePath(_) | SessionError::Config { .. } => EXIT_INPUT,
    }
}

// ---------------------------------------------------------------------------
// update
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct UpdateOutput {
    is_graph_updated: bool,
    staleness: Option<Staleness>,
    affected_sources: BTreeSet<SourceId>,
    added: usize,
    removed: usize,
    changed: usize,
    stable: usize,
}

/// Execute the update subcommand.
///
/// Returns exit code: 0 = success, 1 = bad input, 2 = inconsistent graph,
/// 3 = storage or I/O error.
fn run_update(settings: &SessionSettings, changes_path: &Path, processed: &[String]) -> i32 {
    let changes = match read_changes(changes_path) {
        Ok(changes) => changes,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return EXIT_INPUT;
        }
    };
    let processed = match processed
        .iter()
        .map(|s| SourceId::new(s.as_str()))
        .collect::<Result<BTreeSet<_>, _>>()
    {
        Ok(processed) => processed,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_INPUT;
        }
    };

    let result = GraphConfiguration::with_session(settings, |session| {
        let is_graph_updated = session.is_graph_updated();
        let staleness = session.staleness();
        let delta = DifferencingEngine::new(session.graph_mut()).run_round(&changes, &processed)?;
        Ok(UpdateOutput {
            is_graph_updated,
            staleness,
            added: delta.added.len(),
            removed: delta.removed.len(),
            changed: delta.changed.len(),
            stable: delta.stable.len(),
            affected_sources: delta.affected_sources,
        })
    });

    match result {
        Ok(output) => {
            info!(
                affected = output.affected_sources.len(),
                changed = output.changed,
                removed = output.removed,
                "update complete"
            );
            print_json(&output);
            EXIT_OK
        }
        Err(e) => {
            error!(error = %e, "update failed");
            eprintln!("Error: {}", e);
            session_exit_code(&e)
        }
    }
}

fn read_changes(path: &Path) -> Result<ChangeSet, String> {
    let mut text = String::new();
    if path == Path::new("-") {
        std::io::stdin()
            .read_to_string(&mut text)
            .map_err(|e| format!("failed to read stdin: {}", e))?;
    } else {
        text = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read '{}': {}", path.display(), e))?;
    }
    serde_json::from_str(&text).map_err(|e| format!("invalid change set: {}", e))
}

// ---------------------------------------------------------------------------
// map
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct Unmapped {
    path: PathBuf,
    error: String,
}

#[derive(Serialize)]
struct MapOutput {
    mapped: BTreeSet<SourceId>,
    unmappable: Vec<Unmapped>,
}

fn run_map(settings: &SessionSettings, paths: &[PathBuf]) -> i32 {
    let mapper = match settings.path_mapper() {
        Ok(mapper) => mapper,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_INPUT;
        }
    };
    let partition = incgraph_session::map_changed_paths(&mapper, paths);
    print_json(&MapOutput {
        mapped: partition.mapped,
        unmappable: partition
            .unmappable
            .into_iter()
            .map(|(path, e)| Unmapped {
                path,
                error: e.to_string(),
            })
            .collect(),
    });
    EXIT_OK
}

// ---------------------------------------------------------------------------
// Read-only commands
// ---------------------------------------------------------------------------

/// Opens an existing graph without starting a session, so nothing is
/// repaired or marked.
fn open_existing(settings: &SessionSettings) -> Result<DependencyGraph, i32> {
    let path = &settings.db_path;
    if !path.exists() {
        eprintln!("Error: no graph at '{}'", path.display());
        return Err(EXIT_STORAGE);
    }
    let store = SqliteStore::open(path).map_err(|e| {
        eprintln!("Error: failed to open graph '{}': {}", path.display(), e);
        EXIT_STORAGE
    })?;
    DependencyGraph::open(&store).map_err(|e| {
        eprintln!("Error: {}", e);
        EXIT_STORAGE
    })
}

fn storage_exit_code(e: &StorageError) -> i32 {
    match e {
        StorageError::IndexInconsistency { .. } => EXIT_INCONSISTENT,
        _ => EXIT_STORAGE,
    }
}

#[derive(Serialize)]
struct InspectOutput {
    node: incgraph_core::Node,
    sources: BTreeSet<SourceId>,
    users: Vec<UserOutput>,
}

#[derive(Serialize)]
struct UserOutput {
    owner: NodeId,
    usage: Usage,
}

fn run_inspect(settings: &SessionSettings, node: &str) -> i32 {
    let id = match NodeId::new(node) {
        Ok(id) => id,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_INPUT;
        }
    };
    let graph = match open_existing(settings) {
        Ok(graph) => graph,
        Err(code) => return code,
    };

    let result = (|| -> Result<Option<InspectOutput>, StorageError> {
        let Some(node) = graph.get_node(&id)? else {
            return Ok(None);
        };
        let sources = graph.sources_of_node(&id)?;
        let users = graph
            .users_of(&id)
            .map(|entry| entry.map(|(owner, usage)| UserOutput { owner, usage }))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(InspectOutput {
            node,
            sources,
            users,
        }))
    })();

    match result {
        Ok(Some(output)) => {
            print_json(&output);
            EXIT_OK
        }
        Ok(None) => {
            eprintln!("Error: node {} not found", id);
            EXIT_INPUT
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            storage_exit_code(&e)
        }
    }
}

fn run_check(settings: &SessionSettings) -> i32 {
    let graph = match open_existing(settings) {
        Ok(graph) => graph,
        Err(code) => return code,
    };
    match graph.check_consistency() {
        Ok(()) => {
            println!("graph at '{}' is consistent", settings.db_path.display());
            EXIT_OK
        }
        Err(e) => {
            error!(error = %e, "consistency check failed");
            eprintln!("Error: {}", e);
            storage_exit_code(&e)
        }
    }
}

fn run_stats(settings: &SessionSettings) -> i32 {
    let graph = match open_existing(settings) {
        Ok(graph) => graph,
        Err(code) => return code,
    };
    match graph.stats() {
        Ok(stats) => {
            print_json(&stats);
            EXIT_OK
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            storage_exit_code(&e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn update_accepts_repeated_processed_sources() {
        let cli = Cli::try_parse_from([
            "incgraph",
            "--db",
            "/tmp/g.db",
            "update",
            "changes.json",
            "--processed",
            "$SRC$/A.java",
            "--processed",
            "$SRC$/B.java",
        ])
        .unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/g.db")));
        match cli.command {
            Commands::Update { changes, processed } => {
                assert_eq!(changes, PathBuf::from("changes.json"));
                assert_eq!(processed.len(), 2);
            }
            _ => panic!("expected update"),
        }
    }

    #[test]
    fn exit_codes_follow_error_class() {
        let inconsistent = SessionError::Storage(StorageError::IndexInconsistency {
            reason: "dangling".to_string(),
        });
        assert_eq!(session_exit_code(&inconsistent), EXIT_INCONSISTENT);

        let config = SessionError::Config {
            reason: "bad".to_string(),
        };
        assert_eq!(session_exit_code(&config), EXIT_INPUT);

        let io = SessionError::Io(std::io::Error::other("disk full"));
        assert_eq!(session_exit_code(&io), EXIT_STORAGE);
    }

    #[test]
    fn change_sets_parse_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("changes.json");
        std::fs::write(&path, r#"{ "deleted": ["$SRC$/Gone.java"] }"#).unwrap();

        let changes = read_changes(&path).unwrap();
        assert!(changes.updated.is_empty());
        assert_eq!(changes.deleted.len(), 1);

        std::fs::write(&path, "42").unwrap();
        assert!(read_changes(&path).is_err());
    }
}
