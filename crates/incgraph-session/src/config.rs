//! Session settings.
//!
//! Defaults can be overridden from a JSON file and from environment
//! variables:
//! - `INCGRAPH_DB_PATH`: graph database file (default: "incgraph.db")
//! - `INCGRAPH_MAX_ROUNDS`: differencing round cap (default: 32)
//! - `INCGRAPH_ROOTS`: comma-separated `NAMESPACE=dir` source roots
//!   (default: "SRC=.")

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use incgraph_diff::DEFAULT_MAX_ROUNDS;

use crate::error::{PathMappingError, SessionError};
use crate::mapper::RootedPathMapper;

pub const DB_PATH_VAR: &str = "INCGRAPH_DB_PATH";
pub const MAX_ROUNDS_VAR: &str = "INCGRAPH_MAX_ROUNDS";
pub const ROOTS_VAR: &str = "INCGRAPH_ROOTS";

/// A namespaced source root as written in settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootSetting {
    pub namespace: String,
    pub dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub db_path: PathBuf,
    pub max_rounds: usize,
    pub roots: Vec<RootSetting>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            db_path: PathBuf::from("incgraph.db"),
            max_rounds: DEFAULT_MAX_ROUNDS,
            roots: vec![RootSetting {
                namespace: "SRC".to_string(),
                dir: PathBuf::from("."),
            }],
        }
    }
}

impl SessionSettings {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, SessionError> {
        SessionSettings::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Reads settings from a JSON file; missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self, SessionError> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| SessionError::config(format!("{}: {e}", path.display())))
    }

    /// Applies overrides from `lookup`, keyed by the `INCGRAPH_*` names.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, SessionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db_path) = lookup(DB_PATH_VAR) {
            self.db_path = PathBuf::from(db_path);
        }
        if let Some(rounds) = lookup(MAX_ROUNDS_VAR) {
            self.max_rounds = parse_max_rounds(&rounds)?;
        }
        if let Some(roots) = lookup(ROOTS_VAR) {
            self.roots = parse_roots(&roots)?;
        }
        Ok(self)
    }

    pub fn path_mapper(&self) -> Result<RootedPathMapper, PathMappingError> {
        self.roots
            .iter()
            .try_fold(RootedPathMapper::new(), |mapper, root| {
                mapper.with_root(&root.namespace, &root.dir)
            })
    }
}

fn parse_max_rounds(value: &str) -> Result<usize, SessionError> {
    match value.trim().parse::<usize>() {
        Ok(0) => Err(SessionError::config(format!("{MAX_ROUNDS_VAR} must be at least 1"))),
        Ok(rounds) => Ok(rounds),
        Err(e) => Err(SessionError::config(format!("{MAX_ROUNDS_VAR}={value:?}: {e}"))),
    }
}

fn parse_roots(value: &str) -> Result<Vec<RootSetting>, SessionError> {
    let roots: Vec<RootSetting> = value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (namespace, dir) = entry.split_once('=').ok_or_else(|| {
                SessionError::config(format!("{ROOTS_VAR} entry {entry:?} is not NAMESPACE=dir"))
            })?;
            Ok(RootSetting {
                namespace: namespace.trim().to_string(),
                dir: PathBuf::from(dir.trim()),
            })
        })
        .collect::<Result<_, SessionError>>()?;

    if roots.is_empty() {
        return Err(SessionError::config(format!("{ROOTS_VAR} names no roots")));
    }
    Ok(roots)
}
