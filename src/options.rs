//! Runtime options: strategy selection, strictness, boundary maintenance and
//! connection tuning. Options can be built in code or parsed from TOML.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::types::{Result, TreeError};

/// Tree materialization strategy.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Level-by-level `parent_id IN (...)` queries.
    #[serde(alias = "adjacency")]
    AdjacencyRecursive,
    /// One recursive CTE.
    #[serde(alias = "closure")]
    RecursiveClosure,
    /// One scan ordered by nested-set bounds.
    #[serde(alias = "boundary", alias = "nested_set")]
    BoundaryIndexed,
}

impl Strategy {
    /// Every strategy, in declaration order.
    pub const ALL: [Strategy; 3] = [
        Strategy::AdjacencyRecursive,
        Strategy::RecursiveClosure,
        Strategy::BoundaryIndexed,
    ];

    /// Stable short name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::AdjacencyRecursive => "adjacency",
            Strategy::RecursiveClosure => "closure",
            Strategy::BoundaryIndexed => "boundary",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = TreeError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "adjacency" | "adjacency_recursive" => Ok(Strategy::AdjacencyRecursive),
            "closure" | "recursive_closure" => Ok(Strategy::RecursiveClosure),
            "boundary" | "boundary_indexed" | "nested_set" => Ok(Strategy::BoundaryIndexed),
            other => Err(TreeError::Config(format!("unknown strategy {other:?}"))),
        }
    }
}

/// How boundary writes keep `lft`/`rgt` up to date.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryMaintenance {
    /// Every insert, move and delete renumbers the affected ranges in place.
    #[default]
    Incremental,
    /// Writes only touch `parent_id`; bounds must be rebuilt with a reindex.
    Deferred,
}

/// SQLite journal mode applied to file-backed stores.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalMode {
    /// Write-ahead log; readers do not block the writer.
    #[default]
    Wal,
    /// Rollback journal.
    Delete,
}

impl JournalMode {
    pub(crate) fn pragma_value(&self) -> &'static str {
        match self {
            JournalMode::Wal => "WAL",
            JournalMode::Delete => "DELETE",
        }
    }
}

/// Options shared by stores, loaders and the boundary write path.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TreeOptions {
    /// Strategy returned by [`TreeOptions::loader`].
    pub strategy: Strategy,
    /// Fail loads that match no rows with [`TreeError::EmptyResult`].
    pub strict: bool,
    /// Boundary maintenance mode for write operations.
    pub maintenance: BoundaryMaintenance,
    /// How long a connection waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,
    /// Journal mode for file-backed stores.
    pub journal_mode: JournalMode,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            strategy: Strategy::BoundaryIndexed,
            strict: false,
            maintenance: BoundaryMaintenance::Incremental,
            busy_timeout_ms: 5_000,
            journal_mode: JournalMode::Wal,
        }
    }
}

impl TreeOptions {
    /// Read-heavy preset: boundary reads with incremental maintenance.
    pub fn read_optimized() -> Self {
        Self::default()
    }

    /// Bulk-load preset: deferred maintenance, reindex once at the end.
    pub fn bulk_load() -> Self {
        Self {
            strategy: Strategy::RecursiveClosure,
            maintenance: BoundaryMaintenance::Deferred,
            ..Self::default()
        }
    }

    /// Selects the loader strategy.
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Enables or disables strict loads.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Selects the boundary maintenance mode.
    pub fn maintenance(mut self, maintenance: BoundaryMaintenance) -> Self {
        self.maintenance = maintenance;
        self
    }

    /// Sets the busy timeout in milliseconds.
    pub fn busy_timeout_ms(mut self, millis: u64) -> Self {
        self.busy_timeout_ms = millis;
        self
    }

    /// Sets the journal mode for file-backed stores.
    pub fn journal_mode(mut self, mode: JournalMode) -> Self {
        self.journal_mode = mode;
        self
    }

    pub(crate) fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Parses options from a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|err| TreeError::Config(err.to_string()))
    }

    /// Reads and parses a TOML options file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&source)
    }
}
