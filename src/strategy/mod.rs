#![forbid(unsafe_code)]

//! Tree materialization strategies.
//!
//! Every strategy implements [`TreeLoader`]. Loading is split into a `fetch`
//! phase, which owns all I/O against the [`CategoryStore`], and a pure
//! `assemble` phase, so callers can attribute cost to either side with
//! [`TreeLoader::load_profiled`].

mod adjacency;
mod boundary;
mod closure;

use std::fmt;
use std::time::{Duration, Instant};

use tracing::debug;

pub use adjacency::AdjacencyRecursive;
pub use boundary::{BoundaryIndexed, ReindexReport};
pub use closure::RecursiveClosure;

use crate::model::Category;
use crate::options::{Strategy, TreeOptions};
use crate::store::CategoryStore;
use crate::tree::Tree;
use crate::types::{NodeId, Result, TreeError};

/// Portion of the relation a load materializes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Scope {
    /// Every row, rooted at the parentless rows.
    All,
    /// The subtree rooted at the given node (depths are relative to it).
    Subtree(NodeId),
}

impl Scope {
    pub(crate) fn root(&self) -> Option<NodeId> {
        match self {
            Scope::All => None,
            Scope::Subtree(id) => Some(*id),
        }
    }
}

/// Rows produced by a fetch phase.
#[derive(Clone, Debug, Default)]
pub struct Fetched {
    /// Rows in the order the strategy's assembly expects.
    pub rows: Vec<Category>,
    /// Rows the traversal could not reach from any root, or reached again
    /// through a parent loop.
    pub detached: Vec<Category>,
}

impl Fetched {
    pub(crate) fn rows(rows: Vec<Category>) -> Self {
        Self {
            rows,
            detached: Vec::new(),
        }
    }
}

/// Result of [`TreeLoader::load_profiled`].
#[derive(Clone, Debug)]
pub struct LoadReport {
    /// Strategy that produced the tree.
    pub strategy: Strategy,
    /// The materialized tree.
    pub tree: Tree,
    /// Read statements issued during the fetch phase.
    pub round_trips: u64,
    /// Rows returned by the fetch phase.
    pub rows: usize,
    /// Wall time spent fetching.
    pub fetch: Duration,
    /// Wall time spent assembling.
    pub assemble: Duration,
}

/// A strategy that materializes the category relation into a [`Tree`].
pub trait TreeLoader: fmt::Debug {
    /// Which strategy this is.
    fn strategy(&self) -> Strategy;

    /// Whether empty results fail with [`TreeError::EmptyResult`].
    fn strict(&self) -> bool;

    /// Reads the rows needed for `scope`. All I/O happens here.
    fn fetch(&self, store: &CategoryStore, scope: Scope) -> Result<Fetched>;

    /// Builds the tree from fetched rows without touching the store.
    fn assemble(&self, fetched: Fetched, scope: Scope) -> Result<Tree>;

    /// Fetches and assembles `scope`.
    fn load(&self, store: &CategoryStore, scope: Scope) -> Result<Tree> {
        Ok(self.load_scope_profiled(store, scope)?.tree)
    }

    /// Materializes the whole relation.
    fn load_tree(&self, store: &CategoryStore) -> Result<Tree> {
        self.load(store, Scope::All)
    }

    /// Materializes the subtree rooted at `root`.
    fn load_subtree(&self, store: &CategoryStore, root: NodeId) -> Result<Tree> {
        self.load(store, Scope::Subtree(root))
    }

    /// Loads the whole relation and reports round trips and phase timings.
    fn load_profiled(&self, store: &CategoryStore) -> Result<LoadReport> {
        self.load_scope_profiled(store, Scope::All)
    }

    /// Profiled load of an arbitrary scope.
    fn load_scope_profiled(&self, store: &CategoryStore, scope: Scope) -> Result<LoadReport> {
        let before = store.io_stats();
        let started = Instant::now();
        let fetched = self.fetch(store, scope)?;
        let fetch = started.elapsed();
        let round_trips = store.io_stats().since(&before).reads;
        let rows = fetched.rows.len() + fetched.detached.len();

        let started = Instant::now();
        let tree = self.assemble(fetched, scope)?;
        let assemble = started.elapsed();

        if tree.is_empty() && self.strict() {
            return Err(TreeError::EmptyResult);
        }
        debug!(
            strategy = %self.strategy(),
            rows,
            round_trips,
            fetch_us = fetch.as_micros() as u64,
            assemble_us = assemble.as_micros() as u64,
            "loader.load.completed"
        );
        Ok(LoadReport {
            strategy: self.strategy(),
            tree,
            round_trips,
            rows,
            fetch,
            assemble,
        })
    }
}

impl Strategy {
    /// Builds the loader for this strategy.
    pub fn loader(&self, options: &TreeOptions) -> Box<dyn TreeLoader> {
        match self {
            Strategy::AdjacencyRecursive => {
                Box::new(AdjacencyRecursive::new().strict(options.strict))
            }
            Strategy::RecursiveClosure => Box::new(RecursiveClosure::new().strict(options.strict)),
            Strategy::BoundaryIndexed => Box::new(BoundaryIndexed::from_options(options)),
        }
    }
}

impl TreeOptions {
    /// Loader for the configured strategy.
    pub fn loader(&self) -> Box<dyn TreeLoader> {
        self.strategy.loader(self)
    }
}
