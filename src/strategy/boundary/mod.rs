//! Nested-set (boundary-indexed) strategy.
//!
//! Reads are one scan ordered by `lft`; the hierarchy is rebuilt purely from
//! range containment. Writes keep `lft`/`rgt` consistent either in place
//! ([`BoundaryMaintenance::Incremental`]) or by a later [`BoundaryIndexed::reindex`]
//! ([`BoundaryMaintenance::Deferred`]).

mod reindex;
mod write;

pub use reindex::ReindexReport;

use super::{Fetched, Scope, TreeLoader};
use crate::model::Category;
use crate::options::{BoundaryMaintenance, Strategy, TreeOptions};
use crate::store::{CategoryStore, CATEGORY_COLUMNS};
use crate::tree::{link_by_bounds, Tree};
use crate::types::{NodeId, Result, TreeError};

/// Boundary-indexed loader and its maintenance operations.
#[derive(Clone, Debug, Default)]
pub struct BoundaryIndexed {
    strict: bool,
    maintenance: BoundaryMaintenance,
}

impl BoundaryIndexed {
    /// Non-strict loader with incremental maintenance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader configured from `options`.
    pub fn from_options(options: &TreeOptions) -> Self {
        Self {
            strict: options.strict,
            maintenance: options.maintenance,
        }
    }

    /// Enables or disables strict loads.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Selects how writes maintain boundaries.
    pub fn maintenance(mut self, maintenance: BoundaryMaintenance) -> Self {
        self.maintenance = maintenance;
        self
    }

    /// Current maintenance mode.
    pub fn maintenance_mode(&self) -> BoundaryMaintenance {
        self.maintenance
    }

    /// Ancestors of `node`, outermost first, found by range containment in
    /// one read.
    pub fn ancestors(&self, store: &CategoryStore, node: NodeId) -> Result<Vec<Category>> {
        let target = store.get(node)?.ok_or(TreeError::NodeNotFound(node))?;
        let bounds = target.bounds.ok_or_else(|| {
            TreeError::inconsistent(format!("node {node} has no boundaries; reindex required"))
        })?;
        let sql = format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories c
             WHERE c.lft < ?1 AND c.rgt > ?2
             ORDER BY c.lft"
        );
        store.query_categories(&sql, [bounds.left, bounds.right])
    }
}

impl TreeLoader for BoundaryIndexed {
    fn strategy(&self) -> Strategy {
        Strategy::BoundaryIndexed
    }

    fn strict(&self) -> bool {
        self.strict
    }

    fn fetch(&self, store: &CategoryStore, scope: Scope) -> Result<Fetched> {
        let rows = match scope {
            Scope::All => {
                let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories c ORDER BY c.lft");
                store.query_categories(&sql, [])?
            }
            Scope::Subtree(root) => {
                // The root is matched by id as well, so an unindexed root comes
                // back and fails assembly instead of looking like a missing node.
                let sql = format!(
                    "SELECT {CATEGORY_COLUMNS} FROM categories c
                     WHERE c.id = ?1
                        OR c.lft BETWEEN (SELECT lft FROM categories WHERE id = ?1)
                                     AND (SELECT rgt FROM categories WHERE id = ?1)
                     ORDER BY c.lft"
                );
                let rows = store.query_categories(&sql, [root])?;
                if rows.is_empty() {
                    return Err(TreeError::NodeNotFound(root));
                }
                rows
            }
        };
        Ok(Fetched::rows(rows))
    }

    fn assemble(&self, fetched: Fetched, scope: Scope) -> Result<Tree> {
        link_by_bounds(fetched.rows, scope.root())
    }
}
