use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use super::closure::diagnose_detached;
use super::{Fetched, Scope, TreeLoader};
use crate::model::Category;
use crate::options::Strategy;
use crate::store::{category_from_row, CategoryStore, CATEGORY_COLUMNS, CATEGORY_COLUMN_COUNT};
use crate::tree::{link_by_parent, Tree};
use crate::types::{NodeId, Result, TreeError};

/// Loads the tree one level per query.
///
/// The first statement fetches the roots (or the subtree root); every
/// following statement fetches the children of the previous level, passing
/// the level's ids as one JSON array through `json_each`. The loop stops at
/// the first empty level, so a tree with `d` levels costs `d + 1` reads.
///
/// The root statement also carries the table's row count. When a full load
/// reaches fewer rows, one more read fetches the rest and the load fails with
/// a diagnosis of their parent chains.
#[derive(Clone, Debug, Default)]
pub struct AdjacencyRecursive {
    strict: bool,
}

impl AdjacencyRecursive {
    /// Non-strict loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables strict loads.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// Roots plus the total row count. The left join still yields one row, with
/// NULL category columns, when the relation has no root.
fn roots_sql() -> String {
    format!(
        "SELECT {CATEGORY_COLUMNS}, total.n
         FROM (SELECT COUNT(*) AS n FROM categories) total
         LEFT JOIN categories c ON c.parent_id IS NULL
         ORDER BY c.position, c.id"
    )
}

fn unreached_sql() -> String {
    format!(
        "SELECT {CATEGORY_COLUMNS} FROM categories c
         WHERE c.id NOT IN (SELECT value FROM json_each(?1))
         ORDER BY c.id"
    )
}

fn root_with_total(row: &rusqlite::Row<'_>) -> rusqlite::Result<(Option<Category>, usize)> {
    let total: i64 = row.get(CATEGORY_COLUMN_COUNT)?;
    let id: Option<i64> = row.get(0)?;
    let root = match id {
        Some(_) => Some(category_from_row(row)?),
        None => None,
    };
    Ok((root, total as usize))
}

fn seed_sql() -> String {
    format!("SELECT {CATEGORY_COLUMNS} FROM categories c WHERE c.id = ?1")
}

fn children_sql() -> String {
    format!(
        "SELECT {CATEGORY_COLUMNS} FROM categories c
         WHERE c.parent_id IN (SELECT value FROM json_each(?1))
         ORDER BY c.position, c.id"
    )
}

impl TreeLoader for AdjacencyRecursive {
    fn strategy(&self) -> Strategy {
        Strategy::AdjacencyRecursive
    }

    fn strict(&self) -> bool {
        self.strict
    }

    fn fetch(&self, store: &CategoryStore, scope: Scope) -> Result<Fetched> {
        let (mut level, total) = match scope {
            Scope::All => {
                let roots = store.query_rows(&roots_sql(), [], root_with_total)?;
                let total = roots.first().map(|(_, total)| *total);
                let roots: Vec<Category> = roots.into_iter().filter_map(|(root, _)| root).collect();
                (roots, total)
            }
            Scope::Subtree(root) => {
                let seed = store.query_categories(&seed_sql(), [root])?;
                if seed.is_empty() {
                    return Err(TreeError::NodeNotFound(root));
                }
                (seed, None)
            }
        };

        let children = children_sql();
        let mut seen: FxHashSet<NodeId> = FxHashSet::default();
        let mut rows = Vec::new();
        let mut depth = 0u32;
        while !level.is_empty() {
            for row in &level {
                if !seen.insert(row.id) {
                    return Err(TreeError::CycleDetected {
                        node: row.id,
                        parent: row.parent_id.unwrap_or(row.id),
                    });
                }
            }
            let ids: Vec<i64> = level.iter().map(|row| row.id.0).collect();
            trace!(depth, rows = ids.len(), "loader.adjacency.level");
            rows.append(&mut level);
            level = store.query_categories(&children, [serde_json::to_string(&ids)?])?;
            depth += 1;
        }

        let mut fetched = Fetched::rows(rows);
        if let Some(total) = total {
            if fetched.rows.len() < total {
                let reached: Vec<i64> = seen.iter().map(|id| id.0).collect();
                fetched.detached =
                    store.query_categories(&unreached_sql(), [serde_json::to_string(&reached)?])?;
                debug!(
                    reached = fetched.rows.len(),
                    total,
                    "loader.adjacency.unreached"
                );
            }
        }
        Ok(fetched)
    }

    fn assemble(&self, fetched: Fetched, scope: Scope) -> Result<Tree> {
        if !fetched.detached.is_empty() {
            return Err(diagnose_detached(&fetched.rows, &fetched.detached));
        }
        link_by_parent(fetched.rows, scope.root())
    }
}
