use rustc_hash::{FxHashMap, FxHashSet};

use super::{Fetched, Scope, TreeLoader};
use crate::model::Category;
use crate::options::Strategy;
use crate::store::{category_from_row, CategoryStore, CATEGORY_COLUMNS, CATEGORY_COLUMN_COUNT};
use crate::tree::{link_by_parent, Tree};
use crate::types::{NodeId, Result, TreeError};

/// Loads the tree with one recursive CTE.
///
/// The CTE carries each row's depth and its materialized path (`/1/4/9/`);
/// the recursive step never re-enters an id already on the path, so the fixed
/// point is reached even when `parent_id` contains a loop. For full loads the
/// outer query left-joins the whole table, returning rows the traversal never
/// reached in the same round trip.
#[derive(Clone, Debug, Default)]
pub struct RecursiveClosure {
    strict: bool,
}

impl RecursiveClosure {
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

/// Builds the traversal statement. `seed` selects the starting rows; a
/// subtree load joins only reached rows, a full load keeps every row.
///
/// A child already on the path is still emitted once, flagged `reentry`, and
/// the recursion stops there.
fn closure_sql(scope: Scope) -> String {
    let (seed, join) = match scope {
        Scope::All => ("parent_id IS NULL", "LEFT JOIN"),
        Scope::Subtree(_) => ("id = ?1", "JOIN"),
    };
    format!(
        "WITH RECURSIVE closure (id, depth, path, reentry) AS (
             SELECT id, 0, '/' || id || '/', 0 FROM categories WHERE {seed}
             UNION ALL
             SELECT child.id, closure.depth + 1, closure.path || child.id || '/',
                    instr(closure.path, '/' || child.id || '/') > 0
             FROM categories child
             JOIN closure ON child.parent_id = closure.id
             WHERE closure.reentry = 0
         )
         SELECT {CATEGORY_COLUMNS}, closure.depth, closure.reentry
         FROM categories c
         {join} closure ON closure.id = c.id
         ORDER BY closure.depth IS NULL, closure.depth, c.position, c.id"
    )
}

impl TreeLoader for RecursiveClosure {
    fn strategy(&self) -> Strategy {
        Strategy::RecursiveClosure
    }

    fn strict(&self) -> bool {
        self.strict
    }

    fn fetch(&self, store: &CategoryStore, scope: Scope) -> Result<Fetched> {
        let sql = closure_sql(scope);
        let map = |row: &rusqlite::Row<'_>| -> rusqlite::Result<(Category, Option<bool>)> {
            let reentry: Option<bool> = row.get(CATEGORY_COLUMN_COUNT + 1)?;
            Ok((category_from_row(row)?, reentry))
        };
        let annotated = match scope {
            Scope::All => store.query_rows(&sql, [], map)?,
            Scope::Subtree(root) => {
                let annotated = store.query_rows(&sql, [root], map)?;
                if annotated.is_empty() {
                    return Err(TreeError::NodeNotFound(root));
                }
                annotated
            }
        };

        let mut fetched = Fetched::default();
        for (category, reentry) in annotated {
            match reentry {
                Some(false) => fetched.rows.push(category),
                // unreached, or reached again through a parent loop
                Some(true) | None => fetched.detached.push(category),
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

/// Explains why rows were unreachable from every root: either their parent
/// chain loops, or it ends at an id that does not exist.
pub(crate) fn diagnose_detached(reached: &[Category], detached: &[Category]) -> TreeError {
    let parents: FxHashMap<NodeId, Option<NodeId>> = reached
        .iter()
        .chain(detached)
        .map(|row| (row.id, row.parent_id))
        .collect();

    for row in detached {
        let mut visited: FxHashSet<NodeId> = FxHashSet::default();
        visited.insert(row.id);
        let mut current = row.id;
        while let Some(Some(parent)) = parents.get(&current).copied() {
            if !parents.contains_key(&parent) {
                return TreeError::inconsistent(format!(
                    "node {current} references missing parent {parent}"
                ));
            }
            if !visited.insert(parent) {
                return TreeError::CycleDetected {
                    node: current,
                    parent,
                };
            }
            current = parent;
        }
    }
    TreeError::inconsistent(format!(
        "{} rows were not reachable from any root",
        detached.len()
    ))
}
