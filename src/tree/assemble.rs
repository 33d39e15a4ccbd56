//! Turning flat rows into a nested [`Tree`].
//!
//! Both entry points compute a parent index per row and hand off to
//! [`build_forest`], which nests the rows in one iterative pass. Sibling order
//! is the order rows appear in the input.

use rustc_hash::FxHashMap;

use super::{Tree, TreeNode};
use crate::model::{Bounds, Category};
use crate::types::{NodeId, Result, TreeError};

/// Links rows by `parent_id` through an id-indexed map.
///
/// With `scope_root` set, that row is treated as the single top-level node
/// even though its parent is not part of the input.
pub(crate) fn link_by_parent(rows: Vec<Category>, scope_root: Option<NodeId>) -> Result<Tree> {
    let mut index: FxHashMap<NodeId, usize> = FxHashMap::default();
    index.reserve(rows.len());
    for (i, row) in rows.iter().enumerate() {
        if index.insert(row.id, i).is_some() {
            return Err(TreeError::CycleDetected {
                node: row.id,
                parent: row.parent_id.unwrap_or(row.id),
            });
        }
    }

    let mut parents = Vec::with_capacity(rows.len());
    for row in &rows {
        if scope_root == Some(row.id) {
            parents.push(None);
            continue;
        }
        let parent = match row.parent_id {
            None if scope_root.is_some() => {
                return Err(TreeError::inconsistent(format!(
                    "root {} reached inside a subtree load",
                    row.id
                )))
            }
            None => None,
            Some(parent) => match index.get(&parent) {
                Some(&slot) => Some(slot),
                None => {
                    return Err(TreeError::inconsistent(format!(
                        "node {} references missing parent {parent}",
                        row.id
                    )))
                }
            },
        };
        parents.push(parent);
    }
    build_forest(rows, parents)
}

/// Reconstructs the hierarchy from nested-set bounds. `rows` must be sorted
/// by `lft`.
///
/// A stack holds the currently open ancestors; ranges that closed before the
/// current row are popped, the row attaches under the remaining top, and is
/// then pushed itself.
pub(crate) fn link_by_bounds(rows: Vec<Category>, scope_root: Option<NodeId>) -> Result<Tree> {
    let mut parents: Vec<Option<usize>> = Vec::with_capacity(rows.len());
    let mut open: Vec<(usize, Bounds)> = Vec::new();
    let mut previous_left: Option<i64> = None;

    for (i, row) in rows.iter().enumerate() {
        let bounds = row.bounds.ok_or_else(|| {
            TreeError::inconsistent(format!(
                "node {} has no boundaries; reindex required",
                row.id
            ))
        })?;
        if bounds.left >= bounds.right {
            return Err(TreeError::inconsistent(format!(
                "node {} has inverted boundaries {}..{}",
                row.id, bounds.left, bounds.right
            )));
        }
        if previous_left.is_some_and(|prev| bounds.left <= prev) {
            return Err(TreeError::inconsistent(format!(
                "node {} repeats left boundary {}",
                row.id, bounds.left
            )));
        }
        previous_left = Some(bounds.left);

        while open.last().is_some_and(|(_, top)| top.right < bounds.left) {
            open.pop();
        }

        let parent = match open.last() {
            Some(&(slot, top)) => {
                if bounds.right >= top.right {
                    return Err(TreeError::inconsistent(format!(
                        "node {} range {}..{} overlaps {} range {}..{}",
                        row.id, bounds.left, bounds.right, rows[slot].id, top.left, top.right
                    )));
                }
                if row.parent_id != Some(rows[slot].id) {
                    return Err(TreeError::inconsistent(format!(
                        "node {} lies inside {} but its parent is {:?}",
                        row.id, rows[slot].id, row.parent_id
                    )));
                }
                Some(slot)
            }
            None => {
                let expected_top = match scope_root {
                    Some(root) => i == 0 && row.id == root,
                    None => row.parent_id.is_none(),
                };
                if !expected_top {
                    return Err(TreeError::inconsistent(format!(
                        "node {} sits at the top level but its parent is {:?}",
                        row.id, row.parent_id
                    )));
                }
                None
            }
        };
        parents.push(parent);
        open.push((i, bounds));
    }
    build_forest(rows, parents)
}

/// Nests `rows` given each row's parent slot. Rows that cannot be reached
/// from a top-level row form a cycle and are rejected.
fn build_forest(rows: Vec<Category>, parents: Vec<Option<usize>>) -> Result<Tree> {
    let n = rows.len();
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut tops = Vec::new();
    for (slot, parent) in parents.iter().enumerate() {
        match parent {
            Some(p) => children[*p].push(slot),
            None => tops.push(slot),
        }
    }

    let mut order = Vec::with_capacity(n);
    let mut depth = vec![0u32; n];
    let mut visited = vec![false; n];
    let mut stack: Vec<usize> = tops.iter().rev().copied().collect();
    while let Some(slot) = stack.pop() {
        visited[slot] = true;
        order.push(slot);
        for &child in children[slot].iter().rev() {
            depth[child] = depth[slot] + 1;
            stack.push(child);
        }
    }

    if order.len() != n {
        if let Some(stray) = visited.iter().position(|seen| !seen) {
            let row = &rows[stray];
            return Err(TreeError::CycleDetected {
                node: row.id,
                parent: row.parent_id.unwrap_or(row.id),
            });
        }
    }

    let mut pending: Vec<Option<Category>> = rows.into_iter().map(Some).collect();
    let mut built: Vec<Option<TreeNode>> = (0..n).map(|_| None).collect();
    for &slot in order.iter().rev() {
        let nested = children[slot]
            .iter()
            .filter_map(|&child| built[child].take())
            .collect();
        if let Some(category) = pending[slot].take() {
            built[slot] = Some(TreeNode {
                category,
                depth: depth[slot],
                children: nested,
            });
        }
    }
    Ok(Tree::new(
        tops.iter().filter_map(|&slot| built[slot].take()).collect(),
    ))
}
