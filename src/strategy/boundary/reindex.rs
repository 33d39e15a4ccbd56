use std::time::Instant;

use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::info;

use super::BoundaryIndexed;
use crate::model::Bounds;
use crate::store::CategoryStore;
use crate::types::{NodeId, Result, TreeError};

/// Outcome of [`BoundaryIndexed::reindex`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReindexReport {
    /// Rows numbered.
    pub nodes: usize,
    /// Parentless rows.
    pub roots: usize,
    /// Deepest level reached, roots being depth 0.
    pub max_depth: u32,
    /// Rows whose bounds were rewritten.
    pub changed: usize,
    /// Wall time of the whole transaction in milliseconds.
    pub duration_ms: u64,
}

/// Parent link of one row, in sibling order.
#[derive(Clone, Debug)]
struct Link {
    id: NodeId,
    parent: Option<NodeId>,
    bounds: Option<Bounds>,
}

#[derive(Debug)]
struct Numbering {
    /// Index-aligned with the input links.
    bounds: Vec<Bounds>,
    roots: usize,
    max_depth: u32,
}

/// Assigns `lft` on entry and `rgt` on exit of an iterative pre-order walk,
/// counting from 1. Siblings are visited in input order.
fn number_preorder(links: &[Link]) -> Result<Numbering> {
    let index: FxHashMap<NodeId, usize> = links
        .iter()
        .enumerate()
        .map(|(i, link)| (link.id, i))
        .collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); links.len()];
    let mut roots = Vec::new();
    for (i, link) in links.iter().enumerate() {
        match link.parent {
            None => roots.push(i),
            Some(parent) => {
                let &p = index.get(&parent).ok_or_else(|| {
                    TreeError::inconsistent(format!(
                        "node {} references missing parent {parent}",
                        link.id
                    ))
                })?;
                children[p].push(i);
            }
        }
    }

    let mut bounds = vec![Bounds::new(0, 0); links.len()];
    let mut visited = vec![false; links.len()];
    let mut counter = 0i64;
    let mut max_depth = 0u32;
    // (node, depth, next child to descend into)
    let mut stack: Vec<(usize, u32, usize)> = Vec::new();
    for &root in &roots {
        counter += 1;
        bounds[root].left = counter;
        visited[root] = true;
        stack.push((root, 0, 0));
        while let Some(top) = stack.last_mut() {
            let (node, depth, next) = *top;
            if let Some(&child) = children[node].get(next) {
                top.2 += 1;
                counter += 1;
                bounds[child].left = counter;
                visited[child] = true;
                max_depth = max_depth.max(depth + 1);
                stack.push((child, depth + 1, 0));
            } else {
                counter += 1;
                bounds[node].right = counter;
                stack.pop();
            }
        }
    }

    if let Some(i) = visited.iter().position(|seen| !seen) {
        return Err(TreeError::inconsistent(format!(
            "node {} is not reachable from any root; parent chain loops",
            links[i].id
        )));
    }
    Ok(Numbering {
        bounds,
        roots: roots.len(),
        max_depth,
    })
}

impl BoundaryIndexed {
    /// Recomputes `lft`/`rgt` for every row from the `parent_id` graph.
    ///
    /// Runs in one write transaction and rewrites only rows whose bounds
    /// changed, so a second run reports `changed == 0`. Dangling parents and
    /// parent loops fail with [`TreeError::InconsistentTree`] and leave the
    /// relation untouched.
    pub fn reindex(&self, store: &mut CategoryStore) -> Result<ReindexReport> {
        let started = Instant::now();
        let mut report = store.write(|tx| {
            let links: Vec<Link> = {
                let mut stmt = tx.prepare_cached(
                    "SELECT id, parent_id, lft, rgt FROM categories ORDER BY position, id",
                )?;
                let rows = stmt.query_map([], |row| {
                    let left: Option<i64> = row.get(2)?;
                    let right: Option<i64> = row.get(3)?;
                    Ok(Link {
                        id: row.get(0)?,
                        parent: row.get(1)?,
                        bounds: left.zip(right).map(|(l, r)| Bounds::new(l, r)),
                    })
                })?;
                rows.collect::<rusqlite::Result<_>>()?
            };

            let numbering = number_preorder(&links)?;
            let mut update =
                tx.prepare_cached("UPDATE categories SET lft = ?2, rgt = ?3 WHERE id = ?1")?;
            let mut changed = 0;
            for (link, bounds) in links.iter().zip(&numbering.bounds) {
                if link.bounds != Some(*bounds) {
                    update.execute(rusqlite::params![link.id, bounds.left, bounds.right])?;
                    changed += 1;
                }
            }
            Ok(ReindexReport {
                nodes: links.len(),
                roots: numbering.roots,
                max_depth: numbering.max_depth,
                changed,
                duration_ms: 0,
            })
        })?;
        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            nodes = report.nodes,
            roots = report.roots,
            max_depth = report.max_depth,
            changed = report.changed,
            duration_ms = report.duration_ms,
            "boundary.reindex.completed"
        );
        Ok(report)
    }
}
