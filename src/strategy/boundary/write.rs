//! Boundary-maintaining write operations.
//!
//! Every operation runs inside [`CategoryStore::write`], so the writer gate and
//! an immediate transaction are held for the whole renumbering and a failure
//! rolls every statement back.

use rusqlite::{params, Transaction};
use tracing::{debug, info};

use super::BoundaryIndexed;
use crate::model::{Bounds, Category, NewCategory};
use crate::options::BoundaryMaintenance;
use crate::store::{fetch_in, slug_conflict, CategoryStore};
use crate::types::{NodeId, Result, TreeError};

impl BoundaryIndexed {
    /// Inserts a category as the last child of `parent` (or as the last root).
    ///
    /// In incremental mode every boundary at or after the parent's old `rgt`
    /// moves up by two and the new node takes `lft = rgt_old, rgt = lft + 1`.
    /// In deferred mode the node is stored without bounds.
    pub fn insert(
        &self,
        store: &mut CategoryStore,
        new: &NewCategory,
        parent: Option<NodeId>,
    ) -> Result<NodeId> {
        let (name, slug) = new.normalize()?;
        let maintenance = self.maintenance;
        let id = store.write(|tx| {
            let parent_row = match parent {
                Some(parent) => Some(fetch_in(tx, parent)?.ok_or(TreeError::InvalidParent(parent))?),
                None => None,
            };
            let position = next_position(tx, parent)?;
            let bounds = match maintenance {
                BoundaryMaintenance::Incremental => {
                    require_indexed(tx)?;
                    let target = match &parent_row {
                        Some(row) => indexed(row)?.right,
                        None => max_right(tx)? + 1,
                    };
                    shift_from(tx, target, 2)?;
                    Some(Bounds::new(target, target + 1))
                }
                BoundaryMaintenance::Deferred => None,
            };
            tx.execute(
                "INSERT INTO categories (name, slug, parent_id, position, lft, rgt)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    name,
                    slug,
                    parent,
                    position,
                    bounds.map(|b| b.left),
                    bounds.map(|b| b.right)
                ],
            )
            .map_err(|err| slug_conflict(err, &slug))?;
            Ok(NodeId(tx.last_insert_rowid()))
        })?;
        debug!(node = %id, parent = ?parent, "boundary.insert");
        Ok(id)
    }

    /// Moves `node` and its subtree under `new_parent` (or to the root level),
    /// as the new parent's last child.
    ///
    /// Fails with [`TreeError::CycleDetected`] before mutating anything when
    /// `new_parent` is `node` itself or one of its descendants.
    pub fn move_node(
        &self,
        store: &mut CategoryStore,
        node: NodeId,
        new_parent: Option<NodeId>,
    ) -> Result<()> {
        let maintenance = self.maintenance;
        store.write(|tx| {
            let row = fetch_in(tx, node)?.ok_or(TreeError::NodeNotFound(node))?;
            let parent_row = match new_parent {
                Some(parent) => Some(fetch_in(tx, parent)?.ok_or(TreeError::InvalidParent(parent))?),
                None => None,
            };
            if new_parent == Some(node) {
                return Err(TreeError::CycleDetected { node, parent: node });
            }

            match maintenance {
                BoundaryMaintenance::Incremental => {
                    require_indexed(tx)?;
                    let bounds = indexed(&row)?;
                    let parent_right = match &parent_row {
                        Some(parent) => {
                            let parent_bounds = indexed(parent)?;
                            if parent_bounds.left >= bounds.left && parent_bounds.right <= bounds.right {
                                return Err(TreeError::CycleDetected {
                                    node,
                                    parent: parent.id,
                                });
                            }
                            Some(parent_bounds.right)
                        }
                        None => None,
                    };
                    let position = next_position(tx, new_parent)?;
                    relocate(tx, bounds, parent_right)?;
                    reparent(tx, node, new_parent, position)?;
                }
                BoundaryMaintenance::Deferred => {
                    if let Some(parent) = new_parent {
                        if descends_from(tx, parent, node)? {
                            return Err(TreeError::CycleDetected { node, parent });
                        }
                    }
                    let position = next_position(tx, new_parent)?;
                    reparent(tx, node, new_parent, position)?;
                    tx.execute("UPDATE categories SET lft = NULL, rgt = NULL", [])?;
                }
            }
            Ok(())
        })?;
        debug!(node = %node, parent = ?new_parent, "boundary.move");
        Ok(())
    }

    /// Deletes `node`. Returns the number of rows removed.
    ///
    /// Without `cascade` a node that still has children is refused with
    /// [`TreeError::HasChildren`]. With `cascade` the whole subtree goes and,
    /// in incremental mode, every later boundary shifts down by the subtree
    /// width so no gap remains.
    pub fn delete(&self, store: &mut CategoryStore, node: NodeId, cascade: bool) -> Result<usize> {
        let maintenance = self.maintenance;
        let removed = store.write(|tx| {
            let row = fetch_in(tx, node)?.ok_or(TreeError::NodeNotFound(node))?;
            let children = child_count(tx, node)?;
            if children > 0 && !cascade {
                return Err(TreeError::HasChildren { node, children });
            }
            match maintenance {
                BoundaryMaintenance::Incremental => {
                    require_indexed(tx)?;
                    let bounds = indexed(&row)?;
                    let removed = tx.execute(
                        "DELETE FROM categories WHERE lft BETWEEN ?1 AND ?2",
                        [bounds.left, bounds.right],
                    )?;
                    shift_after(tx, bounds.right, -bounds.width())?;
                    Ok(removed)
                }
                BoundaryMaintenance::Deferred => Ok(tx.execute(
                    "WITH RECURSIVE doomed (id) AS (
                         SELECT ?1
                         UNION
                         SELECT c.id FROM categories c JOIN doomed ON c.parent_id = doomed.id
                     )
                     DELETE FROM categories WHERE id IN (SELECT id FROM doomed)",
                    [node],
                )?),
            }
        })?;
        info!(node = %node, cascade, removed, "boundary.delete");
        Ok(removed)
    }

    /// Deletes only `node`; its children take its place under its parent (or
    /// become roots), keeping their relative order.
    pub fn delete_and_reparent(&self, store: &mut CategoryStore, node: NodeId) -> Result<()> {
        let maintenance = self.maintenance;
        let adopted = store.write(|tx| {
            let row = fetch_in(tx, node)?.ok_or(TreeError::NodeNotFound(node))?;
            let bounds = match maintenance {
                BoundaryMaintenance::Incremental => {
                    require_indexed(tx)?;
                    Some(indexed(&row)?)
                }
                BoundaryMaintenance::Deferred => None,
            };

            let children: Vec<NodeId> = {
                let mut stmt = tx.prepare_cached(
                    "SELECT id FROM categories WHERE parent_id = ?1 ORDER BY position, id",
                )?;
                let ids = stmt.query_map([node], |r| r.get(0))?;
                ids.collect::<rusqlite::Result<_>>()?
            };
            let adopted = children.len() as i64;
            if adopted > 1 {
                tx.execute(
                    "UPDATE categories SET position = position + ?3
                     WHERE parent_id IS ?1 AND position > ?2",
                    params![row.parent_id, row.position, adopted - 1],
                )?;
            }
            for (offset, child) in children.iter().enumerate() {
                reparent(tx, *child, row.parent_id, row.position + offset as i64)?;
            }
            tx.execute("DELETE FROM categories WHERE id = ?1", [node])?;

            if let Some(bounds) = bounds {
                tx.execute(
                    "UPDATE categories SET lft = lft - 1, rgt = rgt - 1
                     WHERE lft > ?1 AND rgt < ?2",
                    [bounds.left, bounds.right],
                )?;
                shift_after(tx, bounds.right, -2)?;
            }
            Ok(children.len())
        })?;
        info!(node = %node, adopted, "boundary.delete_and_reparent");
        Ok(())
    }

    /// Updates the descriptive fields of `node`. Boundaries are untouched.
    pub fn rename(&self, store: &mut CategoryStore, node: NodeId, new: &NewCategory) -> Result<()> {
        let (name, slug) = new.normalize()?;
        store.write(|tx| {
            let updated = tx
                .execute(
                    "UPDATE categories SET name = ?2, slug = ?3, updated_at = CURRENT_TIMESTAMP
                     WHERE id = ?1",
                    params![node, name, slug],
                )
                .map_err(|err| slug_conflict(err, &slug))?;
            if updated == 0 {
                return Err(TreeError::NodeNotFound(node));
            }
            Ok(())
        })
    }
}

/// Moves the subtree occupying `bounds` so it ends up as the last child of
/// the node whose `rgt` is `parent_right`, or after the last root when
/// `parent_right` is `None`.
///
/// The subtree is parked at negated bounds, the gap it leaves is closed, a
/// gap of the same width is opened at the destination, and the parked rows
/// are shifted into it.
fn relocate(tx: &Transaction<'_>, bounds: Bounds, parent_right: Option<i64>) -> Result<()> {
    let width = bounds.width();
    tx.execute(
        "UPDATE categories SET lft = -lft, rgt = -rgt WHERE lft BETWEEN ?1 AND ?2",
        [bounds.left, bounds.right],
    )?;
    shift_after(tx, bounds.right, -width)?;

    let target = match parent_right {
        Some(right) if right > bounds.right => right - width,
        Some(right) => right,
        None => max_right(tx)? + 1,
    };
    shift_from(tx, target, width)?;

    let offset = target - bounds.left;
    tx.execute(
        "UPDATE categories SET lft = ?1 - lft, rgt = ?1 - rgt WHERE lft < 0",
        [offset],
    )?;
    Ok(())
}

fn reparent(tx: &Transaction<'_>, node: NodeId, parent: Option<NodeId>, position: i64) -> Result<()> {
    tx.execute(
        "UPDATE categories SET parent_id = ?2, position = ?3, updated_at = CURRENT_TIMESTAMP
         WHERE id = ?1",
        params![node, parent, position],
    )?;
    Ok(())
}

/// Adds `delta` to every boundary `>= from`.
fn shift_from(tx: &Transaction<'_>, from: i64, delta: i64) -> Result<()> {
    tx.execute(
        "UPDATE categories SET lft = lft + ?2 WHERE lft >= ?1",
        [from, delta],
    )?;
    tx.execute(
        "UPDATE categories SET rgt = rgt + ?2 WHERE rgt >= ?1",
        [from, delta],
    )?;
    Ok(())
}

/// Adds `delta` to every boundary `> after`.
fn shift_after(tx: &Transaction<'_>, after: i64, delta: i64) -> Result<()> {
    shift_from(tx, after + 1, delta)
}

fn next_position(tx: &Transaction<'_>, parent: Option<NodeId>) -> Result<i64> {
    Ok(tx.query_row(
        "SELECT COALESCE(MAX(position), -1) + 1 FROM categories WHERE parent_id IS ?1",
        [parent],
        |row| row.get(0),
    )?)
}

/// Largest positive `rgt`; rows parked at negated bounds do not count.
fn max_right(tx: &Transaction<'_>) -> Result<i64> {
    Ok(tx.query_row(
        "SELECT COALESCE(MAX(rgt), 0) FROM categories WHERE rgt > 0",
        [],
        |row| row.get(0),
    )?)
}

fn child_count(tx: &Transaction<'_>, node: NodeId) -> Result<usize> {
    let count: i64 = tx.query_row(
        "SELECT COUNT(*) FROM categories WHERE parent_id = ?1",
        [node],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// True when `candidate` is `ancestor` or lies below it, following
/// `parent_id` upwards. `UNION` stops the walk on a looping chain.
fn descends_from(tx: &Transaction<'_>, candidate: NodeId, ancestor: NodeId) -> Result<bool> {
    Ok(tx.query_row(
        "WITH RECURSIVE chain (id) AS (
             SELECT ?1
             UNION
             SELECT c.parent_id FROM categories c JOIN chain ON c.id = chain.id
             WHERE c.parent_id IS NOT NULL
         )
         SELECT EXISTS (SELECT 1 FROM chain WHERE id = ?2)",
        [candidate, ancestor],
        |row| row.get(0),
    )?)
}

/// Incremental writes need a fully indexed relation.
fn require_indexed(tx: &Transaction<'_>) -> Result<()> {
    let unindexed: i64 = tx.query_row(
        "SELECT COUNT(*) FROM categories WHERE lft IS NULL OR rgt IS NULL",
        [],
        |row| row.get(0),
    )?;
    if unindexed > 0 {
        return Err(TreeError::inconsistent(format!(
            "{unindexed} rows have no boundaries; reindex before incremental writes"
        )));
    }
    Ok(())
}

fn indexed(row: &Category) -> Result<Bounds> {
    row.bounds.ok_or_else(|| {
        TreeError::inconsistent(format!("node {} has no boundaries; reindex required", row.id))
    })
}
