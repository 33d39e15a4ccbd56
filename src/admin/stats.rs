use serde::Serialize;
use tracing::debug;

use crate::store::CategoryStore;
use crate::types::Result;

/// Counters computed by [`stats`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TreeStats {
    /// Rows in the relation.
    pub nodes: u64,
    /// Rows with no parent.
    pub roots: u64,
    /// Rows with `lft` or `rgt` unset.
    pub unindexed: u64,
    /// Largest `rgt`, `None` when no row is indexed.
    pub max_right: Option<i64>,
}

impl TreeStats {
    /// True when every row has bounds and the numbering can be contiguous.
    pub fn fully_indexed(&self) -> bool {
        self.unindexed == 0
    }
}

/// Counts nodes, roots and unindexed rows with one aggregate read.
pub fn stats(store: &CategoryStore) -> Result<TreeStats> {
    let mut rows = store.query_rows(
        "SELECT COUNT(*),
                COUNT(*) FILTER (WHERE parent_id IS NULL),
                COUNT(*) FILTER (WHERE lft IS NULL OR rgt IS NULL),
                MAX(rgt)
         FROM categories",
        [],
        |row| {
            Ok(TreeStats {
                nodes: row.get::<_, i64>(0)? as u64,
                roots: row.get::<_, i64>(1)? as u64,
                unindexed: row.get::<_, i64>(2)? as u64,
                max_right: row.get(3)?,
            })
        },
    )?;
    let stats = rows.pop().unwrap_or_default();
    debug!(
        nodes = stats.nodes,
        roots = stats.roots,
        unindexed = stats.unindexed,
        "admin.stats.completed"
    );
    Ok(stats)
}
