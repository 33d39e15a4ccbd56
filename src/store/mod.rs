#![forbid(unsafe_code)]

//! SQLite-backed category relation.
//!
//! [`CategoryStore`] owns one connection and is the explicit data-access handle
//! every loader and write operation receives. Reads issued through the store
//! are counted so callers can observe how many round trips a strategy makes.

mod row;
mod schema;
mod writer;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use rusqlite::{params, Connection, OptionalExtension, Params, Row, Transaction, TransactionBehavior};
use tracing::{debug, info};

use crate::model::{Category, ImportRow};
use crate::options::TreeOptions;
use crate::types::{NodeId, Result, TreeError};

pub(crate) use row::{category_from_row, slug_conflict, CATEGORY_COLUMNS, CATEGORY_COLUMN_COUNT};
pub use schema::TABLE;
pub use writer::{WriterGate, WriterGuard};

/// Snapshot of the statement counters of one store handle.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct IoStats {
    /// Read statements issued (one per round trip).
    pub reads: u64,
    /// Committed write transactions.
    pub writes: u64,
}

impl IoStats {
    /// Counter delta between an earlier snapshot and this one.
    pub fn since(&self, earlier: &IoStats) -> IoStats {
        IoStats {
            reads: self.reads.saturating_sub(earlier.reads),
            writes: self.writes.saturating_sub(earlier.writes),
        }
    }
}

/// Connection handle over the `categories` relation.
pub struct CategoryStore {
    conn: Connection,
    path: Option<PathBuf>,
    options: TreeOptions,
    gate: WriterGate,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl std::fmt::Debug for CategoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CategoryStore")
            .field("path", &self.path)
            .field("options", &self.options)
            .field("gate", &self.gate)
            .field("io", &self.io_stats())
            .finish()
    }
}

impl CategoryStore {
    /// Opens (creating if missing) a database file and ensures the schema.
    pub fn open(path: impl AsRef<Path>, options: &TreeOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        let mode: String = conn.pragma_update_and_check(
            None,
            "journal_mode",
            options.journal_mode.pragma_value(),
            |row| row.get(0),
        )?;
        debug!(db_path = %path.display(), journal_mode = %mode, "store.open");
        Self::from_connection(conn, Some(path), options.clone(), WriterGate::new())
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory(options: &TreeOptions) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, None, options.clone(), WriterGate::new())
    }

    fn from_connection(
        conn: Connection,
        path: Option<PathBuf>,
        options: TreeOptions,
        gate: WriterGate,
    ) -> Result<Self> {
        conn.busy_timeout(options.busy_timeout())?;
        // Parent integrity is reported by verify and reindex; imports may
        // reference rows that appear later in the batch.
        conn.pragma_update(None, "foreign_keys", false)?;
        schema::ensure_schema(&conn)?;
        Ok(Self {
            conn,
            path,
            options,
            gate,
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        })
    }

    /// Opens another connection to the same database file. The new handle
    /// shares this handle's writer gate.
    pub fn reopen(&self) -> Result<Self> {
        let path = self.path.clone().ok_or_else(|| {
            TreeError::InvalidArgument("in-memory stores cannot be reopened".into())
        })?;
        let conn = Connection::open(&path)?;
        Self::from_connection(conn, Some(path), self.options.clone(), self.gate.clone())
    }

    /// Options this handle was opened with.
    pub fn options(&self) -> &TreeOptions {
        &self.options
    }

    /// Database file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Writer gate shared with reopened handles.
    pub fn writer_gate(&self) -> &WriterGate {
        &self.gate
    }

    /// Raw connection, for diagnostics and ad-hoc SQL. Statements issued here
    /// are not counted.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Current statement counters.
    pub fn io_stats(&self) -> IoStats {
        IoStats {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
        }
    }

    /// Runs a counted read statement and maps every row with `map`.
    pub(crate) fn query_rows<T, P, F>(&self, sql: &str, params: P, map: F) -> Result<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params, map)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Runs a counted read statement returning full category rows.
    pub(crate) fn query_categories<P: Params>(&self, sql: &str, params: P) -> Result<Vec<Category>> {
        self.query_rows(sql, params, category_from_row)
    }

    /// Fetches one category.
    pub fn get(&self, id: NodeId) -> Result<Option<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories c WHERE c.id = ?1");
        Ok(self.query_categories(&sql, [id])?.into_iter().next())
    }

    /// Fetches one category by slug.
    pub fn get_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories c WHERE c.slug = ?1");
        Ok(self.query_categories(&sql, [slug])?.into_iter().next())
    }

    /// Number of rows in the relation.
    pub fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM categories", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Whether the relation has no rows.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Runs `op` inside a write transaction.
    ///
    /// The writer gate is held for the whole call and the transaction starts
    /// with `BEGIN IMMEDIATE`, so at most one writer touches the relation at a
    /// time. The transaction commits when `op` returns `Ok` and rolls back
    /// otherwise.
    pub fn write<T, F>(&mut self, op: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let gate = self.gate.clone();
        let _guard = gate.acquire();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = op(&tx)?;
        tx.commit()?;
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(value)
    }

    /// Bulk-loads rows with explicit ids and parents in one transaction.
    ///
    /// Rows are written as given: parents are not validated and bounds are
    /// left unset. Run [`crate::admin::verify`] or a reindex afterwards.
    pub fn import(&mut self, rows: &[ImportRow]) -> Result<usize> {
        let inserted = self.write(|tx| {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO categories (id, name, slug, parent_id, position)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for row in rows {
                stmt.execute(params![row.id, row.name, row.slug, row.parent_id, row.position])
                    .map_err(|err| slug_conflict(err, &row.slug))?;
            }
            Ok(rows.len())
        })?;
        info!(rows = inserted, "store.import.completed");
        Ok(inserted)
    }
}

/// Reads one row inside a write transaction.
pub(crate) fn fetch_in(tx: &Transaction<'_>, id: NodeId) -> Result<Option<Category>> {
    let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories c WHERE c.id = ?1");
    Ok(tx
        .prepare_cached(&sql)?
        .query_row([id], category_from_row)
        .optional()?)
}
