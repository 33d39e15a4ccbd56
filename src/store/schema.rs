use rusqlite::Connection;

/// Table every strategy reads from.
pub const TABLE: &str = "categories";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    slug TEXT NOT NULL UNIQUE,
    parent_id INTEGER NULL REFERENCES categories (id),
    position INTEGER NOT NULL DEFAULT 0,
    lft INTEGER NULL,
    rgt INTEGER NULL,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_categories_parent ON categories (parent_id, position, id);
CREATE INDEX IF NOT EXISTS idx_categories_bounds ON categories (lft, rgt);
";

pub(crate) fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)
}
