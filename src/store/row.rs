use rusqlite::types::Type;
use rusqlite::{ErrorCode, Row};

use crate::model::{parse_timestamp, Bounds, Category};
use crate::types::TreeError;

/// Column list shared by every category query; the table is aliased as `c`.
pub(crate) const CATEGORY_COLUMNS: &str =
    "c.id, c.name, c.slug, c.parent_id, c.position, c.lft, c.rgt, c.created_at, c.updated_at";

/// Number of columns in [`CATEGORY_COLUMNS`]; extra projections start here.
pub(crate) const CATEGORY_COLUMN_COUNT: usize = 9;

pub(crate) fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    let left: Option<i64> = row.get(5)?;
    let right: Option<i64> = row.get(6)?;
    let bounds = match (left, right) {
        (Some(left), Some(right)) => Some(Bounds::new(left, right)),
        _ => None,
    };
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        parent_id: row.get(3)?,
        position: row.get(4)?,
        bounds,
        created_at: timestamp(row, 7)?,
        updated_at: timestamp(row, 8)?,
    })
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<time::PrimitiveDateTime> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

/// Maps a failed insert/update to [`TreeError::DuplicateSlug`] when the
/// unique slug constraint fired.
pub(crate) fn slug_conflict(err: rusqlite::Error, slug: &str) -> TreeError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, Some(message))
            if failure.code == ErrorCode::ConstraintViolation && message.contains("slug") =>
        {
            TreeError::DuplicateSlug(slug.to_owned())
        }
        _ => TreeError::Sqlite(err),
    }
}
