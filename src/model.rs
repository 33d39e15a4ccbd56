//! Row-level types stored in the `categories` relation.

use serde::{Serialize, Serializer};
use time::macros::format_description;
use time::PrimitiveDateTime;

use crate::types::{NodeId, Result, TreeError};

/// Nested-set boundary pair (`lft`, `rgt`) of one node.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Bounds {
    /// Number assigned when the pre-order walk enters the node.
    pub left: i64,
    /// Number assigned when the walk leaves the node.
    pub right: i64,
}

impl Bounds {
    /// Creates a boundary pair.
    pub fn new(left: i64, right: i64) -> Self {
        Self { left, right }
    }

    /// Number of boundary values the subtree occupies (`right - left + 1`).
    pub fn width(&self) -> i64 {
        self.right - self.left + 1
    }

    /// True when `other` lies strictly inside this range.
    pub fn contains(&self, other: &Bounds) -> bool {
        self.left < other.left && other.right < self.right
    }

    /// True when the two ranges share at least one value.
    pub fn overlaps(&self, other: &Bounds) -> bool {
        self.left <= other.right && other.left <= self.right
    }

    /// Number of descendants implied by the range.
    pub fn descendant_count(&self) -> i64 {
        (self.right - self.left - 1) / 2
    }
}

/// One category row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Category {
    /// Primary key.
    pub id: NodeId,
    /// Display name.
    pub name: String,
    /// Unique URL-safe key.
    pub slug: String,
    /// Parent row, `None` for roots.
    pub parent_id: Option<NodeId>,
    /// Rank among siblings.
    pub position: i64,
    /// Nested-set bounds, `None` until the row has been indexed.
    pub bounds: Option<Bounds>,
    /// Creation time (UTC).
    #[serde(serialize_with = "serialize_timestamp")]
    pub created_at: PrimitiveDateTime,
    /// Last update time (UTC).
    #[serde(serialize_with = "serialize_timestamp")]
    pub updated_at: PrimitiveDateTime,
}

impl Category {
    /// True for parentless rows.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Input for [`crate::strategy::BoundaryIndexed::insert`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewCategory {
    /// Display name, must not be blank.
    pub name: String,
    /// Explicit slug; derived from `name` when absent.
    pub slug: Option<String>,
}

impl NewCategory {
    /// Category whose slug is derived from its name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slug: None,
        }
    }

    /// Overrides the derived slug.
    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    /// Validates the name and returns `(name, slug)` ready for insertion.
    pub(crate) fn normalize(&self) -> Result<(String, String)> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(TreeError::InvalidArgument(
                "category name must not be blank".into(),
            ));
        }
        let slug = match &self.slug {
            Some(slug) => slugify(slug),
            None => slugify(name),
        };
        if slug.is_empty() {
            return Err(TreeError::InvalidArgument(format!(
                "cannot derive a slug from {name:?}"
            )));
        }
        Ok((name.to_owned(), slug))
    }
}

/// Raw row for [`crate::store::CategoryStore::import`].
///
/// Imported rows carry no bounds; run a reindex afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportRow {
    /// Explicit primary key.
    pub id: NodeId,
    /// Display name.
    pub name: String,
    /// Unique slug.
    pub slug: String,
    /// Parent row, not validated on import.
    pub parent_id: Option<NodeId>,
    /// Rank among siblings.
    pub position: i64,
}

impl ImportRow {
    /// Builds a row whose slug is derived from the name and id.
    pub fn new(id: i64, name: impl Into<String>, parent_id: Option<i64>, position: i64) -> Self {
        let name = name.into();
        let slug = format!("{}-{id}", slugify(&name));
        Self {
            id: NodeId(id),
            name,
            slug,
            parent_id: parent_id.map(NodeId),
            position,
        }
    }
}

/// Lowercases `input` and joins its alphanumeric runs with `-`.
///
/// ```
/// assert_eq!(canopy::model::slugify("Engine Parts & Bearings"), "engine-parts-bearings");
/// ```
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;
    for ch in input.chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

pub(crate) fn parse_timestamp(raw: &str) -> std::result::Result<PrimitiveDateTime, time::error::Parse> {
    PrimitiveDateTime::parse(
        raw,
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    )
}

fn serialize_timestamp<S>(value: &PrimitiveDateTime, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let formatted = value
        .format(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second]Z"
        ))
        .map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&formatted)
}
