#![forbid(unsafe_code)]

//! Identifiers and the crate-wide error type.

use std::fmt;

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of a category row (`categories.id`).
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(pub i64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for NodeId {
    fn from(value: i64) -> Self {
        NodeId(value)
    }
}

impl From<NodeId> for i64 {
    fn from(value: NodeId) -> Self {
        value.0
    }
}

impl ToSql for NodeId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0))
    }
}

impl FromSql for NodeId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(NodeId)
    }
}

/// Errors raised while loading or maintaining a category tree.
#[derive(Debug, Error)]
pub enum TreeError {
    /// The referenced parent does not exist.
    #[error("parent {0} does not exist")]
    InvalidParent(NodeId),
    /// The operation would create, or the data already contains, a parent cycle.
    #[error("cycle detected: {node} cannot descend from {parent}")]
    CycleDetected {
        /// Node whose ancestry loops.
        node: NodeId,
        /// Parent that closes the loop.
        parent: NodeId,
    },
    /// The stored hierarchy violates a structural invariant.
    #[error("inconsistent tree: {0}")]
    InconsistentTree(String),
    /// A non-cascading delete hit a node that still has children.
    #[error("node {node} has {children} children")]
    HasChildren {
        /// Node that was asked to be deleted.
        node: NodeId,
        /// Number of direct children blocking the delete.
        children: usize,
    },
    /// Strict load matched no rows.
    #[error("no rows matched")]
    EmptyResult,
    /// The requested node does not exist.
    #[error("node {0} not found")]
    NodeNotFound(NodeId),
    /// Another category already uses this slug.
    #[error("slug already in use: {0}")]
    DuplicateSlug(String),
    /// Caller supplied an unusable argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Options could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Backing store error.
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// JSON encoding error.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TreeError {
    pub(crate) fn inconsistent(message: impl Into<String>) -> Self {
        TreeError::InconsistentTree(message.into())
    }

    /// Returns true for errors describing a damaged or invalid hierarchy.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            TreeError::InvalidParent(_)
                | TreeError::CycleDetected { .. }
                | TreeError::InconsistentTree(_)
        )
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TreeError>;
