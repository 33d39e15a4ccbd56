//! Hierarchical category trees over SQLite.
//!
//! One `categories` relation, three interchangeable ways to materialize it:
//! level-by-level adjacency queries, a single recursive CTE, and a
//! nested-set scan ordered by `lft`. All three implement
//! [`strategy::TreeLoader`] and produce the same [`tree::Tree`].
//!
//! ```no_run
//! use canopy::{CategoryStore, NewCategory, BoundaryIndexed, TreeLoader, TreeOptions};
//!
//! # fn main() -> canopy::Result<()> {
//! let mut store = CategoryStore::open("shop.db", &TreeOptions::default())?;
//! let boundary = BoundaryIndexed::new();
//! let parts = boundary.insert(&mut store, &NewCategory::new("Auto Parts"), None)?;
//! boundary.insert(&mut store, &NewCategory::new("Engine Parts"), Some(parts))?;
//!
//! let tree = TreeOptions::default().loader().load_tree(&store)?;
//! println!("{}", tree.to_json_pretty()?);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod admin;
pub mod logging;
pub mod model;
pub mod options;
pub mod store;
pub mod strategy;
pub mod tree;
pub mod types;

pub use model::{Bounds, Category, ImportRow, NewCategory};
pub use options::{BoundaryMaintenance, JournalMode, Strategy, TreeOptions};
pub use store::{CategoryStore, IoStats};
pub use strategy::{
    AdjacencyRecursive, BoundaryIndexed, LoadReport, RecursiveClosure, ReindexReport, Scope,
    TreeLoader,
};
pub use tree::{Tree, TreeNode};
pub use types::{NodeId, Result, TreeError};
