#![forbid(unsafe_code)]

//! Diagnostics over the category relation.
//!
//! Neither function writes; both read the relation through the store's
//! counted read path.

mod stats;
mod verify;

/// Aggregate counters of the relation.
pub use stats::{stats, TreeStats};

/// Structural verification of parent links and nested-set bounds.
pub use verify::{verify, VerifyCounts, VerifyFinding, VerifyReport, VerifySeverity};
