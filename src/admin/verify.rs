use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use tracing::{info, warn};

use crate::model::Bounds;
use crate::store::CategoryStore;
use crate::types::{NodeId, Result, TreeError};

const MAX_FINDINGS: usize = 32;

/// Indicates the severity level of a verification finding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifySeverity {
    /// Informational message about the verification process.
    Info,
    /// Loads still succeed, but the numbering is not canonical.
    Warning,
    /// At least one strategy would fail or return a wrong tree.
    Error,
}

/// Represents a single issue discovered during verification.
#[derive(Clone, Debug, Serialize)]
pub struct VerifyFinding {
    /// The severity level of this finding.
    pub severity: VerifySeverity,
    /// Human-readable description of the issue.
    pub message: String,
}

/// Rows examined by [`verify`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct VerifyCounts {
    /// Rows in the relation.
    pub nodes: u64,
    /// Parentless rows.
    pub roots: u64,
    /// Rows with both bounds set.
    pub indexed: u64,
    /// Rows with at least one bound unset.
    pub unindexed: u64,
}

/// Complete report of a verification pass.
#[derive(Clone, Debug, Serialize)]
pub struct VerifyReport {
    /// Whether no error-level finding was recorded.
    pub success: bool,
    /// Issues discovered, capped at a fixed number.
    pub findings: Vec<VerifyFinding>,
    /// Statistics about the rows examined.
    pub counts: VerifyCounts,
}

impl VerifyReport {
    /// Findings at `severity`.
    pub fn findings_at(&self, severity: VerifySeverity) -> impl Iterator<Item = &VerifyFinding> {
        self.findings.iter().filter(move |f| f.severity == severity)
    }

    /// Converts error findings into [`TreeError::InconsistentTree`].
    pub fn into_result(self) -> Result<VerifyReport> {
        if self.success {
            return Ok(self);
        }
        let messages: Vec<&str> = self
            .findings_at(VerifySeverity::Error)
            .map(|f| f.message.as_str())
            .collect();
        Err(TreeError::inconsistent(messages.join("; ")))
    }
}

#[derive(Debug)]
struct Entry {
    id: NodeId,
    parent: Option<NodeId>,
    position: i64,
    bounds: Option<Bounds>,
}

/// Checks parent links and nested-set bounds of every row.
///
/// Parent checks: dangling references and loops. Bound checks (only run when
/// every row is indexed): `lft < rgt`, no value used twice, each parent range
/// strictly containing its children, disjoint siblings whose `lft` order
/// agrees with `position`, and a contiguous `1..=2n` numbering (warning).
///
/// # Errors
///
/// Only back-end failures are returned as errors. Structural problems are
/// reported as findings; use [`VerifyReport::into_result`] to turn them into
/// an error.
pub fn verify(store: &CategoryStore) -> Result<VerifyReport> {
    let entries = store.query_rows(
        "SELECT id, parent_id, position, lft, rgt FROM categories ORDER BY position, id",
        [],
        |row| {
            let left: Option<i64> = row.get(3)?;
            let right: Option<i64> = row.get(4)?;
            Ok(Entry {
                id: row.get(0)?,
                parent: row.get(1)?,
                position: row.get(2)?,
                bounds: left.zip(right).map(|(l, r)| Bounds::new(l, r)),
            })
        },
    )?;

    let mut findings = Vec::new();
    let mut counts = VerifyCounts {
        nodes: entries.len() as u64,
        ..VerifyCounts::default()
    };
    for entry in &entries {
        if entry.parent.is_none() {
            counts.roots += 1;
        }
        if entry.bounds.is_some() {
            counts.indexed += 1;
        } else {
            counts.unindexed += 1;
        }
    }

    let by_id: FxHashMap<NodeId, &Entry> = entries.iter().map(|e| (e.id, e)).collect();
    check_parent_links(&entries, &by_id, &mut findings);

    if counts.unindexed > 0 {
        push(
            &mut findings,
            VerifySeverity::Error,
            format!("{} rows have no boundaries; reindex required", counts.unindexed),
        );
    } else {
        check_bounds(&entries, &by_id, &mut findings);
    }

    let success = !findings
        .iter()
        .any(|f| f.severity == VerifySeverity::Error);
    if success {
        info!(nodes = counts.nodes, findings = findings.len(), "admin.verify.completed");
    } else {
        warn!(nodes = counts.nodes, findings = findings.len(), "admin.verify.failed");
    }
    Ok(VerifyReport {
        success,
        findings,
        counts,
    })
}

fn check_parent_links(
    entries: &[Entry],
    by_id: &FxHashMap<NodeId, &Entry>,
    findings: &mut Vec<VerifyFinding>,
) {
    // nodes already known to reach a root, or already reported
    let mut settled: FxHashSet<NodeId> = FxHashSet::default();
    for entry in entries {
        let mut path: Vec<NodeId> = Vec::new();
        let mut on_path: FxHashSet<NodeId> = FxHashSet::default();
        let mut current = entry;
        loop {
            if settled.contains(&current.id) {
                break;
            }
            if !on_path.insert(current.id) {
                push(
                    findings,
                    VerifySeverity::Error,
                    format!("parent chain of node {} loops back to itself", current.id),
                );
                break;
            }
            path.push(current.id);
            match current.parent {
                None => break,
                Some(parent) => match by_id.get(&parent) {
                    Some(&next) => current = next,
                    None => {
                        push(
                            findings,
                            VerifySeverity::Error,
                            format!("node {} references missing parent {parent}", current.id),
                        );
                        break;
                    }
                },
            }
        }
        settled.extend(path);
    }
}

fn check_bounds(
    entries: &[Entry],
    by_id: &FxHashMap<NodeId, &Entry>,
    findings: &mut Vec<VerifyFinding>,
) {
    let mut values: FxHashMap<i64, NodeId> = FxHashMap::default();
    let mut siblings: FxHashMap<Option<NodeId>, Vec<(i64, Bounds, NodeId)>> = FxHashMap::default();

    for entry in entries {
        let Some(bounds) = entry.bounds else { continue };
        if bounds.left >= bounds.right {
            push(
                findings,
                VerifySeverity::Error,
                format!(
                    "node {} has lft {} not below rgt {}",
                    entry.id, bounds.left, bounds.right
                ),
            );
        }
        for value in [bounds.left, bounds.right] {
            if let Some(owner) = values.insert(value, entry.id) {
                if owner != entry.id || bounds.left == bounds.right {
                    push(
                        findings,
                        VerifySeverity::Error,
                        format!("bound value {value} used by nodes {owner} and {}", entry.id),
                    );
                }
            }
        }
        if let Some(parent) = entry.parent.and_then(|p| by_id.get(&p)) {
            if let Some(parent_bounds) = parent.bounds {
                if !parent_bounds.contains(&bounds) {
                    push(
                        findings,
                        VerifySeverity::Error,
                        format!(
                            "node {} [{}, {}] is not inside parent {} [{}, {}]",
                            entry.id,
                            bounds.left,
                            bounds.right,
                            parent.id,
                            parent_bounds.left,
                            parent_bounds.right
                        ),
                    );
                }
            }
        }
        siblings
            .entry(entry.parent)
            .or_default()
            .push((entry.position, bounds, entry.id));
    }

    // entries arrive in (position, id) order, so each group is in sibling order
    for group in siblings.values() {
        for pair in group.windows(2) {
            let (_, first, first_id) = pair[0];
            let (_, second, second_id) = pair[1];
            if first.overlaps(&second) {
                push(
                    findings,
                    VerifySeverity::Error,
                    format!("siblings {first_id} and {second_id} have overlapping bounds"),
                );
            } else if first.left > second.left {
                push(
                    findings,
                    VerifySeverity::Error,
                    format!(
                        "sibling {second_id} precedes {first_id} by position but not by bounds"
                    ),
                );
            }
        }
    }

    let expected = 2 * entries.len() as i64;
    let contiguous = values.len() as i64 == expected
        && values.keys().min() == Some(&1)
        && values.keys().max() == Some(&expected);
    if !contiguous && !entries.is_empty() {
        push(
            findings,
            VerifySeverity::Warning,
            format!("bounds are not numbered contiguously from 1 to {expected}"),
        );
    }
}

fn push(findings: &mut Vec<VerifyFinding>, severity: VerifySeverity, message: String) {
    if findings.len() < MAX_FINDINGS {
        findings.push(VerifyFinding { severity, message });
    }
}
