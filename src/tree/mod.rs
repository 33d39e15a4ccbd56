//! In-memory materialized hierarchy.
//!
//! A [`Tree`] is an ordered forest of [`TreeNode`]s produced by a loader. It is
//! a read-only projection of the relation at load time and owns no storage of
//! its own.

mod assemble;

pub(crate) use assemble::{link_by_bounds, link_by_parent};

use serde::Serialize;

use crate::model::Category;
use crate::types::{NodeId, Result};

/// One node of a materialized tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    /// The row this node materializes.
    #[serde(flatten)]
    pub category: Category,
    /// Distance from the top of the loaded forest (0 for roots).
    pub depth: u32,
    /// Children in sibling order.
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Row id.
    pub fn id(&self) -> NodeId {
        self.category.id
    }

    /// Number of nodes in this subtree, including this one.
    pub fn subtree_len(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }
}

/// Ordered forest rooted at every parentless row (or at one subtree root).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Tree {
    roots: Vec<TreeNode>,
}

impl Tree {
    /// Builds a tree from already-nested roots.
    pub fn new(roots: Vec<TreeNode>) -> Self {
        Self { roots }
    }

    /// Top-level nodes in sibling order.
    pub fn roots(&self) -> &[TreeNode] {
        &self.roots
    }

    /// Consumes the tree and returns its roots.
    pub fn into_roots(self) -> Vec<TreeNode> {
        self.roots
    }

    /// Total number of nodes.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// True when the tree has no roots.
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Number of levels (0 for an empty tree).
    pub fn height(&self) -> u32 {
        self.iter().map(|node| node.depth + 1).max().unwrap_or(0)
    }

    /// Pre-order iterator over every node.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            stack: self.roots.iter().rev().collect(),
        }
    }

    /// Finds a node by id.
    pub fn find(&self, id: NodeId) -> Option<&TreeNode> {
        self.iter().find(|node| node.id() == id)
    }

    /// Ids from the top of the forest down to `id`, inclusive.
    pub fn path_to(&self, id: NodeId) -> Option<Vec<NodeId>> {
        let mut path: Vec<NodeId> = Vec::new();
        let mut stack: Vec<(&TreeNode, u32)> =
            self.roots.iter().rev().map(|node| (node, 0)).collect();
        while let Some((node, depth)) = stack.pop() {
            path.truncate(depth as usize);
            path.push(node.id());
            if node.id() == id {
                return Some(path);
            }
            stack.extend(node.children.iter().rev().map(|child| (child, depth + 1)));
        }
        None
    }

    /// Structural projection used to compare trees loaded by different
    /// strategies.
    pub fn shape(&self) -> TreeShape {
        let mut entries = Vec::new();
        let mut stack: Vec<(&TreeNode, Option<NodeId>, usize)> = self
            .roots
            .iter()
            .enumerate()
            .rev()
            .map(|(index, node)| (node, None, index))
            .collect();
        while let Some((node, parent, index)) = stack.pop() {
            entries.push(ShapeEntry {
                id: node.id(),
                parent,
                index,
            });
            stack.extend(
                node.children
                    .iter()
                    .enumerate()
                    .rev()
                    .map(|(i, child)| (child, Some(node.id()), i)),
            );
        }
        TreeShape { entries }
    }

    /// True when both trees have the same ids, parent links and sibling order.
    pub fn same_structure(&self, other: &Tree) -> bool {
        self.shape() == other.shape()
    }

    /// Serializes the forest as a JSON array of nested nodes.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Pretty-printed variant of [`Tree::to_json`].
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl<'a> IntoIterator for &'a Tree {
    type Item = &'a TreeNode;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Pre-order iterator returned by [`Tree::iter`].
#[derive(Debug)]
pub struct Iter<'a> {
    stack: Vec<&'a TreeNode>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a TreeNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// One pre-order entry of a [`TreeShape`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ShapeEntry {
    /// Node id.
    pub id: NodeId,
    /// Parent in the materialized tree.
    pub parent: Option<NodeId>,
    /// Index among its siblings.
    pub index: usize,
}

/// Pre-order `(id, parent, sibling index)` listing of a tree.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeShape {
    entries: Vec<ShapeEntry>,
}

impl TreeShape {
    /// Entries in pre-order.
    pub fn entries(&self) -> &[ShapeEntry] {
        &self.entries
    }

    /// First entry where the two shapes disagree, if any.
    pub fn first_difference<'a>(
        &'a self,
        other: &'a TreeShape,
    ) -> Option<(Option<&'a ShapeEntry>, Option<&'a ShapeEntry>)> {
        let len = self.entries.len().max(other.entries.len());
        (0..len).find_map(|i| {
            let left = self.entries.get(i);
            let right = other.entries.get(i);
            (left != right).then_some((left, right))
        })
    }
}
