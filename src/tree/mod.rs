//! Immutable mind-map snapshots and their pure transformations.
//!
//! A [`Tree`] is a cheap handle on an immutable snapshot; [`apply`] produces
//! the next snapshot without touching the old one, rebuilding only the path
//! from the root to the affected node. Transformations are deterministic:
//! the same snapshot and operation always produce the same result, which is
//! what makes optimistic application and exact rollback safe.

pub mod reconcile;
mod store;

use std::sync::Arc;

use crate::models::{Node, NodeId};

pub use store::TreeStore;

/// An immutable snapshot of the whole mind-map.
///
/// Cloning shares the root `Arc`; snapshots are compared with `==` for the
/// deep-equality contract and with [`Tree::same_snapshot`] for identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    pub root: Arc<Node>,
}

impl Tree {
    pub fn new(root: Node) -> Self {
        Self {
            root: Arc::new(root),
        }
    }

    pub fn root_id(&self) -> &NodeId {
        &self.root.id
    }

    /// Whether two handles point at the same snapshot (not merely equal ones).
    pub fn same_snapshot(&self, other: &Tree) -> bool {
        Arc::ptr_eq(&self.root, &other.root)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        reconcile::find(&self.root, id).is_some()
    }

    pub fn find(&self, id: &NodeId) -> Option<Arc<Node>> {
        reconcile::find(&self.root, id)
    }
}

/// A single transformation over a snapshot.
#[derive(Debug, Clone)]
pub enum TreeOp {
    /// Append `node` to the children of `parent_id`, expanding the parent so
    /// the new node is visible.
    Insert { parent_id: NodeId, node: Arc<Node> },
    /// Replace the content of `node_id`.
    Update { node_id: NodeId, content: String },
    /// Remove `node_id` and its whole subtree from its parent.
    Delete { node_id: NodeId },
    /// Flip the expand/collapse flag of `node_id`.
    Toggle { node_id: NodeId },
}

/// Apply `op` to `tree`, returning the next snapshot.
///
/// When the target node (or parent, for Insert) is not present the input
/// snapshot is returned unchanged — same handle, same `Arc` — so callers can
/// detect the no-op with [`Tree::same_snapshot`]. A missing target is not an
/// error: it is the normal outcome of racing a concurrent delete.
///
/// Deleting the root is structurally impossible here (the root has no
/// parent); the sync engine rejects the attempt before it reaches this layer.
pub fn apply(tree: &Tree, op: &TreeOp) -> Tree {
    let root = match op {
        TreeOp::Insert { parent_id, node } => {
            reconcile::locate_and_transform(&tree.root, parent_id, |parent| {
                let mut parent = parent.clone();
                parent.children.push(Arc::clone(node));
                parent.expanded = true;
                parent
            })
        }
        TreeOp::Update { node_id, content } => {
            reconcile::locate_and_transform(&tree.root, node_id, |node| Node {
                content: content.clone(),
                ..node.clone()
            })
        }
        TreeOp::Delete { node_id } => {
            reconcile::locate_parent_and_transform(&tree.root, node_id, |parent| {
                let mut parent = parent.clone();
                parent.children.retain(|child| child.id != *node_id);
                parent
            })
        }
        TreeOp::Toggle { node_id } => {
            reconcile::locate_and_transform(&tree.root, node_id, |node| Node {
                expanded: !node.expanded,
                ..node.clone()
            })
        }
    };

    match root {
        Some(root) => Tree { root },
        None => tree.clone(),
    }
}
