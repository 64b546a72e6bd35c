//! Locate-and-transform over immutable tree snapshots.
//!
//! Every transformation funnels through the same primitive: find the path
//! from the root to a target node, then rebuild only the nodes on that path,
//! reusing every off-path subtree by `Arc` reference. The search uses an
//! explicit stack so pathologically deep trees cannot blow the call stack.

use std::sync::Arc;

use crate::models::{Node, NodeId};

/// Path from the root to a node, as child indices at each level. Empty means
/// the root itself.
type Path = Vec<usize>;

/// Depth-first search for the first node matching `pred`.
///
/// The stack holds `(node, next_child_index)` frames; for any two adjacent
/// frames the lower node is the child at `index - 1` of the upper one, which
/// is exactly the path being explored.
fn find_path(root: &Arc<Node>, pred: impl Fn(&Node) -> bool) -> Option<Path> {
    if pred(root) {
        return Some(Vec::new());
    }

    let mut stack: Vec<(Arc<Node>, usize)> = vec![(Arc::clone(root), 0)];
    while let Some((node, next)) = stack.last_mut() {
        if *next == node.children.len() {
            stack.pop();
            continue;
        }
        let child = Arc::clone(&node.children[*next]);
        *next += 1;
        if pred(&child) {
            return Some(stack.iter().map(|(_, next)| next - 1).collect());
        }
        stack.push((child, 0));
    }
    None
}

/// Rebuild the nodes along `path`, applying `transform` to the node at its
/// end. Each rebuilt parent clones its child list shallowly and swaps in the
/// one rebuilt child; all other subtrees keep their existing `Arc`s.
fn rebuild_along(
    root: &Arc<Node>,
    path: &[usize],
    transform: impl FnOnce(&Node) -> Node,
) -> Arc<Node> {
    let mut chain: Vec<Arc<Node>> = Vec::with_capacity(path.len() + 1);
    chain.push(Arc::clone(root));
    for &index in path {
        let next = Arc::clone(&chain.last().expect("chain is never empty").children[index]);
        chain.push(next);
    }

    let target = chain.pop().expect("chain is never empty");
    let mut rebuilt = Arc::new(transform(&target));
    for (&index, parent) in path.iter().rev().zip(chain.iter().rev()) {
        let mut node = (**parent).clone();
        node.children[index] = rebuilt;
        rebuilt = Arc::new(node);
    }
    rebuilt
}

/// Replace the node with id `target` by `transform(node)`, rebuilding only
/// the root-to-target path. `None` when no such node exists.
pub fn locate_and_transform(
    root: &Arc<Node>,
    target: &NodeId,
    transform: impl FnOnce(&Node) -> Node,
) -> Option<Arc<Node>> {
    let path = find_path(root, |node| node.id == *target)?;
    Some(rebuild_along(root, &path, transform))
}

/// Replace the *parent* of the node with id `child` by `transform(parent)`.
/// Insert and Delete are expressed through this: both are edits to the
/// parent's child list. `None` when no node has such a child (the root
/// included — it has no parent).
pub fn locate_parent_and_transform(
    root: &Arc<Node>,
    child: &NodeId,
    transform: impl FnOnce(&Node) -> Node,
) -> Option<Arc<Node>> {
    let path = find_path(root, |node| node.children.iter().any(|c| c.id == *child))?;
    Some(rebuild_along(root, &path, transform))
}

/// Find a node by id anywhere in the tree.
pub fn find(root: &Arc<Node>, target: &NodeId) -> Option<Arc<Node>> {
    let path = find_path(root, |node| node.id == *target)?;
    let mut node = Arc::clone(root);
    for index in path {
        let next = Arc::clone(&node.children[index]);
        node = next;
    }
    Some(node)
}
