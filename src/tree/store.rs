use tokio::sync::watch;

use super::Tree;

/// Holds the current snapshot and notifies subscribers when it is replaced.
///
/// The snapshot is swapped wholesale on every transition, so a subscriber
/// always observes a complete, internally consistent tree — there is no
/// partially updated state to see.
#[derive(Debug)]
pub struct TreeStore {
    current: watch::Sender<Tree>,
}

impl TreeStore {
    pub fn new(initial: Tree) -> Self {
        let (current, _) = watch::channel(initial);
        Self { current }
    }

    /// The current snapshot. Cheap: clones an `Arc` handle, not the tree.
    pub fn snapshot(&self) -> Tree {
        self.current.borrow().clone()
    }

    /// Replace the current snapshot and wake subscribers.
    pub fn publish(&self, tree: Tree) {
        self.current.send_replace(tree);
    }

    /// Atomically replace the snapshot through `transform`, returning the
    /// snapshots before and after. Concurrent transactions serialize here,
    /// so each one reads the snapshot the previous one wrote. A transform
    /// that returns its input unchanged does not wake subscribers.
    pub fn transact(&self, transform: impl FnOnce(&Tree) -> Tree) -> (Tree, Tree) {
        let mut observed = None;
        self.current.send_if_modified(|tree| {
            let before = tree.clone();
            let after = transform(&before);
            let changed = !after.same_snapshot(&before);
            if changed {
                *tree = after.clone();
            }
            observed = Some((before, after));
            changed
        });
        observed.expect("transform always runs")
    }

    /// Subscribe to snapshot replacements. The receiver starts at the
    /// current snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Tree> {
        self.current.subscribe()
    }
}
