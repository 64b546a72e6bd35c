//! Two-phase optimistic mutation against the remote node service.
//!
//! Every user intent runs the same protocol:
//!
//! 1. Apply the mutation to the local snapshot immediately and publish it,
//!    so the UI re-renders without waiting on the network.
//! 2. Issue the corresponding remote call.
//! 3. On success, commit — for a newly created node this swaps the
//!    client-minted temporary id for the server-issued one in place.
//! 4. On failure, publish the exact pre-mutation snapshot again and emit a
//!    user-visible notice. Remote failures never escape [`SyncEngine::execute`].
//!
//! Per node, at most one intent may be in flight: a second intent against a
//! node with a pending one is rejected with [`SyncError::Busy`] rather than
//! allowed to race the first one's rollback.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::watch;

use crate::models::{Node, NodeId};
use crate::remote::{ClientError, NodeClient};
use crate::tree::{apply, Tree, TreeOp, TreeStore};

/// A user intent against the mind-map.
#[derive(Debug, Clone)]
pub enum Intent {
    /// Create a new node under `parent`.
    AddChild { parent: NodeId, content: String },
    /// Replace the content of `node`.
    EditContent { node: NodeId, content: String },
    /// Delete `node` and its whole subtree.
    Delete { node: NodeId },
    /// Expand or collapse `node`.
    Toggle { node: NodeId },
}

impl Intent {
    /// The node whose pending slot this intent occupies. An AddChild
    /// contends on the parent — that is the node it mutates.
    fn target(&self) -> &NodeId {
        match self {
            Intent::AddChild { parent, .. } => parent,
            Intent::EditContent { node, .. }
            | Intent::Delete { node }
            | Intent::Toggle { node } => node,
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Intent::AddChild { .. } => "add node",
            Intent::EditContent { .. } => "edit node",
            Intent::Delete { .. } => "delete node",
            Intent::Toggle { .. } => "toggle node",
        }
    }
}

/// Terminal state of an executed intent.
#[derive(Debug)]
pub enum Outcome {
    /// Optimistic mutation confirmed by the remote store.
    Committed,
    /// The target node was already gone when the intent ran; nothing was
    /// changed locally and no remote call was made.
    Ignored,
    /// The remote call failed; the tree was restored to the exact
    /// pre-mutation snapshot.
    RolledBack(ClientError),
    /// The engine was shut down while the call was in flight; the completion
    /// neither committed nor rolled back.
    Detached,
}

/// Synchronous rejections — no mutation happened, no call was made.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("the root node cannot be deleted")]
    DeleteRoot,

    #[error("node content cannot be empty")]
    EmptyContent,

    #[error("node {0} already has an edit in flight")]
    Busy(NodeId),

    #[error("failed to fetch the initial tree: {0}")]
    Bootstrap(#[from] ClientError),
}

/// User-visible record of a failed remote call.
#[derive(Debug, Clone)]
pub struct SyncNotice {
    pub node: NodeId,
    pub message: String,
}

/// Orchestrates optimistic mutation, remote confirmation, and rollback.
#[derive(Debug)]
pub struct SyncEngine {
    store: TreeStore,
    client: NodeClient,
    uid: String,
    pending: Mutex<HashSet<NodeId>>,
    active: AtomicBool,
    notices: watch::Sender<Option<SyncNotice>>,
}

impl SyncEngine {
    /// Build an engine over an already-fetched tree.
    pub fn new(client: NodeClient, uid: impl Into<String>, initial: Tree) -> Self {
        let (notices, _) = watch::channel(None);
        Self {
            store: TreeStore::new(initial),
            client,
            uid: uid.into(),
            pending: Mutex::new(HashSet::new()),
            active: AtomicBool::new(true),
            notices,
        }
    }

    /// Fetch the user's tree from the remote store and build an engine on it.
    pub async fn bootstrap(client: NodeClient, uid: impl Into<String>) -> Result<Self, SyncError> {
        let uid = uid.into();
        let initial = client.fetch_tree(&uid).await?;
        tracing::debug!(%uid, root = %initial.root_id(), "fetched initial tree");
        Ok(Self::new(client, uid, initial))
    }

    pub fn store(&self) -> &TreeStore {
        &self.store
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Tree {
        self.store.snapshot()
    }

    /// Subscribe to failure notices. Carries the most recent notice, if any.
    pub fn subscribe_notices(&self) -> watch::Receiver<Option<SyncNotice>> {
        self.notices.subscribe()
    }

    /// Tear the engine down. In-flight remote completions become no-ops:
    /// they neither commit nor roll back after this.
    pub fn shutdown(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    /// Run one intent through the optimistic/remote/rollback protocol.
    ///
    /// `Err` means the intent was rejected synchronously before any
    /// mutation; every remote failure surfaces as `Ok(Outcome::RolledBack)`.
    pub async fn execute(&self, intent: Intent) -> Result<Outcome, SyncError> {
        self.check_preconditions(&intent)?;
        let _slot = self.claim_slot(intent.target().clone())?;

        // Phase 1: optimistic apply, published before the network is touched.
        // The transaction is atomic, so optimistic phases of concurrent
        // intents on different nodes cannot interleave and lose each other's
        // updates.
        let (op, minted) = self.plan(&intent);
        let (before, after) = self.store.transact(|tree| apply(tree, &op));
        if after.same_snapshot(&before) {
            // Target vanished under us (a concurrent delete won). Benign.
            tracing::debug!(node = %intent.target(), "intent target not in tree, ignoring");
            return Ok(Outcome::Ignored);
        }

        // Phase 2: remote confirmation.
        let result = self.dispatch(&intent).await;

        if !self.active.load(Ordering::SeqCst) {
            tracing::debug!(node = %intent.target(), "engine shut down mid-flight");
            return Ok(Outcome::Detached);
        }

        match result {
            Ok(server_id) => {
                if let (Some(server_id), Some(temp_id)) = (server_id, minted) {
                    self.adopt_server_id(&temp_id, server_id);
                }
                Ok(Outcome::Committed)
            }
            Err(err) => {
                tracing::warn!(
                    node = %intent.target(),
                    error = %err,
                    "remote call failed, rolling back"
                );
                self.store.publish(before);
                self.notices.send_replace(Some(SyncNotice {
                    node: intent.target().clone(),
                    message: format!("could not {}: {}", intent.describe(), err),
                }));
                Ok(Outcome::RolledBack(err))
            }
        }
    }

    fn check_preconditions(&self, intent: &Intent) -> Result<(), SyncError> {
        match intent {
            Intent::Delete { node } if node == self.snapshot().root_id() => {
                Err(SyncError::DeleteRoot)
            }
            Intent::AddChild { content, .. } | Intent::EditContent { content, .. }
                if content.trim().is_empty() =>
            {
                Err(SyncError::EmptyContent)
            }
            _ => Ok(()),
        }
    }

    /// Claim the per-node pending slot, enforcing at most one in-flight
    /// intent per node id.
    fn claim_slot(&self, target: NodeId) -> Result<PendingSlot<'_>, SyncError> {
        let mut pending = self.pending.lock().expect("pending lock poisoned");
        if !pending.insert(target.clone()) {
            return Err(SyncError::Busy(target));
        }
        Ok(PendingSlot {
            pending: &self.pending,
            target,
        })
    }

    /// Turn an intent into its tree operation. For AddChild this mints the
    /// temporary node; its id is returned so the commit path can swap in the
    /// server-issued one.
    fn plan(&self, intent: &Intent) -> (TreeOp, Option<NodeId>) {
        match intent {
            Intent::AddChild { parent, content } => {
                let temp_id = NodeId::mint_temporary();
                let node = Arc::new(Node::new(temp_id.clone(), content.clone()));
                (
                    TreeOp::Insert {
                        parent_id: parent.clone(),
                        node,
                    },
                    Some(temp_id),
                )
            }
            Intent::EditContent { node, content } => (
                TreeOp::Update {
                    node_id: node.clone(),
                    content: content.clone(),
                },
                None,
            ),
            Intent::Delete { node } => (
                TreeOp::Delete {
                    node_id: node.clone(),
                },
                None,
            ),
            Intent::Toggle { node } => (
                TreeOp::Toggle {
                    node_id: node.clone(),
                },
                None,
            ),
        }
    }

    /// Issue the remote call for an intent. For AddChild the server-issued
    /// id is returned.
    async fn dispatch(&self, intent: &Intent) -> Result<Option<NodeId>, ClientError> {
        match intent {
            Intent::AddChild { parent, content } => {
                let persisted = self.client.add_node(&self.uid, parent, content).await?;
                Ok(Some(persisted.id))
            }
            Intent::EditContent { node, content } => {
                self.client.update_node(&self.uid, node, content).await?;
                Ok(None)
            }
            Intent::Delete { node } => {
                self.client.delete_node(&self.uid, node).await?;
                Ok(None)
            }
            Intent::Toggle { node } => {
                self.client.toggle_node(&self.uid, node).await?;
                Ok(None)
            }
        }
    }

    /// Swap a temporary id for the authoritative one at the same tree
    /// position. The node may have been deleted while the call was in
    /// flight; that is a benign no-op.
    fn adopt_server_id(&self, temp_id: &NodeId, server_id: NodeId) {
        let (before, after) = self.store.transact(|tree| {
            match crate::tree::reconcile::locate_and_transform(&tree.root, temp_id, |node| Node {
                id: server_id.clone(),
                ..node.clone()
            }) {
                Some(root) => Tree { root },
                None => tree.clone(),
            }
        });
        if before.same_snapshot(&after) {
            tracing::debug!(%temp_id, "temporary node already gone, skipping id adoption");
        } else {
            tracing::debug!(%temp_id, %server_id, "adopted server id");
        }
    }
}

/// RAII entry in the pending set; dropping it releases the node for the
/// next intent, on every exit path of `execute`.
struct PendingSlot<'a> {
    pending: &'a Mutex<HashSet<NodeId>>,
    target: NodeId,
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        self.pending
            .lock()
            .expect("pending lock poisoned")
            .remove(&self.target);
    }
}
