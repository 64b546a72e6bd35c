use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix for client-minted ids of nodes the remote store has not
/// acknowledged yet.
const TEMP_ID_PREFIX: &str = "tmp-";

/// Opaque node identity.
///
/// Two kinds share this type: *temporary* ids minted locally for a node
/// created by the user but not yet persisted, and *persistent* ids issued by
/// the remote store. A persistent id is stable for the life of the node; a
/// temporary id is swapped for the persistent one when the add is
/// acknowledged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh temporary id for a locally created node.
    pub fn mint_temporary() -> Self {
        Self(format!("{}{}", TEMP_ID_PREFIX, Uuid::new_v4()))
    }

    /// Whether this id is a client-minted placeholder awaiting the
    /// authoritative id from the remote store.
    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMP_ID_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

fn default_expanded() -> bool {
    true
}

/// A labeled vertex in the mind-map tree.
///
/// A parent exclusively owns its children; deleting a node deletes its whole
/// subtree. Children are held behind `Arc` so successive snapshots share
/// every subtree that a transformation did not touch.
///
/// Wire shape: `{ "id": string, "content": string, "children": [Node],
/// "expanded": bool }`, with `expanded` defaulting to `true` when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub content: String,
    #[serde(default)]
    pub children: Vec<Arc<Node>>,
    #[serde(default = "default_expanded")]
    pub expanded: bool,
}

impl Node {
    /// Create a leaf node. New nodes start expanded.
    pub fn new(id: NodeId, content: impl Into<String>) -> Self {
        Self {
            id,
            content: content.into(),
            children: Vec::new(),
            expanded: true,
        }
    }
}

// ============================================================
// Remote node service wire bodies
// ============================================================

/// Response body of `GET /mindmap/{uid}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchTreeResponse {
    pub root: Node,
}

/// Request body of `POST /mindmap/add-node`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddNodeRequest {
    pub uid: String,
    pub parent_id: NodeId,
    pub content: String,
}

/// Request body of `POST /mindmap/update-node`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNodeRequest {
    pub uid: String,
    pub node_id: NodeId,
    pub content: String,
}

/// Request body of `POST /mindmap/delete-node` and
/// `POST /mindmap/toggle-node`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRequest {
    pub uid: String,
    pub node_id: NodeId,
}

/// Acknowledgement body returned by update/delete/toggle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
}
