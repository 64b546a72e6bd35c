//! Sync engine tests against an in-process mock of the remote node service.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

use cortex_mindmap::models::{
    Ack, AddNodeRequest, FetchTreeResponse, Node, NodeId, NodeRequest, UpdateNodeRequest,
};
use cortex_mindmap::remote::NodeClient;
use cortex_mindmap::sync::{Intent, Outcome, SyncEngine, SyncError};

const UID: &str = "user-1";

// ============================================================
// Mock remote node service
// ============================================================

struct RemoteState {
    initial: Node,
    /// When set, every mutating endpoint answers 500.
    fail: AtomicBool,
    /// Per-handler artificial latency, for in-flight scenarios.
    delay_ms: AtomicU64,
    /// Endpoint names in call order.
    calls: Mutex<Vec<&'static str>>,
    next_id: AtomicU32,
}

struct MockRemote {
    base_url: String,
    state: Arc<RemoteState>,
}

impl MockRemote {
    fn fail_requests(&self) {
        self.state.fail.store(true, Ordering::SeqCst);
    }

    fn delay_requests(&self, ms: u64) {
        self.state.delay_ms.store(ms, Ordering::SeqCst);
    }

    fn calls(&self) -> Vec<&'static str> {
        self.state.calls.lock().unwrap().clone()
    }
}

async fn throttle_and_record(state: &RemoteState, endpoint: &'static str) -> Result<(), Response> {
    state.calls.lock().unwrap().push(endpoint);
    let delay = state.delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
    }
    if state.fail.load(Ordering::SeqCst) {
        Err((StatusCode::INTERNAL_SERVER_ERROR, "mock outage").into_response())
    } else {
        Ok(())
    }
}

async fn fetch_tree(
    State(state): State<Arc<RemoteState>>,
    Path(_uid): Path<String>,
) -> Json<FetchTreeResponse> {
    Json(FetchTreeResponse {
        root: state.initial.clone(),
    })
}

async fn add_node(
    State(state): State<Arc<RemoteState>>,
    Json(req): Json<AddNodeRequest>,
) -> Response {
    if let Err(resp) = throttle_and_record(&state, "add-node").await {
        return resp;
    }
    let n = state.next_id.fetch_add(1, Ordering::SeqCst) + 1;
    Json(Node::new(NodeId::new(format!("srv-{n}")), req.content)).into_response()
}

async fn update_node(
    State(state): State<Arc<RemoteState>>,
    Json(_req): Json<UpdateNodeRequest>,
) -> Response {
    match throttle_and_record(&state, "update-node").await {
        Err(resp) => resp,
        Ok(()) => Json(Ack { success: true }).into_response(),
    }
}

async fn delete_node(
    State(state): State<Arc<RemoteState>>,
    Json(_req): Json<NodeRequest>,
) -> Response {
    match throttle_and_record(&state, "delete-node").await {
        Err(resp) => resp,
        Ok(()) => Json(Ack { success: true }).into_response(),
    }
}

async fn toggle_node(
    State(state): State<Arc<RemoteState>>,
    Json(_req): Json<NodeRequest>,
) -> Response {
    match throttle_and_record(&state, "toggle-node").await {
        Err(resp) => resp,
        Ok(()) => Json(Ack { success: true }).into_response(),
    }
}

async fn spawn_remote(initial: Node) -> MockRemote {
    let state = Arc::new(RemoteState {
        initial,
        fail: AtomicBool::new(false),
        delay_ms: AtomicU64::new(0),
        calls: Mutex::new(Vec::new()),
        next_id: AtomicU32::new(0),
    });

    let app = Router::new()
        .route("/mindmap/{uid}", get(fetch_tree))
        .route("/mindmap/add-node", post(add_node))
        .route("/mindmap/update-node", post(update_node))
        .route("/mindmap/delete-node", post(delete_node))
        .route("/mindmap/toggle-node", post(toggle_node))
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mock remote");
    let addr = listener.local_addr().expect("Failed to read local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock remote died");
    });

    MockRemote {
        base_url: format!("http://{addr}"),
        state,
    }
}

// ============================================================
// Fixtures
// ============================================================

fn leaf(id: &str, content: &str) -> Arc<Node> {
    Arc::new(Node::new(NodeId::from(id), content))
}

fn collect_ids(node: &Node, out: &mut Vec<NodeId>) {
    out.push(node.id.clone());
    for child in &node.children {
        collect_ids(child, out);
    }
}

/// r
/// └── n1 "A"
///     └── n2 "B"
fn initial_tree() -> Node {
    Node {
        id: NodeId::from("r"),
        content: "Root".to_string(),
        children: vec![Arc::new(Node {
            id: NodeId::from("n1"),
            content: "A".to_string(),
            children: vec![leaf("n2", "B")],
            expanded: true,
        })],
        expanded: true,
    }
}

async fn setup() -> (MockRemote, SyncEngine) {
    let remote = spawn_remote(initial_tree()).await;
    let client = NodeClient::new(remote.base_url.clone(), None);
    let engine = SyncEngine::bootstrap(client, UID)
        .await
        .expect("Failed to bootstrap engine");
    (remote, engine)
}

// ============================================================
// Specs
// ============================================================

mod bootstrap {
    use super::*;

    #[tokio::test]
    async fn fetches_the_initial_tree_from_the_remote() {
        let (_remote, engine) = setup().await;
        let tree = engine.snapshot();
        assert_eq!(tree.root_id(), &NodeId::from("r"));
        assert!(tree.contains(&NodeId::from("n2")));
    }
}

mod add_child {
    use super::*;

    #[tokio::test]
    async fn commits_and_adopts_the_server_issued_id() {
        let (remote, engine) = setup().await;

        let outcome = engine
            .execute(Intent::AddChild {
                parent: NodeId::from("r"),
                content: "Goals".to_string(),
            })
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Committed));

        let tree = engine.snapshot();
        let added = tree.find(&NodeId::from("srv-1")).expect("node persisted");
        assert_eq!(added.content, "Goals");
        assert!(!added.id.is_temporary());
        // Same position: second child of the root.
        assert_eq!(tree.root.children[1].id, NodeId::from("srv-1"));
        assert_eq!(remote.calls(), vec!["add-node"]);
    }

    #[tokio::test]
    async fn ids_stay_unique_across_adds_and_server_id_adoption() {
        let (_remote, engine) = setup().await;

        for (parent, content) in [("r", "Goals"), ("n1", "Steps"), ("r", "Later")] {
            let outcome = engine
                .execute(Intent::AddChild {
                    parent: NodeId::from(parent),
                    content: content.to_string(),
                })
                .await
                .unwrap();
            assert!(matches!(outcome, Outcome::Committed));
        }

        let tree = engine.snapshot();
        let mut ids = Vec::new();
        collect_ids(&tree.root, &mut ids);
        let distinct: std::collections::HashSet<&NodeId> = ids.iter().collect();
        assert_eq!(distinct.len(), ids.len());
        // Every add was acknowledged, so no temporary id survives either.
        assert!(ids.iter().all(|id| !id.is_temporary()));
    }

    #[tokio::test]
    async fn rolls_back_to_the_exact_prior_snapshot_on_failure() {
        let (remote, engine) = setup().await;
        remote.fail_requests();
        let before = engine.snapshot();

        let outcome = engine
            .execute(Intent::AddChild {
                parent: NodeId::from("r"),
                content: "Goals".to_string(),
            })
            .await
            .unwrap();

        assert!(matches!(outcome, Outcome::RolledBack(_)));
        assert_eq!(engine.snapshot(), before);
        let notice = engine.subscribe_notices().borrow().clone();
        assert!(notice.unwrap().message.contains("add node"));
    }

    #[tokio::test]
    async fn rejects_empty_content_before_any_mutation() {
        let (remote, engine) = setup().await;
        let before = engine.snapshot();

        let result = engine
            .execute(Intent::AddChild {
                parent: NodeId::from("r"),
                content: "   ".to_string(),
            })
            .await;

        assert!(matches!(result, Err(SyncError::EmptyContent)));
        assert!(engine.snapshot().same_snapshot(&before));
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn ignores_a_parent_that_no_longer_exists() {
        let (remote, engine) = setup().await;

        let outcome = engine
            .execute(Intent::AddChild {
                parent: NodeId::from("gone"),
                content: "Orphan".to_string(),
            })
            .await
            .unwrap();

        assert!(matches!(outcome, Outcome::Ignored));
        assert!(remote.calls().is_empty());
    }
}

mod edit_content {
    use super::*;

    #[tokio::test]
    async fn commits_the_new_content() {
        let (_remote, engine) = setup().await;

        let outcome = engine
            .execute(Intent::EditContent {
                node: NodeId::from("n1"),
                content: "A, refined".to_string(),
            })
            .await
            .unwrap();

        assert!(matches!(outcome, Outcome::Committed));
        assert_eq!(
            engine.snapshot().find(&NodeId::from("n1")).unwrap().content,
            "A, refined"
        );
    }

    #[tokio::test]
    async fn rolls_back_exactly_on_failure() {
        let (remote, engine) = setup().await;
        remote.fail_requests();
        let before = engine.snapshot();

        let outcome = engine
            .execute(Intent::EditContent {
                node: NodeId::from("n2"),
                content: "B, refined".to_string(),
            })
            .await
            .unwrap();

        assert!(matches!(outcome, Outcome::RolledBack(_)));
        assert_eq!(engine.snapshot(), before);
        assert_eq!(
            engine.snapshot().find(&NodeId::from("n2")).unwrap().content,
            "B"
        );
    }
}

mod delete {
    use super::*;

    #[tokio::test]
    async fn removes_the_whole_subtree() {
        let (_remote, engine) = setup().await;

        let outcome = engine
            .execute(Intent::Delete {
                node: NodeId::from("n1"),
            })
            .await
            .unwrap();

        assert!(matches!(outcome, Outcome::Committed));
        let tree = engine.snapshot();
        assert!(!tree.contains(&NodeId::from("n1")));
        assert!(!tree.contains(&NodeId::from("n2")));
        assert_eq!(tree.root_id(), &NodeId::from("r"));
    }

    #[tokio::test]
    async fn rejects_deleting_the_root() {
        let (remote, engine) = setup().await;

        let result = engine
            .execute(Intent::Delete {
                node: NodeId::from("r"),
            })
            .await;

        assert!(matches!(result, Err(SyncError::DeleteRoot)));
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn a_stale_intent_after_the_delete_is_a_benign_noop() {
        let (remote, engine) = setup().await;

        engine
            .execute(Intent::Delete {
                node: NodeId::from("n1"),
            })
            .await
            .unwrap();

        // An edit of the deleted child resolves against the current tree.
        let outcome = engine
            .execute(Intent::EditContent {
                node: NodeId::from("n2"),
                content: "B2".to_string(),
            })
            .await
            .unwrap();

        assert!(matches!(outcome, Outcome::Ignored));
        assert_eq!(remote.calls(), vec!["delete-node"]);
    }
}

mod toggle {
    use super::*;

    #[tokio::test]
    async fn double_toggle_returns_a_deep_equal_tree() {
        let (_remote, engine) = setup().await;
        let original = engine.snapshot();

        for _ in 0..2 {
            let outcome = engine
                .execute(Intent::Toggle {
                    node: NodeId::from("n1"),
                })
                .await
                .unwrap();
            assert!(matches!(outcome, Outcome::Committed));
        }

        assert_eq!(engine.snapshot(), original);
    }

    #[tokio::test]
    async fn rolls_back_on_failure() {
        let (remote, engine) = setup().await;
        remote.fail_requests();
        let before = engine.snapshot();

        let outcome = engine
            .execute(Intent::Toggle {
                node: NodeId::from("n1"),
            })
            .await
            .unwrap();

        assert!(matches!(outcome, Outcome::RolledBack(_)));
        assert_eq!(engine.snapshot(), before);
    }
}

mod per_node_serialization {
    use super::*;

    #[tokio::test]
    async fn rejects_a_second_intent_while_the_first_is_pending() {
        let (remote, engine) = setup().await;
        remote.delay_requests(200);
        let engine = Arc::new(engine);

        let first = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                engine
                    .execute(Intent::EditContent {
                        node: NodeId::from("n1"),
                        content: "first".to_string(),
                    })
                    .await
            })
        };

        // Let the first intent reach its network suspension point.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let second = engine
            .execute(Intent::EditContent {
                node: NodeId::from("n1"),
                content: "second".to_string(),
            })
            .await;
        assert!(matches!(second, Err(SyncError::Busy(_))));

        let first = first.await.unwrap().unwrap();
        assert!(matches!(first, Outcome::Committed));
        assert_eq!(
            engine.snapshot().find(&NodeId::from("n1")).unwrap().content,
            "first"
        );
    }

    #[tokio::test]
    async fn intents_on_different_nodes_run_independently() {
        let (remote, engine) = setup().await;
        remote.delay_requests(100);
        let engine = Arc::new(engine);

        let edits = [("n1", "A2"), ("n2", "B2")].map(|(id, content)| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                engine
                    .execute(Intent::EditContent {
                        node: NodeId::from(id),
                        content: content.to_string(),
                    })
                    .await
            })
        });

        for edit in edits {
            assert!(matches!(edit.await.unwrap().unwrap(), Outcome::Committed));
        }
        let tree = engine.snapshot();
        assert_eq!(tree.find(&NodeId::from("n1")).unwrap().content, "A2");
        assert_eq!(tree.find(&NodeId::from("n2")).unwrap().content, "B2");
    }
}

mod shutdown {
    use super::*;

    #[tokio::test]
    async fn an_in_flight_completion_becomes_a_noop_after_teardown() {
        let (remote, engine) = setup().await;
        remote.delay_requests(200);
        remote.fail_requests();
        let engine = Arc::new(engine);

        let pending = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                engine
                    .execute(Intent::EditContent {
                        node: NodeId::from("n1"),
                        content: "optimistic".to_string(),
                    })
                    .await
            })
        };

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        engine.shutdown();

        let outcome = pending.await.unwrap().unwrap();
        assert!(matches!(outcome, Outcome::Detached));
        // Neither the rollback nor a commit ran: the optimistic value is
        // still in place, untouched since teardown.
        assert_eq!(
            engine.snapshot().find(&NodeId::from("n1")).unwrap().content,
            "optimistic"
        );
    }
}
