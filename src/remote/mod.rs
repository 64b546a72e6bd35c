//! HTTP client for the remote node service.
//!
//! The remote service is the authoritative store for a user's mind-map,
//! keyed by an opaque user identifier. Configuration is via environment
//! variables:
//! - `CORTEX_MINDMAP_URL` - Base URL (default: `http://localhost:17010/api/v1`)
//! - `CORTEX_MINDMAP_API_KEY` - API key for authentication (optional for local)

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::models::{Ack, AddNodeRequest, FetchTreeResponse, Node, NodeId, NodeRequest,
    UpdateNodeRequest};
use crate::tree::Tree;

/// Default URL for local development.
const DEFAULT_URL: &str = "http://localhost:17010/api/v1";

/// HTTP client errors. Every variant is recoverable at the sync-engine
/// boundary: a failed call rolls the optimistic mutation back, nothing more.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: API key required or invalid")]
    Unauthorized,

    #[error("Server error: {0}")]
    Server(String),

    #[error("Server rejected the operation: {0}")]
    Rejected(String),
}

/// Client configuration, usually read from the environment.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl RemoteConfig {
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("CORTEX_MINDMAP_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
        let api_key = std::env::var("CORTEX_MINDMAP_API_KEY").ok();
        Self { base_url, api_key }
    }
}

/// HTTP client for the remote node service.
#[derive(Debug, Clone)]
pub struct NodeClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl NodeClient {
    pub fn from_env() -> Self {
        Self::from_config(RemoteConfig::from_env())
    }

    pub fn from_config(config: RemoteConfig) -> Self {
        Self::new(config.base_url, config.api_key)
    }

    /// Create with explicit configuration.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            client: Client::new(),
        }
    }

    /// Build a request with optional auth header.
    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.client.request(method, &url);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }
        req
    }

    /// Handle response, converting HTTP errors to ClientError.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            let body = response.text().await.unwrap_or_default();
            match status {
                StatusCode::NOT_FOUND => Err(ClientError::NotFound(body)),
                StatusCode::BAD_REQUEST => Err(ClientError::BadRequest(body)),
                StatusCode::UNAUTHORIZED => Err(ClientError::Unauthorized),
                _ => Err(ClientError::Server(format!("{}: {}", status, body))),
            }
        }
    }

    /// Handle an acknowledgement body; `success: false` counts as failure
    /// for rollback purposes just like a non-2xx status.
    async fn handle_ack(&self, response: reqwest::Response, what: &str) -> Result<(), ClientError> {
        let ack: Ack = self.handle_response(response).await?;
        if ack.success {
            Ok(())
        } else {
            Err(ClientError::Rejected(what.to_string()))
        }
    }

    /// Fetch the user's whole tree.
    pub async fn fetch_tree(&self, uid: &str) -> Result<Tree, ClientError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/mindmap/{}", uid))
            .send()
            .await?;
        let body: FetchTreeResponse = self.handle_response(response).await?;
        Ok(Tree::new(body.root))
    }

    /// Create a node under `parent_id`. Returns the persisted node carrying
    /// the authoritative id.
    pub async fn add_node(
        &self,
        uid: &str,
        parent_id: &NodeId,
        content: &str,
    ) -> Result<Node, ClientError> {
        let response = self
            .request(reqwest::Method::POST, "/mindmap/add-node")
            .json(&AddNodeRequest {
                uid: uid.to_string(),
                parent_id: parent_id.clone(),
                content: content.to_string(),
            })
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Replace a node's content.
    pub async fn update_node(
        &self,
        uid: &str,
        node_id: &NodeId,
        content: &str,
    ) -> Result<(), ClientError> {
        let response = self
            .request(reqwest::Method::POST, "/mindmap/update-node")
            .json(&UpdateNodeRequest {
                uid: uid.to_string(),
                node_id: node_id.clone(),
                content: content.to_string(),
            })
            .send()
            .await?;
        self.handle_ack(response, "update-node").await
    }

    /// Delete a node and its subtree.
    pub async fn delete_node(&self, uid: &str, node_id: &NodeId) -> Result<(), ClientError> {
        let response = self
            .request(reqwest::Method::POST, "/mindmap/delete-node")
            .json(&NodeRequest {
                uid: uid.to_string(),
                node_id: node_id.clone(),
            })
            .send()
            .await?;
        self.handle_ack(response, "delete-node").await
    }

    /// Flip a node's expand/collapse flag.
    pub async fn toggle_node(&self, uid: &str, node_id: &NodeId) -> Result<(), ClientError> {
        let response = self
            .request(reqwest::Method::POST, "/mindmap/toggle-node")
            .json(&NodeRequest {
                uid: uid.to_string(),
                node_id: node_id.clone(),
            })
            .send()
            .await?;
        self.handle_ack(response, "toggle-node").await
    }
}
