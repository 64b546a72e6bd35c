//! Domain models for the mind-map editor.
//!
//! # Core Concepts
//!
//! - [`Node`]: a labeled vertex in the mind-map tree — identity, content,
//!   ordered children, expand/collapse flag. Nodes form a strict forest
//!   rooted at a single root node that is never deleted.
//! - [`NodeId`]: opaque node identity. Client-minted *temporary* ids tag
//!   nodes created locally but not yet acknowledged by the remote store; the
//!   remote store replaces them with stable *persistent* ids.
//!
//! The wire request/response bodies for the remote node service live here
//! too, so the client and the tests share one definition of each shape.

mod node;

pub use node::*;
