//! Optimistic mind-map editor engine for the Cortex brain-training app.
//!
//! The authoritative copy of a user's mind-map lives on a remote node
//! service; this crate keeps an in-memory snapshot that mutates instantly on
//! user intent and reconciles with the remote store afterwards, rolling the
//! snapshot back exactly when a remote call fails.
//!
//! - [`tree`]: immutable snapshots and their pure transformations.
//! - [`sync`]: the optimistic-apply / confirm / rollback engine.
//! - [`remote`]: HTTP client for the remote node service.
//! - [`models`]: node entities and wire bodies.
//! - [`render`]: ASCII rendering for the CLI.

pub mod models;
pub mod remote;
pub mod render;
pub mod sync;
pub mod tree;
