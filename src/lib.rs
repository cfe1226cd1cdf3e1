//! fileroute: a document routing and approval service.
//!
//! Users draft files (letters, memos, notes), route them to an assignee
//! for approval, and track every transition in a prepended history log.
//! State lives in SQLite; attachment blobs go on disk under a
//! year/month tree; workflow actions are mirrored to a JSONL audit
//! trail. The HTTP surface is an axum REST API with a WebSocket
//! broadcast channel for live updates.

pub mod api;
pub mod audit;
pub mod config;
pub mod errors;
pub mod models;
pub mod server;
pub mod store;
pub mod workflow;
pub mod ws;
