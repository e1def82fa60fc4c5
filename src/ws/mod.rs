//! WebSocket layer: connection handling, message routing, subscriptions.
//!
//! The WebSocket endpoint at `/ws` streams [`crate::domain::MountPointEvent`]s
//! filtered by node, and answers a few read-only mount-point queries.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
