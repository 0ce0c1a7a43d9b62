//! WebSocket layer: upgrade handlers, per-connection loops, and the inbound
//! message contract.
//!
//! Two endpoints exist, one per broadcast scope kind: location channels for
//! conversation-list updates and conversation channels for messages,
//! typing, and presence.

pub mod connection;
pub mod handler;
pub mod messages;
