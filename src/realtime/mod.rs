//! Realtime layer: connection registry, presence, and broadcast fan-out.
//!
//! The registry tracks which connections belong to which broadcast scopes;
//! the hub delivers events to them and layers presence notifications on
//! top. Both are pure in-memory state; nothing here touches persistence.

pub mod hub;
pub mod registry;

pub use hub::RealtimeHub;
pub use registry::{ConnectionHandle, ConnectionRegistry, Departure, RegistryStats};
