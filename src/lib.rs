//! # localoop-gateway
//!
//! REST API and WebSocket gateway for the Localoop location-scoped
//! community chat. Users join geographic locations, post categorized
//! conversations within them, exchange messages, and receive realtime
//! updates over two nested broadcast scopes (location-level and
//! conversation-level).
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handlers (ws/)
//!     │
//!     ├── ChatService (service/)
//!     ├── RealtimeHub (realtime/)
//!     │
//!     ├── ConnectionRegistry (realtime/)
//!     │
//!     └── DocumentStore (persistence/: memory or PostgreSQL)
//! ```
//!
//! The realtime layer is pure in-memory state: the registry tracks which
//! connections belong to which scopes, the hub fans events out to them and
//! self-heals on failed deliveries. Everything persistent flows through the
//! document store, whose collections the gateway treats as opaque JSON.

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod realtime;
pub mod service;
pub mod ws;
