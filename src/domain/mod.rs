//! Domain layer: identifiers, broadcast scopes, and realtime events.
//!
//! Persistent entities (conversations, messages, users) are opaque JSON
//! documents owned by the persistence layer; this module models only the
//! typed vocabulary the gateway itself reasons about.

pub mod event;
pub mod ids;
pub mod scope;

pub use event::ChatEvent;
pub use ids::{ConnectionId, ConversationId, LocationId, MessageId, UserId};
pub use scope::Scope;
