//! Broadcast scope: the unit of realtime fan-out.
//!
//! Every live connection subscribes to exactly one scope. Location scopes
//! carry conversation-list updates (new conversations, activity, deletions);
//! conversation scopes carry messages, typing indicators, and presence.

use std::fmt;

use super::{ConversationId, LocationId};

/// One of the two nested broadcast scopes.
///
/// Used as the key of the connection registry's scope map. Conversation
/// scopes additionally track distinct-user presence; location scopes do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Location-level updates for one geographic location.
    Location(LocationId),
    /// Conversation-level updates for one conversation.
    Conversation(ConversationId),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Location(id) => write!(f, "location:{id}"),
            Self::Conversation(id) => write!(f, "conversation:{id}"),
        }
    }
}
