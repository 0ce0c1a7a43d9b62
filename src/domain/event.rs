//! Realtime events pushed to subscribed connections.
//!
//! Every domain write and presence change emits a [`ChatEvent`] through the
//! realtime hub. Events are transient: serialized onto live connections and
//! never persisted. Conversation and message payloads are opaque documents
//! forwarded verbatim from the persistence layer.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{ConversationId, LocationId, UserId};

/// Event delivered over a realtime channel.
///
/// Serialized with a `type` discriminator matching the wire contract, e.g.
/// `{"type":"user_joined","user_id":"…","active_users":2}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// Welcome payload sent to a connection right after it subscribes.
    ///
    /// Location subscriptions carry `location_id`; conversation
    /// subscriptions carry `conversation_id` and the current distinct-user
    /// presence count.
    Connected {
        /// Subscribed location, for location-scope welcomes.
        #[serde(skip_serializing_if = "Option::is_none")]
        location_id: Option<LocationId>,
        /// Subscribed conversation, for conversation-scope welcomes.
        #[serde(skip_serializing_if = "Option::is_none")]
        conversation_id: Option<ConversationId>,
        /// Distinct users currently present in the conversation.
        #[serde(skip_serializing_if = "Option::is_none")]
        active_users: Option<usize>,
        /// Human-readable confirmation text.
        message: String,
    },

    /// A conversation was created in the location.
    NewConversation {
        /// Full conversation document, forwarded verbatim.
        conversation: serde_json::Value,
    },

    /// A message was posted to the conversation.
    NewMessage {
        /// Full message document, forwarded verbatim.
        message: serde_json::Value,
    },

    /// A conversation in the location received new activity.
    ConversationActivity {
        /// Conversation that was active.
        conversation_id: ConversationId,
        /// Timestamp of the activity.
        last_activity: DateTime<Utc>,
    },

    /// A conversation in the location was deleted.
    ConversationDeleted {
        /// Conversation that was removed.
        conversation_id: ConversationId,
    },

    /// A subscriber's typing state changed.
    Typing {
        /// User whose typing state changed.
        user_id: UserId,
        /// Display name to render next to the indicator.
        user_name: String,
        /// Whether the user is currently typing.
        is_typing: bool,
    },

    /// A user joined the conversation.
    UserJoined {
        /// User that joined.
        user_id: UserId,
        /// Distinct users present after the join.
        active_users: usize,
    },

    /// A user left the conversation.
    UserLeft {
        /// User that left.
        user_id: UserId,
        /// Distinct users present after the departure.
        active_users: usize,
    },

    /// Reply to an application-level `ping`.
    Pong,
}

impl ChatEvent {
    /// Welcome event for a new location-scope subscriber.
    #[must_use]
    pub fn location_welcome(location_id: LocationId) -> Self {
        Self::Connected {
            location_id: Some(location_id),
            conversation_id: None,
            active_users: None,
            message: "Connected to location updates".to_string(),
        }
    }

    /// Welcome event for a new conversation-scope subscriber.
    #[must_use]
    pub fn conversation_welcome(conversation_id: ConversationId, active_users: usize) -> Self {
        Self::Connected {
            location_id: None,
            conversation_id: Some(conversation_id),
            active_users: Some(active_users),
            message: "Connected to conversation".to_string(),
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::NewConversation { .. } => "new_conversation",
            Self::NewMessage { .. } => "new_message",
            Self::ConversationActivity { .. } => "conversation_activity",
            Self::ConversationDeleted { .. } => "conversation_deleted",
            Self::Typing { .. } => "typing",
            Self::UserJoined { .. } => "user_joined",
            Self::UserLeft { .. } => "user_left",
            Self::Pong => "pong",
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn location_welcome_omits_conversation_fields() {
        let event = ChatEvent::location_welcome(LocationId::new());
        let json = serde_json::to_string(&event).unwrap_or_default();
        assert!(json.contains("\"type\":\"connected\""));
        assert!(json.contains("location_id"));
        assert!(!json.contains("conversation_id"));
        assert!(!json.contains("active_users"));
    }

    #[test]
    fn conversation_welcome_carries_presence_count() {
        let event = ChatEvent::conversation_welcome(ConversationId::new(), 3);
        let json = serde_json::to_string(&event).unwrap_or_default();
        assert!(json.contains("\"active_users\":3"));
        assert!(!json.contains("location_id"));
    }

    #[test]
    fn typing_event_serializes_all_fields() {
        let event = ChatEvent::Typing {
            user_id: UserId::from("u1"),
            user_name: "Ada".to_string(),
            is_typing: true,
        };
        let json = serde_json::to_string(&event).unwrap_or_default();
        assert!(json.contains("\"type\":\"typing\""));
        assert!(json.contains("\"user_id\":\"u1\""));
        assert!(json.contains("\"is_typing\":true"));
    }

    #[test]
    fn pong_is_a_bare_tag() {
        let json = serde_json::to_string(&ChatEvent::Pong).unwrap_or_default();
        assert_eq!(json, "{\"type\":\"pong\"}");
    }

    #[test]
    fn event_type_str_matches_tag() {
        let event = ChatEvent::ConversationDeleted {
            conversation_id: ConversationId::new(),
        };
        assert_eq!(event.event_type_str(), "conversation_deleted");
        let json = serde_json::to_string(&event).unwrap_or_default();
        assert!(json.contains("\"type\":\"conversation_deleted\""));
    }

    #[test]
    fn payload_documents_are_forwarded_verbatim() {
        let document = serde_json::json!({"id": "c1", "title": "Pipes burst"});
        let event = ChatEvent::NewConversation {
            conversation: document.clone(),
        };
        let json = serde_json::to_value(&event).unwrap_or_default();
        assert_eq!(json.get("conversation"), Some(&document));
    }
}
