//! Type-safe identifiers for the chat domain.
//!
//! Locations, conversations, messages, and live connections each get a
//! newtype wrapper around [`uuid::Uuid`] (v4) so the different identifier
//! kinds cannot be confused. User identifiers are opaque strings issued by
//! the authentication collaborator and are not guaranteed to be UUIDs.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Creates a new random identifier (UUID v4).
            #[must_use]
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Creates an identifier from an existing [`uuid::Uuid`].
            #[must_use]
            pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner [`uuid::Uuid`].
            #[must_use]
            pub const fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for uuid::Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id! {
    /// Unique identifier for a geographic location.
    ///
    /// Keys location-level broadcast scopes and the `location_id` field of
    /// conversation documents.
    LocationId
}

uuid_id! {
    /// Unique identifier for a conversation.
    ///
    /// Keys conversation-level broadcast scopes and presence tracking.
    ConversationId
}

uuid_id! {
    /// Unique identifier for a chat message.
    MessageId
}

uuid_id! {
    /// Unique identity of one live client connection.
    ///
    /// Generated when the transport hands the connection to the registry.
    /// A reconnect always produces a fresh `ConnectionId`.
    ConnectionId
}

/// Opaque identifier of an authenticated user.
///
/// Issued by the authentication collaborator and passed through verbatim;
/// the upstream system does not guarantee any particular format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
