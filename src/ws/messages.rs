//! Inbound control messages on a conversation channel.

use serde::Deserialize;

use crate::domain::UserId;

/// Control message a conversation-channel client may send.
///
/// Anything that fails to parse (unknown `type`, missing field, non-JSON)
/// is ignored without a reply; the connection stays subscribed.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Typing-state change, relayed to every other subscriber.
    Typing {
        /// User whose typing state changed.
        user_id: UserId,
        /// Display name to relay alongside.
        user_name: String,
        /// Whether the user is typing. Defaults to `false` when omitted.
        #[serde(default)]
        is_typing: bool,
    },
    /// Liveness check; answered with a `pong` to the sender only.
    Ping,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn parses_typing() {
        let parsed: Result<ClientMessage, _> = serde_json::from_str(
            r#"{"type":"typing","user_id":"u1","user_name":"Ada","is_typing":true}"#,
        );
        let Ok(ClientMessage::Typing {
            user_id,
            user_name,
            is_typing,
        }) = parsed
        else {
            panic!("expected a typing message");
        };
        assert_eq!(user_id, UserId::from("u1"));
        assert_eq!(user_name, "Ada");
        assert!(is_typing);
    }

    #[test]
    fn is_typing_defaults_to_false() {
        let parsed: Result<ClientMessage, _> =
            serde_json::from_str(r#"{"type":"typing","user_id":"u1","user_name":"Ada"}"#);
        let Ok(ClientMessage::Typing { is_typing, .. }) = parsed else {
            panic!("expected a typing message");
        };
        assert!(!is_typing);
    }

    #[test]
    fn parses_ping() {
        let parsed: Result<ClientMessage, _> = serde_json::from_str(r#"{"type":"ping"}"#);
        assert!(matches!(parsed, Ok(ClientMessage::Ping)));
    }

    #[test]
    fn unknown_type_is_an_error() {
        let parsed: Result<ClientMessage, _> =
            serde_json::from_str(r#"{"type":"shout","volume":11}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn missing_field_is_an_error() {
        let parsed: Result<ClientMessage, _> =
            serde_json::from_str(r#"{"type":"typing","user_id":"u1"}"#);
        assert!(parsed.is_err());
    }
}
