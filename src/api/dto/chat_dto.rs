//! Chat-related DTOs for conversation and message endpoints.
//!
//! Conversation and message payloads stay opaque `serde_json::Value`
//! documents end to end; the DTOs here only shape the envelopes around
//! them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Request body for `POST /chat/locations/{location_id}/conversations`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateConversationRequest {
    /// Conversation title.
    pub title: String,
    /// Opening post body.
    pub body: String,
    /// Category identifier (see `GET /chat/categories`).
    pub category: String,
}

/// Request body for `POST /chat/conversations/{conversation_id}/messages`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    /// Message text.
    pub content: String,
    /// Message this one replies to, if any.
    #[serde(default)]
    pub reply_to_id: Option<uuid::Uuid>,
}

/// Query parameters for the conversation list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationListParams {
    /// Page number (1-indexed). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: usize,
    /// Conversations per page (max 100). Defaults to 20.
    #[serde(default = "default_conversation_limit")]
    pub limit: usize,
    /// Category filter; `all` or absent returns every category.
    #[serde(default)]
    pub category: Option<String>,
}

impl ConversationListParams {
    /// Clamps `page` and `limit` to their allowed ranges.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            page: self.page.max(1),
            limit: self.limit.clamp(1, 100),
            category: self.category,
        }
    }
}

/// Query parameters for the message list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageListParams {
    /// Page number (1-indexed). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: usize,
    /// Messages per page (max 100). Defaults to 50.
    #[serde(default = "default_message_limit")]
    pub limit: usize,
    /// Message id to page backwards from (cursor pagination). Takes
    /// precedence over `page`.
    #[serde(default)]
    pub before: Option<uuid::Uuid>,
}

impl MessageListParams {
    /// Clamps `page` and `limit` to their allowed ranges.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            page: self.page.max(1),
            limit: self.limit.clamp(1, 100),
            before: self.before,
        }
    }
}

fn default_page() -> usize {
    1
}

fn default_conversation_limit() -> usize {
    20
}

fn default_message_limit() -> usize {
    50
}

/// Paginated response for the conversation list endpoint.
#[derive(Debug, Serialize)]
pub struct ConversationListResponse {
    /// Conversation documents, newest activity first.
    pub conversations: Vec<Value>,
    /// Requested page.
    pub page: usize,
    /// Requested page size.
    pub limit: usize,
    /// Whether another page may exist.
    pub has_more: bool,
}

/// Response for a created conversation.
#[derive(Debug, Serialize)]
pub struct CreateConversationResponse {
    /// Human-readable confirmation.
    pub message: String,
    /// The created conversation document.
    pub conversation: Value,
}

/// Paginated response for the message list endpoint.
#[derive(Debug, Serialize)]
pub struct MessageListResponse {
    /// Message documents, oldest first.
    pub messages: Vec<Value>,
    /// The surrounding conversation document.
    pub conversation: Value,
    /// Requested page.
    pub page: usize,
    /// Requested page size.
    pub limit: usize,
    /// Whether another page may exist.
    pub has_more: bool,
}

/// Response for a sent message.
#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    /// Human-readable confirmation.
    pub message: String,
    /// The created message document.
    pub data: Value,
}

/// Bare confirmation envelope for deletes and read marks.
#[derive(Debug, Serialize)]
pub struct AckResponse {
    /// Human-readable confirmation.
    pub message: String,
}

/// One entry of the category catalog.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryInfo {
    /// Stable category identifier.
    pub id: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Emoji shown next to the category.
    pub icon: &'static str,
    /// Hex display color.
    pub color: &'static str,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn conversation_params_default_and_clamp() {
        let params: Result<ConversationListParams, _> = serde_json::from_str("{}");
        let Ok(params) = params else {
            panic!("params should deserialize from an empty object");
        };
        assert_eq!(params.page, 1);
        assert_eq!(params.limit, 20);
        assert!(params.category.is_none());

        let clamped = ConversationListParams {
            page: 0,
            limit: 500,
            category: None,
        }
        .clamped();
        assert_eq!(clamped.page, 1);
        assert_eq!(clamped.limit, 100);
    }

    #[test]
    fn message_params_default_limit_is_fifty() {
        let params: Result<MessageListParams, _> = serde_json::from_str("{}");
        let Ok(params) = params else {
            panic!("params should deserialize from an empty object");
        };
        assert_eq!(params.limit, 50);
        assert!(params.before.is_none());
    }
}
