//! Chat endpoint handlers: conversations, messages, categories.
//!
//! REST covers initial loading and refresh; deltas arrive over the
//! WebSocket channels. Write handlers delegate to the chat service, which
//! performs the matching broadcasts after each successful persistence
//! write.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};

use crate::api::auth::CurrentUser;
use crate::api::dto::{
    AckResponse, CategoryInfo, ConversationListParams, ConversationListResponse,
    CreateConversationRequest, CreateConversationResponse, MessageListParams,
    MessageListResponse, SendMessageRequest, SendMessageResponse,
};
use crate::app_state::AppState;
use crate::domain::{ConversationId, LocationId, MessageId};
use crate::error::{ErrorResponse, GatewayError};

/// Catalog of conversation categories, aligned with
/// [`crate::service::CATEGORY_IDS`].
pub const CATEGORY_CATALOG: [CategoryInfo; 6] = [
    CategoryInfo {
        id: "water",
        name: "Water",
        icon: "💧",
        color: "#2196F3",
    },
    CategoryInfo {
        id: "electricity",
        name: "Electricity",
        icon: "⚡",
        color: "#FF9800",
    },
    CategoryInfo {
        id: "maintenance",
        name: "Maintenance",
        icon: "🔧",
        color: "#4CAF50",
    },
    CategoryInfo {
        id: "crime",
        name: "Crime & Safety",
        icon: "🚨",
        color: "#F44336",
    },
    CategoryInfo {
        id: "places",
        name: "Local Places",
        icon: "📍",
        color: "#9C27B0",
    },
    CategoryInfo {
        id: "general",
        name: "General",
        icon: "💬",
        color: "#607D8B",
    },
];

/// `GET /chat/locations/{location_id}/conversations` — List conversations.
///
/// # Errors
///
/// Returns [`GatewayError`] on persistence failure or missing identity.
#[utoipa::path(
    get,
    path = "/api/v1/chat/locations/{location_id}/conversations",
    tag = "Chat",
    summary = "List a location's conversations",
    description = "Returns active conversations of a location, newest activity first, \
                   with per-user unread flags.",
    params(
        ("location_id" = uuid::Uuid, Path, description = "Location UUID"),
        ("page" = Option<u32>, Query, description = "Page number (1-indexed)"),
        ("limit" = Option<u32>, Query, description = "Page size (max 100)"),
        ("category" = Option<String>, Query, description = "Category filter, `all` for every category"),
    ),
    responses(
        (status = 200, description = "Paginated conversation list", body = serde_json::Value),
        (status = 401, description = "Missing identity", body = ErrorResponse),
    )
)]
pub async fn list_conversations(
    State(state): State<AppState>,
    Path(location_id): Path<uuid::Uuid>,
    Query(params): Query<ConversationListParams>,
    CurrentUser(user_id): CurrentUser,
) -> Result<impl IntoResponse, GatewayError> {
    let params = params.clamped();
    let conversations = state
        .chat_service
        .list_conversations(
            LocationId::from_uuid(location_id),
            params.category.as_deref(),
            params.page,
            params.limit,
            Some(&user_id),
        )
        .await?;

    let has_more = conversations.len() == params.limit;
    Ok(Json(ConversationListResponse {
        conversations,
        page: params.page,
        limit: params.limit,
        has_more,
    }))
}

/// `POST /chat/locations/{location_id}/conversations` — Start a conversation.
///
/// # Errors
///
/// Returns [`GatewayError`] on validation or persistence failure.
#[utoipa::path(
    post,
    path = "/api/v1/chat/locations/{location_id}/conversations",
    tag = "Chat",
    summary = "Create a conversation",
    description = "Creates a conversation in the location and pushes a `new_conversation` \
                   event to the location's realtime subscribers.",
    params(
        ("location_id" = uuid::Uuid, Path, description = "Location UUID"),
    ),
    responses(
        (status = 201, description = "Conversation created", body = serde_json::Value),
        (status = 400, description = "Invalid title, body, or category", body = ErrorResponse),
        (status = 401, description = "Missing identity", body = ErrorResponse),
    )
)]
pub async fn create_conversation(
    State(state): State<AppState>,
    Path(location_id): Path<uuid::Uuid>,
    CurrentUser(user_id): CurrentUser,
    Json(req): Json<CreateConversationRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let conversation = state
        .chat_service
        .create_conversation(
            LocationId::from_uuid(location_id),
            &req.title,
            &req.body,
            &req.category,
            &user_id,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateConversationResponse {
            message: "Conversation created successfully".to_string(),
            conversation,
        }),
    ))
}

/// `GET /chat/conversations/{conversation_id}` — Get one conversation.
///
/// # Errors
///
/// Returns [`GatewayError::ConversationNotFound`] for an unknown or
/// inactive conversation.
#[utoipa::path(
    get,
    path = "/api/v1/chat/conversations/{conversation_id}",
    tag = "Chat",
    summary = "Get a conversation",
    params(
        ("conversation_id" = uuid::Uuid, Path, description = "Conversation UUID"),
    ),
    responses(
        (status = 200, description = "Conversation document", body = serde_json::Value),
        (status = 404, description = "Conversation not found", body = ErrorResponse),
    )
)]
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<uuid::Uuid>,
    CurrentUser(_user_id): CurrentUser,
) -> Result<impl IntoResponse, GatewayError> {
    let conversation = state
        .chat_service
        .get_conversation(ConversationId::from_uuid(conversation_id))
        .await?;
    Ok(Json(conversation))
}

/// `DELETE /chat/conversations/{conversation_id}` — Delete own conversation.
///
/// # Errors
///
/// Returns [`GatewayError::ConversationNotFound`] when no active
/// conversation of the caller matches.
#[utoipa::path(
    delete,
    path = "/api/v1/chat/conversations/{conversation_id}",
    tag = "Chat",
    summary = "Delete a conversation",
    description = "Author-only soft delete. Hides the conversation and its messages and \
                   pushes `conversation_deleted` to the location's subscribers.",
    params(
        ("conversation_id" = uuid::Uuid, Path, description = "Conversation UUID"),
    ),
    responses(
        (status = 200, description = "Conversation deleted", body = serde_json::Value),
        (status = 404, description = "Conversation not found or not owned", body = ErrorResponse),
    )
)]
pub async fn delete_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<uuid::Uuid>,
    CurrentUser(user_id): CurrentUser,
) -> Result<impl IntoResponse, GatewayError> {
    let deleted = state
        .chat_service
        .delete_conversation(ConversationId::from_uuid(conversation_id), &user_id)
        .await?;
    if !deleted {
        return Err(GatewayError::ConversationNotFound(conversation_id));
    }
    Ok(Json(AckResponse {
        message: "Conversation deleted successfully".to_string(),
    }))
}

/// `GET /chat/conversations/{conversation_id}/messages` — List messages.
///
/// # Errors
///
/// Returns [`GatewayError::ConversationNotFound`] for an unknown
/// conversation.
#[utoipa::path(
    get,
    path = "/api/v1/chat/conversations/{conversation_id}/messages",
    tag = "Chat",
    summary = "List a conversation's messages",
    description = "Returns messages oldest-first. Pass `before` for cursor pagination \
                   backwards from a message id.",
    params(
        ("conversation_id" = uuid::Uuid, Path, description = "Conversation UUID"),
        ("page" = Option<u32>, Query, description = "Page number (1-indexed)"),
        ("limit" = Option<u32>, Query, description = "Page size (max 100)"),
        ("before" = Option<uuid::Uuid>, Query, description = "Message id to page backwards from"),
    ),
    responses(
        (status = 200, description = "Paginated message list", body = serde_json::Value),
        (status = 404, description = "Conversation not found", body = ErrorResponse),
    )
)]
pub async fn list_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<uuid::Uuid>,
    Query(params): Query<MessageListParams>,
    CurrentUser(_user_id): CurrentUser,
) -> Result<impl IntoResponse, GatewayError> {
    let conversation_id = ConversationId::from_uuid(conversation_id);
    let conversation = state.chat_service.get_conversation(conversation_id).await?;

    let params = params.clamped();
    let messages = state
        .chat_service
        .list_messages(
            conversation_id,
            params.page,
            params.limit,
            params.before.map(MessageId::from_uuid),
        )
        .await?;

    let has_more = messages.len() == params.limit;
    Ok(Json(MessageListResponse {
        messages,
        conversation,
        page: params.page,
        limit: params.limit,
        has_more,
    }))
}

/// `POST /chat/conversations/{conversation_id}/messages` — Send a message.
///
/// # Errors
///
/// Returns [`GatewayError`] for an unknown conversation, empty content, or
/// persistence failure.
#[utoipa::path(
    post,
    path = "/api/v1/chat/conversations/{conversation_id}/messages",
    tag = "Chat",
    summary = "Send a message",
    description = "Persists the message, then pushes `new_message` to the conversation's \
                   subscribers and `conversation_activity` to the owning location's.",
    params(
        ("conversation_id" = uuid::Uuid, Path, description = "Conversation UUID"),
    ),
    responses(
        (status = 201, description = "Message sent", body = serde_json::Value),
        (status = 400, description = "Empty content", body = ErrorResponse),
        (status = 404, description = "Conversation not found", body = ErrorResponse),
    )
)]
pub async fn send_message(
    State(state): State<AppState>,
    Path(conversation_id): Path<uuid::Uuid>,
    CurrentUser(user_id): CurrentUser,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let message = state
        .chat_service
        .send_message(
            ConversationId::from_uuid(conversation_id),
            &req.content,
            &user_id,
            req.reply_to_id.map(MessageId::from_uuid),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SendMessageResponse {
            message: "Message sent successfully".to_string(),
            data: message,
        }),
    ))
}

/// `POST /chat/conversations/{conversation_id}/read` — Mark as read.
///
/// # Errors
///
/// Returns [`GatewayError`] on persistence failure.
#[utoipa::path(
    post,
    path = "/api/v1/chat/conversations/{conversation_id}/read",
    tag = "Chat",
    summary = "Mark a conversation read",
    params(
        ("conversation_id" = uuid::Uuid, Path, description = "Conversation UUID"),
    ),
    responses(
        (status = 200, description = "Read state recorded", body = serde_json::Value),
        (status = 401, description = "Missing identity", body = ErrorResponse),
    )
)]
pub async fn mark_conversation_read(
    State(state): State<AppState>,
    Path(conversation_id): Path<uuid::Uuid>,
    CurrentUser(user_id): CurrentUser,
) -> Result<impl IntoResponse, GatewayError> {
    state
        .chat_service
        .mark_conversation_read(ConversationId::from_uuid(conversation_id), &user_id)
        .await?;
    Ok(Json(AckResponse {
        message: "Conversation marked as read".to_string(),
    }))
}

/// `DELETE /chat/messages/{message_id}` — Delete own message.
///
/// # Errors
///
/// Returns [`GatewayError::MessageNotFound`] when no live message of the
/// caller matches.
#[utoipa::path(
    delete,
    path = "/api/v1/chat/messages/{message_id}",
    tag = "Chat",
    summary = "Delete a message",
    params(
        ("message_id" = uuid::Uuid, Path, description = "Message UUID"),
    ),
    responses(
        (status = 200, description = "Message deleted", body = serde_json::Value),
        (status = 404, description = "Message not found or not owned", body = ErrorResponse),
    )
)]
pub async fn delete_message(
    State(state): State<AppState>,
    Path(message_id): Path<uuid::Uuid>,
    CurrentUser(user_id): CurrentUser,
) -> Result<impl IntoResponse, GatewayError> {
    let deleted = state
        .chat_service
        .delete_message(MessageId::from_uuid(message_id), &user_id)
        .await?;
    if !deleted {
        return Err(GatewayError::MessageNotFound(message_id));
    }
    Ok(Json(AckResponse {
        message: "Message deleted successfully".to_string(),
    }))
}

/// `GET /chat/categories` — Category catalog.
#[utoipa::path(
    get,
    path = "/api/v1/chat/categories",
    tag = "Chat",
    summary = "List conversation categories",
    responses(
        (status = 200, description = "Category catalog", body = serde_json::Value),
    )
)]
pub async fn list_categories() -> impl IntoResponse {
    Json(CATEGORY_CATALOG)
}

/// Chat routes mounted under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/chat/locations/{location_id}/conversations",
            get(list_conversations).post(create_conversation),
        )
        .route(
            "/chat/conversations/{conversation_id}",
            get(get_conversation).delete(delete_conversation),
        )
        .route(
            "/chat/conversations/{conversation_id}/messages",
            get(list_messages).post(send_message),
        )
        .route(
            "/chat/conversations/{conversation_id}/read",
            post(mark_conversation_read),
        )
        .route("/chat/messages/{message_id}", delete(delete_message))
        .route("/chat/categories", get(list_categories))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::service::CATEGORY_IDS;

    #[test]
    fn catalog_matches_accepted_category_ids() {
        let catalog_ids: Vec<_> = CATEGORY_CATALOG.iter().map(|c| c.id).collect();
        assert_eq!(catalog_ids, CATEGORY_IDS);
    }

    #[test]
    fn catalog_serializes_with_display_metadata() {
        let json = serde_json::to_value(CATEGORY_CATALOG).unwrap_or_default();
        let Some(first) = json.as_array().and_then(|entries| entries.first()) else {
            panic!("catalog should serialize to an array");
        };
        assert_eq!(first.get("id"), Some(&serde_json::json!("water")));
        assert!(first.get("icon").is_some());
        assert!(first.get("color").is_some());
    }
}
