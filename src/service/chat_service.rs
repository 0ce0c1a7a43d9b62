//! Chat service: conversation and message operations with realtime fan-out.
//!
//! Orchestration layer between the document store and the realtime hub.
//! Every mutation follows the pattern: validate → persist → broadcast.
//! Documents cross this layer as opaque JSON and are forwarded verbatim
//! into events; the service only reads the handful of fields it routes on
//! (`id`, `location_id`, `author_id`, timestamps).

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Value, json};

use crate::domain::{ChatEvent, ConversationId, LocationId, MessageId, Scope, UserId};
use crate::error::GatewayError;
use crate::persistence::{DocumentStore, FetchOptions, Filter, RECORD_ID_FIELD, SortOrder};
use crate::realtime::RealtimeHub;

/// Category identifiers a conversation may be filed under.
pub const CATEGORY_IDS: [&str; 6] = [
    "water",
    "electricity",
    "maintenance",
    "crime",
    "places",
    "general",
];

const CONVERSATIONS: &str = "conversations";
const MESSAGES: &str = "messages";
const USERS: &str = "users";
const READ_STATE: &str = "user_conversation_activity";

/// Fallback author name when the user document is missing or nameless.
const UNKNOWN_USER: &str = "Unknown User";

/// Conversation and message operations backed by the document store.
#[derive(Debug, Clone)]
pub struct ChatService {
    store: Arc<dyn DocumentStore>,
    hub: RealtimeHub,
}

impl ChatService {
    /// Creates a new `ChatService`.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, hub: RealtimeHub) -> Self {
        Self { store, hub }
    }

    /// Lists active conversations of a location, newest activity first.
    ///
    /// Each returned document is enriched with `message_count` and, when a
    /// user is given, that user's `is_unread` flag.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] on persistence failure.
    pub async fn list_conversations(
        &self,
        location_id: LocationId,
        category: Option<&str>,
        page: usize,
        limit: usize,
        user_id: Option<&UserId>,
    ) -> Result<Vec<Value>, GatewayError> {
        let mut filter = Filter::new()
            .eq("location_id", json!(location_id))
            .eq("is_active", json!(true));
        if let Some(category) = category
            && category != "all"
        {
            filter = filter.eq("category", json!(category));
        }

        let options = FetchOptions {
            skip: page.saturating_sub(1).saturating_mul(limit),
            limit: Some(limit),
            sort: vec![
                ("last_activity".to_string(), SortOrder::Desc),
                ("created_at".to_string(), SortOrder::Desc),
            ],
            projection: None,
        };
        let conversations = self.store.fetch(CONVERSATIONS, &filter, &options).await?;

        let mut enriched = Vec::with_capacity(conversations.len());
        for mut conversation in conversations {
            let conversation_id = conversation
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let message_count = self.count_messages(&conversation_id).await?;
            let is_unread = match user_id {
                Some(user) => self.has_unread_messages(&conversation_id, user).await?,
                None => false,
            };
            if let Some(map) = conversation.as_object_mut() {
                map.insert("message_count".to_string(), json!(message_count));
                map.insert("is_unread".to_string(), json!(is_unread));
            }
            enriched.push(conversation);
        }
        Ok(enriched)
    }

    /// Creates a conversation and notifies the location's subscribers.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for empty title or body,
    /// [`GatewayError::InvalidCategory`] for an unknown category, or a
    /// persistence error.
    pub async fn create_conversation(
        &self,
        location_id: LocationId,
        title: &str,
        body: &str,
        category: &str,
        author_id: &UserId,
    ) -> Result<Value, GatewayError> {
        let title = title.trim();
        let body = body.trim();
        if title.is_empty() {
            return Err(GatewayError::InvalidRequest(
                "title must not be empty".to_string(),
            ));
        }
        if body.is_empty() {
            return Err(GatewayError::InvalidRequest(
                "body must not be empty".to_string(),
            ));
        }
        if !CATEGORY_IDS.contains(&category) {
            return Err(GatewayError::InvalidCategory(category.to_string()));
        }

        let author_name = self.author_display_name(author_id).await;
        let conversation_id = ConversationId::new();
        let now = Utc::now();
        let document = json!({
            "id": conversation_id,
            "location_id": location_id,
            "title": title,
            "body": body,
            "category": category,
            "author_id": author_id,
            "author_name": author_name,
            "created_at": now,
            "last_activity": now,
            "is_active": true,
            "is_pinned": false,
            "view_count": 0,
        });
        self.store.insert(CONVERSATIONS, document.clone()).await?;
        tracing::info!(%conversation_id, %location_id, category, "conversation created");

        let mut conversation = document;
        if let Some(map) = conversation.as_object_mut() {
            map.insert("message_count".to_string(), json!(0));
            map.insert("is_unread".to_string(), json!(false));
        }

        self.hub
            .broadcast(
                Scope::Location(location_id),
                &ChatEvent::NewConversation {
                    conversation: conversation.clone(),
                },
                None,
            )
            .await;

        Ok(conversation)
    }

    /// Returns a single active conversation with its message count.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ConversationNotFound`] when the conversation
    /// does not exist or is inactive.
    pub async fn get_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Value, GatewayError> {
        let mut conversation = self.find_active_conversation(conversation_id).await?;
        let message_count = self
            .count_messages(&conversation_id.to_string())
            .await?;
        if let Some(map) = conversation.as_object_mut() {
            map.insert("message_count".to_string(), json!(message_count));
        }
        Ok(conversation)
    }

    /// Lists a conversation's messages, oldest first.
    ///
    /// With `before`, returns messages strictly older than that message
    /// (cursor pagination); otherwise pages by offset.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] on persistence failure.
    pub async fn list_messages(
        &self,
        conversation_id: ConversationId,
        page: usize,
        limit: usize,
        before: Option<MessageId>,
    ) -> Result<Vec<Value>, GatewayError> {
        let mut filter = Filter::new()
            .eq("conversation_id", json!(conversation_id))
            .ne("is_deleted", json!(true));
        let mut skip = page.saturating_sub(1).saturating_mul(limit);

        if let Some(before) = before {
            let anchor = self
                .store
                .fetch(
                    MESSAGES,
                    &Filter::new().eq("id", json!(before)),
                    &FetchOptions {
                        limit: Some(1),
                        ..FetchOptions::default()
                    },
                )
                .await?;
            if let Some(timestamp) = anchor.first().and_then(|message| message.get("timestamp")) {
                filter = filter.lt("timestamp", timestamp.clone());
                skip = 0;
            }
        }

        let options = FetchOptions {
            skip,
            limit: Some(limit),
            sort: vec![("timestamp".to_string(), SortOrder::Desc)],
            projection: None,
        };
        let mut messages = self.store.fetch(MESSAGES, &filter, &options).await?;
        // Latest page fetched newest-first, displayed oldest-first.
        messages.reverse();
        Ok(messages)
    }

    /// Posts a message, bumps the conversation's activity clock, and
    /// broadcasts to both the conversation and its location.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ConversationNotFound`] for a missing or
    /// inactive conversation, [`GatewayError::InvalidRequest`] for empty
    /// content, or a persistence error.
    pub async fn send_message(
        &self,
        conversation_id: ConversationId,
        content: &str,
        author_id: &UserId,
        reply_to_id: Option<MessageId>,
    ) -> Result<Value, GatewayError> {
        let conversation = self.find_active_conversation(conversation_id).await?;
        let content = content.trim();
        if content.is_empty() {
            return Err(GatewayError::InvalidRequest(
                "content must not be empty".to_string(),
            ));
        }

        let author_name = self.author_display_name(author_id).await;
        let message_id = MessageId::new();
        let now = Utc::now();
        let document = json!({
            "id": message_id,
            "conversation_id": conversation_id,
            "content": content,
            "author_id": author_id,
            "author_name": author_name,
            "timestamp": now,
            "is_edited": false,
            "reply_to_id": reply_to_id,
            "is_deleted": false,
        });
        self.store.insert(MESSAGES, document.clone()).await?;

        // The message is already persisted; a failed activity bump must not
        // undo the send.
        if let Some(record_id) = conversation.get(RECORD_ID_FIELD).and_then(Value::as_str) {
            let bump = self
                .store
                .update(
                    CONVERSATIONS,
                    record_id,
                    json!({"last_activity": now, "updated_at": now}),
                )
                .await;
            if let Err(error) = bump {
                tracing::warn!(%conversation_id, %error, "failed to bump conversation activity");
            }
        }

        self.hub
            .broadcast(
                Scope::Conversation(conversation_id),
                &ChatEvent::NewMessage {
                    message: document.clone(),
                },
                None,
            )
            .await;

        if let Some(location_id) = location_id_of(&conversation) {
            self.hub
                .broadcast(
                    Scope::Location(location_id),
                    &ChatEvent::ConversationActivity {
                        conversation_id,
                        last_activity: now,
                    },
                    None,
                )
                .await;
        }

        Ok(document)
    }

    /// Soft-deletes a conversation and its messages.
    ///
    /// Only the author may delete; returns `false` when no active
    /// conversation matches the id and author. Location subscribers are
    /// notified on success.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] on persistence failure.
    pub async fn delete_conversation(
        &self,
        conversation_id: ConversationId,
        user_id: &UserId,
    ) -> Result<bool, GatewayError> {
        let filter = Filter::new()
            .eq("id", json!(conversation_id))
            .eq("author_id", json!(user_id))
            .eq("is_active", json!(true));
        let conversations = self
            .store
            .fetch(
                CONVERSATIONS,
                &filter,
                &FetchOptions {
                    limit: Some(1),
                    ..FetchOptions::default()
                },
            )
            .await?;
        let Some(conversation) = conversations.into_iter().next() else {
            return Ok(false);
        };
        let Some(record_id) = conversation.get(RECORD_ID_FIELD).and_then(Value::as_str) else {
            return Err(GatewayError::Internal(
                "stored conversation has no record id".to_string(),
            ));
        };

        let now = Utc::now();
        self.store
            .update(
                CONVERSATIONS,
                record_id,
                json!({"is_active": false, "deleted_at": now}),
            )
            .await?;
        let hidden = self
            .store
            .update_many(
                MESSAGES,
                &Filter::new().eq("conversation_id", json!(conversation_id)),
                json!({"is_deleted": true, "deleted_at": now}),
            )
            .await?;
        tracing::info!(%conversation_id, hidden_messages = hidden, "conversation deleted");

        if let Some(location_id) = location_id_of(&conversation) {
            self.hub
                .broadcast(
                    Scope::Location(location_id),
                    &ChatEvent::ConversationDeleted { conversation_id },
                    None,
                )
                .await;
        }
        Ok(true)
    }

    /// Soft-deletes a message. Only the author may delete; returns `false`
    /// when no live message matches the id and author.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] on persistence failure.
    pub async fn delete_message(
        &self,
        message_id: MessageId,
        user_id: &UserId,
    ) -> Result<bool, GatewayError> {
        let filter = Filter::new()
            .eq("id", json!(message_id))
            .eq("author_id", json!(user_id))
            .ne("is_deleted", json!(true));
        let messages = self
            .store
            .fetch(
                MESSAGES,
                &filter,
                &FetchOptions {
                    limit: Some(1),
                    ..FetchOptions::default()
                },
            )
            .await?;
        let Some(message) = messages.into_iter().next() else {
            return Ok(false);
        };
        let Some(record_id) = message.get(RECORD_ID_FIELD).and_then(Value::as_str) else {
            return Err(GatewayError::Internal(
                "stored message has no record id".to_string(),
            ));
        };

        self.store
            .update(
                MESSAGES,
                record_id,
                json!({"is_deleted": true, "deleted_at": Utc::now()}),
            )
            .await?;
        tracing::info!(%message_id, "message deleted");
        Ok(true)
    }

    /// Records that the user has read the conversation up to now.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] on persistence failure.
    pub async fn mark_conversation_read(
        &self,
        conversation_id: ConversationId,
        user_id: &UserId,
    ) -> Result<(), GatewayError> {
        let now = Utc::now();
        let filter = Filter::new()
            .eq("user_id", json!(user_id))
            .eq("conversation_id", json!(conversation_id));
        let existing = self
            .store
            .fetch(
                READ_STATE,
                &filter,
                &FetchOptions {
                    limit: Some(1),
                    ..FetchOptions::default()
                },
            )
            .await?;

        if let Some(record_id) = existing
            .first()
            .and_then(|record| record.get(RECORD_ID_FIELD))
            .and_then(Value::as_str)
        {
            self.store
                .update(
                    READ_STATE,
                    record_id,
                    json!({"last_read": now, "updated_at": now}),
                )
                .await?;
        } else {
            self.store
                .insert(
                    READ_STATE,
                    json!({
                        "user_id": user_id,
                        "conversation_id": conversation_id,
                        "last_read": now,
                        "created_at": now,
                        "updated_at": now,
                    }),
                )
                .await?;
        }
        Ok(())
    }

    async fn find_active_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Value, GatewayError> {
        let filter = Filter::new()
            .eq("id", json!(conversation_id))
            .eq("is_active", json!(true));
        let conversations = self
            .store
            .fetch(
                CONVERSATIONS,
                &filter,
                &FetchOptions {
                    limit: Some(1),
                    ..FetchOptions::default()
                },
            )
            .await?;
        conversations
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::ConversationNotFound(*conversation_id.as_uuid()))
    }

    async fn count_messages(&self, conversation_id: &str) -> Result<usize, GatewayError> {
        let filter = Filter::new()
            .eq("conversation_id", json!(conversation_id))
            .ne("is_deleted", json!(true));
        let messages = self
            .store
            .fetch(MESSAGES, &filter, &FetchOptions::default())
            .await?;
        Ok(messages.len())
    }

    async fn has_unread_messages(
        &self,
        conversation_id: &str,
        user_id: &UserId,
    ) -> Result<bool, GatewayError> {
        let filter = Filter::new()
            .eq("user_id", json!(user_id))
            .eq("conversation_id", json!(conversation_id));
        let activity = self
            .store
            .fetch(
                READ_STATE,
                &filter,
                &FetchOptions {
                    limit: Some(1),
                    ..FetchOptions::default()
                },
            )
            .await?;

        let last_read = activity
            .first()
            .and_then(|record| record.get("last_read"))
            .filter(|value| !value.is_null())
            .cloned();
        let Some(last_read) = last_read else {
            // Never opened: unread as soon as anything was posted.
            return Ok(self.count_messages(conversation_id).await? > 0);
        };

        let newer = self
            .store
            .fetch(
                MESSAGES,
                &Filter::new()
                    .eq("conversation_id", json!(conversation_id))
                    .gt("timestamp", last_read)
                    .ne("author_id", json!(user_id))
                    .ne("is_deleted", json!(true)),
                &FetchOptions {
                    limit: Some(1),
                    ..FetchOptions::default()
                },
            )
            .await?;
        Ok(!newer.is_empty())
    }

    async fn author_display_name(&self, author_id: &UserId) -> String {
        let users = self
            .store
            .fetch(
                USERS,
                &Filter::new().eq("id", json!(author_id)),
                &FetchOptions {
                    limit: Some(1),
                    ..FetchOptions::default()
                },
            )
            .await
            .unwrap_or_default();
        let Some(user) = users.first() else {
            return UNKNOWN_USER.to_string();
        };

        let display_name = user.get("display_name").and_then(Value::as_str).unwrap_or("");
        let last_name = user.get("last_name").and_then(Value::as_str).unwrap_or("");
        let full = format!("{display_name} {last_name}");
        let full = full.trim();
        if full.is_empty() {
            UNKNOWN_USER.to_string()
        } else {
            full.to_string()
        }
    }
}

/// Reads the owning location out of a conversation document.
fn location_id_of(conversation: &Value) -> Option<LocationId> {
    conversation
        .get("location_id")
        .and_then(Value::as_str)
        .and_then(|raw| raw.parse::<uuid::Uuid>().ok())
        .map(LocationId::from)
}
