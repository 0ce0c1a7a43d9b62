//! Request and response DTOs for the REST API.

pub mod chat_dto;

pub use chat_dto::{
    AckResponse, CategoryInfo, ConversationListParams, ConversationListResponse,
    CreateConversationRequest, CreateConversationResponse, MessageListParams,
    MessageListResponse, SendMessageRequest, SendMessageResponse,
};
