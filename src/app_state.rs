//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::realtime::RealtimeHub;
use crate::service::ChatService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Chat service for conversation and message operations.
    pub chat_service: Arc<ChatService>,
    /// Realtime hub for WebSocket subscriptions and fan-out.
    pub hub: Arc<RealtimeHub>,
}
