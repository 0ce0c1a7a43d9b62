//! Axum WebSocket upgrade handlers for the two scope channels.

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::app_state::AppState;
use crate::domain::{ConversationId, LocationId, UserId};

use super::connection::{run_conversation_connection, run_location_connection};

/// Optional identity attached to a realtime subscription.
///
/// The identity is assumed to be pre-validated by the authentication layer;
/// anonymous subscriptions are allowed and simply skip presence tracking.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Already-authenticated user identifier.
    #[serde(default)]
    pub user_id: Option<String>,
}

/// `GET /chat/locations/{location_id}/ws` — subscribe to location updates.
pub async fn location_ws_handler(
    ws: WebSocketUpgrade,
    Path(location_id): Path<uuid::Uuid>,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let hub = Arc::clone(&state.hub);
    let location_id = LocationId::from_uuid(location_id);
    let user_id = query.user_id.map(UserId::from);

    ws.on_upgrade(move |socket| run_location_connection(socket, hub, location_id, user_id))
}

/// `GET /chat/conversations/{conversation_id}/ws` — subscribe to a
/// conversation.
pub async fn conversation_ws_handler(
    ws: WebSocketUpgrade,
    Path(conversation_id): Path<uuid::Uuid>,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let hub = Arc::clone(&state.hub);
    let conversation_id = ConversationId::from_uuid(conversation_id);
    let user_id = query.user_id.map(UserId::from);

    ws.on_upgrade(move |socket| {
        run_conversation_connection(socket, hub, conversation_id, user_id)
    })
}
