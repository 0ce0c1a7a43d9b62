//! Per-connection read/write loops.
//!
//! Each accepted WebSocket runs one task that multiplexes two sources with
//! `tokio::select!`: inbound frames from the client and outbound
//! [`ChatEvent`]s queued on the connection's channel by the hub. The loop
//! exits on transport close, a failed write, or a closed event channel (the
//! hub pruned the connection after a failed delivery); all three paths end
//! in the same idempotent disconnect call.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};

use crate::domain::{ChatEvent, ConversationId, LocationId, UserId};
use crate::realtime::{ConnectionHandle, RealtimeHub};

use super::messages::ClientMessage;

/// Runs the read/write loop for a location-scope connection.
///
/// Inbound contract: the literal text `ping` is answered with the literal
/// text `pong`; everything else is ignored.
pub async fn run_location_connection(
    socket: WebSocket,
    hub: Arc<RealtimeHub>,
    location_id: LocationId,
    user_id: Option<UserId>,
) {
    let (handle, mut events) = ConnectionHandle::channel();
    let connection = handle.id();
    hub.connect_to_location(location_id, handle, user_id).await;

    let (mut ws_tx, mut ws_rx) = socket.split();
    loop {
        tokio::select! {
            inbound = ws_rx.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        if text.trim() == "ping"
                            && ws_tx.send(Message::text("pong")).await.is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
            event = events.recv() => {
                match event {
                    Some(event) => {
                        let json = serde_json::to_string(&event).unwrap_or_default();
                        if ws_tx.send(Message::text(json)).await.is_err() {
                            break;
                        }
                    }
                    // The hub already pruned this connection.
                    None => break,
                }
            }
        }
    }

    hub.disconnect_from_location(location_id, connection).await;
    tracing::debug!(%location_id, %connection, "location ws closed");
}

/// Runs the read/write loop for a conversation-scope connection.
///
/// Inbound contract: JSON control messages; `typing` is relayed to the
/// other subscribers, `ping` gets a `pong` back to the sender only, and
/// malformed input is ignored.
pub async fn run_conversation_connection(
    socket: WebSocket,
    hub: Arc<RealtimeHub>,
    conversation_id: ConversationId,
    user_id: Option<UserId>,
) {
    let (handle, mut events) = ConnectionHandle::channel();
    let connection = handle.id();
    hub.connect_to_conversation(conversation_id, handle, user_id)
        .await;

    let (mut ws_tx, mut ws_rx) = socket.split();
    loop {
        tokio::select! {
            inbound = ws_rx.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::Typing {
                                user_id,
                                user_name,
                                is_typing,
                            }) => {
                                hub.typing(
                                    conversation_id,
                                    connection,
                                    user_id,
                                    user_name,
                                    is_typing,
                                )
                                .await;
                            }
                            Ok(ClientMessage::Ping) => {
                                let pong =
                                    serde_json::to_string(&ChatEvent::Pong).unwrap_or_default();
                                if ws_tx.send(Message::text(pong)).await.is_err() {
                                    break;
                                }
                            }
                            Err(_) => {
                                tracing::debug!(%conversation_id, "ignoring malformed inbound message");
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
            event = events.recv() => {
                match event {
                    Some(event) => {
                        let json = serde_json::to_string(&event).unwrap_or_default();
                        if ws_tx.send(Message::text(json)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    hub.disconnect_from_conversation(conversation_id, connection)
        .await;
    tracing::debug!(%conversation_id, %connection, "conversation ws closed");
}
