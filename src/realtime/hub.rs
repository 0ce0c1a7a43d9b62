//! Broadcast engine and presence events layered on the registry.
//!
//! [`RealtimeHub`] is the single entry point the transport and the chat
//! service use: connect/disconnect per scope kind, typing relay, and
//! [`RealtimeHub::broadcast`]. Delivery failure is the expected steady
//! state, not an exception: a connection whose channel has closed is pruned
//! from the scope as if it had disconnected, and its `user_left`
//! notification goes out to the survivors.

use std::sync::Arc;

use crate::domain::{ChatEvent, ConnectionId, ConversationId, LocationId, Scope, UserId};

use super::registry::{ConnectionHandle, ConnectionRegistry};

/// Fan-out hub for realtime events.
///
/// Cheap to share: holds only an [`Arc`] to the registry. Constructed once
/// at startup and handed to every connection handler and service.
#[derive(Debug, Clone)]
pub struct RealtimeHub {
    registry: Arc<ConnectionRegistry>,
}

impl RealtimeHub {
    /// Creates a hub over the given registry.
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Returns the underlying connection registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Subscribes a connection to location-level updates and sends the
    /// welcome payload.
    pub async fn connect_to_location(
        &self,
        location_id: LocationId,
        handle: ConnectionHandle,
        user_id: Option<UserId>,
    ) {
        let scope = Scope::Location(location_id);
        self.registry
            .subscribe(scope, handle.clone(), user_id.clone())
            .await;
        tracing::info!(user = ?user_id, %location_id, "connected to location");

        if !handle.send(ChatEvent::location_welcome(location_id)) {
            tracing::debug!(%location_id, connection = %handle.id(), "welcome send failed");
        }
    }

    /// Unsubscribes a connection from location-level updates.
    ///
    /// Idempotent: a second call for the same connection is a no-op, so the
    /// read-loop teardown and a concurrent failed-send cleanup cannot
    /// double-fire.
    pub async fn disconnect_from_location(
        &self,
        location_id: LocationId,
        connection: ConnectionId,
    ) {
        let scope = Scope::Location(location_id);
        if let Some(departure) = self.registry.unsubscribe(scope, connection).await {
            tracing::info!(user = ?departure.user_id, %location_id, "disconnected from location");
        }
    }

    /// Subscribes a connection to a conversation, sends the welcome payload,
    /// and notifies the other subscribers that the user joined.
    pub async fn connect_to_conversation(
        &self,
        conversation_id: ConversationId,
        handle: ConnectionHandle,
        user_id: Option<UserId>,
    ) {
        let scope = Scope::Conversation(conversation_id);
        let connection = handle.id();
        let active_users = self
            .registry
            .subscribe(scope, handle.clone(), user_id.clone())
            .await;
        tracing::info!(user = ?user_id, %conversation_id, active_users, "connected to conversation");

        if !handle.send(ChatEvent::conversation_welcome(conversation_id, active_users)) {
            tracing::debug!(%conversation_id, connection = %connection, "welcome send failed");
        }

        if let Some(user_id) = user_id {
            self.broadcast(
                scope,
                &ChatEvent::UserJoined {
                    user_id,
                    active_users,
                },
                Some(connection),
            )
            .await;
        }
    }

    /// Unsubscribes a connection from a conversation and notifies the
    /// remaining subscribers that the user left.
    ///
    /// Idempotent like [`Self::disconnect_from_location`]. The `user_left`
    /// notification only goes out when the departing connection had an
    /// associated user.
    pub async fn disconnect_from_conversation(
        &self,
        conversation_id: ConversationId,
        connection: ConnectionId,
    ) {
        let scope = Scope::Conversation(conversation_id);
        let Some(departure) = self.registry.unsubscribe(scope, connection).await else {
            return;
        };
        tracing::info!(
            user = ?departure.user_id,
            %conversation_id,
            active_users = departure.active_users,
            "disconnected from conversation"
        );

        if let Some(user_id) = departure.user_id {
            self.broadcast(
                scope,
                &ChatEvent::UserLeft {
                    user_id,
                    active_users: departure.active_users,
                },
                None,
            )
            .await;
        }
    }

    /// Relays a typing indicator to every other subscriber of the
    /// conversation. The sender never receives its own indicator.
    pub async fn typing(
        &self,
        conversation_id: ConversationId,
        sender: ConnectionId,
        user_id: UserId,
        user_name: String,
        is_typing: bool,
    ) {
        self.broadcast(
            Scope::Conversation(conversation_id),
            &ChatEvent::Typing {
                user_id,
                user_name,
                is_typing,
            },
            Some(sender),
        )
        .await;
    }

    /// Delivers an event to every connection subscribed to a scope, except
    /// `exclude`.
    ///
    /// Delivery iterates a snapshot taken atomically with respect to
    /// concurrent subscribes and unsubscribes. A failed delivery removes the
    /// dead connection from the scope and, for conversation scopes with a
    /// known user, queues that user's `user_left` for the survivors; the
    /// worklist drains until no delivery fails. Never returns an error to
    /// the caller.
    pub async fn broadcast(&self, scope: Scope, event: &ChatEvent, exclude: Option<ConnectionId>) {
        let mut pending = vec![(event.clone(), exclude)];

        while let Some((event, exclude)) = pending.pop() {
            let snapshot = self.registry.snapshot(scope).await;
            let mut failed = Vec::new();

            for handle in &snapshot {
                if Some(handle.id()) == exclude {
                    continue;
                }
                if !handle.send(event.clone()) {
                    tracing::warn!(
                        %scope,
                        connection = %handle.id(),
                        event = event.event_type_str(),
                        "delivery failed, scheduling connection cleanup"
                    );
                    failed.push(handle.id());
                }
            }

            for connection in failed {
                if let Some(departure) = self.registry.unsubscribe(scope, connection).await
                    && matches!(scope, Scope::Conversation(_))
                    && let Some(user_id) = departure.user_id
                {
                    pending.push((
                        ChatEvent::UserLeft {
                            user_id,
                            active_users: departure.active_users,
                        },
                        None,
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    fn make_hub() -> RealtimeHub {
        RealtimeHub::new(Arc::new(ConnectionRegistry::new()))
    }

    fn recv_type(rx: &mut mpsc::UnboundedReceiver<ChatEvent>) -> &'static str {
        let Ok(event) = rx.try_recv() else {
            panic!("expected a delivered event");
        };
        event.event_type_str()
    }

    #[tokio::test]
    async fn location_subscriber_gets_welcome() {
        let hub = make_hub();
        let location_id = LocationId::new();
        let (handle, mut rx) = ConnectionHandle::channel();

        hub.connect_to_location(location_id, handle, None).await;
        assert_eq!(recv_type(&mut rx), "connected");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn join_and_leave_notifications_follow_the_contract() {
        let hub = make_hub();
        let conversation_id = ConversationId::new();
        let (a, mut rx_a) = ConnectionHandle::channel();
        let (b, mut rx_b) = ConnectionHandle::channel();

        hub.connect_to_conversation(conversation_id, a.clone(), Some(UserId::from("u1")))
            .await;
        let Ok(ChatEvent::Connected { active_users, .. }) = rx_a.try_recv() else {
            panic!("expected a welcome for the first subscriber");
        };
        assert_eq!(active_users, Some(1));

        hub.connect_to_conversation(conversation_id, b.clone(), Some(UserId::from("u2")))
            .await;
        let Ok(ChatEvent::Connected { active_users, .. }) = rx_b.try_recv() else {
            panic!("expected a welcome for the second subscriber");
        };
        assert_eq!(active_users, Some(2));
        // B's own join is not echoed back to B.
        assert!(rx_b.try_recv().is_err());

        let Ok(ChatEvent::UserJoined {
            user_id,
            active_users,
        }) = rx_a.try_recv()
        else {
            panic!("expected user_joined for the first subscriber");
        };
        assert_eq!(user_id, UserId::from("u2"));
        assert_eq!(active_users, 2);

        hub.disconnect_from_conversation(conversation_id, b.id()).await;
        let Ok(ChatEvent::UserLeft {
            user_id,
            active_users,
        }) = rx_a.try_recv()
        else {
            panic!("expected user_left for the remaining subscriber");
        };
        assert_eq!(user_id, UserId::from("u2"));
        assert_eq!(active_users, 1);
        assert_eq!(
            hub.registry().present_user_count(conversation_id).await,
            1
        );
    }

    #[tokio::test]
    async fn typing_is_relayed_to_everyone_but_the_sender() {
        let hub = make_hub();
        let conversation_id = ConversationId::new();
        let (a, mut rx_a) = ConnectionHandle::channel();
        let (b, mut rx_b) = ConnectionHandle::channel();

        hub.connect_to_conversation(conversation_id, a.clone(), Some(UserId::from("u1")))
            .await;
        hub.connect_to_conversation(conversation_id, b.clone(), Some(UserId::from("u2")))
            .await;
        // Drain welcomes and join notifications.
        while rx_a.try_recv().is_ok() {}
        while rx_b.try_recv().is_ok() {}

        hub.typing(
            conversation_id,
            a.id(),
            UserId::from("u1"),
            "Ada".to_string(),
            true,
        )
        .await;

        let Ok(ChatEvent::Typing {
            user_id, is_typing, ..
        }) = rx_b.try_recv()
        else {
            panic!("expected typing event for the other subscriber");
        };
        assert_eq!(user_id, UserId::from("u1"));
        assert!(is_typing);
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_excludes_the_given_connection() {
        let hub = make_hub();
        let location_id = LocationId::new();
        let scope = Scope::Location(location_id);
        let (a, mut rx_a) = ConnectionHandle::channel();
        let (b, mut rx_b) = ConnectionHandle::channel();
        let (c, mut rx_c) = ConnectionHandle::channel();

        for handle in [&a, &b, &c] {
            hub.connect_to_location(location_id, handle.clone(), None).await;
        }
        while rx_a.try_recv().is_ok() {}
        while rx_b.try_recv().is_ok() {}
        while rx_c.try_recv().is_ok() {}

        let event = ChatEvent::ConversationDeleted {
            conversation_id: ConversationId::new(),
        };
        hub.broadcast(scope, &event, Some(b.id())).await;

        assert_eq!(recv_type(&mut rx_a), "conversation_deleted");
        assert_eq!(recv_type(&mut rx_c), "conversation_deleted");
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_delivery_prunes_the_connection_and_notifies_survivors() {
        let hub = make_hub();
        let conversation_id = ConversationId::new();
        let scope = Scope::Conversation(conversation_id);
        let (alive, mut rx_alive) = ConnectionHandle::channel();
        let (dead, rx_dead) = ConnectionHandle::channel();

        hub.connect_to_conversation(conversation_id, alive.clone(), Some(UserId::from("u1")))
            .await;
        hub.connect_to_conversation(conversation_id, dead.clone(), Some(UserId::from("u2")))
            .await;
        while rx_alive.try_recv().is_ok() {}

        // Simulate a dead transport: the receiving task is gone.
        drop(rx_dead);

        let event = ChatEvent::NewMessage {
            message: serde_json::json!({"id": "m1"}),
        };
        hub.broadcast(scope, &event, None).await;

        // The live subscriber still got the message, then the dead user's
        // departure.
        assert_eq!(recv_type(&mut rx_alive), "new_message");
        let Ok(ChatEvent::UserLeft {
            user_id,
            active_users,
        }) = rx_alive.try_recv()
        else {
            panic!("expected user_left after cleanup");
        };
        assert_eq!(user_id, UserId::from("u2"));
        assert_eq!(active_users, 1);

        assert_eq!(hub.registry().subscriber_count(scope).await, 1);
        assert_eq!(
            hub.registry().present_user_count(conversation_id).await,
            1
        );
    }

    #[tokio::test]
    async fn anonymous_departure_sends_no_user_left() {
        let hub = make_hub();
        let conversation_id = ConversationId::new();
        let (a, mut rx_a) = ConnectionHandle::channel();
        let (anonymous, _rx_anonymous) = ConnectionHandle::channel();

        hub.connect_to_conversation(conversation_id, a.clone(), Some(UserId::from("u1")))
            .await;
        hub.connect_to_conversation(conversation_id, anonymous.clone(), None)
            .await;
        while rx_a.try_recv().is_ok() {}

        hub.disconnect_from_conversation(conversation_id, anonymous.id())
            .await;
        assert!(rx_a.try_recv().is_err());
    }
}
