//! Scope-keyed connection registry with presence tracking.
//!
//! [`ConnectionRegistry`] owns three maps behind a single
//! [`tokio::sync::RwLock`]: scope → subscribed connections, connection →
//! user, and conversation → per-user presence counts. One lock domain keeps
//! the two-step sequences ("set became empty → delete the scope entry")
//! atomic under concurrent connects and disconnects.
//!
//! Invariant: a scope key exists in the map if and only if at least one
//! connection is subscribed to it. Empty entries are removed inside the same
//! write-lock section that emptied them.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use serde::Serialize;
use tokio::sync::{RwLock, mpsc};

use crate::domain::{ChatEvent, ConnectionId, ConversationId, Scope, UserId};

/// Outbound handle for one live client connection.
///
/// Wraps the sending half of the connection's unbounded event channel. The
/// transport task owns the receiving half and serializes events onto the
/// wire, so pushing an event here never blocks on a slow peer.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    sender: mpsc::UnboundedSender<ChatEvent>,
}

impl ConnectionHandle {
    /// Creates a handle around the sending half of an event channel.
    #[must_use]
    pub fn new(sender: mpsc::UnboundedSender<ChatEvent>) -> Self {
        Self {
            id: ConnectionId::new(),
            sender,
        }
    }

    /// Creates a handle together with the receiving half of its channel.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ChatEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }

    /// Returns the connection's unique identity.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queues an event on the connection's outbound channel.
    ///
    /// Returns `false` when the receiving task is gone, which marks the
    /// connection as dead for the caller.
    pub fn send(&self, event: ChatEvent) -> bool {
        self.sender.send(event).is_ok()
    }
}

/// Outcome of removing a connection from a scope.
#[derive(Debug, Clone)]
pub struct Departure {
    /// User the departing connection was identified as, if any.
    pub user_id: Option<UserId>,
    /// Distinct users still present after the removal (conversation scopes);
    /// remaining subscriber count for location scopes.
    pub active_users: usize,
}

/// Connection statistics for monitoring.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    /// Connections subscribed to location scopes.
    pub total_location_connections: usize,
    /// Connections subscribed to conversation scopes.
    pub total_conversation_connections: usize,
    /// Location scopes with at least one subscriber.
    pub active_locations: usize,
    /// Conversation scopes with at least one subscriber.
    pub active_conversations: usize,
    /// Connections with a known user identity.
    pub total_users: usize,
}

#[derive(Debug, Default)]
struct RegistryInner {
    /// Subscriber sets, keyed by scope. Present iff non-empty.
    scopes: HashMap<Scope, HashMap<ConnectionId, ConnectionHandle>>,
    /// Connection → user index, populated on identified subscribes.
    users: HashMap<ConnectionId, UserId>,
    /// Per-conversation presence: user → number of that user's connections.
    presence: HashMap<ConversationId, HashMap<UserId, usize>>,
}

/// Tracks which connections are subscribed to which scopes.
///
/// # Concurrency
///
/// All mutations and the snapshot read used by broadcasts run under one
/// `RwLock` over the whole inner state, so membership checks, presence
/// accounting, and empty-scope removal cannot interleave.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    inner: RwLock<RegistryInner>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection to a scope's subscriber set.
    ///
    /// Lazily creates the scope entry. A duplicate subscribe of the same
    /// connection is an idempotent no-op: membership is keyed by connection
    /// identity and presence is never double-counted. When `user_id` is
    /// given it is recorded in the connection → user index and, for
    /// conversation scopes, joins that conversation's present-user set.
    ///
    /// Returns the scope's current activity count: distinct present users
    /// for conversation scopes, subscriber count for location scopes.
    pub async fn subscribe(
        &self,
        scope: Scope,
        handle: ConnectionHandle,
        user_id: Option<UserId>,
    ) -> usize {
        let connection = handle.id();
        let mut inner = self.inner.write().await;

        let newly_added = match inner.scopes.entry(scope).or_default().entry(connection) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(handle);
                true
            }
        };

        if newly_added && let Some(user) = user_id {
            inner.users.insert(connection, user.clone());
            if let Scope::Conversation(conversation_id) = scope {
                *inner
                    .presence
                    .entry(conversation_id)
                    .or_default()
                    .entry(user)
                    .or_insert(0) += 1;
            }
        }

        match scope {
            Scope::Location(_) => inner.scopes.get(&scope).map_or(0, HashMap::len),
            Scope::Conversation(conversation_id) => {
                inner.presence.get(&conversation_id).map_or(0, HashMap::len)
            }
        }
    }

    /// Removes a connection from a scope's subscriber set.
    ///
    /// Deletes the scope entry when the set empties, drops the connection's
    /// user-index entry, and decrements the conversation's presence count
    /// for that user. Safe to call for a connection that is not subscribed:
    /// the call is an idempotent no-op returning `None`.
    pub async fn unsubscribe(&self, scope: Scope, connection: ConnectionId) -> Option<Departure> {
        let mut inner = self.inner.write().await;

        let connections = inner.scopes.get_mut(&scope)?;
        connections.remove(&connection)?;
        let emptied = connections.is_empty();
        if emptied {
            inner.scopes.remove(&scope);
        }

        let user_id = inner.users.remove(&connection);

        let active_users = match scope {
            Scope::Conversation(conversation_id) => {
                if let Some(user) = &user_id
                    && let Some(present) = inner.presence.get_mut(&conversation_id)
                {
                    if let Some(count) = present.get_mut(user) {
                        *count = count.saturating_sub(1);
                        if *count == 0 {
                            present.remove(user);
                        }
                    }
                    if present.is_empty() {
                        inner.presence.remove(&conversation_id);
                    }
                }
                if emptied {
                    inner.presence.remove(&conversation_id);
                }
                inner.presence.get(&conversation_id).map_or(0, HashMap::len)
            }
            Scope::Location(_) => inner.scopes.get(&scope).map_or(0, HashMap::len),
        };

        Some(Departure {
            user_id,
            active_users,
        })
    }

    /// Returns the number of connections subscribed to a scope.
    ///
    /// Returns 0 for a scope with no subscribers; such scopes have no
    /// registry entry at all.
    pub async fn subscriber_count(&self, scope: Scope) -> usize {
        self.inner
            .read()
            .await
            .scopes
            .get(&scope)
            .map_or(0, HashMap::len)
    }

    /// Returns the number of distinct users present in a conversation.
    pub async fn present_user_count(&self, conversation_id: ConversationId) -> usize {
        self.inner
            .read()
            .await
            .presence
            .get(&conversation_id)
            .map_or(0, HashMap::len)
    }

    /// Returns an owned snapshot of a scope's current subscribers.
    ///
    /// The snapshot is taken atomically with respect to concurrent
    /// subscribes and unsubscribes; deliveries then happen outside the lock.
    pub async fn snapshot(&self, scope: Scope) -> Vec<ConnectionHandle> {
        self.inner
            .read()
            .await
            .scopes
            .get(&scope)
            .map_or_else(Vec::new, |connections| {
                connections.values().cloned().collect()
            })
    }

    /// Returns connection statistics for monitoring.
    pub async fn stats(&self) -> RegistryStats {
        let inner = self.inner.read().await;
        let mut stats = RegistryStats {
            total_location_connections: 0,
            total_conversation_connections: 0,
            active_locations: 0,
            active_conversations: 0,
            total_users: inner.users.len(),
        };
        for (scope, connections) in &inner.scopes {
            match scope {
                Scope::Location(_) => {
                    stats.active_locations += 1;
                    stats.total_location_connections += connections.len();
                }
                Scope::Conversation(_) => {
                    stats.active_conversations += 1;
                    stats.total_conversation_connections += connections.len();
                }
            }
        }
        stats
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::LocationId;

    fn conversation_scope() -> (Scope, ConversationId) {
        let id = ConversationId::new();
        (Scope::Conversation(id), id)
    }

    #[tokio::test]
    async fn subscribe_creates_scope_lazily() {
        let registry = ConnectionRegistry::new();
        let scope = Scope::Location(LocationId::new());
        assert_eq!(registry.subscriber_count(scope).await, 0);

        let (handle, _rx) = ConnectionHandle::channel();
        registry.subscribe(scope, handle, None).await;
        assert_eq!(registry.subscriber_count(scope).await, 1);
    }

    #[tokio::test]
    async fn last_unsubscribe_removes_scope_entry() {
        let registry = ConnectionRegistry::new();
        let (scope, _) = conversation_scope();
        let (a, _rx_a) = ConnectionHandle::channel();
        let (b, _rx_b) = ConnectionHandle::channel();

        registry.subscribe(scope, a.clone(), None).await;
        registry.subscribe(scope, b.clone(), None).await;
        assert_eq!(registry.subscriber_count(scope).await, 2);

        registry.unsubscribe(scope, a.id()).await;
        assert_eq!(registry.subscriber_count(scope).await, 1);

        registry.unsubscribe(scope, b.id()).await;
        assert_eq!(registry.subscriber_count(scope).await, 0);
        assert!(registry.snapshot(scope).await.is_empty());
    }

    #[tokio::test]
    async fn duplicate_subscribe_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (scope, conversation_id) = conversation_scope();
        let (handle, _rx) = ConnectionHandle::channel();

        let first = registry
            .subscribe(scope, handle.clone(), Some(UserId::from("u1")))
            .await;
        let second = registry
            .subscribe(scope, handle, Some(UserId::from("u1")))
            .await;

        assert_eq!(first, 1);
        assert_eq!(second, 1);
        assert_eq!(registry.subscriber_count(scope).await, 1);
        assert_eq!(registry.present_user_count(conversation_id).await, 1);
    }

    #[tokio::test]
    async fn unsubscribe_unknown_connection_is_noop() {
        let registry = ConnectionRegistry::new();
        let (scope, _) = conversation_scope();
        let (handle, _rx) = ConnectionHandle::channel();

        assert!(registry.unsubscribe(scope, handle.id()).await.is_none());

        registry
            .subscribe(scope, handle.clone(), Some(UserId::from("u1")))
            .await;
        let first = registry.unsubscribe(scope, handle.id()).await;
        assert!(first.is_some());
        let second = registry.unsubscribe(scope, handle.id()).await;
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn same_user_on_two_connections_counts_once() {
        let registry = ConnectionRegistry::new();
        let (scope, conversation_id) = conversation_scope();
        let (a, _rx_a) = ConnectionHandle::channel();
        let (b, _rx_b) = ConnectionHandle::channel();

        registry
            .subscribe(scope, a.clone(), Some(UserId::from("u1")))
            .await;
        registry
            .subscribe(scope, b.clone(), Some(UserId::from("u1")))
            .await;
        assert_eq!(registry.present_user_count(conversation_id).await, 1);

        // One of the two connections leaves; the user is still present.
        let departure = registry.unsubscribe(scope, b.id()).await;
        let Some(departure) = departure else {
            panic!("expected a departure");
        };
        assert_eq!(departure.active_users, 1);
        assert_eq!(registry.present_user_count(conversation_id).await, 1);

        let departure = registry.unsubscribe(scope, a.id()).await;
        let Some(departure) = departure else {
            panic!("expected a departure");
        };
        assert_eq!(departure.active_users, 0);
        assert_eq!(registry.present_user_count(conversation_id).await, 0);
    }

    #[tokio::test]
    async fn departure_reports_user_identity() {
        let registry = ConnectionRegistry::new();
        let (scope, _) = conversation_scope();
        let (identified, _rx_a) = ConnectionHandle::channel();
        let (anonymous, _rx_b) = ConnectionHandle::channel();

        registry
            .subscribe(scope, identified.clone(), Some(UserId::from("u1")))
            .await;
        registry.subscribe(scope, anonymous.clone(), None).await;

        let departure = registry.unsubscribe(scope, identified.id()).await;
        let Some(departure) = departure else {
            panic!("expected a departure");
        };
        assert_eq!(departure.user_id, Some(UserId::from("u1")));

        let departure = registry.unsubscribe(scope, anonymous.id()).await;
        let Some(departure) = departure else {
            panic!("expected a departure");
        };
        assert_eq!(departure.user_id, None);
    }

    #[tokio::test]
    async fn snapshot_excludes_other_scopes() {
        let registry = ConnectionRegistry::new();
        let (scope_a, _) = conversation_scope();
        let (scope_b, _) = conversation_scope();
        let (a, _rx_a) = ConnectionHandle::channel();
        let (b, _rx_b) = ConnectionHandle::channel();

        registry.subscribe(scope_a, a.clone(), None).await;
        registry.subscribe(scope_b, b.clone(), None).await;

        let snapshot = registry.snapshot(scope_a).await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.first().map(ConnectionHandle::id), Some(a.id()));
    }

    #[tokio::test]
    async fn stats_count_scopes_and_users() {
        let registry = ConnectionRegistry::new();
        let location = Scope::Location(LocationId::new());
        let (conversation, _) = conversation_scope();
        let (a, _rx_a) = ConnectionHandle::channel();
        let (b, _rx_b) = ConnectionHandle::channel();
        let (c, _rx_c) = ConnectionHandle::channel();

        registry
            .subscribe(location, a, Some(UserId::from("u1")))
            .await;
        registry
            .subscribe(conversation, b, Some(UserId::from("u2")))
            .await;
        registry.subscribe(conversation, c, None).await;

        let stats = registry.stats().await;
        assert_eq!(stats.total_location_connections, 1);
        assert_eq!(stats.total_conversation_connections, 2);
        assert_eq!(stats.active_locations, 1);
        assert_eq!(stats.active_conversations, 1);
        assert_eq!(stats.total_users, 2);
    }
}
