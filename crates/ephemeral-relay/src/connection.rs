//! Per-connection state and the registry of open connections.

use crate::message::RelayMessage;
use crate::subscription::SubscriptionManager;
use std::collections::HashMap;
use std::fmt;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Stable identifier of an accepted connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Allocate a fresh identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Instructions for the transport side of a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Send a text frame
    Text(String),
    /// Close the socket
    Close,
}

/// Outbound half of a connection as seen by the relay
pub type OutboundSender = mpsc::UnboundedSender<Outbound>;

/// A connection: its id, its outbound channel and its subscriptions
#[derive(Debug)]
pub struct ConnectionHandle {
    id: ConnectionId,
    sender: OutboundSender,
    subscriptions: SubscriptionManager,
}

impl ConnectionHandle {
    /// Create a handle with no subscriptions
    pub fn new(id: ConnectionId, sender: OutboundSender) -> Self {
        Self {
            id,
            sender,
            subscriptions: SubscriptionManager::new(),
        }
    }

    /// Connection identifier
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a frame for the client. Delivery is not awaited; returns false
    /// when the transport has already gone away.
    pub fn send(&self, message: RelayMessage<'_>) -> bool {
        let queued = self.sender.send(Outbound::Text(message.to_json())).is_ok();
        if !queued {
            debug!("Dropping {} for closed connection {}", message.verb(), self.id);
        }
        queued
    }

    /// Ask the transport to close the socket
    pub fn request_close(&self) {
        let _ = self.sender.send(Outbound::Close);
    }

    /// Subscriptions owned by this connection
    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }

    /// Mutable access to the subscriptions owned by this connection
    pub fn subscriptions_mut(&mut self) -> &mut SubscriptionManager {
        &mut self.subscriptions
    }
}

/// All currently open connections
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, ConnectionHandle>,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection, returning any handle previously stored under
    /// the same id
    pub fn insert(&mut self, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        self.connections.insert(handle.id(), handle)
    }

    /// Unregister a connection
    pub fn remove(&mut self, id: ConnectionId) -> Option<ConnectionHandle> {
        self.connections.remove(&id)
    }

    /// Look up a connection
    pub fn get(&self, id: ConnectionId) -> Option<&ConnectionHandle> {
        self.connections.get(&id)
    }

    /// Look up a connection mutably
    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut ConnectionHandle> {
        self.connections.get_mut(&id)
    }

    /// Iterate over all open connections
    pub fn iter(&self) -> impl Iterator<Item = &ConnectionHandle> {
        self.connections.values()
    }

    /// Total subscriptions across every connection
    pub fn subscription_count(&self) -> usize {
        self.connections
            .values()
            .map(|handle| handle.subscriptions().len())
            .sum()
    }

    /// Number of open connections
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether no connection is open
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use crate::subscription::Subscription;

    #[test]
    fn test_send_queues_text_frame() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = ConnectionHandle::new(ConnectionId::new(), tx);

        assert!(handle.send(RelayMessage::Eose { subscription_id: "s1" }));
        assert_eq!(
            rx.try_recv().unwrap(),
            Outbound::Text(r#"["EOSE","s1"]"#.to_string())
        );

        handle.request_close();
        assert_eq!(rx.try_recv().unwrap(), Outbound::Close);
    }

    #[test]
    fn test_send_after_transport_gone() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let handle = ConnectionHandle::new(ConnectionId::new(), tx);
        assert!(!handle.send(RelayMessage::Notice { message: "bye" }));
    }

    #[test]
    fn test_registry_tracks_connections() {
        let mut registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);

        registry.insert(ConnectionHandle::new(a, tx.clone()));
        registry.insert(ConnectionHandle::new(b, tx));
        assert_eq!(registry.len(), 2);

        registry
            .get_mut(a)
            .unwrap()
            .subscriptions_mut()
            .add(Subscription::new("s", vec![Filter::new()]));
        assert_eq!(registry.subscription_count(), 1);

        let removed = registry.remove(a).unwrap();
        assert_eq!(removed.subscriptions().len(), 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.subscription_count(), 0);
        assert!(registry.get(a).is_none());
        assert!(registry.remove(a).is_none());
    }
}
