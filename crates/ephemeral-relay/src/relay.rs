//! Relay state machine.
//!
//! Owns the event store and the connection registry. Every inbound frame,
//! connection change and purge tick is applied here as one uninterrupted
//! step, so handlers never observe a half-updated store.
//!
//! - EVENT: store, acknowledge with OK, broadcast to matching subscriptions
//! - REQ: register the subscription, replay stored events, send EOSE
//! - CLOSE: drop the subscription (unknown names are ignored)

use crate::config::{LimitMode, RelayConfig};
use crate::connection::{ConnectionHandle, ConnectionId, ConnectionRegistry, OutboundSender};
use crate::event::Event;
use crate::filter::Filter;
use crate::message::{ClientMessage, RelayMessage};
use crate::metrics::RelayMetrics;
use crate::store::{EventStore, Placement, PurgeOutcome};
use crate::subscription::Subscription;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Sizes of the store partitions and the registry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RelayStats {
    pub live_events: usize,
    pub retired_events: usize,
    pub persistent_events: usize,
    pub connections: usize,
    pub subscriptions: usize,
}

/// The relay core
#[derive(Debug)]
pub struct Relay {
    store: EventStore,
    connections: ConnectionRegistry,
    limit_mode: LimitMode,
    metrics: Arc<RelayMetrics>,
}

impl Relay {
    /// Create a relay around an existing store
    pub fn new(store: EventStore, limit_mode: LimitMode, metrics: Arc<RelayMetrics>) -> Self {
        Self {
            store,
            connections: ConnectionRegistry::new(),
            limit_mode,
            metrics,
        }
    }

    /// Create an empty relay from configuration
    pub fn from_config(config: &RelayConfig, metrics: Arc<RelayMetrics>) -> Self {
        Self::new(
            EventStore::new(config.store_options()),
            config.limit_mode,
            metrics,
        )
    }

    /// The event store
    pub fn store(&self) -> &EventStore {
        &self.store
    }

    /// The open connections
    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    /// Register a newly accepted connection
    pub fn open(&mut self, id: ConnectionId, sender: OutboundSender) {
        if let Some(previous) = self.connections.insert(ConnectionHandle::new(id, sender)) {
            warn!("Connection {} registered twice, dropping old handle", id);
            self.metrics
                .subscriptions_closed(previous.subscriptions().len());
        } else {
            self.metrics.connection_opened();
        }
        info!(
            "Received new connection: {} (current connections: {})",
            id,
            self.connections.len()
        );
    }

    /// Tear down a connection and every subscription it owns
    pub fn close(&mut self, id: ConnectionId) {
        let Some(handle) = self.connections.remove(id) else {
            debug!("Close for unknown connection {}", id);
            return;
        };
        self.metrics
            .subscriptions_closed(handle.subscriptions().len());
        self.metrics.connection_closed();
        handle.request_close();
        info!("Client {} disconnected", id);
    }

    /// Handle one raw text frame from a connection
    pub fn handle_frame(&mut self, id: ConnectionId, text: &str) {
        debug!("Received message on {}", id);
        match ClientMessage::from_json(text) {
            Ok(message) => self.handle_message(id, message),
            Err(e) => {
                warn!("Could not handle message from {}: {}", id, e);
                self.notice(id, &e.to_string());
            }
        }
    }

    /// Dispatch a parsed frame
    pub fn handle_message(&mut self, id: ConnectionId, message: ClientMessage) {
        if self.connections.get(id).is_none() {
            warn!("Message for unknown connection {}", id);
            return;
        }
        match message {
            ClientMessage::Event(event) => self.handle_event(id, *event),
            ClientMessage::Req {
                subscription_id,
                filters,
            } => self.handle_subscribe(id, subscription_id, filters),
            ClientMessage::Close { subscription_id } => {
                self.handle_unsubscribe(id, &subscription_id)
            }
        }
    }

    fn handle_event(&mut self, id: ConnectionId, event: Event) {
        debug!("Event received: {} (kind {})", event.id, event.kind);
        self.metrics.event_received();

        match self.store.append(event.clone()) {
            Placement::Live => {}
            Placement::Persistent { replaced } => {
                if replaced {
                    self.metrics.event_replaced();
                }
                debug!(
                    "Stored replaceable event {} for {} (replaced: {})",
                    event.id, event.pubkey, replaced
                );
            }
        }

        if let Some(handle) = self.connections.get(id) {
            handle.send(RelayMessage::Ok {
                event_id: &event.id,
                accepted: true,
                message: "",
            });
        }

        self.broadcast(&event);
    }

    fn handle_subscribe(&mut self, id: ConnectionId, subscription_id: String, filters: Vec<Filter>) {
        let Some(handle) = self.connections.get_mut(id) else {
            return;
        };

        let replaced = handle
            .subscriptions_mut()
            .add(Subscription::new(subscription_id.clone(), filters));
        self.metrics.subscription_requested(replaced);
        info!("Added sub [{}] on {}", subscription_id, id);

        if let Some(subscription) = handle.subscriptions().get(&subscription_id) {
            for filter in &subscription.filters {
                if filter.replay_disabled() {
                    debug!(
                        "Skipping replay due to limit {:?} on subscription {}",
                        filter.limit, subscription_id
                    );
                    continue;
                }
                for event in replay(filter, self.store.snapshot_for_replay(), self.limit_mode) {
                    handle.send(RelayMessage::Event {
                        subscription_id: &subscription_id,
                        event,
                    });
                    self.metrics.event_replayed();
                }
            }
        }

        handle.send(RelayMessage::Eose {
            subscription_id: &subscription_id,
        });
    }

    fn handle_unsubscribe(&mut self, id: ConnectionId, subscription_id: &str) {
        let Some(handle) = self.connections.get_mut(id) else {
            return;
        };
        if handle.subscriptions_mut().remove(subscription_id) {
            self.metrics.subscriptions_closed(1);
            info!("Removing sub [{}] on {}", subscription_id, id);
        } else {
            debug!(
                "Attempted to close non-existent subscription {} on {}",
                subscription_id, id
            );
        }
    }

    /// Push an event to every subscription, on every connection, that
    /// matches it. One frame per matching subscription.
    fn broadcast(&self, event: &Event) {
        for handle in self.connections.iter() {
            for subscription_id in handle.subscriptions().matching(event) {
                if handle.send(RelayMessage::Event {
                    subscription_id,
                    event,
                }) {
                    self.metrics.event_broadcast();
                    debug!(
                        "Event {} sent on {} to {}",
                        event.id,
                        subscription_id,
                        handle.id()
                    );
                }
            }
        }
    }

    fn notice(&self, id: ConnectionId, message: &str) {
        if let Some(handle) = self.connections.get(id) {
            handle.send(RelayMessage::Notice { message });
            self.metrics.notice_sent();
        }
    }

    /// Run one purge cycle on the store
    pub fn purge(&mut self) -> PurgeOutcome {
        let live = self.store.live_len();
        let outcome = self.store.purge_cycle();
        self.metrics.purged(outcome.expired);
        info!(
            "Purging [{}] events ({} retired, {} expired)",
            live, outcome.retired, outcome.expired
        );
        outcome
    }

    /// Current partition and registry sizes
    pub fn stats(&self) -> RelayStats {
        RelayStats {
            live_events: self.store.live_len(),
            retired_events: self.store.retired_len(),
            persistent_events: self.store.persistent_len(),
            connections: self.connections.len(),
            subscriptions: self.connections.subscription_count(),
        }
    }
}

/// Walk stored events for one filter.
///
/// The filter's limit is a countdown. In [`LimitMode::Examined`] every event
/// looked at while the countdown is positive consumes one unit, matched or
/// not; in [`LimitMode::Matched`] only delivered events do. The walk stops
/// when the countdown reaches zero. A limit of zero or below yields nothing.
pub fn replay<'a>(
    filter: &Filter,
    events: impl IntoIterator<Item = &'a Event>,
    mode: LimitMode,
) -> Vec<&'a Event> {
    if filter.replay_disabled() {
        return Vec::new();
    }

    let mut remaining = filter.limit;
    let mut matched = Vec::new();
    for event in events {
        if remaining == Some(0) {
            break;
        }
        let is_match = filter.matches(event);
        if is_match {
            matched.push(event);
        }
        if let Some(count) = remaining.as_mut()
            && (is_match || mode == LimitMode::Examined)
        {
            *count -= 1;
        }
    }
    matched
}
