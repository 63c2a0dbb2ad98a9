//! In-memory event store.
//!
//! Events live in three partitions:
//!
//! - **live**: recently published events, rotated out by every purge cycle
//! - **retired**: the live partition as it was at the previous purge, kept for
//!   one more interval so replay right after a purge still sees it
//! - **persistent**: one replaceable event per publisher, never purged
//!
//! Replay walks live, then retired, then persistent, each in insertion order.

use crate::config::DEFAULT_REPLACEABLE_KIND;
use crate::event::Event;
use std::mem;

/// Store behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Keep the previous live partition for one extra purge interval
    pub retain_retired: bool,
    /// Route the replaceable kind to the persistent partition
    pub persist_replaceable: bool,
    /// Kind treated as replaceable
    pub replaceable_kind: u16,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            retain_retired: true,
            persist_replaceable: true,
            replaceable_kind: DEFAULT_REPLACEABLE_KIND,
        }
    }
}

/// Partition an appended event ended up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Live,
    /// Stored in the persistent partition; `replaced` is true when it
    /// superseded an earlier event from the same publisher.
    Persistent { replaced: bool },
}

/// Counts reported by a purge cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeOutcome {
    /// Events moved from live to retired
    pub retired: usize,
    /// Events dropped for good
    pub expired: usize,
}

/// Event store with live, retired and persistent partitions
#[derive(Debug, Default)]
pub struct EventStore {
    options: StoreOptions,
    live: Vec<Event>,
    retired: Vec<Event>,
    persistent: Vec<Event>,
}

impl EventStore {
    /// Create an empty store
    pub fn new(options: StoreOptions) -> Self {
        Self {
            options,
            live: Vec::new(),
            retired: Vec::new(),
            persistent: Vec::new(),
        }
    }

    /// Whether the event goes to the persistent partition
    pub fn is_replaceable(&self, event: &Event) -> bool {
        self.options.persist_replaceable && event.kind == self.options.replaceable_kind
    }

    /// Store an event in the live partition, or route it to [`replace`]
    /// when its kind is replaceable.
    ///
    /// [`replace`]: EventStore::replace
    pub fn append(&mut self, event: Event) -> Placement {
        if self.is_replaceable(&event) {
            let replaced = self.replace(event).is_some();
            return Placement::Persistent { replaced };
        }
        self.live.push(event);
        Placement::Live
    }

    /// Store an event in the persistent partition, superseding the existing
    /// record from the same publisher in place. Returns the superseded event.
    pub fn replace(&mut self, event: Event) -> Option<Event> {
        match self
            .persistent
            .iter_mut()
            .find(|existing| existing.pubkey == event.pubkey)
        {
            Some(slot) => Some(mem::replace(slot, event)),
            None => {
                self.persistent.push(event);
                None
            }
        }
    }

    /// Rotate the live partition into retired, dropping the previously
    /// retired events. Without a retired window the live events are dropped
    /// directly. The persistent partition is untouched.
    pub fn purge_cycle(&mut self) -> PurgeOutcome {
        let live = mem::take(&mut self.live);
        if self.options.retain_retired {
            let dropped = mem::replace(&mut self.retired, live);
            PurgeOutcome {
                retired: self.retired.len(),
                expired: dropped.len(),
            }
        } else {
            self.retired.clear();
            PurgeOutcome {
                retired: 0,
                expired: live.len(),
            }
        }
    }

    /// All replayable events: live, then retired, then persistent.
    pub fn snapshot_for_replay(&self) -> impl Iterator<Item = &Event> {
        self.live
            .iter()
            .chain(self.retired.iter())
            .chain(self.persistent.iter())
    }

    /// Number of events in the live partition
    pub fn live_len(&self) -> usize {
        self.live.len()
    }

    /// Number of events in the retired partition
    pub fn retired_len(&self) -> usize {
        self.retired.len()
    }

    /// Number of events in the persistent partition
    pub fn persistent_len(&self) -> usize {
        self.persistent.len()
    }

    /// Total number of replayable events
    pub fn len(&self) -> usize {
        self.live.len() + self.retired.len() + self.persistent.len()
    }

    /// Whether the store holds no events
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str, pubkey: &str, kind: u16) -> Event {
        Event {
            id: id.to_string(),
            pubkey: pubkey.to_string(),
            created_at: 1700000000,
            kind,
            tags: vec![],
            content: format!("content of {id}"),
            sig: "sig".to_string(),
            extra: Default::default(),
        }
    }

    fn ids(store: &EventStore) -> Vec<&str> {
        store.snapshot_for_replay().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn test_append_goes_to_live() {
        let mut store = EventStore::new(StoreOptions::default());
        assert_eq!(store.append(event("a", "pk", 1)), Placement::Live);
        assert_eq!(store.live_len(), 1);
        assert_eq!(store.persistent_len(), 0);
    }

    #[test]
    fn test_replaceable_kind_is_routed_to_persistent() {
        let mut store = EventStore::new(StoreOptions::default());
        let placement = store.append(event("a", "pk", DEFAULT_REPLACEABLE_KIND));
        assert_eq!(placement, Placement::Persistent { replaced: false });
        assert_eq!(store.live_len(), 0);
        assert_eq!(store.persistent_len(), 1);
    }

    #[test]
    fn test_replace_keeps_one_record_per_publisher() {
        let mut store = EventStore::new(StoreOptions::default());
        store.append(event("first", "alice", DEFAULT_REPLACEABLE_KIND));
        store.append(event("bob", "bob", DEFAULT_REPLACEABLE_KIND));
        let placement = store.append(event("second", "alice", DEFAULT_REPLACEABLE_KIND));

        assert_eq!(placement, Placement::Persistent { replaced: true });
        assert_eq!(store.persistent_len(), 2);
        // Overwritten in place, so alice's slot stays ahead of bob's
        assert_eq!(ids(&store), vec!["second", "bob"]);
    }

    #[test]
    fn test_replace_returns_superseded_event() {
        let mut store = EventStore::new(StoreOptions::default());
        assert!(store.replace(event("old", "alice", DEFAULT_REPLACEABLE_KIND)).is_none());
        let old = store.replace(event("new", "alice", DEFAULT_REPLACEABLE_KIND));
        assert_eq!(old.map(|e| e.id), Some("old".to_string()));
    }

    #[test]
    fn test_persistence_disabled_keeps_replaceable_in_live() {
        let mut store = EventStore::new(StoreOptions {
            persist_replaceable: false,
            ..StoreOptions::default()
        });
        assert_eq!(
            store.append(event("a", "pk", DEFAULT_REPLACEABLE_KIND)),
            Placement::Live
        );
        store.append(event("b", "pk", DEFAULT_REPLACEABLE_KIND));
        assert_eq!(store.live_len(), 2);
        assert_eq!(store.persistent_len(), 0);
    }

    #[test]
    fn test_purge_rotates_live_into_retired() {
        let mut store = EventStore::new(StoreOptions::default());
        store.append(event("a", "pk", 1));
        store.append(event("p", "pk", DEFAULT_REPLACEABLE_KIND));

        let outcome = store.purge_cycle();
        assert_eq!(outcome, PurgeOutcome { retired: 1, expired: 0 });
        assert_eq!(store.live_len(), 0);
        assert_eq!(store.retired_len(), 1);
        assert_eq!(ids(&store), vec!["a", "p"]);

        store.append(event("b", "pk", 1));
        assert_eq!(ids(&store), vec!["b", "a", "p"]);

        let outcome = store.purge_cycle();
        assert_eq!(outcome, PurgeOutcome { retired: 1, expired: 1 });
        assert_eq!(ids(&store), vec!["b", "p"]);

        store.purge_cycle();
        assert_eq!(ids(&store), vec!["p"]);
    }

    #[test]
    fn test_purge_without_retired_window_drops_live() {
        let mut store = EventStore::new(StoreOptions {
            retain_retired: false,
            ..StoreOptions::default()
        });
        store.append(event("a", "pk", 1));
        store.append(event("b", "pk", 1));

        let outcome = store.purge_cycle();
        assert_eq!(outcome, PurgeOutcome { retired: 0, expired: 2 });
        assert!(store.is_empty());
    }

    #[test]
    fn test_snapshot_order_is_live_retired_persistent() {
        let mut store = EventStore::new(StoreOptions::default());
        store.append(event("p1", "alice", DEFAULT_REPLACEABLE_KIND));
        store.append(event("r1", "pk", 1));
        store.append(event("r2", "pk", 1));
        store.purge_cycle();
        store.append(event("l1", "pk", 1));
        store.append(event("p2", "bob", DEFAULT_REPLACEABLE_KIND));

        assert_eq!(ids(&store), vec!["l1", "r1", "r2", "p1", "p2"]);
        assert_eq!(store.len(), 5);
    }
}
