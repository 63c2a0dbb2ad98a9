//! Relay counters
//!
//! Tracks connection churn, publishes, subscriptions, deliveries and purge
//! activity. Counters are atomics so the transport tasks can record bytes
//! while the hub owns everything else.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Relay metrics collector
#[derive(Debug)]
pub struct RelayMetrics {
    /// Server start time
    start_time: Instant,

    /// Currently open connections
    pub active_connections: AtomicUsize,

    /// Total events received via EVENT
    pub events_received: AtomicU64,

    /// Events that superseded a persistent record
    pub events_replaced: AtomicU64,

    /// Currently registered subscriptions across all connections
    pub active_subscriptions: AtomicUsize,

    /// Total REQ commands handled
    pub subscription_requests: AtomicU64,

    /// Total subscriptions removed (CLOSE or disconnect)
    pub subscription_closes: AtomicU64,

    /// Events sent during replay
    pub events_replayed: AtomicU64,

    /// Events pushed to live subscriptions
    pub events_broadcast: AtomicU64,

    /// NOTICE frames sent
    pub notices_sent: AtomicU64,

    /// Purge cycles run
    pub purge_cycles: AtomicU64,

    /// Events dropped by purging
    pub events_expired: AtomicU64,

    /// Total bytes received
    pub bytes_received: AtomicU64,

    /// Total bytes sent
    pub bytes_sent: AtomicU64,
}

impl RelayMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            active_connections: AtomicUsize::new(0),
            events_received: AtomicU64::new(0),
            events_replaced: AtomicU64::new(0),
            active_subscriptions: AtomicUsize::new(0),
            subscription_requests: AtomicU64::new(0),
            subscription_closes: AtomicU64::new(0),
            events_replayed: AtomicU64::new(0),
            events_broadcast: AtomicU64::new(0),
            notices_sent: AtomicU64::new(0),
            purge_cycles: AtomicU64::new(0),
            events_expired: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
        }
    }

    /// Get uptime duration
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn event_received(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn event_replaced(&self) {
        self.events_replaced.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a REQ; `replaced` is true when it overwrote a same-named
    /// subscription, which leaves the active count unchanged.
    pub fn subscription_requested(&self, replaced: bool) {
        self.subscription_requests.fetch_add(1, Ordering::Relaxed);
        if !replaced {
            self.active_subscriptions.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record `count` subscriptions going away
    pub fn subscriptions_closed(&self, count: usize) {
        if count == 0 {
            return;
        }
        self.active_subscriptions.fetch_sub(count, Ordering::Relaxed);
        self.subscription_closes
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn event_replayed(&self) {
        self.events_replayed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn event_broadcast(&self) {
        self.events_broadcast.fetch_add(1, Ordering::Relaxed);
    }

    pub fn notice_sent(&self) {
        self.notices_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a purge cycle and how many events it dropped
    pub fn purged(&self, expired: usize) {
        self.purge_cycles.fetch_add(1, Ordering::Relaxed);
        self.events_expired
            .fetch_add(expired as u64, Ordering::Relaxed);
    }

    pub fn bytes_in(&self, count: u64) {
        self.bytes_received.fetch_add(count, Ordering::Relaxed);
    }

    pub fn bytes_out(&self, count: u64) {
        self.bytes_sent.fetch_add(count, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
            uptime_secs: self.uptime().as_secs(),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            events_received: self.events_received.load(Ordering::Relaxed),
            events_replaced: self.events_replaced.load(Ordering::Relaxed),
            active_subscriptions: self.active_subscriptions.load(Ordering::Relaxed),
            subscription_requests: self.subscription_requests.load(Ordering::Relaxed),
            subscription_closes: self.subscription_closes.load(Ordering::Relaxed),
            events_replayed: self.events_replayed.load(Ordering::Relaxed),
            events_broadcast: self.events_broadcast.load(Ordering::Relaxed),
            notices_sent: self.notices_sent.load(Ordering::Relaxed),
            purge_cycles: self.purge_cycles.load(Ordering::Relaxed),
            events_expired: self.events_expired.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
        }
    }
}

impl Default for RelayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsSnapshot {
    /// Unix timestamp when snapshot was taken
    pub timestamp: u64,
    pub uptime_secs: u64,
    pub active_connections: usize,
    pub events_received: u64,
    pub events_replaced: u64,
    pub active_subscriptions: usize,
    pub subscription_requests: u64,
    pub subscription_closes: u64,
    pub events_replayed: u64,
    pub events_broadcast: u64,
    pub notices_sent: u64,
    pub purge_cycles: u64,
    pub events_expired: u64,
    pub bytes_received: u64,
    pub bytes_sent: u64,
}

impl MetricsSnapshot {
    /// Calculate events per second rate
    pub fn events_per_second(&self) -> f64 {
        if self.uptime_secs == 0 {
            0.0
        } else {
            self.events_received as f64 / self.uptime_secs as f64
        }
    }

    /// Calculate average subscriptions per connection
    pub fn avg_subscriptions_per_connection(&self) -> f64 {
        if self.active_connections == 0 {
            0.0
        } else {
            self.active_subscriptions as f64 / self.active_connections as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_tracking() {
        let metrics = RelayMetrics::new();

        metrics.connection_opened();
        metrics.connection_opened();
        assert_eq!(metrics.active_connections.load(Ordering::Relaxed), 2);

        metrics.connection_closed();
        assert_eq!(metrics.active_connections.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_subscription_tracking() {
        let metrics = RelayMetrics::new();

        metrics.subscription_requested(false);
        metrics.subscription_requested(false);
        metrics.subscription_requested(true);
        assert_eq!(metrics.active_subscriptions.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.subscription_requests.load(Ordering::Relaxed), 3);

        metrics.subscriptions_closed(2);
        metrics.subscriptions_closed(0);
        assert_eq!(metrics.active_subscriptions.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.subscription_closes.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_snapshot() {
        let metrics = RelayMetrics::new();

        metrics.connection_opened();
        metrics.event_received();
        metrics.event_broadcast();
        metrics.purged(4);
        metrics.bytes_in(10);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.active_connections, 1);
        assert_eq!(snapshot.events_received, 1);
        assert_eq!(snapshot.events_broadcast, 1);
        assert_eq!(snapshot.purge_cycles, 1);
        assert_eq!(snapshot.events_expired, 4);
        assert_eq!(snapshot.bytes_received, 10);
    }

    #[test]
    fn test_metrics_calculations() {
        let snapshot = MetricsSnapshot {
            timestamp: 0,
            uptime_secs: 100,
            active_connections: 10,
            events_received: 1000,
            events_replaced: 0,
            active_subscriptions: 50,
            subscription_requests: 100,
            subscription_closes: 50,
            events_replayed: 0,
            events_broadcast: 0,
            notices_sent: 0,
            purge_cycles: 0,
            events_expired: 0,
            bytes_received: 0,
            bytes_sent: 0,
        };

        assert_eq!(snapshot.events_per_second(), 10.0);
        assert_eq!(snapshot.avg_subscriptions_per_connection(), 5.0);
    }
}
