//! Hub task: the single owner of relay state.
//!
//! Connection tasks and timers never touch the [`Relay`] directly. They send
//! [`HubCommand`]s over an unbounded channel and the hub applies them one at
//! a time, interleaved with purge and stats ticks.

use crate::config::RelayConfig;
use crate::connection::{ConnectionId, OutboundSender};
use crate::error::{RelayError, Result};
use crate::metrics::RelayMetrics;
use crate::purge::PurgeScheduler;
use crate::relay::{Relay, RelayStats};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, info};

/// Commands applied by the hub
#[derive(Debug)]
pub enum HubCommand {
    /// A connection was accepted
    Open {
        id: ConnectionId,
        sender: OutboundSender,
    },
    /// A text frame arrived on a connection
    Frame { id: ConnectionId, text: String },
    /// A connection went away
    Close { id: ConnectionId },
    /// Report partition and registry sizes
    Stats { reply: oneshot::Sender<RelayStats> },
}

/// Cloneable handle for talking to the hub
#[derive(Debug, Clone)]
pub struct RelayHandle {
    tx: mpsc::UnboundedSender<HubCommand>,
    metrics: Arc<RelayMetrics>,
}

impl RelayHandle {
    fn command(&self, command: HubCommand) -> Result<()> {
        self.tx.send(command).map_err(|_| RelayError::HubClosed)
    }

    /// Register a connection and get its id
    pub fn open(&self, sender: OutboundSender) -> Result<ConnectionId> {
        let id = ConnectionId::new();
        self.command(HubCommand::Open { id, sender })?;
        Ok(id)
    }

    /// Forward a text frame
    pub fn frame(&self, id: ConnectionId, text: String) -> Result<()> {
        self.command(HubCommand::Frame { id, text })
    }

    /// Unregister a connection
    pub fn close(&self, id: ConnectionId) -> Result<()> {
        self.command(HubCommand::Close { id })
    }

    /// Current store and registry sizes
    pub async fn stats(&self) -> Result<RelayStats> {
        let (reply, rx) = oneshot::channel();
        self.command(HubCommand::Stats { reply })?;
        rx.await.map_err(|_| RelayError::HubClosed)
    }

    /// Shared metrics
    pub fn metrics(&self) -> Arc<RelayMetrics> {
        Arc::clone(&self.metrics)
    }
}

/// Start the hub on the current runtime. It runs until every
/// [`RelayHandle`] has been dropped.
pub fn spawn_hub(config: &RelayConfig) -> (RelayHandle, JoinHandle<()>) {
    let metrics = Arc::new(RelayMetrics::new());
    let relay = Relay::from_config(config, Arc::clone(&metrics));
    let (tx, rx) = mpsc::unbounded_channel();

    let purge = PurgeScheduler::new(config.purge_interval);
    if let Some(period) = purge.period() {
        info!("Purging events every {} seconds", period.as_secs());
    } else {
        info!("Event purging disabled");
    }

    let stats = stats_ticker(config.stats_interval);
    let task = tokio::spawn(run(relay, rx, purge, stats, Arc::clone(&metrics)));
    (RelayHandle { tx, metrics }, task)
}

/// Periodic stats log timer. A zero period disables the log.
fn stats_ticker(period: Duration) -> Option<Interval> {
    (!period.is_zero()).then(|| {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    })
}

async fn next_stats_tick(stats: &mut Option<Interval>) {
    match stats.as_mut() {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn run(
    mut relay: Relay,
    mut rx: mpsc::UnboundedReceiver<HubCommand>,
    mut purge: PurgeScheduler,
    mut stats: Option<Interval>,
    metrics: Arc<RelayMetrics>,
) {
    loop {
        tokio::select! {
            command = rx.recv() => {
                let Some(command) = command else {
                    break;
                };
                apply(&mut relay, command);
            }
            _ = purge.tick() => {
                relay.purge();
            }
            _ = next_stats_tick(&mut stats) => {
                let s = relay.stats();
                let snapshot = metrics.snapshot();
                debug!(
                    "events: [{}] purgeEvents: [{}] persistEvents: [{}] connections: [{}]",
                    s.live_events, s.retired_events, s.persistent_events, s.connections
                );
                debug!(
                    "events/s: {:.2} subs/conn: {:.2} replayed: {} broadcast: {}",
                    snapshot.events_per_second(),
                    snapshot.avg_subscriptions_per_connection(),
                    snapshot.events_replayed,
                    snapshot.events_broadcast
                );
            }
        }
    }

    debug!("Relay hub stopped");
}

fn apply(relay: &mut Relay, command: HubCommand) {
    match command {
        HubCommand::Open { id, sender } => relay.open(id, sender),
        HubCommand::Frame { id, text } => relay.handle_frame(id, &text),
        HubCommand::Close { id } => relay.close(id),
        HubCommand::Stats { reply } => {
            let _ = reply.send(relay.stats());
        }
    }
}
