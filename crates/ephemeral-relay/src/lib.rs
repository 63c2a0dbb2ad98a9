//! Ephemeral event relay
//!
//! An in-memory publish/subscribe relay for signed event records. Clients
//! publish events with `EVENT`, register filters with `REQ` and drop them
//! with `CLOSE`. Nothing is written to disk: recent events are rotated out
//! by a purge timer, and one replaceable metadata event per publisher is
//! kept for the lifetime of the process.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │   WebSocket server (tokio-tungstenite)      │
//! │   Info document (warp, optional)            │
//! └────────────────┬────────────────────────────┘
//!                  │ Open / Frame / Close
//! ┌────────────────▼────────────────────────────┐
//! │   Hub task (single writer)                  │
//! │   ├─ Relay: command handlers, replay,       │
//! │   │         broadcaster                     │
//! │   ├─ EventStore: live / retired / persistent│
//! │   └─ ConnectionRegistry                     │
//! └────────────────┬────────────────────────────┘
//!                  │ ticks
//! ┌────────────────▼────────────────────────────┐
//! │   PurgeScheduler + stats ticker             │
//! └─────────────────────────────────────────────┘
//! ```

mod config;
mod connection;
mod error;
mod event;
mod filter;
mod hub;
mod message;
mod metrics;
mod purge;
mod relay;
mod relay_info;
mod server;
mod store;
mod subscription;

#[cfg(test)]
mod tests;

pub use config::{DEFAULT_PURGE_INTERVAL, DEFAULT_REPLACEABLE_KIND, LimitMode, RelayConfig};
pub use connection::{ConnectionHandle, ConnectionId, ConnectionRegistry, Outbound, OutboundSender};
pub use error::{RelayError, Result};
pub use event::Event;
pub use filter::{Filter, FilterError};
pub use hub::{HubCommand, RelayHandle, spawn_hub};
pub use message::{ClientMessage, MessageError, RelayMessage};
pub use metrics::{MetricsSnapshot, RelayMetrics};
pub use purge::PurgeScheduler;
pub use relay::{Relay, RelayStats, replay};
pub use relay_info::RelayInformation;
pub use server::RelayServer;
pub use store::{EventStore, Placement, PurgeOutcome, StoreOptions};
pub use subscription::{Subscription, SubscriptionManager};
