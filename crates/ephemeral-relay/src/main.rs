//! Ephemeral relay server
//!
//! # Usage
//!
//! ```bash
//! # Defaults: ws://127.0.0.1:3001, purge every 100 seconds
//! cargo run --bin ephemeral-relay
//!
//! # Serve the info document as well, purge every 2 minutes
//! cargo run --bin ephemeral-relay -- \
//!   --bind 0.0.0.0:3001 \
//!   --info-bind 0.0.0.0:3002 \
//!   --purge-interval 120
//!
//! # Stripped-down relay: no retired window, no persistent partition
//! cargo run --bin ephemeral-relay -- --compact
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use ephemeral_relay::{LimitMode, RelayConfig, RelayServer, spawn_hub};
use tracing::{error, info};

/// How a filter's `limit` is consumed during replay.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum LimitArg {
    /// Every stored event examined counts against the limit
    Examined,
    /// Only delivered events count against the limit
    Matched,
}

impl From<LimitArg> for LimitMode {
    fn from(arg: LimitArg) -> Self {
        match arg {
            LimitArg::Examined => LimitMode::Examined,
            LimitArg::Matched => LimitMode::Matched,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "ephemeral-relay", version, about = "In-memory event relay")]
struct Cli {
    /// WebSocket listen address
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// HTTP address for the relay information document
    #[arg(long)]
    info_bind: Option<SocketAddr>,

    /// Purge period in seconds (0 disables purging)
    #[arg(long)]
    purge_interval: Option<u64>,

    /// Start from the compact profile (no retired window, no persistence)
    #[arg(long)]
    compact: bool,

    /// Drop expired events at once instead of keeping them one more period
    #[arg(long)]
    no_retired: bool,

    /// Treat replaceable events like any other event
    #[arg(long)]
    no_persistent: bool,

    /// Replay limit semantics
    #[arg(long, value_enum)]
    limit_mode: Option<LimitArg>,

    /// Close connections idle for this many seconds
    #[arg(long)]
    idle_timeout: Option<u64>,
}

impl Cli {
    fn into_config(self) -> RelayConfig {
        let mut config = if self.compact {
            RelayConfig::compact()
        } else {
            RelayConfig::default()
        };

        if let Some(bind) = self.bind {
            config.bind_addr = bind;
        }
        if self.info_bind.is_some() {
            config.info_addr = self.info_bind;
        }
        if let Some(secs) = self.purge_interval {
            config.purge_interval = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if self.no_retired {
            config.retain_retired = false;
        }
        if self.no_persistent {
            config.persist_replaceable = false;
        }
        if let Some(mode) = self.limit_mode {
            config.limit_mode = mode.into();
        }
        if let Some(secs) = self.idle_timeout {
            config.idle_timeout = Duration::from_secs(secs);
        }
        config
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Cli::parse().into_config();
    info!(
        "Starting relay (retired window: {}, persistent: {}, limit mode: {})",
        config.retain_retired, config.persist_replaceable, config.limit_mode
    );

    let (relay, hub) = spawn_hub(&config);
    let info_addr = config.info_addr;
    let server = RelayServer::new(config, relay);

    let info_server = async {
        match info_addr {
            Some(addr) => server.start_info_server(addr).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        result = server.start() => {
            result.context("relay server stopped")?;
        }
        result = info_server => {
            result.context("info server stopped")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    // Live connections still hold hub handles, so stop the hub explicitly.
    drop(server);
    hub.abort();
    if let Err(e) = hub.await
        && !e.is_cancelled()
    {
        error!("Relay hub task failed: {}", e);
    }
    Ok(())
}
