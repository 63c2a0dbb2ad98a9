//! Relay configuration
//!
//! Defaults come from the environment where a variable is set, otherwise from
//! the built-in values. The binary layers CLI flags on top.

use crate::error::RelayError;
use crate::relay_info::RelayInformation;
use crate::store::StoreOptions;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Kind kept in the persistent partition, one per publisher
pub const DEFAULT_REPLACEABLE_KIND: u16 = 13194;

/// Default purge period
pub const DEFAULT_PURGE_INTERVAL: Duration = Duration::from_secs(100);

const DEFAULT_PORT: u16 = 3001;

/// How a filter's `limit` is consumed during replay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LimitMode {
    /// Every stored event examined uses up one unit of the limit, whether
    /// it matched or not.
    #[default]
    Examined,
    /// Only delivered (matching) events use up the limit.
    Matched,
}

impl FromStr for LimitMode {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "examined" => Ok(LimitMode::Examined),
            "matched" => Ok(LimitMode::Matched),
            other => Err(RelayError::Config(format!(
                "unknown limit mode '{other}' (expected 'examined' or 'matched')"
            ))),
        }
    }
}

impl fmt::Display for LimitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitMode::Examined => f.write_str("examined"),
            LimitMode::Matched => f.write_str("matched"),
        }
    }
}

/// Relay server configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Bind address for the WebSocket server
    pub bind_addr: SocketAddr,
    /// Bind address for the HTTP relay information endpoint
    pub info_addr: Option<SocketAddr>,
    /// Purge period; `None` disables purging
    pub purge_interval: Option<Duration>,
    /// Keep the previous live partition for one extra purge interval
    pub retain_retired: bool,
    /// Keep the latest replaceable event per publisher indefinitely
    pub persist_replaceable: bool,
    /// Kind treated as replaceable
    pub replaceable_kind: u16,
    /// Replay limit semantics
    pub limit_mode: LimitMode,
    /// Close connections that send nothing for this long
    pub idle_timeout: Duration,
    /// Maximum inbound frame size in bytes
    pub max_message_size: usize,
    /// Period of the store statistics log
    pub stats_interval: Duration,
    /// Relay information document
    pub relay_info: RelayInformation,
}

impl Default for RelayConfig {
    fn default() -> Self {
        let bind_addr = env_parse("RELAY_BIND_ADDR")
            .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)));

        let info_addr = env_parse("RELAY_INFO_ADDR");

        let purge_interval = match env_parse::<u64>("RELAY_PURGE_INTERVAL_SECS") {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => Some(DEFAULT_PURGE_INTERVAL),
        };

        let idle_timeout = env_parse::<u64>("RELAY_IDLE_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(240));

        Self {
            bind_addr,
            info_addr,
            purge_interval,
            retain_retired: env_flag("RELAY_RETAIN_RETIRED").unwrap_or(true),
            persist_replaceable: env_flag("RELAY_PERSIST_REPLACEABLE").unwrap_or(true),
            replaceable_kind: DEFAULT_REPLACEABLE_KIND,
            limit_mode: env_parse("RELAY_LIMIT_MODE").unwrap_or_default(),
            idle_timeout,
            max_message_size: 512 * 1024, // 512 KB
            stats_interval: Duration::from_secs(30),
            relay_info: RelayInformation::default(),
        }
    }
}

impl RelayConfig {
    /// Configuration of the stripped-down relay: no retired window, no
    /// persistent partition, two minute purge.
    pub fn compact() -> Self {
        Self {
            purge_interval: Some(Duration::from_secs(120)),
            retain_retired: false,
            persist_replaceable: false,
            ..Self::default()
        }
    }

    /// Store options derived from this configuration
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            retain_retired: self.retain_retired,
            persist_replaceable: self.persist_replaceable,
            replaceable_kind: self.replaceable_kind,
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_flag(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| v == "true" || v == "1")
}
