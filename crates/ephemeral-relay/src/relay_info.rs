//! Relay information document
//!
//! Static metadata served over plain HTTP with content type
//! `application/nostr+json`.

use serde::{Deserialize, Serialize};

/// Relay information document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelayInformation {
    /// Relay name
    pub name: String,

    /// Detailed description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Icon image URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    /// Administrative contact pubkey (hex)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pubkey: Option<String>,

    /// List of supported NIP numbers
    pub supported_nips: Vec<u16>,

    /// Relay software URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub software: Option<String>,

    /// Software version
    pub version: String,
}

impl RelayInformation {
    /// Create a new relay information document with defaults
    pub fn new() -> Self {
        let version = env!("CARGO_PKG_VERSION").to_string();
        Self {
            name: format!("{}-v{}", env!("CARGO_PKG_NAME"), version),
            description: Some("Ephemeral relay".to_string()),
            icon: None,
            pubkey: None,
            supported_nips: vec![1, 11],
            software: Some(env!("CARGO_PKG_NAME").to_string()),
            version,
        }
    }
}

impl Default for RelayInformation {
    fn default() -> Self {
        Self::new()
    }
}
