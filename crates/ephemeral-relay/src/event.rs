//! Event records as published by clients.
//!
//! The relay treats events as opaque signed payloads: the fields are decoded
//! so filters can inspect them, but the id and signature are never checked.
//! Fields the relay does not know about are carried through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A signed event record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier (hex)
    pub id: String,
    /// Publisher identity (hex public key)
    pub pubkey: String,
    /// Unix timestamp in seconds
    pub created_at: u64,
    /// Event kind
    pub kind: u16,
    /// Array of arrays of strings (tags)
    pub tags: Vec<Vec<String>>,
    /// Arbitrary string content
    pub content: String,
    /// Signature (not verified)
    pub sig: String,
    /// Any other top-level fields, re-sent exactly as published
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Event {
    /// Values of the first element after the name, for every tag called `name`.
    pub fn tag_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.tags
            .iter()
            .filter(move |tag| tag.first().is_some_and(|n| n == name))
            .filter_map(|tag| tag.get(1).map(String::as_str))
    }
}
