//! Subscription filters and event matching
//!
//! A filter is a set of optional constraints: ids, authors, kinds, tag values,
//! since/until bounds and a limit. Absent constraints impose no restriction;
//! present ones must all hold for an event to match.

use crate::event::Event;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors produced while decoding a filter from the wire.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("tag filter {0} must be an array of strings")]
    InvalidTagValues(String),
}

/// Event filter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(try_from = "RawFilter")]
pub struct Filter {
    /// List of event IDs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,

    /// List of publisher pubkeys
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,

    /// List of event kinds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kinds: Option<Vec<u16>>,

    /// Tag constraints keyed as on the wire (`"#e"`, `"#p"`, ...)
    #[serde(flatten)]
    pub tags: BTreeMap<String, Vec<String>>,

    /// Events must not be older than this (Unix timestamp, inclusive)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<u64>,

    /// Events must not be newer than this (Unix timestamp, inclusive)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<u64>,

    /// Maximum number of stored events to replay. Signed so that zero and
    /// negative values decode; both disable replay for the filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

/// Wire shape of a filter before tag keys are separated from unknown keys.
#[derive(Deserialize)]
struct RawFilter {
    ids: Option<Vec<String>>,
    authors: Option<Vec<String>>,
    kinds: Option<Vec<u16>>,
    since: Option<u64>,
    until: Option<u64>,
    limit: Option<i64>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

impl TryFrom<RawFilter> for Filter {
    type Error = FilterError;

    fn try_from(raw: RawFilter) -> Result<Self, Self::Error> {
        let mut tags = BTreeMap::new();
        for (key, value) in raw.extra {
            // Anything that is not a tag constraint is ignored
            if !key.starts_with('#') {
                continue;
            }
            let values: Vec<String> = serde_json::from_value(value)
                .map_err(|_| FilterError::InvalidTagValues(key.clone()))?;
            tags.insert(key, values);
        }

        Ok(Self {
            ids: raw.ids,
            authors: raw.authors,
            kinds: raw.kinds,
            tags,
            since: raw.since,
            until: raw.until,
            limit: raw.limit,
        })
    }
}

impl Filter {
    /// Create a new empty filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to the given kinds
    pub fn kinds(mut self, kinds: impl IntoIterator<Item = u16>) -> Self {
        self.kinds = Some(kinds.into_iter().collect());
        self
    }

    /// Restrict to the given authors
    pub fn authors<S: Into<String>>(mut self, authors: impl IntoIterator<Item = S>) -> Self {
        self.authors = Some(authors.into_iter().map(Into::into).collect());
        self
    }

    /// Restrict to the given event ids
    pub fn ids<S: Into<String>>(mut self, ids: impl IntoIterator<Item = S>) -> Self {
        self.ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    /// Add a tag constraint, e.g. `tag('e', ["abc"])`
    pub fn tag<S: Into<String>>(mut self, name: char, values: impl IntoIterator<Item = S>) -> Self {
        self.tags.insert(
            format!("#{name}"),
            values.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Set the replay limit
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether replay for this filter is disabled by a zero or negative limit.
    pub fn replay_disabled(&self) -> bool {
        self.limit.is_some_and(|limit| limit <= 0)
    }

    /// Check if an event matches this filter
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(ref ids) = self.ids
            && !ids.iter().any(|id| *id == event.id)
        {
            return false;
        }

        if let Some(ref authors) = self.authors
            && !authors.iter().any(|author| *author == event.pubkey)
        {
            return false;
        }

        if let Some(ref kinds) = self.kinds
            && !kinds.contains(&event.kind)
        {
            return false;
        }

        if let Some(since) = self.since
            && event.created_at < since
        {
            return false;
        }

        if let Some(until) = self.until
            && event.created_at > until
        {
            return false;
        }

        // Every tag constraint needs at least one event tag with a listed value
        self.tags.iter().all(|(key, values)| {
            let name = key.strip_prefix('#').unwrap_or(key);
            event
                .tag_values(name)
                .any(|value| values.iter().any(|v| v == value))
        })
    }

    /// Check if an event matches any of the given filters
    pub fn matches_any(filters: &[Filter], event: &Event) -> bool {
        filters.iter().any(|filter| filter.matches(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(id: &str, pubkey: &str, kind: u16, created_at: u64, tags: Vec<Vec<&str>>) -> Event {
        Event {
            id: id.to_string(),
            pubkey: pubkey.to_string(),
            created_at,
            kind,
            tags: tags
                .into_iter()
                .map(|tag| tag.into_iter().map(str::to_string).collect())
                .collect(),
            content: "test".to_string(),
            sig: "sig".to_string(),
            extra: Default::default(),
        }
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = Filter::new();
        assert!(filter.matches(&event("a", "pk", 1, 10, vec![])));
        assert!(filter.matches(&event("b", "pk2", 30023, 0, vec![vec!["t", "x"]])));
    }

    #[test]
    fn test_filter_kinds() {
        let filter = Filter::new().kinds([1, 2, 3]);
        assert!(filter.matches(&event("a", "pk", 1, 0, vec![])));
        assert!(!filter.matches(&event("a", "pk", 4, 0, vec![])));
    }

    #[test]
    fn test_filter_ids_and_authors_are_exact() {
        let ev = event("abcdef", "pubkey1", 1, 0, vec![]);

        assert!(Filter::new().ids(["abcdef"]).matches(&ev));
        assert!(!Filter::new().ids(["abc"]).matches(&ev));
        assert!(Filter::new().authors(["pubkey1"]).matches(&ev));
        assert!(!Filter::new().authors(["pubkey"]).matches(&ev));
    }

    #[test]
    fn test_empty_sets_match_nothing() {
        let ev = event("a", "pk", 1, 0, vec![]);
        assert!(!Filter::new().ids(Vec::<String>::new()).matches(&ev));
        assert!(!Filter::new().kinds([]).matches(&ev));
    }

    #[test]
    fn test_filter_since_until_inclusive() {
        let ev = event("a", "pk", 1, 100, vec![]);

        let mut filter = Filter::new();
        filter.since = Some(100);
        filter.until = Some(100);
        assert!(filter.matches(&ev));

        filter.since = Some(101);
        assert!(!filter.matches(&ev));

        filter.since = None;
        filter.until = Some(99);
        assert!(!filter.matches(&ev));
    }

    #[test]
    fn test_filter_tags() {
        let ev = event(
            "a",
            "pk",
            1,
            0,
            vec![vec!["e", "event123"], vec!["p", "pubkey456"]],
        );

        assert!(Filter::new().tag('e', ["event123"]).matches(&ev));
        assert!(Filter::new().tag('e', ["nope", "event123"]).matches(&ev));
        assert!(!Filter::new().tag('e', ["different"]).matches(&ev));
        assert!(
            !Filter::new()
                .tag('e', ["event123"])
                .tag('p', ["other"])
                .matches(&ev)
        );
        assert!(!Filter::new().tag('t', ["event123"]).matches(&ev));
    }

    #[test]
    fn test_tag_key_strips_single_hash() {
        let filter: Filter = serde_json::from_value(json!({"##e": ["x"]})).unwrap();

        let hashed = event("a", "pk", 1, 0, vec![vec!["#e", "x"]]);
        let plain = event("b", "pk", 1, 0, vec![vec!["e", "x"]]);
        assert!(filter.matches(&hashed));
        assert!(!filter.matches(&plain));
    }

    #[test]
    fn test_filter_multiple_conditions() {
        let ev = event("a", "pk", 1, 0, vec![]);
        assert!(Filter::new().kinds([1]).authors(["pk"]).matches(&ev));
        assert!(!Filter::new().kinds([2]).authors(["pk"]).matches(&ev));
    }

    #[test]
    fn test_matches_any_is_or_across_filters() {
        let ev = event("a", "pk", 2, 0, vec![]);
        let filters = vec![Filter::new().kinds([1]), Filter::new().kinds([2])];
        assert!(Filter::matches_any(&filters, &ev));
        assert!(!Filter::matches_any(&filters[..1], &ev));
        assert!(!Filter::matches_any(&[], &ev));
    }

    #[test]
    fn test_decode_wire_filter() {
        let filter: Filter = serde_json::from_value(json!({
            "kinds": [1, 13194],
            "authors": ["pk"],
            "#e": ["abc"],
            "since": 10,
            "limit": -3,
            "search": "ignored"
        }))
        .unwrap();

        assert_eq!(filter.kinds, Some(vec![1, 13194]));
        assert_eq!(filter.tags.get("#e"), Some(&vec!["abc".to_string()]));
        assert_eq!(filter.tags.len(), 1);
        assert_eq!(filter.limit, Some(-3));
        assert!(filter.replay_disabled());
    }

    #[test]
    fn test_decode_rejects_bad_tag_values() {
        let result = serde_json::from_value::<Filter>(json!({"#e": "abc"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_replay_disabled_only_for_non_positive_limit() {
        assert!(!Filter::new().replay_disabled());
        assert!(!Filter::new().limit(1).replay_disabled());
        assert!(Filter::new().limit(0).replay_disabled());
        assert!(Filter::new().limit(-1).replay_disabled());
    }

    #[test]
    fn test_serialize_omits_absent_fields() {
        let filter = Filter::new().kinds([1]).tag('p', ["x"]);
        let value = serde_json::to_value(&filter).unwrap();
        assert_eq!(value, json!({"kinds": [1], "#p": ["x"]}));
    }
}
