//! Subscription management
//!
//! Each connection owns a set of named subscriptions. A subscription is an
//! ordered list of filters; an event matches it when it matches any filter.

use crate::event::Event;
use crate::filter::Filter;
use std::collections::HashMap;

/// A client subscription
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    /// Subscription name, unique within its connection
    pub id: String,

    /// Filters for this subscription
    pub filters: Vec<Filter>,
}

impl Subscription {
    /// Create a new subscription
    pub fn new(id: impl Into<String>, filters: Vec<Filter>) -> Self {
        Self {
            id: id.into(),
            filters,
        }
    }

    /// Check if an event matches any filter in this subscription
    pub fn matches(&self, event: &Event) -> bool {
        Filter::matches_any(&self.filters, event)
    }
}

/// Manages all subscriptions for a connection
#[derive(Debug, Default, Clone)]
pub struct SubscriptionManager {
    subscriptions: HashMap<String, Subscription>,
}

impl SubscriptionManager {
    /// Create a new subscription manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscription, replacing any existing one with the same name.
    /// Returns true when an existing subscription was replaced.
    pub fn add(&mut self, subscription: Subscription) -> bool {
        self.subscriptions
            .insert(subscription.id.clone(), subscription)
            .is_some()
    }

    /// Remove a subscription
    pub fn remove(&mut self, subscription_id: &str) -> bool {
        self.subscriptions.remove(subscription_id).is_some()
    }

    /// Get a subscription by name
    pub fn get(&self, subscription_id: &str) -> Option<&Subscription> {
        self.subscriptions.get(subscription_id)
    }

    /// Names of all subscriptions that match the event
    pub fn matching<'a>(&'a self, event: &'a Event) -> impl Iterator<Item = &'a str> + 'a {
        self.subscriptions
            .values()
            .filter(move |sub| sub.matches(event))
            .map(|sub| sub.id.as_str())
    }

    /// Get number of subscriptions
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Check if there are no subscriptions
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}
