//! Per-connection subscription manager.
//!
//! Tracks which node IDs a WebSocket client is subscribed to and provides
//! server-side event filtering.

use std::collections::HashSet;

use crate::domain::NodeId;

/// Manages the set of node subscriptions for a single WebSocket connection.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    /// Subscribed node IDs. If `subscribe_all` is true, this set is ignored.
    node_ids: HashSet<NodeId>,
    /// Whether the client subscribes to all nodes (wildcard `"*"`).
    subscribe_all: bool,
}

impl SubscriptionManager {
    /// Creates a new empty subscription manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds node IDs to the subscription set; `wildcard` enables `"*"`.
    pub fn subscribe(&mut self, ids: &[NodeId], wildcard: bool) {
        if wildcard {
            self.subscribe_all = true;
        }
        self.node_ids.extend(ids.iter().cloned());
    }

    /// Removes node IDs from the subscription set; `wildcard` clears `"*"`.
    pub fn unsubscribe(&mut self, ids: &[NodeId], wildcard: bool) {
        if wildcard {
            self.subscribe_all = false;
        }
        for id in ids {
            self.node_ids.remove(id);
        }
    }

    /// Returns `true` if the given node matches the subscription filter.
    #[must_use]
    pub fn matches(&self, node_id: &NodeId) -> bool {
        self.subscribe_all || self.node_ids.contains(node_id)
    }

    /// Returns the number of explicitly subscribed node IDs.
    #[must_use]
    pub fn count(&self) -> usize {
        self.node_ids.len()
    }

    /// Returns `true` if the wildcard subscription is active.
    #[must_use]
    pub fn is_subscribed_all(&self) -> bool {
        self.subscribe_all
    }
}

/// Splits raw IDs into explicit node IDs and a wildcard flag.
#[must_use]
pub fn parse_targets(raw: &[String]) -> (Vec<NodeId>, bool) {
    let mut wildcard = false;
    let mut ids = Vec::with_capacity(raw.len());
    for id in raw {
        match id.as_str() {
            "*" => wildcard = true,
            "" => {}
            other => ids.push(NodeId::new(other)),
        }
    }
    (ids, wildcard)
}
