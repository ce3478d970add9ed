//! Event-listener ledger.
//!
//! A static document has no script engine, so listeners are declared
//! explicitly: callers (or a config file) tag elements with event names and
//! `:event(...)` checks the tags.

use ego_tree::NodeId;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct EventLedger {
    listeners: HashMap<NodeId, Vec<String>>,
}

impl EventLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `node` listens for `event`. Returns false if it already did.
    pub fn tag(&mut self, node: NodeId, event: &str) -> bool {
        let event = event.trim();
        let names = self.listeners.entry(node).or_default();
        if names.iter().any(|n| n == event) {
            return false;
        }
        names.push(event.to_string());
        true
    }

    /// Remove a listener tag. Returns whether it was present.
    pub fn untag(&mut self, node: NodeId, event: &str) -> bool {
        let Some(names) = self.listeners.get_mut(&node) else {
            return false;
        };
        let before = names.len();
        names.retain(|n| n != event.trim());
        let removed = names.len() != before;
        if names.is_empty() {
            self.listeners.remove(&node);
        }
        removed
    }

    pub fn events(&self, node: NodeId) -> &[String] {
        self.listeners.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True when `node` listens for every name in `required`.
    pub fn has_all<S: AsRef<str>>(&self, node: NodeId, required: &[S]) -> bool {
        let names = self.events(node);
        required
            .iter()
            .all(|r| names.iter().any(|n| n == r.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn node_ids() -> (NodeId, NodeId) {
        let html = Html::parse_fragment("<a></a><b></b>");
        let mut ids = html.tree.nodes().map(|n| n.id());
        (ids.next().unwrap(), ids.next().unwrap())
    }

    #[test]
    fn tag_is_idempotent() {
        let (a, _) = node_ids();
        let mut ledger = EventLedger::new();
        assert!(ledger.tag(a, "click"));
        assert!(!ledger.tag(a, "click"));
        assert_eq!(ledger.events(a), ["click".to_string()]);
    }

    #[test]
    fn has_all_requires_every_name() {
        let (a, b) = node_ids();
        let mut ledger = EventLedger::new();
        ledger.tag(a, "click");
        ledger.tag(a, "keyup");
        assert!(ledger.has_all(a, &["click", "keyup"]));
        assert!(!ledger.has_all(a, &["click", "focus"]));
        assert!(!ledger.has_all(b, &["click"]));
        assert!(ledger.has_all::<&str>(b, &[]));
    }

    #[test]
    fn untag_drops_empty_entries() {
        let (a, _) = node_ids();
        let mut ledger = EventLedger::new();
        ledger.tag(a, "click");
        assert!(ledger.untag(a, "click"));
        assert!(!ledger.untag(a, "click"));
        assert!(ledger.is_empty());
    }
}
