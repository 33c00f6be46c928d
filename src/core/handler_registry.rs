use std::sync::Arc;

use hashbrown::HashMap;

use crate::core::continuation::Next;
use crate::core::payload::Payload;

/// Callback invoked when a step with a matching event name is dispatched
///
/// The handler receives the dispatch payload (step payload plus `prev`) and
/// the continuation. It must eventually call [`Next::resume`] or
/// [`Next::done`]; until then the chain does not advance.
pub type Handler = Arc<dyn Fn(Payload, Next) + Send + Sync>;

/// Identifies one registration within a registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Per-event ordered lists of handlers
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Vec<(HandlerId, Handler)>>,
    next_id: u64,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler for `event`, preserving registration order
    pub fn insert(&mut self, event: &str, handler: Handler) -> HandlerId {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        self.handlers
            .entry(event.to_string())
            .or_default()
            .push((id, handler));
        id
    }

    /// Remove exactly one registration; returns whether it was present
    pub fn remove(&mut self, event: &str, id: HandlerId) -> bool {
        let Some(list) = self.handlers.get_mut(event) else {
            return false;
        };

        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        let removed = list.len() != before;

        if list.is_empty() {
            self.handlers.remove(event);
        }
        removed
    }

    /// Snapshot of the handlers for `event` in registration order
    pub fn handlers_for(&self, event: &str) -> Vec<Handler> {
        self.handlers
            .get(event)
            .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.handlers.get(event).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Handler {
        Arc::new(|_payload: Payload, _next: Next| {})
    }

    #[test]
    fn remove_drops_only_the_given_registration() {
        let mut registry = HandlerRegistry::new();
        let first = registry.insert("save", noop());
        let _second = registry.insert("save", noop());

        assert!(registry.remove("save", first));
        assert!(!registry.remove("save", first));
        assert_eq!(registry.listener_count("save"), 1);
    }

    #[test]
    fn empty_lists_are_pruned() {
        let mut registry = HandlerRegistry::new();
        let id = registry.insert("save", noop());
        registry.remove("save", id);

        assert_eq!(registry.listener_count("save"), 0);
        assert!(registry.handlers_for("save").is_empty());
    }
}
