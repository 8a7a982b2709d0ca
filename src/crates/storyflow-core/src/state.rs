//! Per-runtime mutable traversal state
//!
//! The loaded project is immutable; everything a traversal mutates lives
//! here, keyed by element id. This keeps one [`Project`] sharable across
//! any number of runtimes.
//!
//! [`Project`]: storyflow_model::Project

use std::collections::HashMap;

use storyflow_model::{ElementId, FlowId, NodeId};

/// Mutable flags of one node element
///
/// `just_once` and `if_no_more` mirror the `[-]` and `[+]` authoring
/// markers; they are discovered during rendering and remembered here.
#[derive(Debug, Clone, Copy, Default)]
pub struct ElementState {
    /// The element was emitted/chosen (or hidden) this run
    pub visited: bool,
    /// `[-]`: once chosen, never offered again
    pub just_once: bool,
    /// `[+]`: held back as a fallback, offered only when nothing else is
    pub if_no_more: bool,
    /// The element was hidden because its text rendered empty
    pub was_hidden_because_empty: bool,
}

/// Element-state table keyed by element id
#[derive(Debug, Clone, Default)]
pub struct ElementStateTable {
    states: HashMap<ElementId, ElementState>,
}

impl ElementStateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of an element (default flags if never touched)
    pub fn get(&self, element_id: &str) -> ElementState {
        self.states.get(element_id).copied().unwrap_or_default()
    }

    /// Mutable state of an element, created on first touch
    pub fn get_mut(&mut self, element_id: &str) -> &mut ElementState {
        self.states.entry(element_id.to_string()).or_default()
    }

    /// Mark an element visited
    pub fn mark_visited(&mut self, element_id: &str) {
        self.get_mut(element_id).visited = true;
    }

    /// Clear the visited flag of every element of the given ids
    pub fn reset_visited(&mut self, element_ids: impl IntoIterator<Item = ElementId>) {
        for id in element_ids {
            self.get_mut(&id).visited = false;
        }
    }

    /// Drop all state (full reload)
    pub fn clear(&mut self) {
        self.states.clear();
    }
}

/// One entry of the sub-flow call stack: where to resume when the callee
/// flow terminates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubFlowFrame {
    /// Flow containing the SubFlow node
    pub flow_id: FlowId,
    /// The SubFlow node itself
    pub node_id: NodeId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untouched_elements_have_default_flags() {
        let table = ElementStateTable::new();
        let state = table.get("e1");
        assert!(!state.visited);
        assert!(!state.just_once);
        assert!(!state.if_no_more);
        assert!(!state.was_hidden_because_empty);
    }

    #[test]
    fn mark_and_reset() {
        let mut table = ElementStateTable::new();
        table.mark_visited("e1");
        table.mark_visited("e2");
        assert!(table.get("e1").visited);

        table.reset_visited(["e1".to_string(), "e2".to_string()]);
        assert!(!table.get("e1").visited);
        assert!(!table.get("e2").visited);
    }

    #[test]
    fn reset_visited_keeps_marker_flags() {
        let mut table = ElementStateTable::new();
        table.get_mut("e1").just_once = true;
        table.mark_visited("e1");
        table.reset_visited(["e1".to_string()]);
        assert!(table.get("e1").just_once);
        assert!(!table.get("e1").visited);
    }
}
