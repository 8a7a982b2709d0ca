//! Element selection under a node's cycle policy
//!
//! Pure function of `(node, element states, rng)`: picks which element a
//! node plays on this visit and updates visitation in the state table.

use rand::rngs::StdRng;
use rand::Rng;
use storyflow_model::{CycleType, Node};

use crate::state::ElementStateTable;

/// Pick the element a node emits on this visit
///
/// Policies:
/// - **List** - first unvisited element; once all were played, the last
///   element repeats without further marking
/// - **Loop** - first unvisited element; exhaustion clears the node's
///   visitation and wraps to the first
/// - **Random** - uniform over all elements, no marking
/// - **SmartRandom** - uniform over unvisited elements, marking each pick;
///   exhaustion clears and starts a fresh cycle
/// - **None** - the first element (selection is host-driven, e.g. Choice)
pub fn select_element_index(
    node: &Node,
    states: &mut ElementStateTable,
    rng: &mut StdRng,
) -> Option<usize> {
    if node.elements.is_empty() {
        return None;
    }

    match node.cycle_type {
        CycleType::None => Some(0),
        CycleType::Random => Some(rng.gen_range(0..node.elements.len())),
        CycleType::List => {
            match first_unvisited(node, states) {
                Some(index) => {
                    states.mark_visited(&node.elements[index].id);
                    Some(index)
                }
                // Sticky final element
                None => Some(node.elements.len() - 1),
            }
        }
        CycleType::Loop => {
            let index = match first_unvisited(node, states) {
                Some(index) => index,
                None => {
                    reset_node(node, states);
                    0
                }
            };
            states.mark_visited(&node.elements[index].id);
            Some(index)
        }
        CycleType::SmartRandom => {
            if first_unvisited(node, states).is_none() {
                reset_node(node, states);
            }
            let unvisited: Vec<usize> = (0..node.elements.len())
                .filter(|&i| !states.get(&node.elements[i].id).visited)
                .collect();
            let index = unvisited[rng.gen_range(0..unvisited.len())];
            states.mark_visited(&node.elements[index].id);
            Some(index)
        }
    }
}

fn first_unvisited(node: &Node, states: &ElementStateTable) -> Option<usize> {
    (0..node.elements.len()).find(|&i| !states.get(&node.elements[i].id).visited)
}

fn reset_node(node: &Node, states: &mut ElementStateTable) {
    states.reset_visited(node.elements.iter().map(|e| e.id.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use storyflow_model::{LocalizedContent, NodeElement, NodeType};

    fn node_with(cycle_type: CycleType, count: usize) -> Node {
        Node {
            id: "n1".to_string(),
            kind: NodeType::Text,
            permalink: None,
            actor_id: None,
            metadata: vec![],
            elements: (0..count)
                .map(|i| NodeElement {
                    id: format!("e{i}"),
                    node_id: "n1".to_string(),
                    kind: None,
                    localized_contents: vec![LocalizedContent {
                        locale_code: "en".to_string(),
                        text: format!("t{i}"),
                    }],
                })
                .collect(),
            connections: vec![],
            cycle_type,
            translatable: true,
            jump_to: None,
            image: None,
            header: None,
        }
    }

    fn picks(node: &Node, rounds: usize) -> Vec<usize> {
        let mut states = ElementStateTable::new();
        let mut rng = StdRng::seed_from_u64(3);
        (0..rounds)
            .map(|_| select_element_index(node, &mut states, &mut rng).unwrap())
            .collect()
    }

    #[test]
    fn list_is_linear_then_sticky() {
        let node = node_with(CycleType::List, 3);
        assert_eq!(picks(&node, 5), vec![0, 1, 2, 2, 2]);
    }

    #[test]
    fn loop_wraps() {
        let node = node_with(CycleType::Loop, 2);
        assert_eq!(picks(&node, 4), vec![0, 1, 0, 1]);
    }

    #[test]
    fn smart_random_exhausts_each_cycle() {
        let node = node_with(CycleType::SmartRandom, 3);
        let all = picks(&node, 6);
        let mut first: Vec<usize> = all[..3].to_vec();
        let mut second: Vec<usize> = all[3..].to_vec();
        first.sort_unstable();
        second.sort_unstable();
        assert_eq!(first, vec![0, 1, 2]);
        assert_eq!(second, vec![0, 1, 2]);
    }

    #[test]
    fn none_returns_the_first_element() {
        let node = node_with(CycleType::None, 2);
        assert_eq!(picks(&node, 3), vec![0, 0, 0]);
    }

    #[test]
    fn empty_node_selects_nothing() {
        let node = node_with(CycleType::List, 0);
        let mut states = ElementStateTable::new();
        let mut rng = StdRng::seed_from_u64(3);
        assert!(select_element_index(&node, &mut states, &mut rng).is_none());
    }
}
