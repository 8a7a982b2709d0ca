//! The flow walker
//!
//! Node-dispatched traversal of the story graph. Each [`next_node`] call
//! moves the cursor off the node it stands on, following whichever outgoing
//! edge that node's kind dictates, and keeps going through internal
//! (non-emitting) nodes until it lands on a node the host should present -
//! or the traversal terminates.
//!
//! The recursion the semantics describe is implemented as a bounded loop:
//! a single step passes through at most [`MAX_WALK_DEPTH`] nodes, which
//! turns author-induced cycles over internal nodes into a clean
//! [`FlowError::DepthExceeded`] instead of a hang.
//!
//! [`next_node`]: crate::Runtime::next_node

use std::sync::Arc;

use rand::Rng;
use storyflow_model::{
    Connection, ConnectionKind, CycleType, ElementId, Node, NodeElement, NodeId, NodeType,
};
use tracing::{debug, warn};

use crate::error::{EvalError, FlowError, Result};
use crate::state::SubFlowFrame;
use crate::template::{self, TemplateContext};
use crate::value::Value;
use crate::Runtime;

/// Sentinel node id marking a terminated traversal
pub const THE_END: &str = "THE END";

/// Most nodes a single step may pass through
pub const MAX_WALK_DEPTH: usize = 1000;

/// What a step of the walker produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextOutcome {
    /// The cursor landed on an emitting node
    Node(NodeId),
    /// The traversal terminated; further steps keep returning this
    End,
}

impl Runtime {
    /// Advance the cursor to the next emitting node
    ///
    /// `element_id` names the chosen alternative when the cursor stands on
    /// a Choice node; every other node kind ignores it. All side effects of
    /// the step (variable writes, visitation, variation rotation, sub-flow
    /// pushes and pops) are applied before this returns.
    ///
    /// # Errors
    ///
    /// - [`FlowError::BadJump`] - a JumpToNode target does not exist; the
    ///   cursor is left where it was
    /// - [`FlowError::DepthExceeded`] - the step passed through more than
    ///   [`MAX_WALK_DEPTH`] nodes; the traversal is terminated
    /// - [`FlowError::UnreachableEnd`] - the cursor's node vanished
    pub fn next_node(&mut self, element_id: Option<&str>) -> Result<NextOutcome> {
        let project = Arc::clone(&self.project);
        let mut element_id: Option<String> = element_id.map(str::to_string);
        let mut depth = 0usize;

        loop {
            depth += 1;
            if depth > MAX_WALK_DEPTH {
                warn!(
                    flow = %self.selected_flow_id,
                    "walk depth cap exceeded, terminating traversal"
                );
                self.selected_node_id = THE_END.to_string();
                return Err(FlowError::DepthExceeded(MAX_WALK_DEPTH));
            }

            if self.selected_node_id == THE_END {
                return Ok(NextOutcome::End);
            }
            let Some(current) =
                project.node(&self.selected_node_id, Some(&self.selected_flow_id))
            else {
                return Err(FlowError::UnreachableEnd(format!(
                    "node '{}' is not in flow '{}'",
                    self.selected_node_id, self.selected_flow_id
                )));
            };

            // Which edge leaves the current node, and through which element
            let (mut connection, involved) =
                self.available_connection(current, element_id.as_deref());
            if connection.is_none() {
                connection = current.fail_connection().cloned();
            }

            // Pre-transition bookkeeping
            match current.kind {
                NodeType::Choice if !self.is_jumping => {
                    if let Some(chosen) = element_id.as_deref() {
                        if let Some(element) = current.element(chosen) {
                            // Selecting a choice is the one moment its
                            // assignment blocks may run
                            self.render(current, element, true);
                            if self.elements.get(&element.id).just_once {
                                self.elements.mark_visited(&element.id);
                            }
                        }
                    }
                }
                NodeType::JumpToNode => match &current.jump_to {
                    Some(jump) if project.node_exists(&jump.node_id, Some(&jump.flow_id)) => {
                        debug!(flow = %jump.flow_id, node = %jump.node_id, "jumping");
                        self.is_jumping = true;
                        self.selected_flow_id = jump.flow_id.clone();
                        self.selected_node_id = jump.node_id.clone();
                    }
                    Some(jump) => {
                        return Err(FlowError::BadJump {
                            flow_id: jump.flow_id.clone(),
                            node_id: jump.node_id.clone(),
                        })
                    }
                    None => {
                        return Err(FlowError::BadJump {
                            flow_id: String::new(),
                            node_id: String::new(),
                        })
                    }
                },
                _ => {
                    if let Some(el_id) = &involved {
                        self.elements.mark_visited(el_id);
                    }
                }
            }

            // Target selection
            if connection.is_none() && current.kind != NodeType::JumpToNode {
                if let Some(frame) = self.active_sub_flows.last().cloned() {
                    // Peek only: the SubFlow node pops its own frame when
                    // it finds itself on the stack again
                    debug!(
                        flow = %frame.flow_id,
                        node = %frame.node_id,
                        "callee flow exhausted, resuming caller"
                    );
                    self.start(Some(&frame.node_id), Some(&frame.flow_id))?;
                    element_id = None;
                    continue;
                }
                self.selected_node_id = THE_END.to_string();
                return Ok(NextOutcome::End);
            } else if !self.is_jumping {
                if let Some(conn) = &connection {
                    self.selected_node_id = conn.to.clone();
                    // SubFlow call edges may land in another flow
                    if project
                        .node(&conn.to, Some(&self.selected_flow_id))
                        .is_none()
                    {
                        if let Some(flow) = project.flow_of_node(&conn.to) {
                            self.selected_flow_id = flow.id.clone();
                        }
                    }
                }
            }

            // Land on the target, falling through exhausted Choice nodes
            let current_id = current.id.clone();
            let target_kind = loop {
                depth += 1;
                if depth > MAX_WALK_DEPTH {
                    self.selected_node_id = THE_END.to_string();
                    return Err(FlowError::DepthExceeded(MAX_WALK_DEPTH));
                }
                let Some(target) =
                    project.node(&self.selected_node_id, Some(&self.selected_flow_id))
                else {
                    return Err(FlowError::UnreachableEnd(format!(
                        "node '{}' is not in flow '{}'",
                        self.selected_node_id, self.selected_flow_id
                    )));
                };
                self.previous_nodes
                    .insert(target.id.clone(), current_id.clone());

                if target.kind == NodeType::Choice
                    && self.available_choices_for(target).is_empty()
                {
                    if let Some(fail) = target.fail_connection() {
                        debug!(node = %target.id, "choice exhausted, taking fail edge");
                        self.selected_node_id = fail.to.clone();
                        continue;
                    }
                }
                break target.kind;
            };

            self.is_jumping = false;

            if target_kind.is_internal() {
                element_id = None;
                continue;
            }
            return Ok(NextOutcome::Node(self.selected_node_id.clone()));
        }
    }

    /// The edge leaving `node` on this visit, plus the element that edge
    /// belongs to (for kinds that dispatch per element)
    ///
    /// Side effects live here by design: SubFlow dispatch pushes/pops the
    /// call stack, Variables dispatch runs its elements' expressions.
    fn available_connection(
        &mut self,
        node: &Node,
        element_id: Option<&str>,
    ) -> (Option<Connection>, Option<ElementId>) {
        match node.kind {
            NodeType::Start
            | NodeType::Text
            | NodeType::Note
            | NodeType::Layout
            | NodeType::Label
            | NodeType::FailCondition => (node.default_connection().cloned(), None),

            NodeType::SubFlow => {
                if let Some(pos) = self
                    .active_sub_flows
                    .iter()
                    .rposition(|f| f.node_id == node.id)
                {
                    // Returning from the callee: drop the frame and resume
                    self.active_sub_flows.truncate(pos);
                    (node.resume_connection().cloned(), None)
                } else {
                    let connection = node.sub_flow_connection().cloned();
                    if connection.is_some() {
                        self.active_sub_flows.push(SubFlowFrame {
                            flow_id: self.selected_flow_id.clone(),
                            node_id: node.id.clone(),
                        });
                    }
                    (connection, None)
                }
            }

            NodeType::Choice => match element_id {
                Some(chosen) => (
                    node.connection_for_element(chosen).cloned(),
                    Some(chosen.to_string()),
                ),
                None => (None, None),
            },

            NodeType::Condition => {
                for element in &node.elements {
                    match self.eval_element(node, element) {
                        Ok(value) if value.is_truthy() => {
                            return (
                                node.connection_for_element(&element.id).cloned(),
                                Some(element.id.clone()),
                            );
                        }
                        Ok(_) => {}
                        Err(err) => {
                            debug!(element = %element.id, %err, "condition element failed, treating as false");
                        }
                    }
                }
                (None, None)
            }

            NodeType::Variables => {
                for element in &node.elements {
                    if let Err(err) = self.eval_element(node, element) {
                        debug!(element = %element.id, %err, "variables element failed");
                    }
                }
                (node.default_connection().cloned(), None)
            }

            NodeType::Random => {
                let candidates: Vec<&Connection> = node
                    .connections
                    .iter()
                    .filter(|c| c.kind != ConnectionKind::FailCondition)
                    .collect();
                if candidates.is_empty() {
                    (None, None)
                } else {
                    let pick = self.rng.gen_range(0..candidates.len());
                    (Some(candidates[pick].clone()), None)
                }
            }

            NodeType::Sequence => self.sequence_connection(node),

            // The jump itself happens in the pre-transition step
            NodeType::JumpToNode => (None, None),
        }
    }

    /// Connection choice for a Sequence node under its cycle policy
    ///
    /// Exhaustion of a linear sequence falls back to the fail edge when one
    /// was authored, and otherwise sticks on the last element's edge.
    fn sequence_connection(
        &mut self,
        node: &Node,
    ) -> (Option<Connection>, Option<ElementId>) {
        if node.elements.is_empty() {
            return (node.default_connection().cloned(), None);
        }

        let first_unvisited = node
            .elements
            .iter()
            .position(|e| !self.elements.get(&e.id).visited);

        let element = match node.cycle_type {
            CycleType::Random => {
                let pick = self.rng.gen_range(0..node.elements.len());
                &node.elements[pick]
            }
            CycleType::Loop | CycleType::SmartRandom => {
                let unvisited: Vec<usize> = match first_unvisited {
                    Some(_) => (0..node.elements.len())
                        .filter(|&i| !self.elements.get(&node.elements[i].id).visited)
                        .collect(),
                    None => {
                        self.elements
                            .reset_visited(node.elements.iter().map(|e| e.id.clone()));
                        (0..node.elements.len()).collect()
                    }
                };
                if node.cycle_type == CycleType::Loop {
                    &node.elements[unvisited[0]]
                } else {
                    let pick = self.rng.gen_range(0..unvisited.len());
                    &node.elements[unvisited[pick]]
                }
            }
            CycleType::List | CycleType::None => match first_unvisited {
                Some(index) => &node.elements[index],
                None => {
                    if node.fail_connection().is_some() {
                        return (None, None);
                    }
                    // No fail edge authored: stick on the last element
                    match node.elements.last() {
                        Some(element) => element,
                        None => return (None, None),
                    }
                }
            },
        };

        (
            node.connection_for_element(&element.id).cloned(),
            Some(element.id.clone()),
        )
    }

    /// The selectable elements of a Choice node
    ///
    /// Renders every alternative (without realizing choice side effects) so
    /// empty renders self-hide and previously hidden alternatives whose
    /// text came back can un-hide. `[+]` fallbacks are withheld until the
    /// regular alternatives are spent.
    pub(crate) fn available_choices_for(&mut self, node: &Node) -> Vec<NodeElement> {
        for element in &node.elements {
            let rendered = self.render(node, element, false);
            let state = self.elements.get_mut(&element.id);
            if state.if_no_more {
                state.visited = true;
            }
            if rendered.text.is_empty() {
                if !state.visited {
                    state.visited = true;
                    state.was_hidden_because_empty = true;
                }
            } else if state.was_hidden_because_empty {
                state.visited = false;
                state.was_hidden_because_empty = false;
            }
        }

        let available: Vec<NodeElement> = node
            .elements
            .iter()
            .filter(|e| !self.elements.get(&e.id).visited)
            .cloned()
            .collect();
        if !available.is_empty() {
            return available;
        }
        node.elements
            .iter()
            .filter(|e| self.elements.get(&e.id).if_no_more)
            .cloned()
            .collect()
    }

    /// Evaluate a Condition/Variables element body against the stores
    fn eval_element(
        &mut self,
        node: &Node,
        element: &NodeElement,
    ) -> std::result::Result<Value, EvalError> {
        let project = Arc::clone(&self.project);
        let locale = self.locale.clone();
        let mut ctx = TemplateContext {
            project: project.as_ref(),
            locale: &locale,
            vars: &mut self.vars,
            variations: &mut self.variations,
            elements: &mut self.elements,
            rng: &mut self.rng,
        };
        template::eval_element_expression(&mut ctx, node, element)
    }
}
