//! The story runtime
//!
//! [`Runtime`] is the cursor a host drives: load a project, `start`, call
//! [`next_node`] to advance, then fetch rendered text and available choices
//! for whatever node the cursor stands on. One runtime owns all mutable
//! traversal state (variable stores, element visitation, variation
//! rotation, the sub-flow call stack); the project itself stays immutable
//! behind an [`Arc`] and can back any number of runtimes.
//!
//! # Example
//!
//! ```rust,no_run
//! use storyflow_core::{NextOutcome, Runtime};
//!
//! let bytes = std::fs::read("project.json").unwrap();
//! let mut runtime = Runtime::from_json(&bytes, None).unwrap();
//!
//! while let Ok(NextOutcome::Node(_)) = runtime.next_node(None) {
//!     if let Some(line) = runtime.get_parsed_text(None, false) {
//!         println!("{}", line.text);
//!     }
//!     for choice in runtime.get_available_choices(None) {
//!         println!("  -> {}", choice.id);
//!     }
//! }
//! ```
//!
//! [`next_node`]: Runtime::next_node

use std::collections::HashMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use storyflow_model::{
    Actor, Flow, Label, LoadError, Metadata, MetadataValue, Node, NodeElement, NodeId,
    NodeType, Project,
};

use crate::error::{FlowError, Result};
use crate::locale::{self, ResolvedText};
use crate::selector;
use crate::state::{ElementStateTable, SubFlowFrame};
use crate::template::{self, RenderedText, TemplateContext};
use crate::value::VariableStore;
use crate::variation::VariationRegistry;
use crate::walker::THE_END;

/// A running story: cursor, variable stores, and per-element state over an
/// immutable project
pub struct Runtime {
    pub(crate) project: Arc<Project>,
    pub(crate) locale: String,
    pub(crate) selected_flow_id: String,
    pub(crate) selected_node_id: String,
    pub(crate) vars: VariableStore,
    pub(crate) variations: VariationRegistry,
    pub(crate) elements: ElementStateTable,
    pub(crate) previous_nodes: HashMap<NodeId, NodeId>,
    pub(crate) active_sub_flows: Vec<SubFlowFrame>,
    pub(crate) is_jumping: bool,
    pub(crate) rng: StdRng,
}

impl Runtime {
    /// Load a project and park the cursor on the Start node of the given
    /// flow (or the project's default flow)
    pub fn from_project(
        project: Project,
        flow_name: Option<&str>,
    ) -> std::result::Result<Self, LoadError> {
        Self::from_shared(Arc::new(project), flow_name)
    }

    /// Like [`Runtime::from_project`], sharing an already-loaded project
    pub fn from_shared(
        project: Arc<Project>,
        flow_name: Option<&str>,
    ) -> std::result::Result<Self, LoadError> {
        let locale = project.locale.clone();
        let mut runtime = Self {
            project,
            locale,
            selected_flow_id: String::new(),
            selected_node_id: String::new(),
            vars: VariableStore::new(),
            variations: VariationRegistry::default(),
            elements: ElementStateTable::new(),
            previous_nodes: HashMap::new(),
            active_sub_flows: Vec::new(),
            is_jumping: false,
            rng: StdRng::from_entropy(),
        };
        runtime.load(flow_name)?;
        Ok(runtime)
    }

    /// Parse a project from JSON bytes and load it
    pub fn from_json(
        bytes: &[u8],
        flow_name: Option<&str>,
    ) -> std::result::Result<Self, LoadError> {
        Self::from_project(Project::from_json(bytes)?, flow_name)
    }

    /// Replace the PRNG with a seeded one, making every Random/RND/SRND
    /// decision reproducible
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Reset all traversal state and park the cursor on a flow's Start node
    ///
    /// Clears element flags, reseeds the global store from the project's
    /// variable declarations, drops locals and the sub-flow stack, and
    /// restores every variation block's rotation. The variation registry is
    /// only rebuilt when it is empty.
    pub fn load(&mut self, flow_name: Option<&str>) -> std::result::Result<(), LoadError> {
        let project = Arc::clone(&self.project);
        self.elements.clear();
        self.previous_nodes.clear();
        self.active_sub_flows.clear();
        self.is_jumping = false;
        self.vars.seed(&project.variables);
        if self.variations.is_empty() {
            self.variations = VariationRegistry::from_project(&project);
        } else {
            self.variations.reset();
        }
        self.selected_flow_id = String::new();
        self.start(None, flow_name)
            .map_err(|e| LoadError::Malformed(e.to_string()))
    }

    /// Place the cursor on a node (or a flow's Start node)
    ///
    /// `flow_name` accepts a flow id, name, or slug; without one the
    /// project's default flow is used. Traversal state is left untouched.
    pub fn start(&mut self, node_id: Option<&str>, flow_name: Option<&str>) -> Result<()> {
        let project = Arc::clone(&self.project);
        let flow = match flow_name {
            Some(key) => project
                .flow(key)
                .ok_or_else(|| FlowError::UnreachableEnd(format!("flow '{key}' not found")))?,
            None => project.default_flow().ok_or_else(|| {
                FlowError::UnreachableEnd("project has no flows".to_string())
            })?,
        };
        self.selected_flow_id = flow.id.clone();
        match node_id {
            Some(id) => {
                if flow.node(id).is_none() {
                    return Err(FlowError::UnreachableEnd(format!(
                        "node '{id}' is not in flow '{}'",
                        flow.name
                    )));
                }
                self.selected_node_id = id.to_string();
            }
            None => {
                let start = flow.start_node().ok_or_else(|| {
                    FlowError::UnreachableEnd(format!("flow '{}' has no Start node", flow.name))
                })?;
                self.selected_node_id = start.id.clone();
            }
        }
        Ok(())
    }

    /// Park the cursor back on the current flow's Start node
    ///
    /// Unlike [`Runtime::load`] this keeps variables, visitation, and
    /// variation rotation as they are.
    pub fn restart(&mut self) -> Result<()> {
        let flow_id = self.selected_flow_id.clone();
        self.start(None, Some(&flow_id))
    }

    // --- queries ------------------------------------------------------

    /// The loaded project
    pub fn project(&self) -> &Project {
        &self.project
    }

    /// The locale text is currently rendered in
    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Switch the rendering locale
    pub fn set_locale(&mut self, locale: impl Into<String>) {
        self.locale = locale.into();
    }

    /// The variable stores
    pub fn store(&self) -> &VariableStore {
        &self.vars
    }

    /// Mutable access to the variable stores, for host-driven state
    pub fn store_mut(&mut self) -> &mut VariableStore {
        &mut self.vars
    }

    /// Id of the flow the cursor is in
    pub fn selected_flow_id(&self) -> &str {
        &self.selected_flow_id
    }

    /// Id of the node the cursor stands on (the end sentinel once the
    /// traversal terminated)
    pub fn selected_node_id(&self) -> &str {
        &self.selected_node_id
    }

    /// Whether the traversal has terminated
    pub fn has_ended(&self) -> bool {
        self.selected_node_id == THE_END
    }

    /// The node the cursor stands on
    pub fn current_node(&self) -> Option<&Node> {
        self.project
            .node(&self.selected_node_id, Some(&self.selected_flow_id))
    }

    /// The flow the cursor is in
    pub fn get_selected_flow(&self) -> Option<&Flow> {
        self.project.flow_by_id(&self.selected_flow_id)
    }

    /// Look up a flow by id, name, or slug
    pub fn get_flow(&self, key: &str) -> Option<&Flow> {
        self.project.flow(key)
    }

    /// All flows of the project
    pub fn get_flows(&self) -> &[Flow] {
        &self.project.flows
    }

    /// Look up a node by id (current node when `node_id` is `None`)
    pub fn get_node(&self, node_id: Option<&str>, flow_id: Option<&str>) -> Option<&Node> {
        match node_id {
            Some(id) => self.project.node(id, flow_id),
            None => self.current_node(),
        }
    }

    /// Look up a node by its authored permalink
    pub fn get_node_by_permalink(&self, permalink: &str) -> Option<&Node> {
        self.project.node_by_permalink(permalink)
    }

    /// All nodes of a kind, project-wide
    pub fn get_nodes_by_type(&self, kind: NodeType) -> Vec<&Node> {
        self.project.nodes_by_type(kind)
    }

    /// Whether a node exists, scoped to one flow or project-wide
    pub fn node_exists(&self, node_id: &str, flow_id: Option<&str>) -> bool {
        self.project.node_exists(node_id, flow_id)
    }

    /// The actor speaking a node (current node when `node_id` is `None`)
    pub fn get_node_actor(&self, node_id: Option<&str>) -> Option<&Actor> {
        let node = self.get_node(node_id, None)?;
        self.project.actor(node.actor_id.as_deref()?)
    }

    /// Look up an actor by authored uid
    pub fn get_actor_by_uid(&self, uid: &str) -> Option<&Actor> {
        self.project.actor_by_uid(uid)
    }

    /// All labels of the project
    pub fn get_labels(&self) -> &[Label] {
        &self.project.labels
    }

    /// Resolve a label for a locale (current locale when `None`)
    pub fn get_label(&self, key: &str, locale: Option<&str>) -> Option<ResolvedText> {
        let label = self.project.label(key)?;
        locale::resolve(
            &label.localized_contents,
            true,
            locale.unwrap_or(&self.locale),
            &self.project.main_locale,
        )
    }

    /// Metadata values attached to a node, with their owning tags
    pub fn get_node_metadata(&self, node_id: Option<&str>) -> Vec<(&Metadata, &MetadataValue)> {
        let Some(node) = self.get_node(node_id, None) else {
            return Vec::new();
        };
        node.metadata
            .iter()
            .filter_map(|id| self.project.metadata_value(id))
            .collect()
    }

    /// The value a node carries for the metadata tag with the given uid
    pub fn get_node_meta_by_meta_uid(
        &self,
        uid: &str,
        node_id: Option<&str>,
    ) -> Option<&MetadataValue> {
        self.get_node_metadata(node_id)
            .into_iter()
            .find(|(tag, _)| tag.uid == uid)
            .map(|(_, value)| value)
    }

    /// Nodes whose edges point at the given node (within its flow)
    pub fn get_linking_nodes(&self, node_id: Option<&str>) -> Vec<&Node> {
        let Some(node) = self.get_node(node_id, None) else {
            return Vec::new();
        };
        let Some(flow) = self.project.flow_of_node(&node.id) else {
            return Vec::new();
        };
        flow.nodes
            .iter()
            .filter(|n| n.connections.iter().any(|c| c.to == node.id))
            .collect()
    }

    /// Nodes the given node's edges point at
    pub fn get_links_to_nodes(&self, node_id: Option<&str>) -> Vec<&Node> {
        let Some(node) = self.get_node(node_id, None) else {
            return Vec::new();
        };
        node.connections
            .iter()
            .filter_map(|c| self.project.node(&c.to, None))
            .collect()
    }

    /// Id of the node the cursor came from when it last landed on `node_id`
    pub fn previous_node_id(&self, node_id: &str) -> Option<&str> {
        self.previous_nodes.get(node_id).map(String::as_str)
    }

    // --- rendering ----------------------------------------------------

    /// Render the text the cursor's node (or a specific element) presents
    ///
    /// With `element_id = None` the current node's cycle policy selects the
    /// element (the choice header for Choice nodes). `force_eval` realizes
    /// assignment side effects inside Choice elements and is normally only
    /// passed by the walker when a choice is selected.
    pub fn get_parsed_text(
        &mut self,
        element_id: Option<&str>,
        force_eval: bool,
    ) -> Option<RenderedText> {
        let project = Arc::clone(&self.project);
        match element_id {
            Some(id) => {
                let (node, element) = project.element(id)?;
                Some(self.render(node, element, force_eval))
            }
            None => {
                let node = project.node(&self.selected_node_id, Some(&self.selected_flow_id))?;
                if node.kind == NodeType::Choice {
                    let header = node.header.as_ref()?;
                    return Some(self.render(node, header, force_eval));
                }
                let index =
                    selector::select_element_index(node, &mut self.elements, &mut self.rng)?;
                Some(self.render(node, &node.elements[index], force_eval))
            }
        }
    }

    /// An element's authored text, optionally cleaned of markers and with
    /// side-effect-free `{...}` blocks substituted
    ///
    /// Never advances variation rotation or element flags.
    pub fn get_original_text(
        &mut self,
        element_id: &str,
        cleaned: bool,
        resolve_vars: bool,
        locale: Option<&str>,
    ) -> Option<RenderedText> {
        let project = Arc::clone(&self.project);
        let (node, element) = project.element(element_id)?;
        let resolved = locale::resolve(
            &element.localized_contents,
            node.translatable,
            locale.unwrap_or(&self.locale),
            &project.main_locale,
        )?;
        let text = template::original_text(&mut self.vars, &resolved.text, cleaned, resolve_vars);
        Some(RenderedText {
            text,
            not_translated: resolved.not_translated,
        })
    }

    /// The selectable elements of a Choice node (current node when `None`)
    ///
    /// Renders each alternative to apply self-hiding of empty choices; when
    /// every regular alternative is spent, the `[+]` fallbacks are
    /// returned instead.
    pub fn get_available_choices(&mut self, node_id: Option<&str>) -> Vec<NodeElement> {
        let project = Arc::clone(&self.project);
        let node = match node_id {
            Some(id) => project.node(id, None),
            None => project.node(&self.selected_node_id, Some(&self.selected_flow_id)),
        };
        match node {
            Some(node) if node.kind == NodeType::Choice => self.available_choices_for(node),
            _ => Vec::new(),
        }
    }

    /// Render one element against this runtime's state
    pub(crate) fn render(
        &mut self,
        node: &Node,
        element: &NodeElement,
        force_eval: bool,
    ) -> RenderedText {
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
        template::render_element(&mut ctx, node, element, force_eval)
    }
}
