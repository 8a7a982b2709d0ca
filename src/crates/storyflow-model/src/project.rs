//! Core project data structures
//!
//! This module defines the typed, in-memory representation of an authored
//! story project: flows of nodes connected by typed edges, plus the actors,
//! variables, labels, locales, and metadata the nodes reference.
//!
//! A [`Project`] is **immutable at runtime**. All mutable traversal state
//! (element visitation, variation rotation, the cursor itself) lives in the
//! runtime crate, keyed by the ids defined here, so a single loaded project
//! can back any number of concurrent story runtimes.
//!
//! # Project Structure
//!
//! ```text
//! Project
//! ├── FlowGroup*         ordered grouping of flows
//! ├── Flow*              named directed subgraph, one Start node each
//! │   └── Node*          typed vertex
//! │       ├── NodeElement*       localized text variants / choice options
//! │       └── Connection*        typed outgoing edges
//! ├── Actor*             speakers (one may be the narrator)
//! ├── Variable*          seed values for the global variable store
//! ├── Label*             localized UI strings
//! └── Metadata*          authored tags with value sets
//! ```

use serde::{Deserialize, Serialize};

/// Node identifier - unique id of a node within a project
pub type NodeId = String;

/// Flow identifier
pub type FlowId = String;

/// Element identifier - unique id of a node element within a project
pub type ElementId = String;

/// Node kind, determining traversal semantics and connection dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    /// Entry point of a flow; exactly one per flow, no incoming edges
    Start,
    /// Emitting node carrying one or more text elements
    Text,
    /// Authoring annotation; passed through without emission
    Note,
    /// Emitting node whose elements are alternatives picked by the host
    Choice,
    /// Evaluates its elements for variable side effects, then moves on
    Variables,
    /// Routes to the connection of its first truthy element
    Condition,
    /// Marker kind for dedicated fail-branch nodes
    FailCondition,
    /// Routes uniformly at random among its connections
    Random,
    /// Routes through its elements' connections under a cycle policy
    Sequence,
    /// Redirects the cursor to an arbitrary (flow, node) target
    JumpToNode,
    /// Presentation-only node; passed through without emission
    Layout,
    /// Calls another flow, resuming here once the callee terminates
    SubFlow,
    /// Named bookmark node
    Label,
}

impl NodeType {
    /// Whether the walker passes through this kind without emitting it
    ///
    /// Internal nodes perform their routing or side effects and hand the
    /// cursor to the next node in the same step.
    pub fn is_internal(self) -> bool {
        matches!(
            self,
            NodeType::Start
                | NodeType::Note
                | NodeType::Sequence
                | NodeType::Random
                | NodeType::Variables
                | NodeType::Layout
                | NodeType::SubFlow
                | NodeType::JumpToNode
                | NodeType::Condition
        )
    }
}

/// Element-selection policy over a node's elements
///
/// Governs which element a Text node emits or which connection a Sequence
/// node follows on each visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CycleType {
    /// Linear with a sticky final element
    List,
    /// Linear, wrapping back to the first element on exhaustion
    Loop,
    /// Uniform with replacement
    Random,
    /// Uniform without replacement, resetting once all were seen
    SmartRandom,
    /// No selection policy; the host picks by element id (Choice nodes)
    #[default]
    None,
}

/// Edge kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionKind {
    /// Ordinary transition
    #[default]
    Default,
    /// Call edge of a SubFlow node, leading into the callee flow
    SubFlow,
    /// Fallback edge taken when a node's regular dispatch comes up empty
    FailCondition,
}

/// A directed edge between nodes
///
/// For per-element dispatch kinds (Choice, Condition, Sequence) the edge is
/// bound to one of the source node's elements via [`node_element_id`].
///
/// [`node_element_id`]: Connection::node_element_id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// Id of the node this edge leaves from
    pub from_node_id: NodeId,
    /// Id of the target node
    pub to: NodeId,
    /// Edge kind
    pub kind: ConnectionKind,
    /// Owning element for per-element dispatch, if any
    pub node_element_id: Option<ElementId>,
}

/// A single localized rendering of an element's text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalizedContent {
    /// BCP-47-ish locale code as authored, e.g. `"en"` or `"pt-BR"`
    pub locale_code: String,
    /// Raw authored text, including template markers
    pub text: String,
}

/// A child of a node carrying localized text
///
/// Text and Sequence nodes hold one element per variant; Choice nodes hold
/// one element per alternative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeElement {
    /// Unique element id
    pub id: ElementId,
    /// Id of the owning node
    pub node_id: NodeId,
    /// Authored element kind tag, when present
    pub kind: Option<String>,
    /// Per-locale text bodies
    pub localized_contents: Vec<LocalizedContent>,
}

impl NodeElement {
    /// The content authored for exactly the given locale, if any
    pub fn content(&self, locale: &str) -> Option<&LocalizedContent> {
        self.localized_contents
            .iter()
            .find(|c| c.locale_code == locale)
    }
}

/// Cross-flow redirect target of a JumpToNode node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JumpTarget {
    /// Target flow id
    pub flow_id: FlowId,
    /// Target node id inside that flow
    pub node_id: NodeId,
}

/// A vertex of a flow graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique node id
    pub id: NodeId,
    /// Node kind
    pub kind: NodeType,
    /// Stable deep-link slug, when authored
    pub permalink: Option<String>,
    /// Speaking actor, if any
    pub actor_id: Option<String>,
    /// Ids of metadata values attached to this node
    pub metadata: Vec<String>,
    /// Text variants / choice alternatives
    pub elements: Vec<NodeElement>,
    /// Outgoing edges
    pub connections: Vec<Connection>,
    /// Element-selection policy
    pub cycle_type: CycleType,
    /// Whether this node's text participates in translation
    pub translatable: bool,
    /// Redirect target (JumpToNode only)
    pub jump_to: Option<JumpTarget>,
    /// Illustration reference, when authored
    pub image: Option<String>,
    /// Prompt element of a Choice node
    pub header: Option<NodeElement>,
}

impl Node {
    /// The element with the given id, including the choice header
    pub fn element(&self, element_id: &str) -> Option<&NodeElement> {
        self.elements
            .iter()
            .find(|e| e.id == element_id)
            .or_else(|| self.header.as_ref().filter(|h| h.id == element_id))
    }

    /// First outgoing edge that is not a fail edge
    pub fn default_connection(&self) -> Option<&Connection> {
        self.connections
            .iter()
            .find(|c| c.kind != ConnectionKind::FailCondition)
    }

    /// The fail edge, if one was authored
    pub fn fail_connection(&self) -> Option<&Connection> {
        self.connections
            .iter()
            .find(|c| c.kind == ConnectionKind::FailCondition)
    }

    /// The SubFlow call edge (SubFlow nodes only)
    pub fn sub_flow_connection(&self) -> Option<&Connection> {
        self.connections
            .iter()
            .find(|c| c.kind == ConnectionKind::SubFlow)
    }

    /// First non-fail edge that is not the SubFlow call edge
    ///
    /// This is the edge a SubFlow node resumes on after its callee flow has
    /// terminated.
    pub fn resume_connection(&self) -> Option<&Connection> {
        self.connections.iter().find(|c| {
            c.kind != ConnectionKind::SubFlow && c.kind != ConnectionKind::FailCondition
        })
    }

    /// The non-fail edge bound to the given element
    pub fn connection_for_element(&self, element_id: &str) -> Option<&Connection> {
        self.connections.iter().find(|c| {
            c.kind != ConnectionKind::FailCondition
                && c.node_element_id.as_deref() == Some(element_id)
        })
    }
}

/// A named directed subgraph with a single Start node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    /// Unique flow id
    pub id: FlowId,
    /// Display name
    pub name: String,
    /// URL-safe name
    pub slug: String,
    /// Vertices, in authored order
    pub nodes: Vec<Node>,
}

impl Flow {
    /// The flow's entry node
    pub fn start_node(&self) -> Option<&Node> {
        self.nodes.iter().find(|n| n.kind == NodeType::Start)
    }

    /// The node with the given id
    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == node_id)
    }

    /// All edges in this flow that point at the given node
    pub fn connections_to(&self, node_id: &str) -> Vec<&Connection> {
        self.nodes
            .iter()
            .flat_map(|n| n.connections.iter())
            .filter(|c| c.to == node_id)
            .collect()
    }
}

/// Ordered grouping of flows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowGroup {
    /// Unique group id
    pub id: String,
    /// Display name
    pub name: String,
    /// Member flows, in authored order; the first flow of the first group
    /// is the project's default entry flow
    pub flow_ids: Vec<FlowId>,
}

/// A speaking character
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    /// Unique actor id
    pub id: String,
    /// Stable authored uid
    pub uid: String,
    /// Display name
    pub name: String,
    /// Whether this actor is the narrator voice
    pub is_narrator: bool,
}

/// Declared type of an authored variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableType {
    Bool,
    String,
    Int,
    Float,
    /// Immutable string constant
    Fixed,
    /// Display-only divider in the editor; never loaded into the store
    Separator,
}

/// An authored variable seeding the global store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    /// Store key (without the `$` sigil)
    pub key: String,
    /// Authored value, coerced by the runtime according to [`Variable::kind`]
    pub value: serde_json::Value,
    /// Declared type
    pub kind: VariableType,
}

/// A localized UI string, shaped like an element's content list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    /// Lookup key
    pub key: String,
    /// Per-locale text bodies
    pub localized_contents: Vec<LocalizedContent>,
}

impl Label {
    /// The content authored for exactly the given locale, if any
    pub fn content(&self, locale: &str) -> Option<&LocalizedContent> {
        self.localized_contents
            .iter()
            .find(|c| c.locale_code == locale)
    }
}

/// One value of an authored metadata tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataValue {
    /// Unique value id (what nodes reference)
    pub id: String,
    /// Stable authored uid
    pub uid: String,
    /// Display value
    pub value: String,
    /// Icon reference
    pub icon: Option<String>,
    /// Back-reference to the owning metadata tag
    pub metadata_id: String,
}

/// An authored metadata tag with its value set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Unique tag id
    pub id: String,
    /// Stable authored uid
    pub uid: String,
    /// Display name
    pub name: String,
    /// Icon reference
    pub icon: Option<String>,
    /// Value set
    pub values: Vec<MetadataValue>,
}

/// A locale available in the project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocaleInfo {
    /// Locale code, e.g. `"en"`
    pub code: String,
    /// Human-readable description
    pub description: Option<String>,
}

/// The loaded, immutable story project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Project display name
    pub name: String,
    /// Source document API version
    pub api_version: String,
    /// Locale the project was exported with
    pub locale: String,
    /// Locale translations fall back to
    pub main_locale: String,
    /// All locales the project carries content for
    pub available_locales: Vec<LocaleInfo>,
    /// Flow groupings, in authored order
    pub flow_groups: Vec<FlowGroup>,
    /// All flows
    pub flows: Vec<Flow>,
    /// All actors
    pub actors: Vec<Actor>,
    /// Global-store seed variables
    pub variables: Vec<Variable>,
    /// Localized UI strings
    pub labels: Vec<Label>,
    /// Metadata tags
    pub metadata: Vec<Metadata>,
}

impl Project {
    /// Look up a flow by id, name, or slug (in that order)
    pub fn flow(&self, key: &str) -> Option<&Flow> {
        self.flow_by_id(key)
            .or_else(|| self.flows.iter().find(|f| f.name == key))
            .or_else(|| self.flows.iter().find(|f| f.slug == key))
    }

    /// Look up a flow by id
    pub fn flow_by_id(&self, flow_id: &str) -> Option<&Flow> {
        self.flows.iter().find(|f| f.id == flow_id)
    }

    /// The project's default entry flow
    ///
    /// The first flow of the first flow group, falling back to the first
    /// flow in authored order when no groups exist.
    pub fn default_flow(&self) -> Option<&Flow> {
        self.flow_groups
            .first()
            .and_then(|g| g.flow_ids.first())
            .and_then(|id| self.flow_by_id(id))
            .or_else(|| self.flows.first())
    }

    /// Look up a node, scoped to one flow or searched project-wide
    pub fn node(&self, node_id: &str, flow_id: Option<&str>) -> Option<&Node> {
        match flow_id {
            Some(fid) => self.flow_by_id(fid)?.node(node_id),
            None => self.flows.iter().find_map(|f| f.node(node_id)),
        }
    }

    /// The flow containing the given node
    pub fn flow_of_node(&self, node_id: &str) -> Option<&Flow> {
        self.flows.iter().find(|f| f.node(node_id).is_some())
    }

    /// Whether a node exists, scoped to one flow or project-wide
    pub fn node_exists(&self, node_id: &str, flow_id: Option<&str>) -> bool {
        self.node(node_id, flow_id).is_some()
    }

    /// Look up a node by its authored permalink
    pub fn node_by_permalink(&self, permalink: &str) -> Option<&Node> {
        self.flows
            .iter()
            .flat_map(|f| f.nodes.iter())
            .find(|n| n.permalink.as_deref() == Some(permalink))
    }

    /// All nodes of the given kind, project-wide
    pub fn nodes_by_type(&self, kind: NodeType) -> Vec<&Node> {
        self.flows
            .iter()
            .flat_map(|f| f.nodes.iter())
            .filter(|n| n.kind == kind)
            .collect()
    }

    /// Look up an element by id, searching every node including choice headers
    pub fn element(&self, element_id: &str) -> Option<(&Node, &NodeElement)> {
        self.flows
            .iter()
            .flat_map(|f| f.nodes.iter())
            .find_map(|n| n.element(element_id).map(|e| (n, e)))
    }

    /// Look up an actor by id
    pub fn actor(&self, actor_id: &str) -> Option<&Actor> {
        self.actors.iter().find(|a| a.id == actor_id)
    }

    /// Look up an actor by authored uid
    pub fn actor_by_uid(&self, uid: &str) -> Option<&Actor> {
        self.actors.iter().find(|a| a.uid == uid)
    }

    /// Look up a label by key
    pub fn label(&self, key: &str) -> Option<&Label> {
        self.labels.iter().find(|l| l.key == key)
    }

    /// Resolve a metadata value id to its value and owning tag
    pub fn metadata_value(&self, value_id: &str) -> Option<(&Metadata, &MetadataValue)> {
        self.metadata.iter().find_map(|m| {
            m.values
                .iter()
                .find(|v| v.id == value_id)
                .map(|v| (m, v))
        })
    }

    /// Check the statically-checkable structural invariants
    ///
    /// Verified here:
    /// - every connection target resolves within its own flow (SubFlow call
    ///   edges are exempt, they may cross flows)
    /// - per-element connections reference an element of their source node
    /// - each flow has exactly one Start node
    /// - Condition and Sequence nodes carry at most one fail edge
    ///
    /// Violations are reported as [`LoadError::Malformed`] with a message
    /// naming the flow and node.
    ///
    /// [`LoadError::Malformed`]: crate::error::LoadError::Malformed
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::LoadError;

        for flow in &self.flows {
            let starts = flow
                .nodes
                .iter()
                .filter(|n| n.kind == NodeType::Start)
                .count();
            if starts != 1 {
                return Err(LoadError::malformed(format!(
                    "Flow '{}' has {} Start nodes, expected exactly 1",
                    flow.name, starts
                )));
            }

            for node in &flow.nodes {
                let fails = node
                    .connections
                    .iter()
                    .filter(|c| c.kind == ConnectionKind::FailCondition)
                    .count();
                if fails > 1
                    && matches!(node.kind, NodeType::Condition | NodeType::Sequence)
                {
                    return Err(LoadError::malformed(format!(
                        "Node '{}' in flow '{}' has {} fail connections, expected at most 1",
                        node.id, flow.name, fails
                    )));
                }

                for conn in &node.connections {
                    if conn.kind == ConnectionKind::SubFlow {
                        if !self.node_exists(&conn.to, None) {
                            return Err(LoadError::malformed(format!(
                                "SubFlow edge of node '{}' in flow '{}' targets unknown node '{}'",
                                node.id, flow.name, conn.to
                            )));
                        }
                        continue;
                    }
                    if flow.node(&conn.to).is_none() {
                        return Err(LoadError::malformed(format!(
                            "Edge of node '{}' in flow '{}' targets '{}', which is not in that flow",
                            node.id, flow.name, conn.to
                        )));
                    }
                    if let Some(el_id) = &conn.node_element_id {
                        if node.element(el_id).is_none() {
                            return Err(LoadError::malformed(format!(
                                "Edge of node '{}' in flow '{}' references unknown element '{}'",
                                node.id, flow.name, el_id
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
