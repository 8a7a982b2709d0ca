//! Editor export format
//!
//! Serde mirror of the JSON document the authoring editor exports
//! (underscore-prefixed field names), plus the conversion into the typed
//! [`Project`] model. File I/O stays with the host; this module only parses
//! caller-supplied bytes.
//!
//! The loader is lenient where the format is open-ended (unknown connection
//! types fall back to `Default`, unknown variable types to `String`) and
//! strict where structure matters (unknown node types, dangling edges).

use crate::error::{LoadError, Result};
use crate::project::{
    Actor, Connection, ConnectionKind, CycleType, Flow, FlowGroup, JumpTarget, Label,
    LocaleInfo, LocalizedContent, Metadata, MetadataValue, Node, NodeElement, NodeType,
    Project, Variable, VariableType,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// API version this loader was written against
///
/// A mismatch is reported with a warning and loading continues; only an
/// uninterpretable version field is an error.
pub const SUPPORTED_API_VERSION: &str = "1.4";

/// Top-level source document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSource {
    #[serde(rename = "_apiVersion", default)]
    pub api_version: Option<String>,
    #[serde(rename = "_name", default)]
    pub name: Option<String>,
    #[serde(rename = "_locale", default)]
    pub locale: Option<String>,
    #[serde(rename = "_mainLocale", default)]
    pub main_locale: Option<LocaleCodeSource>,
    #[serde(rename = "_availableLocale", default)]
    pub available_locales: Vec<AvailableLocaleSource>,
    #[serde(rename = "_flowGroups", default)]
    pub flow_groups: Vec<FlowGroupSource>,
    #[serde(rename = "_flows", default)]
    pub flows: Option<Vec<FlowSource>>,
    #[serde(rename = "_actors", default)]
    pub actors: Vec<ActorSource>,
    #[serde(rename = "_variables", default)]
    pub variables: Vec<VariableSource>,
    #[serde(rename = "_labels", default)]
    pub labels: Vec<LabelSource>,
    #[serde(rename = "_metadata", default)]
    pub metadata: Vec<MetadataSource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocaleCodeSource {
    #[serde(rename = "_code")]
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableLocaleSource {
    #[serde(rename = "_code")]
    pub code: String,
    #[serde(rename = "_desc", default)]
    pub desc: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowGroupSource {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_name", default)]
    pub name: String,
    #[serde(rename = "_flowIds", default)]
    pub flow_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowSource {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_name", default)]
    pub name: String,
    #[serde(rename = "_slug", default)]
    pub slug: String,
    #[serde(rename = "_nodes", default)]
    pub nodes: Vec<NodeSource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSource {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_type")]
    pub kind: String,
    #[serde(rename = "_permalink", default)]
    pub permalink: Option<String>,
    #[serde(rename = "_actorId", default)]
    pub actor_id: Option<String>,
    #[serde(rename = "_cycleType", default)]
    pub cycle_type: Option<String>,
    #[serde(rename = "_translatable", default = "default_true")]
    pub translatable: bool,
    #[serde(rename = "_metadata", default)]
    pub metadata: Vec<String>,
    #[serde(rename = "_elements", default)]
    pub elements: Vec<ElementSource>,
    #[serde(rename = "_connections", default)]
    pub connections: Vec<ConnectionSource>,
    #[serde(rename = "_jumpTo", default)]
    pub jump_to: Option<JumpToSource>,
    #[serde(rename = "_image", default)]
    pub image: Option<String>,
    #[serde(rename = "_header", default)]
    pub header: Option<ElementSource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementSource {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_nodeId", default)]
    pub node_id: String,
    #[serde(rename = "_type", default)]
    pub kind: Option<String>,
    #[serde(rename = "_localizedContents", default)]
    pub localized_contents: Vec<LocalizedContentSource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalizedContentSource {
    #[serde(rename = "_localeCode")]
    pub locale_code: String,
    #[serde(rename = "_text", default)]
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSource {
    #[serde(rename = "_to")]
    pub to: String,
    #[serde(rename = "_type", default)]
    pub kind: Option<String>,
    #[serde(rename = "_nodeElementId", default)]
    pub node_element_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JumpToSource {
    #[serde(rename = "_flowId")]
    pub flow_id: String,
    #[serde(rename = "_nodeId")]
    pub node_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorSource {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_uid", default)]
    pub uid: String,
    #[serde(rename = "_name", default)]
    pub name: String,
    #[serde(rename = "_isNarrator", default)]
    pub is_narrator: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableSource {
    #[serde(rename = "_key")]
    pub key: String,
    #[serde(rename = "_value", default)]
    pub value: serde_json::Value,
    #[serde(rename = "_type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelSource {
    #[serde(rename = "_key")]
    pub key: String,
    #[serde(rename = "_localizedContents", default)]
    pub localized_contents: Vec<LocalizedContentSource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataSource {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_uid", default)]
    pub uid: String,
    #[serde(rename = "_name", default)]
    pub name: String,
    #[serde(rename = "_icon", default)]
    pub icon: Option<String>,
    #[serde(rename = "_values", default)]
    pub values: Vec<MetadataValueSource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataValueSource {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_uid", default)]
    pub uid: String,
    #[serde(rename = "_value", default)]
    pub value: String,
    #[serde(rename = "_icon", default)]
    pub icon: Option<String>,
    #[serde(rename = "_metadataId", default)]
    pub metadata_id: String,
}

fn default_true() -> bool {
    true
}

fn parse_node_type(raw: &str) -> Result<NodeType> {
    match raw.to_ascii_lowercase().as_str() {
        "start" => Ok(NodeType::Start),
        "text" => Ok(NodeType::Text),
        "note" => Ok(NodeType::Note),
        "choice" => Ok(NodeType::Choice),
        "variables" => Ok(NodeType::Variables),
        "condition" => Ok(NodeType::Condition),
        "failcondition" => Ok(NodeType::FailCondition),
        "random" => Ok(NodeType::Random),
        "sequence" => Ok(NodeType::Sequence),
        "jumptonode" => Ok(NodeType::JumpToNode),
        "layout" => Ok(NodeType::Layout),
        "subflow" => Ok(NodeType::SubFlow),
        "label" => Ok(NodeType::Label),
        other => Err(LoadError::malformed(format!("Unknown node type '{other}'"))),
    }
}

fn parse_cycle_type(raw: Option<&str>) -> Result<CycleType> {
    match raw {
        None => Ok(CycleType::None),
        Some(s) => match s.to_ascii_lowercase().as_str() {
            "list" => Ok(CycleType::List),
            "loop" => Ok(CycleType::Loop),
            "random" => Ok(CycleType::Random),
            "smartrandom" => Ok(CycleType::SmartRandom),
            "none" | "" => Ok(CycleType::None),
            other => Err(LoadError::malformed(format!(
                "Unknown cycle type '{other}'"
            ))),
        },
    }
}

fn parse_connection_kind(raw: Option<&str>) -> ConnectionKind {
    match raw.map(str::to_ascii_lowercase).as_deref() {
        Some("subflow") => ConnectionKind::SubFlow,
        Some("failcondition") => ConnectionKind::FailCondition,
        _ => ConnectionKind::Default,
    }
}

fn parse_variable_type(key: &str, raw: Option<&str>) -> VariableType {
    match raw.map(str::to_ascii_lowercase).as_deref() {
        Some("bool") | Some("boolean") => VariableType::Bool,
        Some("string") | None => VariableType::String,
        Some("int") | Some("integer") => VariableType::Int,
        Some("float") | Some("number") => VariableType::Float,
        Some("fixed") => VariableType::Fixed,
        Some("separator") => VariableType::Separator,
        Some(other) => {
            warn!(variable = key, kind = other, "unknown variable type, treating as string");
            VariableType::String
        }
    }
}

fn check_api_version(version: Option<&str>) -> Result<()> {
    match version {
        None => {
            warn!("project source carries no API version");
            Ok(())
        }
        Some(v) => {
            let well_formed = {
                let mut parts = v.split('.');
                let major = parts.next().is_some_and(|p| p.parse::<u32>().is_ok());
                let minor = parts.next().map_or(true, |p| p.parse::<u32>().is_ok());
                major && minor && v.split('.').count() <= 2
            };
            if !well_formed {
                return Err(LoadError::BadVersion(v.to_string()));
            }
            if v != SUPPORTED_API_VERSION {
                warn!(
                    found = v,
                    supported = SUPPORTED_API_VERSION,
                    "project API version differs from the supported version"
                );
            }
            Ok(())
        }
    }
}

fn convert_element(source: ElementSource, node_id: &str) -> NodeElement {
    NodeElement {
        id: source.id,
        node_id: if source.node_id.is_empty() {
            node_id.to_string()
        } else {
            source.node_id
        },
        kind: source.kind,
        localized_contents: source
            .localized_contents
            .into_iter()
            .map(|c| LocalizedContent {
                locale_code: c.locale_code,
                text: c.text,
            })
            .collect(),
    }
}

fn convert_node(source: NodeSource) -> Result<Node> {
    let kind = parse_node_type(&source.kind)?;
    let cycle_type = parse_cycle_type(source.cycle_type.as_deref())?;
    let node_id = source.id.clone();
    Ok(Node {
        kind,
        cycle_type,
        permalink: source.permalink,
        actor_id: source.actor_id,
        translatable: source.translatable,
        metadata: source.metadata,
        elements: source
            .elements
            .into_iter()
            .map(|e| convert_element(e, &node_id))
            .collect(),
        connections: source
            .connections
            .into_iter()
            .map(|c| Connection {
                from_node_id: node_id.clone(),
                to: c.to,
                kind: parse_connection_kind(c.kind.as_deref()),
                node_element_id: c.node_element_id,
            })
            .collect(),
        jump_to: source.jump_to.map(|j| JumpTarget {
            flow_id: j.flow_id,
            node_id: j.node_id,
        }),
        image: source.image,
        header: source.header.map(|h| convert_element(h, &node_id)),
        id: source.id,
    })
}

impl Project {
    /// Convert a parsed source document into the typed model
    ///
    /// Checks the API version (warning on mismatch, error only when the
    /// field is uninterpretable), converts every entity, and runs
    /// [`Project::validate`] on the result.
    pub fn from_source(source: ProjectSource) -> Result<Self> {
        check_api_version(source.api_version.as_deref())?;

        let main_locale = source
            .main_locale
            .ok_or(LoadError::MissingField("_mainLocale"))?
            .code;
        let flows_source = source.flows.ok_or(LoadError::MissingField("_flows"))?;

        let mut flows = Vec::with_capacity(flows_source.len());
        for flow in flows_source {
            let nodes = flow
                .nodes
                .into_iter()
                .map(convert_node)
                .collect::<Result<Vec<_>>>()
                .map_err(|e| {
                    LoadError::malformed(format!("Flow '{}': {e}", flow.name))
                })?;
            flows.push(Flow {
                id: flow.id,
                name: flow.name,
                slug: flow.slug,
                nodes,
            });
        }

        let project = Project {
            name: source.name.unwrap_or_default(),
            api_version: source
                .api_version
                .unwrap_or_else(|| SUPPORTED_API_VERSION.to_string()),
            locale: source.locale.unwrap_or_else(|| main_locale.clone()),
            main_locale,
            available_locales: source
                .available_locales
                .into_iter()
                .map(|l| LocaleInfo {
                    code: l.code,
                    description: l.desc,
                })
                .collect(),
            flow_groups: source
                .flow_groups
                .into_iter()
                .map(|g| FlowGroup {
                    id: g.id,
                    name: g.name,
                    flow_ids: g.flow_ids,
                })
                .collect(),
            flows,
            actors: source
                .actors
                .into_iter()
                .map(|a| Actor {
                    id: a.id,
                    uid: a.uid,
                    name: a.name,
                    is_narrator: a.is_narrator,
                })
                .collect(),
            variables: source
                .variables
                .into_iter()
                .map(|v| Variable {
                    kind: parse_variable_type(&v.key, v.kind.as_deref()),
                    key: v.key,
                    value: v.value,
                })
                .collect(),
            labels: source
                .labels
                .into_iter()
                .map(|l| Label {
                    key: l.key,
                    localized_contents: l
                        .localized_contents
                        .into_iter()
                        .map(|c| LocalizedContent {
                            locale_code: c.locale_code,
                            text: c.text,
                        })
                        .collect(),
                })
                .collect(),
            metadata: source
                .metadata
                .into_iter()
                .map(|m| Metadata {
                    id: m.id,
                    uid: m.uid,
                    name: m.name,
                    icon: m.icon,
                    values: m
                        .values
                        .into_iter()
                        .map(|v| MetadataValue {
                            id: v.id,
                            uid: v.uid,
                            value: v.value,
                            icon: v.icon,
                            metadata_id: v.metadata_id,
                        })
                        .collect(),
                })
                .collect(),
        };

        project.validate()?;
        Ok(project)
    }

    /// Parse a project from raw JSON bytes
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let source: ProjectSource = serde_json::from_slice(bytes)?;
        Self::from_source(source)
    }

    /// Parse a project from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        let source: ProjectSource = serde_json::from_str(json)?;
        Self::from_source(source)
    }
}
