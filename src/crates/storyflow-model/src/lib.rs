//! # storyflow-model - Typed Project Model for the Storyflow Runtime
//!
//! **The data crate the story-flow runtime builds on.** It defines the typed,
//! immutable in-memory representation of an authored story project and the
//! loader for the editor's JSON export format.
//!
//! ## Overview
//!
//! A story project is a set of **flows**: directed subgraphs of typed nodes
//! (text, choices, conditions, jumps, sub-flow calls, ...) connected by typed
//! edges, together with the actors, variables, labels, locales, and metadata
//! those nodes reference.
//!
//! This crate deliberately contains **no traversal state**. Element
//! visitation, variation rotation, the variable stores, and the cursor all
//! live in `storyflow-core`, keyed by the ids defined here, so one loaded
//! [`Project`] can back many concurrent runtimes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use storyflow_model::Project;
//!
//! let bytes = std::fs::read("project.json").unwrap();
//! let project = Project::from_json(&bytes).unwrap();
//!
//! let flow = project.default_flow().unwrap();
//! println!("entry flow: {} ({} nodes)", flow.name, flow.nodes.len());
//! ```
//!
//! ## Loading & Validation
//!
//! - [`Project::from_json`] / [`Project::from_json_str`] parse the editor
//!   export (underscore-prefixed field names, see [`source`]).
//! - [`Project::from_source`] converts an already-deserialized
//!   [`ProjectSource`].
//! - [`Project::validate`] checks the structural invariants (one Start node
//!   per flow, edges resolve within their flow, per-element edges reference
//!   real elements) and is run automatically on load.
//!
//! An API-version mismatch between the document and
//! [`SUPPORTED_API_VERSION`] logs a warning and loading continues.

pub mod error;
pub mod project;
pub mod source;

pub use error::{LoadError, Result};
pub use project::{
    Actor, Connection, ConnectionKind, CycleType, ElementId, Flow, FlowGroup, FlowId,
    JumpTarget, Label, LocaleInfo, LocalizedContent, Metadata, MetadataValue, Node,
    NodeElement, NodeId, NodeType, Project, Variable, VariableType,
};
pub use source::{ProjectSource, SUPPORTED_API_VERSION};
