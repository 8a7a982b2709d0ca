//! Variation registry
//!
//! Variations are text-level rotating placeholders authored as
//! `[[TYPE option | option | ...]]`. The registry extracts every block from
//! every element's main-locale text once, up front, and holds the rotation
//! state each block advances through as the element is rendered:
//!
//! - **LIST** - play the options in order, then stick on the last one
//! - **LOOP** - play the options in order, wrapping around
//! - **RND** - uniform with replacement
//! - **SRND** - uniform without replacement, refilled once exhausted
//!
//! Blocks are addressed `(element_id, index)` where `index` is the block's
//! 0-based position within its element, so the i-th block of an element
//! always consults the i-th record no matter how often the text renders.

use std::collections::HashMap;
use std::sync::LazyLock;

use rand::rngs::StdRng;
use rand::Rng;
use regex::Regex;
use storyflow_model::{ElementId, Project};
use tracing::warn;

/// Matches one `[[ ... ]]` variation block (dot matches newlines)
pub(crate) static VARIATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[\[(.*?)\]\]").unwrap());

/// Rotation discipline of a variation block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariationKind {
    List,
    Loop,
    Rnd,
    Srnd,
}

impl VariationKind {
    fn parse(keyword: &str) -> Option<Self> {
        match keyword {
            "LIST" => Some(VariationKind::List),
            "LOOP" => Some(VariationKind::Loop),
            "RND" => Some(VariationKind::Rnd),
            "SRND" => Some(VariationKind::Srnd),
            _ => None,
        }
    }
}

/// One extracted variation block with its rotation state
#[derive(Debug, Clone)]
pub struct Variation {
    /// Owning element
    pub element_id: ElementId,
    /// 0-based position among the element's blocks
    pub index: usize,
    /// Rotation discipline
    pub kind: VariationKind,
    /// Options as authored
    pub initial_values: Vec<String>,
    /// Options not yet played this cycle (LIST/LOOP/SRND)
    pub remaining: Vec<String>,
}

/// All variation blocks of a project, with rotation state
#[derive(Debug, Clone, Default)]
pub struct VariationRegistry {
    entries: Vec<Variation>,
    by_key: HashMap<(ElementId, usize), usize>,
}

/// Split a block body into its discipline keyword and options
///
/// Returns `None` when the keyword is not a known discipline.
pub(crate) fn parse_block(body: &str) -> Option<(VariationKind, Vec<String>)> {
    let body = body.trim().replace(" | ", "|");
    let (keyword, rest) = body.split_once(|c: char| c.is_whitespace())?;
    let kind = VariationKind::parse(keyword)?;
    let options: Vec<String> = rest
        .split('|')
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect();
    if options.is_empty() {
        return None;
    }
    Some((kind, options))
}

impl VariationRegistry {
    /// Scan every element of the project and extract its variation blocks
    ///
    /// Blocks are read from the main-locale text, left to right. Unknown
    /// discipline keywords are skipped with a warning.
    pub fn from_project(project: &Project) -> Self {
        let mut registry = Self::default();
        let main = &project.main_locale;
        for flow in &project.flows {
            for node in &flow.nodes {
                for element in node.elements.iter().chain(node.header.as_ref()) {
                    let Some(content) = element.content(main) else {
                        continue;
                    };
                    registry.scan_element(&element.id, &content.text);
                }
            }
        }
        registry
    }

    fn scan_element(&mut self, element_id: &str, text: &str) {
        for (index, captures) in VARIATION_RE.captures_iter(text).enumerate() {
            let body = &captures[1];
            match parse_block(body) {
                Some((kind, options)) => {
                    let entry = Variation {
                        element_id: element_id.to_string(),
                        index,
                        kind,
                        remaining: options.clone(),
                        initial_values: options,
                    };
                    self.by_key
                        .insert((entry.element_id.clone(), index), self.entries.len());
                    self.entries.push(entry);
                }
                None => {
                    warn!(
                        element = element_id,
                        block = body.trim(),
                        "skipping variation block with unknown discipline"
                    );
                }
            }
        }
    }

    /// Whether the registry holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, for inspection
    pub fn entries(&self) -> &[Variation] {
        &self.entries
    }

    /// Restore every block's rotation state to its authored options
    pub fn reset(&mut self) {
        for entry in &mut self.entries {
            entry.remaining = entry.initial_values.clone();
        }
    }

    /// Produce the next value of the block at `(element_id, index)`
    ///
    /// Returns `None` when no such block was registered.
    pub fn next_value(
        &mut self,
        element_id: &str,
        index: usize,
        rng: &mut StdRng,
    ) -> Option<String> {
        let entry_index = *self.by_key.get(&(element_id.to_string(), index))?;
        let entry = &mut self.entries[entry_index];
        let value = match entry.kind {
            VariationKind::List => {
                if entry.remaining.is_empty() {
                    entry.initial_values.last()?.clone()
                } else {
                    entry.remaining.remove(0)
                }
            }
            VariationKind::Loop => {
                let value = entry.remaining.remove(0);
                if entry.remaining.is_empty() {
                    entry.remaining = entry.initial_values.clone();
                }
                value
            }
            VariationKind::Rnd => {
                let i = rng.gen_range(0..entry.initial_values.len());
                entry.initial_values[i].clone()
            }
            VariationKind::Srnd => {
                if entry.remaining.is_empty() {
                    entry.remaining = entry.initial_values.clone();
                }
                let i = rng.gen_range(0..entry.remaining.len());
                entry.remaining.remove(i)
            }
        };
        Some(value)
    }
}
