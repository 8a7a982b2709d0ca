//! Text templating
//!
//! Renders an element's authored text by applying the template passes in
//! order, each consuming the output of the prior:
//!
//! 1. `[[TYPE a|b|c]]` variation blocks (via the [`VariationRegistry`])
//! 2. `[IF cond ? "yes" : "no"]` inline conditionals
//! 3. `[TODO ...]` stripping
//! 4. `[-]` just-once marker (flag set, marker removed)
//! 5. `[+]` if-no-more marker (flag set, marker removed)
//! 6. `{expr}` interpolation
//! 7. whitespace normalization
//!
//! Expression failures never abort a render: a failing `{expr}` becomes
//! `--error--`, a failing or malformed inline conditional ` --ERROR-- `.
//!
//! [`VariationRegistry`]: crate::variation::VariationRegistry

use std::sync::LazyLock;

use rand::rngs::StdRng;
use regex::{Captures, Regex};
use storyflow_model::{Node, NodeElement, NodeType, Project};
use tracing::debug;

use crate::error::EvalError;
use crate::eval;
use crate::locale;
use crate::state::ElementStateTable;
use crate::value::{Value, VariableStore};
use crate::variation::{self, VariationRegistry, VARIATION_RE};

/// Marker rendered in place of a failing `{expr}` block
pub const ERROR_MARKER: &str = "--error--";

/// Marker rendered in place of a failing or malformed inline conditional
pub const ERROR_MARKER_INLINE: &str = " --ERROR-- ";

static IF_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\[IF\s+(.*?)\]").unwrap());
static IF_ARMS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)^\s*"([^"]*)"\s*:\s*"([^"]*)"\s*$"#).unwrap());
static TODO_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\[TODO.*?\]").unwrap());
static EXPR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{([^{}]*)\}").unwrap());

/// A rendered element body
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderedText {
    /// Final text after all template passes
    pub text: String,
    /// Whether the main-locale fallback served the underlying content
    pub not_translated: bool,
}

/// Everything a render needs from the runtime, borrowed piecewise
pub(crate) struct TemplateContext<'a> {
    pub project: &'a Project,
    pub locale: &'a str,
    pub vars: &'a mut VariableStore,
    pub variations: &'a mut VariationRegistry,
    pub elements: &'a mut ElementStateTable,
    pub rng: &'a mut StdRng,
}

/// Render one element of a node
///
/// `force_eval` realizes assignment side effects inside Choice elements;
/// pre-display renders pass `false` so choosing a choice applies its
/// effects exactly once.
pub(crate) fn render_element(
    ctx: &mut TemplateContext<'_>,
    node: &Node,
    element: &NodeElement,
    force_eval: bool,
) -> RenderedText {
    let resolved = locale::resolve(
        &element.localized_contents,
        node.translatable,
        ctx.locale,
        &ctx.project.main_locale,
    );
    let Some(resolved) = resolved else {
        return RenderedText::default();
    };

    let text = apply_variations(ctx, &element.id, &resolved.text);
    let text = apply_inline_conditionals(ctx, &text);
    let text = TODO_RE.replace_all(&text, "").into_owned();
    let text = strip_markers(ctx, &element.id, text);
    let text = apply_interpolation(ctx, node.kind, &text, force_eval);

    RenderedText {
        text: normalize_whitespace(&text),
        not_translated: resolved.not_translated,
    }
}

/// Evaluate a Condition/Variables element body as an expression
///
/// A body without braces is one whole expression; a body with braces
/// evaluates every `{...}` block in order and yields the last value.
/// Elements with no usable content are falsy.
pub(crate) fn eval_element_expression(
    ctx: &mut TemplateContext<'_>,
    node: &Node,
    element: &NodeElement,
) -> Result<Value, EvalError> {
    let resolved = locale::resolve(
        &element.localized_contents,
        node.translatable,
        ctx.locale,
        &ctx.project.main_locale,
    );
    let Some(resolved) = resolved else {
        return Ok(Value::Bool(false));
    };

    if resolved.text.contains('{') {
        let mut last = Value::Bool(false);
        for captures in EXPR_RE.captures_iter(&resolved.text) {
            let expr = eval::sanitize(&captures[1]);
            if expr.trim().is_empty() {
                continue;
            }
            last = eval::evaluate(&expr, ctx.vars)?;
        }
        Ok(last)
    } else {
        let expr = eval::sanitize(&resolved.text);
        if expr.trim().is_empty() {
            return Ok(Value::Bool(false));
        }
        eval::evaluate(&expr, ctx.vars)
    }
}

/// Produce an element's authored text without advancing any runtime state
///
/// `cleaned` strips the TODO/just-once/if-no-more markers and collapses
/// variation blocks to their first option; `resolve_vars` substitutes
/// single-variable `{...}` blocks with their current value. Compound
/// blocks are left as authored - raw access never runs their effects.
pub(crate) fn original_text(
    vars: &mut VariableStore,
    raw: &str,
    cleaned: bool,
    resolve_vars: bool,
) -> String {
    let mut text = raw.to_string();
    if cleaned {
        text = VARIATION_RE
            .replace_all(&text, |captures: &Captures| {
                variation::parse_block(&captures[1])
                    .map(|(_, options)| options[0].clone())
                    .unwrap_or_default()
            })
            .into_owned();
        text = TODO_RE.replace_all(&text, "").into_owned();
        text = text.replace("[-]", "").replace("[+]", "");
    }
    if resolve_vars {
        text = EXPR_RE
            .replace_all(&text, |captures: &Captures| {
                let expr = eval::sanitize(&captures[1]);
                if !eval::is_single_variable_reference(&expr) {
                    return captures[0].to_string();
                }
                match eval::evaluate(&expr, vars) {
                    Ok(value) => value.to_string(),
                    Err(_) => captures[0].to_string(),
                }
            })
            .into_owned();
    }
    if cleaned {
        text = normalize_whitespace(&text);
    }
    text
}

fn apply_variations(ctx: &mut TemplateContext<'_>, element_id: &str, text: &str) -> String {
    let mut index = 0usize;
    VARIATION_RE
        .replace_all(text, |captures: &Captures| {
            let block_index = index;
            index += 1;
            let value = ctx
                .variations
                .next_value(element_id, block_index, ctx.rng)
                .or_else(|| {
                    // Unregistered block (label text, locale mismatch):
                    // fall back to the first authored option
                    variation::parse_block(&captures[1]).map(|(_, options)| options[0].clone())
                })
                .unwrap_or_default();
            format!("<variation>{value}</variation>")
        })
        .into_owned()
}

fn apply_inline_conditionals(ctx: &mut TemplateContext<'_>, text: &str) -> String {
    IF_RE
        .replace_all(text, |captures: &Captures| {
            let body = &captures[1];
            let Some((condition, arms)) = body.split_once('?') else {
                return ERROR_MARKER_INLINE.to_string();
            };
            let Some(arm_captures) = IF_ARMS_RE.captures(arms) else {
                return ERROR_MARKER_INLINE.to_string();
            };
            match eval::evaluate_raw(condition, ctx.vars) {
                Ok(value) if value.is_truthy() => arm_captures[1].to_string(),
                Ok(_) => arm_captures[2].to_string(),
                Err(err) => {
                    debug!(condition, %err, "inline conditional failed");
                    ERROR_MARKER_INLINE.to_string()
                }
            }
        })
        .into_owned()
}

fn strip_markers(ctx: &mut TemplateContext<'_>, element_id: &str, text: String) -> String {
    let mut text = text;
    if text.contains("[-]") {
        ctx.elements.get_mut(element_id).just_once = true;
        text = text.replace("[-]", "");
    }
    if text.contains("[+]") {
        ctx.elements.get_mut(element_id).if_no_more = true;
        text = text.replace("[+]", "");
    }
    text
}

fn apply_interpolation(
    ctx: &mut TemplateContext<'_>,
    node_kind: NodeType,
    text: &str,
    force_eval: bool,
) -> String {
    // Condition/Variables bodies without braces are one whole expression
    if matches!(node_kind, NodeType::Condition | NodeType::Variables) && !text.contains('{') {
        let expr = eval::sanitize(text);
        if expr.trim().is_empty() {
            return String::new();
        }
        return match eval::evaluate(&expr, ctx.vars) {
            Ok(value) => substituted(&expr, value),
            Err(err) => {
                debug!(%expr, %err, "interpolation failed");
                ERROR_MARKER.to_string()
            }
        };
    }
    EXPR_RE
        .replace_all(text, |captures: &Captures| {
            let expr = eval::sanitize(&captures[1]);
            if expr.trim().is_empty() {
                return String::new();
            }
            // Choice side effects are deferred until the choice is selected
            if node_kind == NodeType::Choice
                && eval::contains_assignment(&expr)
                && !force_eval
            {
                return String::new();
            }
            match eval::evaluate(&expr, ctx.vars) {
                Ok(value) => substituted(&expr, value),
                Err(err) => {
                    debug!(%expr, %err, "interpolation failed");
                    ERROR_MARKER.to_string()
                }
            }
        })
        .into_owned()
}

/// What an evaluated `{...}` block contributes to the output
///
/// Only a block that is exactly one variable reference substitutes its
/// value; compound blocks (assignments, arithmetic, literals) run for
/// their effects and leave no text behind.
fn substituted(expr: &str, value: Value) -> String {
    if eval::is_single_variable_reference(expr) {
        value.to_string()
    } else {
        String::new()
    }
}

fn normalize_whitespace(text: &str) -> String {
    let mut current = text.replace("&nbsp;", " ");
    loop {
        let trimmed = current.trim();
        let stripped = ["<br />", "<br/>", "<br>"]
            .iter()
            .find_map(|tag| {
                trimmed
                    .strip_prefix(tag)
                    .or_else(|| trimmed.strip_suffix(tag))
            });
        match stripped {
            Some(rest) => current = rest.to_string(),
            None => return trimmed.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Scope;
    use rand::SeedableRng;
    use storyflow_model::{CycleType, LocalizedContent};

    struct Fixture {
        project: Project,
        vars: VariableStore,
        variations: VariationRegistry,
        elements: ElementStateTable,
        rng: StdRng,
    }

    fn element(id: &str, text: &str) -> NodeElement {
        NodeElement {
            id: id.to_string(),
            node_id: "n1".to_string(),
            kind: None,
            localized_contents: vec![LocalizedContent {
                locale_code: "en".to_string(),
                text: text.to_string(),
            }],
        }
    }

    fn node_of_kind(kind: NodeType, elements: Vec<NodeElement>) -> Node {
        Node {
            id: "n1".to_string(),
            kind,
            permalink: None,
            actor_id: None,
            metadata: vec![],
            elements,
            connections: vec![],
            cycle_type: CycleType::None,
            translatable: true,
            jump_to: None,
            image: None,
            header: None,
        }
    }

    fn fixture(kind: NodeType, text: &str) -> (Fixture, Node) {
        let node = node_of_kind(kind, vec![element("e1", text)]);
        let project = Project {
            name: "t".to_string(),
            api_version: "1.4".to_string(),
            locale: "en".to_string(),
            main_locale: "en".to_string(),
            available_locales: vec![],
            flow_groups: vec![],
            flows: vec![storyflow_model::Flow {
                id: "f1".to_string(),
                name: "main".to_string(),
                slug: "main".to_string(),
                nodes: vec![node.clone()],
            }],
            actors: vec![],
            variables: vec![],
            labels: vec![],
            metadata: vec![],
        };
        let variations = VariationRegistry::from_project(&project);
        (
            Fixture {
                project,
                vars: VariableStore::new(),
                variations,
                elements: ElementStateTable::new(),
                rng: StdRng::seed_from_u64(11),
            },
            node,
        )
    }

    fn render(fixture: &mut Fixture, node: &Node, force_eval: bool) -> RenderedText {
        let mut ctx = TemplateContext {
            project: &fixture.project,
            locale: "en",
            vars: &mut fixture.vars,
            variations: &mut fixture.variations,
            elements: &mut fixture.elements,
            rng: &mut fixture.rng,
        };
        render_element(&mut ctx, node, &node.elements[0], force_eval)
    }

    #[test]
    fn plain_text_passes_through() {
        let (mut fx, node) = fixture(NodeType::Text, "Good morning.");
        assert_eq!(render(&mut fx, &node, false).text, "Good morning.");
    }

    #[test]
    fn interpolates_variables() {
        let (mut fx, node) = fixture(NodeType::Text, "n={$n}");
        fx.vars.set(Scope::Global, "n", Value::Int(1));
        assert_eq!(render(&mut fx, &node, false).text, "n=1");
    }

    #[test]
    fn inline_conditional_with_interpolation() {
        let (mut fx, node) =
            fixture(NodeType::Text, r#"[IF $x == 1 ? "one" : "other"] and {$x}"#);
        fx.vars.set(Scope::Global, "x", Value::Int(1));
        assert_eq!(render(&mut fx, &node, false).text, "one and 1");
    }

    #[test]
    fn inline_conditional_false_arm() {
        let (mut fx, node) = fixture(NodeType::Text, r#"[IF $x == 1 ? "one" : "other"]"#);
        fx.vars.set(Scope::Global, "x", Value::Int(2));
        assert_eq!(render(&mut fx, &node, false).text, "other");
    }

    #[test]
    fn malformed_conditional_renders_error_marker() {
        let (mut fx, node) = fixture(NodeType::Text, r#"[IF $x == 1 ? "only one arm"]"#);
        fx.vars.set(Scope::Global, "x", Value::Int(1));
        assert_eq!(render(&mut fx, &node, false).text, "--ERROR--");
    }

    #[test]
    fn failing_conditional_renders_error_marker() {
        let (mut fx, node) = fixture(NodeType::Text, r#"[IF $missing ? "a" : "b"]"#);
        assert_eq!(render(&mut fx, &node, false).text, "--ERROR--");
    }

    #[test]
    fn failing_interpolation_renders_error_marker() {
        let (mut fx, node) = fixture(NodeType::Text, "x is {$missing}");
        assert_eq!(render(&mut fx, &node, false).text, "x is --error--");
    }

    #[test]
    fn todo_blocks_are_stripped() {
        let (mut fx, node) = fixture(NodeType::Text, "Keep this[TODO rewrite later] text.");
        assert_eq!(render(&mut fx, &node, false).text, "Keep this text.");
    }

    #[test]
    fn markers_set_flags_and_vanish() {
        let (mut fx, node) = fixture(NodeType::Text, "[-]Only once");
        assert_eq!(render(&mut fx, &node, false).text, "Only once");
        assert!(fx.elements.get("e1").just_once);

        let (mut fx, node) = fixture(NodeType::Text, "[+]Fallback line");
        assert_eq!(render(&mut fx, &node, false).text, "Fallback line");
        assert!(fx.elements.get("e1").if_no_more);
    }

    #[test]
    fn list_variation_advances_and_sticks() {
        let (mut fx, node) = fixture(NodeType::Text, "[[LIST a|b|c]]");
        let picks: Vec<String> = (0..5)
            .map(|_| render(&mut fx, &node, false).text)
            .collect();
        assert_eq!(
            picks,
            vec![
                "<variation>a</variation>",
                "<variation>b</variation>",
                "<variation>c</variation>",
                "<variation>c</variation>",
                "<variation>c</variation>",
            ]
        );
    }

    #[test]
    fn choice_assignment_is_deferred_until_force_eval() {
        let (mut fx, node) = fixture(NodeType::Choice, "Buy the sword {$gold = $gold - 5}");
        fx.vars.set(Scope::Global, "gold", Value::Int(10));

        // Pre-display render must not touch the store
        assert_eq!(render(&mut fx, &node, false).text, "Buy the sword");
        assert_eq!(fx.vars.global("gold"), Some(&Value::Int(10)));

        // Selection applies the effect, output still omits the block
        assert_eq!(render(&mut fx, &node, true).text, "Buy the sword");
        assert_eq!(fx.vars.global("gold"), Some(&Value::Int(5)));
    }

    #[test]
    fn non_assignment_blocks_always_evaluate_in_choices() {
        let (mut fx, node) = fixture(NodeType::Choice, "You have {$gold} gold");
        fx.vars.set(Scope::Global, "gold", Value::Int(10));
        assert_eq!(render(&mut fx, &node, false).text, "You have 10 gold");
    }

    #[test]
    fn compound_blocks_run_for_effects_and_drop_from_output() {
        let (mut fx, node) = fixture(NodeType::Text, "a+b{$a + $b} then{2 + 3} {$a += $b}done");
        fx.vars.set(Scope::Global, "a", Value::Int(2));
        fx.vars.set(Scope::Global, "b", Value::Int(3));

        // Multi-reference and literal blocks leave no text; the compound
        // assignment still lands in the store
        assert_eq!(render(&mut fx, &node, false).text, "a+b then done");
        assert_eq!(fx.vars.global("a"), Some(&Value::Int(5)));
        assert_eq!(fx.vars.global("b"), Some(&Value::Int(3)));
    }

    #[test]
    fn assignment_in_text_node_applies_and_drops_output() {
        let (mut fx, node) = fixture(NodeType::Text, "{%seen = true}Hello");
        assert_eq!(render(&mut fx, &node, false).text, "Hello");
        assert_eq!(fx.vars.local("seen"), Some(&Value::Bool(true)));
    }

    #[test]
    fn whitespace_normalization() {
        let (mut fx, node) = fixture(NodeType::Text, "<br> <br/>hello&nbsp;there <br />");
        assert_eq!(render(&mut fx, &node, false).text, "hello there");
    }

    #[test]
    fn whole_body_expression_for_condition_elements() {
        let (mut fx, node) = fixture(NodeType::Condition, "$n &gt; 0");
        fx.vars.set(Scope::Global, "n", Value::Int(3));
        let mut ctx = TemplateContext {
            project: &fx.project,
            locale: "en",
            vars: &mut fx.vars,
            variations: &mut fx.variations,
            elements: &mut fx.elements,
            rng: &mut fx.rng,
        };
        let value = eval_element_expression(&mut ctx, &node, &node.elements[0]).unwrap();
        assert_eq!(value, Value::Bool(true));
    }

    #[test]
    fn original_text_cleaning_and_resolution() {
        let mut vars = VariableStore::new();
        vars.set(Scope::Global, "n", Value::Int(2));
        let raw = "[-][[LIST a|b]] n={$n}[TODO later]";
        assert_eq!(original_text(&mut vars, raw, true, true), "a n=2");
        assert_eq!(original_text(&mut vars, raw, false, false), raw);
        // Assignments are left untouched even when resolving
        let raw = "take {$n = 5}";
        assert_eq!(original_text(&mut vars, raw, false, true), raw);
        assert_eq!(vars.global("n"), Some(&Value::Int(2)));
    }
}
