//! Sandboxed expression evaluation
//!
//! Authored expressions arrive as text embedded in element bodies
//! (`{$gold >= 10}`, `{%seen = true}`, the condition of an `[IF …]`
//! fragment, or the whole body of a Condition/Variables element). They are
//! evaluated by a self-contained lexer + recursive-descent parser; no host
//! language evaluation is ever involved.
//!
//! Variables are `$name` (global store) and `%name` (local store).
//! Assignments write back through [`VariableStore`]. All failures are
//! [`EvalError`]s, which the templater renders as `--error--` markers
//! rather than aborting the step.

mod lexer;
mod parser;

pub use parser::{BinOp, Expr, UnaryOp};

use crate::error::EvalError;
use crate::value::{Value, VariableStore};

/// Strip the HTML residue the editor leaves inside expressions
///
/// `<br>` tags become spaces; `&gt;`, `&lt;`, and `&nbsp;` are decoded.
pub fn sanitize(raw: &str) -> String {
    raw.replace("<br/>", " ")
        .replace("<br />", " ")
        .replace("<br>", " ")
        .replace("&gt;", ">")
        .replace("&lt;", "<")
        .replace("&nbsp;", " ")
}

/// Whether the expression is exactly one bare variable reference
///
/// Interpolation substitutes only such blocks (`{$gold}`, `{%seen}`);
/// every other block is evaluated for its effects and dropped from the
/// rendered output.
pub fn is_single_variable_reference(expr: &str) -> bool {
    matches!(
        lexer::tokenize(expr).as_deref(),
        Ok([lexer::Token::Var(_, _)])
    )
}

/// Whether the expression contains an assignment operator
///
/// An `=` counts unless it is part of `==`, `!=`, `<=`, or `>=`. Choice
/// elements use this to defer side effects until the choice is actually
/// selected.
pub fn contains_assignment(expr: &str) -> bool {
    let bytes = expr.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b != b'=' {
            continue;
        }
        let prev = i.checked_sub(1).map(|p| bytes[p]);
        let next = bytes.get(i + 1);
        if matches!(prev, Some(b'=') | Some(b'!') | Some(b'<') | Some(b'>')) {
            continue;
        }
        if next == Some(&b'=') {
            continue;
        }
        return true;
    }
    false
}

/// Parse and evaluate a sanitized expression against the store
pub fn evaluate(expr: &str, store: &mut VariableStore) -> Result<Value, EvalError> {
    let tokens = lexer::tokenize(expr)?;
    let ast = parser::Parser::new(tokens).parse()?;
    parser::eval(&ast, store)
}

/// Sanitize, then parse and evaluate a raw authored expression
pub fn evaluate_raw(raw: &str, store: &mut VariableStore) -> Result<Value, EvalError> {
    evaluate(&sanitize(raw), store)
}
