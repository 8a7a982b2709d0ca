//! Error types for story traversal and expression evaluation
//!
//! Two error families with deliberately different blast radii:
//!
//! - [`EvalError`] is confined to the expression evaluator. The templater
//!   maps it to the literal `--error--` marker in rendered text, so an
//!   authoring mistake never aborts a running story.
//! - [`FlowError`] is returned from [`next_node`] when the traversal itself
//!   cannot continue: a dangling jump target, or a runaway chain of internal
//!   nodes hitting the depth cap. The host decides whether to abort.
//!
//! [`next_node`]: crate::Runtime::next_node

use thiserror::Error;

/// Result type for traversal operations
pub type Result<T> = std::result::Result<T, FlowError>;

/// Errors produced while evaluating an authored expression
///
/// These surface in rendered text as `--error--` (or ` --ERROR-- ` inside an
/// inline conditional), never as a failure of the step that triggered the
/// evaluation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    /// A `$global` or `%local` name has no value in its store
    #[error("Undefined variable: {0}")]
    UndefinedVariable(String),

    /// The expression could not be parsed
    #[error("Expression syntax error: {0}")]
    Syntax(String),

    /// An operator was applied to operands it does not support
    #[error("Type error: {0}")]
    Type(String),

    /// Division or remainder by zero
    #[error("Division by zero")]
    DivisionByZero,
}

impl EvalError {
    /// Build a syntax error with context
    pub fn syntax(message: impl Into<String>) -> Self {
        EvalError::Syntax(message.into())
    }

    /// Build a type error with context
    pub fn type_error(message: impl Into<String>) -> Self {
        EvalError::Type(message.into())
    }
}

/// Errors produced by the flow walker
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlowError {
    /// The cursor has no node to stand on
    ///
    /// Raised when a named flow or node cannot be resolved at `start`, or
    /// when the node under the cursor has vanished from the project.
    #[error("No reachable node: {0}")]
    UnreachableEnd(String),

    /// A JumpToNode target does not exist
    ///
    /// The cursor is left unchanged; the host typically reports the broken
    /// link and stops the story.
    #[error("Jump target node '{node_id}' in flow '{flow_id}' does not exist")]
    BadJump {
        /// Flow the jump pointed at
        flow_id: String,
        /// Node the jump pointed at
        node_id: String,
    },

    /// A single step passed through more internal nodes than the cap allows
    ///
    /// Guards against author-induced cycles over non-emitting nodes. The
    /// traversal is terminated (the cursor parks on the end sentinel) before
    /// this is returned.
    #[error("Walk depth cap of {0} exceeded")]
    DepthExceeded(usize),
}
