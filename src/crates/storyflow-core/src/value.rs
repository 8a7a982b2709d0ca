//! Runtime values and the two-scope variable store
//!
//! Authored expressions read and write flat name→value maps: one global
//! store (seeded from the project's variable declarations, `$name`) and one
//! local store (per-runtime scratch space, `%name`).

use std::collections::HashMap;
use std::fmt;

use storyflow_model::{Variable, VariableType};
use tracing::warn;

/// A value held by a variable or produced by an expression
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    /// Truthiness under the expression language
    ///
    /// `false`, `0`, `0.0`, and the empty string are falsy; everything else
    /// is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
        }
    }

    /// Numeric view of this value, when it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Whether this value is numeric
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "{s}"),
        }
    }
}

/// Variable scope, selected by the sigil in authored expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// `$name` - project-wide, seeded from the variable declarations
    Global,
    /// `%name` - runtime-local scratch
    Local,
}

/// The two flat name→value maps backing expression evaluation
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    globals: HashMap<String, Value>,
    locals: HashMap<String, Value>,
}

impl VariableStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the global map from the project's variable declarations
    ///
    /// Values are coerced by their declared type; `separator` entries are
    /// display-only and never loaded. The local map is cleared.
    pub fn seed(&mut self, variables: &[Variable]) {
        self.globals.clear();
        self.locals.clear();
        for var in variables {
            if var.kind == VariableType::Separator {
                continue;
            }
            if let Some(value) = coerce(var) {
                self.globals.insert(var.key.clone(), value);
            }
        }
    }

    /// Read a variable
    pub fn get(&self, scope: Scope, name: &str) -> Option<&Value> {
        match scope {
            Scope::Global => self.globals.get(name),
            Scope::Local => self.locals.get(name),
        }
    }

    /// Write a variable
    pub fn set(&mut self, scope: Scope, name: &str, value: Value) {
        match scope {
            Scope::Global => self.globals.insert(name.to_string(), value),
            Scope::Local => self.locals.insert(name.to_string(), value),
        };
    }

    /// Read a global by name
    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    /// Read a local by name
    pub fn local(&self, name: &str) -> Option<&Value> {
        self.locals.get(name)
    }

    /// Drop all locals
    pub fn clear_locals(&mut self) {
        self.locals.clear();
    }
}

/// Coerce an authored variable value to its declared type
fn coerce(var: &Variable) -> Option<Value> {
    use serde_json::Value as Json;

    let value = match (var.kind, &var.value) {
        (VariableType::Bool, Json::Bool(b)) => Value::Bool(*b),
        (VariableType::Bool, Json::String(s)) => Value::Bool(s.trim() == "true"),
        (VariableType::Int, Json::Number(n)) => Value::Int(n.as_i64().unwrap_or(0)),
        (VariableType::Int, Json::String(s)) => {
            Value::Int(s.trim().parse().unwrap_or_default())
        }
        (VariableType::Float, Json::Number(n)) => Value::Float(n.as_f64().unwrap_or(0.0)),
        (VariableType::Float, Json::String(s)) => {
            Value::Float(s.trim().parse().unwrap_or_default())
        }
        (VariableType::String | VariableType::Fixed, Json::String(s)) => {
            Value::Str(s.clone())
        }
        (VariableType::String | VariableType::Fixed, other) => {
            Value::Str(other.to_string())
        }
        (VariableType::Separator, _) => return None,
        (kind, other) => {
            warn!(
                variable = %var.key,
                ?kind,
                value = %other,
                "variable value does not match its declared type, keeping as string"
            );
            Value::Str(other.to_string())
        }
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn var(key: &str, value: serde_json::Value, kind: VariableType) -> Variable {
        Variable {
            key: key.to_string(),
            value,
            kind,
        }
    }

    #[test]
    fn seed_coerces_declared_types() {
        let mut store = VariableStore::new();
        store.seed(&[
            var("flag", json!("true"), VariableType::Bool),
            var("count", json!("42"), VariableType::Int),
            var("ratio", json!(0.5), VariableType::Float),
            var("name", json!("Ada"), VariableType::String),
        ]);
        assert_eq!(store.global("flag"), Some(&Value::Bool(true)));
        assert_eq!(store.global("count"), Some(&Value::Int(42)));
        assert_eq!(store.global("ratio"), Some(&Value::Float(0.5)));
        assert_eq!(store.global("name"), Some(&Value::Str("Ada".to_string())));
    }

    #[test]
    fn separators_are_never_loaded() {
        let mut store = VariableStore::new();
        store.seed(&[var("---", json!(""), VariableType::Separator)]);
        assert!(store.global("---").is_none());
    }

    #[test]
    fn seed_resets_previous_state() {
        let mut store = VariableStore::new();
        store.set(Scope::Global, "stale", Value::Int(1));
        store.set(Scope::Local, "scratch", Value::Int(2));
        store.seed(&[var("fresh", json!(true), VariableType::Bool)]);
        assert!(store.global("stale").is_none());
        assert!(store.local("scratch").is_none());
        assert_eq!(store.global("fresh"), Some(&Value::Bool(true)));
    }

    #[test]
    fn truthiness() {
        assert!(Value::Bool(true).is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::Int(-3).is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(Value::Str("x".to_string()).is_truthy());
    }

    #[test]
    fn display_is_bare() {
        assert_eq!(Value::Str("hi".to_string()).to_string(), "hi");
        assert_eq!(Value::Int(7).to_string(), "7");
        assert_eq!(Value::Float(1.5).to_string(), "1.5");
        assert_eq!(Value::Bool(false).to_string(), "false");
    }
}
