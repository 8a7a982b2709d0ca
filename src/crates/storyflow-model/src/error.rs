//! Error types for project loading

use thiserror::Error;

/// Result type for project loading operations
pub type Result<T> = std::result::Result<T, LoadError>;

/// Errors that can occur while loading or validating a project
///
/// Loading is the only fallible phase of the model crate: once a
/// [`Project`](crate::Project) exists it is immutable and every lookup on it
/// is a plain `Option`.
#[derive(Error, Debug)]
pub enum LoadError {
    /// A required field was absent from the project source
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// The source document declared an API version this loader cannot read
    ///
    /// Note that a plain version *mismatch* is only a warning; this variant
    /// is reserved for documents whose version field cannot be interpreted
    /// at all.
    #[error("Unreadable API version: {0}")]
    BadVersion(String),

    /// The source document is structurally invalid
    ///
    /// Covers JSON syntax errors, unknown node or cycle types, dangling
    /// connections, and every other violation of the project invariants.
    #[error("Malformed project: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for LoadError {
    fn from(err: serde_json::Error) -> Self {
        LoadError::Malformed(err.to_string())
    }
}

impl LoadError {
    /// Build a [`LoadError::Malformed`] with context naming the offending entity
    pub fn malformed(context: impl Into<String>) -> Self {
        LoadError::Malformed(context.into())
    }
}
