//! Error types for rust-yangbind

use thiserror::Error;

/// Main error type for binding, validation and codec operations
#[derive(Debug, Error)]
pub enum BindError {
    /// A value violates the restrictions of its YANG type
    #[error("invalid value at {path}: {reason}")]
    InvalidValue {
        /// Schema or instance path of the offending node
        path: String,
        /// What the value failed
        reason: String,
    },

    /// Structural mismatch between data and schema (unknown child, duplicate key, ...)
    #[error("schema violation: {0}")]
    SchemaViolation(String),

    /// The node-type module is malformed or references something undefined
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// The encoder was handed a path helper it cannot use
    #[error("invalid path helper: {0}")]
    InvalidPathHelper(String),

    /// Malformed XML input or XML writer failure
    #[error("XML error: {0}")]
    Xml(String),

    /// JSON parsing/serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BindError {
    pub(crate) fn invalid_value(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn xml(err: impl std::fmt::Display) -> Self {
        Self::Xml(err.to_string())
    }

    /// Re-anchor an `InvalidValue` at a more precise path; other variants pass through
    pub fn with_path(self, path: &str) -> Self {
        match self {
            Self::InvalidValue { reason, .. } => Self::InvalidValue {
                path: path.to_string(),
                reason,
            },
            other => other,
        }
    }

    /// True for `InvalidValue`
    pub fn is_invalid_value(&self) -> bool {
        matches!(self, Self::InvalidValue { .. })
    }

    /// True for `SchemaViolation`
    pub fn is_schema_violation(&self) -> bool {
        matches!(self, Self::SchemaViolation(_))
    }
}

/// Result type alias for rust-yangbind operations
pub type Result<T> = std::result::Result<T, BindError>;
