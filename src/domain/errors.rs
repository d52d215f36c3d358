//! Domain error types
//!
//! Two layers of errors live here:
//!
//! - [`ConfigraphError`] is returned from fallible library calls (loading settings,
//!   registering entities, cache provider lifecycle). It is the only error that can
//!   escape [`Configraph::resolve_config`](crate::core::Configraph::resolve_config).
//! - [`NodeError`] is attached to a single configuration node. A node error never
//!   aborts a resolution pass; it is recorded on the node and inspected afterwards.

use serde::Serialize;
use thiserror::Error;

/// Main Configraph error type
#[derive(Debug, Error)]
pub enum ConfigraphError {
    /// Engine settings errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Structural errors in the registered graph (duplicate entities, bad keys)
    #[error("Schema error: {0}")]
    Schema(String),

    /// Caching provider contract violations
    #[error("Cache error: {0}")]
    Cache(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// Node-local error kinds
///
/// Each variant is recorded on the node it concerns. Errors are cloneable because
/// one node's outcome can be observed by any number of dependent resolvers.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeError {
    /// The schema is structurally invalid for this node; resolution is skipped
    #[error("Schema error: {message}")]
    Schema { message: String },

    /// The raw value could not be converted to the declared type
    #[error("Coercion error: {message}")]
    Coercion { message: String },

    /// The coerced value failed a validation rule
    #[error("Validation error: {message}")]
    Validation { message: String, is_warning: bool },

    /// The resolver failed
    ///
    /// `expected` is true when a resolver author raised the error deliberately and
    /// false when an unexpected failure was wrapped by the engine.
    #[error("Resolution error: {message}")]
    Resolution {
        message: String,
        expected: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        cause: Option<String>,
    },

    /// The value settled as empty but the node is required
    #[error("Value is required but is currently empty")]
    Required,
}

impl NodeError {
    pub fn schema(message: impl Into<String>) -> Self {
        NodeError::Schema {
            message: message.into(),
        }
    }

    pub fn coercion(message: impl Into<String>) -> Self {
        NodeError::Coercion {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        NodeError::Validation {
            message: message.into(),
            is_warning: false,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        NodeError::Validation {
            message: message.into(),
            is_warning: true,
        }
    }

    /// A resolution failure raised on purpose by resolver code
    pub fn resolution(message: impl Into<String>) -> Self {
        NodeError::Resolution {
            message: message.into(),
            expected: true,
            cause: None,
        }
    }

    /// Wraps an arbitrary resolver failure, keeping the full context chain as the cause
    pub fn unexpected(err: &anyhow::Error) -> Self {
        NodeError::Resolution {
            message: err.to_string(),
            expected: false,
            cause: Some(format!("{err:#}")),
        }
    }

    /// Returns true for validation errors flagged as warnings
    pub fn is_warning(&self) -> bool {
        matches!(self, NodeError::Validation { is_warning: true, .. })
    }

    /// Returns true if this error makes its node invalid
    pub fn is_blocking(&self) -> bool {
        !self.is_warning()
    }

    /// Returns true for resolution errors the engine wrapped from unexpected failures
    pub fn is_unexpected(&self) -> bool {
        matches!(
            self,
            NodeError::Resolution {
                expected: false,
                ..
            }
        )
    }

    /// Short name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            NodeError::Schema { .. } => "schema",
            NodeError::Coercion { .. } => "coercion",
            NodeError::Validation { .. } => "validation",
            NodeError::Resolution { .. } => "resolution",
            NodeError::Required => "required",
        }
    }
}

/// Turns a resolver failure into a node error
///
/// Domain errors raised through `anyhow` keep their kind; anything else is wrapped as
/// an unexpected resolution error.
pub(crate) fn classify_resolver_error(err: anyhow::Error) -> NodeError {
    match err.downcast::<NodeError>() {
        Ok(NodeError::Schema { message }) => NodeError::Schema { message },
        Ok(resolution @ NodeError::Resolution { .. }) => resolution,
        Ok(other) => NodeError::Resolution {
            message: other.to_string(),
            expected: true,
            cause: None,
        },
        Err(err) => NodeError::unexpected(&err),
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for ConfigraphError {
    fn from(err: std::io::Error) -> Self {
        ConfigraphError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for ConfigraphError {
    fn from(err: serde_json::Error) -> Self {
        ConfigraphError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for ConfigraphError {
    fn from(err: toml::de::Error) -> Self {
        ConfigraphError::Configuration(format!("TOML parse error: {err}"))
    }
}
