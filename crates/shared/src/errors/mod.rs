// crates/shared/src/errors/mod.rs
use thiserror::Error;

/// Failures raised while building or querying a [`crate::registry::ToolRegistry`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Tool '{0}' is already registered")]
    DuplicateTool(String),

    #[error("Tool '{0}' not found")]
    UnknownTool(String),
}

/// Failures of a single tool call. These never escape a dispatch batch;
/// they are rendered into an error tool result for the model to read.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("Tool '{0}' not found")]
    UnknownTool(String),

    #[error("Invalid arguments for '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("Tool '{tool}' failed: {reason}")]
    Invocation { tool: String, reason: String },
}
