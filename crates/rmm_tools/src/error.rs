//! Error types for collaborator calls.

use thiserror::Error;

/// Result type alias for collaborator operations.
pub type ToolResult<T> = Result<T, ToolError>;

/// Errors reported by inventory, metrics and remediation services.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("{service} unavailable: {message}")]
    Unavailable { service: String, message: String },

    #[error("No data available for {0}")]
    NoData(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Remediation execution failed: {0}")]
    Execution(String),
}

impl ToolError {
    pub fn unavailable(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            service: service.into(),
            message: message.into(),
        }
    }
}
