//! Error types for the agent layer.

use rmm_core::CoreError;
use rmm_tools::ToolError;
use thiserror::Error;

/// Result type alias for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;

/// Errors that can occur while routing, running a pipeline or streaming.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Collaborator error: {0}")]
    Tool(#[from] ToolError),

    /// Model transport failure. Only surfaces mid-stream; before the first
    /// token the adapter substitutes a degraded response instead.
    #[error("Model error: {0}")]
    Model(String),

    #[error("Stream error: {0}")]
    Stream(String),
}

impl AgentError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AgentError::Core(CoreError::Cancelled))
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(self, AgentError::Core(CoreError::InvalidInput(_)))
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        AgentError::Model(err.to_string())
    }
}
