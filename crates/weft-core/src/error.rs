// Error types for turn orchestration

use thiserror::Error;

/// Result type alias for orchestration operations
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Errors that can occur while executing a turn
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Agent runtime error (model call failed or stream broke)
    #[error("Agent runtime error: {0}")]
    Runtime(String),

    /// Tool execution error
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Event emission error
    #[error("Event emission error: {0}")]
    Emission(String),

    /// Workflow configuration error
    #[error("Workflow configuration error: {0}")]
    Workflow(String),

    /// The resolved agent does not exist in the workflow
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    /// Turn exceeded the configured model-round cap
    #[error("Max model rounds ({0}) reached")]
    MaxRoundsReached(usize),

    /// No messages to process
    #[error("No messages to process")]
    NoMessages,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl OrchestratorError {
    /// Create an agent runtime error
    pub fn runtime(msg: impl Into<String>) -> Self {
        OrchestratorError::Runtime(msg.into())
    }

    /// Create a tool execution error
    pub fn tool(msg: impl Into<String>) -> Self {
        OrchestratorError::ToolExecution(msg.into())
    }

    /// Create an event emission error
    pub fn emission(msg: impl Into<String>) -> Self {
        OrchestratorError::Emission(msg.into())
    }

    /// Create a workflow configuration error
    pub fn workflow(msg: impl Into<String>) -> Self {
        OrchestratorError::Workflow(msg.into())
    }

    /// Create an unknown agent error
    pub fn unknown_agent(name: impl Into<String>) -> Self {
        OrchestratorError::UnknownAgent(name.into())
    }
}
