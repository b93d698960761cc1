use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    #[error("Maximum iterations ({max}) exceeded without a final answer")]
    MaxIterationsExceeded { max: usize },

    #[error("Agent execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Workflow failed: {0}")]
    WorkflowFailed(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl AgentError {
    /// Errors produced before a tool ever ran. These are never retried.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::ToolNotFound(_) | Self::InvalidParameters(_))
    }
}

pub type AgentResult<T> = Result<T, AgentError>;
