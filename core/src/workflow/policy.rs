use crate::agent::{Agent, AgentContext, AgentResponse};
use crate::error::{AgentError, AgentResult};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

fn default_retry_attempts() -> u32 {
    DEFAULT_RETRY_ATTEMPTS
}

/// What a workflow does when one of its agents fails.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "strategy", rename_all = "kebab-case")]
pub enum ErrorHandlingStrategy {
    /// Propagate the error immediately.
    #[default]
    FailFast,
    /// Re-run the failed agent, then propagate the last error.
    Retry {
        #[serde(default = "default_retry_attempts")]
        max_attempts: u32,
    },
    /// Replace the failed output with a synthetic response and carry on.
    Fallback {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// Drop the failed step and let the workflow decide where to go next.
    Continue,
}

#[derive(Debug)]
pub enum StepOutcome {
    Completed(AgentResponse),
    Skipped(AgentError),
}

impl ErrorHandlingStrategy {
    fn attempts(&self) -> u32 {
        match self {
            Self::Retry { max_attempts } => (*max_attempts).max(1),
            _ => 1,
        }
    }

    /// Runs the agent, re-running it when the strategy is `Retry`.
    pub async fn attempt(
        &self,
        agent: &Agent,
        input: &str,
        context: &AgentContext,
    ) -> AgentResult<AgentResponse> {
        let attempts = self.attempts();
        let mut attempt = 1;
        loop {
            match agent.execute(input, context).await {
                Ok(response) => return Ok(response),
                Err(e) if attempt < attempts => {
                    warn!(agent = %agent.name(), attempt, "Agent failed, retrying: {}", e);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Applies the strategy to a step that has already failed.
    pub fn recover(&self, agent_name: &str, error: AgentError) -> AgentResult<StepOutcome> {
        match self {
            Self::FailFast | Self::Retry { .. } => Err(error),
            Self::Fallback { .. } => {
                warn!(agent = %agent_name, "Agent failed, using fallback response: {}", error);
                Ok(StepOutcome::Completed(self.fallback_response(agent_name, &error)))
            }
            Self::Continue => {
                warn!(agent = %agent_name, "Agent failed, continuing without it: {}", error);
                Ok(StepOutcome::Skipped(error))
            }
        }
    }

    pub async fn run(
        &self,
        agent: &Agent,
        input: &str,
        context: &AgentContext,
    ) -> AgentResult<StepOutcome> {
        match self.attempt(agent, input, context).await {
            Ok(response) => Ok(StepOutcome::Completed(response)),
            Err(e) => self.recover(agent.name(), e),
        }
    }

    pub fn fallback_response(&self, agent_name: &str, error: &AgentError) -> AgentResponse {
        let content = match self {
            Self::Fallback {
                message: Some(message),
            } => message.clone(),
            _ => format!("Agent '{agent_name}' failed: {error}"),
        };
        AgentResponse::error(content)
    }
}
