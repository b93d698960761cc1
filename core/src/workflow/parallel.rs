use super::{ErrorHandlingStrategy, Workflow, WorkflowAgents, WorkflowKind};
use crate::agent::{AgentContext, AgentResponse, ResponseMetadata};
use crate::error::{AgentError, AgentResult};
use async_trait::async_trait;
use futures_util::future::join_all;
use tracing::{info, warn};

/// Runs every agent on the same input at once and merges their answers.
///
/// Successful outputs are joined as `[name]: content` in declaration order.
/// Under `fail-fast` or `retry` any failure fails the whole run once every
/// agent has finished; otherwise failures are left out of the merge.
pub struct ParallelWorkflow {
    agents: WorkflowAgents,
}

impl ParallelWorkflow {
    pub fn new(agents: WorkflowAgents) -> Self {
        Self { agents }
    }
}

fn describe(failures: &[(String, AgentError)]) -> String {
    failures
        .iter()
        .map(|(name, e)| format!("[{name}]: {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Workflow for ParallelWorkflow {
    fn kind(&self) -> WorkflowKind {
        WorkflowKind::Parallel
    }

    fn agent_names(&self) -> Vec<String> {
        self.agents.names()
    }

    async fn execute(
        &self,
        input: &str,
        context: &mut AgentContext,
    ) -> AgentResult<AgentResponse> {
        let shared: &AgentContext = context;
        let runs = self.agents.iter().map(|agent| async move {
            let result = self.agents.attempt_step(agent, input, shared).await;
            (agent.name().to_string(), result)
        });
        let results = join_all(runs).await;

        let mut successes = Vec::new();
        let mut failures = Vec::new();
        for (name, result) in results {
            match result {
                Ok(response) => successes.push((name, response)),
                Err(e) => {
                    warn!(agent = %name, "Parallel branch failed: {}", e);
                    failures.push((name, e));
                }
            }
        }

        let policy = self.agents.error_handling();
        if !failures.is_empty()
            && matches!(
                policy,
                ErrorHandlingStrategy::FailFast | ErrorHandlingStrategy::Retry { .. }
            )
        {
            return Err(AgentError::WorkflowFailed(describe(&failures)));
        }

        if successes.is_empty() {
            let summary = describe(&failures);
            return Ok(match policy {
                ErrorHandlingStrategy::Fallback { .. } => policy
                    .fallback_response("parallel", &AgentError::WorkflowFailed(summary)),
                _ => AgentResponse::error(summary),
            });
        }

        let mut metadata = ResponseMetadata::default();
        let mut tool_calls = Vec::new();
        let mut sections = Vec::with_capacity(successes.len());
        for (name, response) in successes {
            metadata.absorb(&response.metadata);
            tool_calls.extend(response.tool_calls);
            sections.push(format!("[{name}]: {}", response.content));
        }

        info!(
            succeeded = sections.len(),
            failed = failures.len(),
            tokens = metadata.tokens_used,
            "Parallel workflow complete"
        );

        Ok(AgentResponse {
            content: sections.join("\n\n"),
            tool_calls,
            metadata,
            ..AgentResponse::default()
        })
    }
}
