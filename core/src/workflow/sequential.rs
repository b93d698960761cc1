use super::{StepOutcome, Workflow, WorkflowAgents, WorkflowKind};
use crate::agent::{AgentContext, AgentResponse, ResponseMetadata};
use crate::error::{AgentError, AgentResult};
use async_trait::async_trait;
use tracing::{debug, info};

/// Runs agents in declaration order, feeding each one the previous output.
pub struct SequentialWorkflow {
    agents: WorkflowAgents,
}

impl SequentialWorkflow {
    pub fn new(agents: WorkflowAgents) -> Self {
        Self { agents }
    }
}

#[async_trait]
impl Workflow for SequentialWorkflow {
    fn kind(&self) -> WorkflowKind {
        WorkflowKind::Sequential
    }

    fn agent_names(&self) -> Vec<String> {
        self.agents.names()
    }

    async fn execute(
        &self,
        input: &str,
        context: &mut AgentContext,
    ) -> AgentResult<AgentResponse> {
        let mut current_input = input.to_string();
        let mut totals = ResponseMetadata::default();
        let mut last: Option<AgentResponse> = None;

        for name in self.agents.names() {
            let agent = self.agents.get_agent(&name)?;
            debug!(agent = %name, "Running sequential step");

            match self.agents.run_step(agent, &current_input, context).await? {
                StepOutcome::Completed(response) => {
                    totals.absorb(&response.metadata);
                    current_input = response.content.clone();
                    last = Some(response);
                }
                // The next agent sees the last successful output.
                StepOutcome::Skipped(_) => {}
            }
        }

        let mut response = last.ok_or_else(|| {
            AgentError::WorkflowFailed("no agent in the sequence produced a response".to_string())
        })?;
        response.metadata = totals;

        info!(
            agents = self.agents.names().len(),
            tokens = totals.tokens_used,
            "Sequential workflow complete"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use crate::agent::{AgentConfig, AgentContext, FinishReason, ToolRegistry};
    use crate::error::AgentError;
    use crate::providers::MockProvider;
    use crate::traits::{Message, Role};
    use crate::workflow::{ErrorHandlingStrategy, WorkflowConfig, WorkflowKind, create_workflow};
    use std::sync::Arc;

    fn system_prompt(messages: &[Message]) -> &str {
        messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }

    fn last_user(messages: &[Message]) -> String {
        messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }

    /// Agent "a" answers 42, agent "b" doubles its input, "broken" fails.
    fn arithmetic_provider() -> Arc<MockProvider> {
        Arc::new(MockProvider::from_fn(|messages| {
            match system_prompt(messages) {
                "answer" => Ok(MockProvider::text("42")),
                "double" => {
                    let n: i64 = last_user(messages).trim().parse()?;
                    Ok(MockProvider::text((n * 2).to_string()))
                }
                _ => Err(anyhow::anyhow!("model unavailable")),
            }
        }))
    }

    fn agents() -> Vec<AgentConfig> {
        vec![
            AgentConfig::new("a", "m").with_system_prompt("answer"),
            AgentConfig::new("broken", "m").with_system_prompt("fail"),
            AgentConfig::new("b", "m").with_system_prompt("double"),
        ]
    }

    #[tokio::test]
    async fn feeds_output_forward_and_sums_tokens() {
        let provider = arithmetic_provider();
        let config = WorkflowConfig::new(
            WorkflowKind::Sequential,
            vec![
                AgentConfig::new("a", "m").with_system_prompt("answer"),
                AgentConfig::new("b", "m").with_system_prompt("double"),
            ],
        );
        let workflow = create_workflow(config, provider.clone(), Arc::new(ToolRegistry::new()), None)
            .unwrap();

        let response = workflow
            .execute("what is the answer?", &mut AgentContext::new("c"))
            .await
            .unwrap();

        assert_eq!(response.content, "84");
        assert_eq!(response.metadata.tokens_used, 30);
        assert_eq!(response.metadata.iterations, 2);
        assert_eq!(last_user(&provider.requests()[1]), "42");
    }

    #[tokio::test]
    async fn continue_skips_failed_step() {
        let config = WorkflowConfig::new(WorkflowKind::Sequential, agents())
            .with_error_handling(ErrorHandlingStrategy::Continue);
        let workflow =
            create_workflow(config, arithmetic_provider(), Arc::new(ToolRegistry::new()), None)
                .unwrap();

        let response = workflow
            .execute("go", &mut AgentContext::new("c"))
            .await
            .unwrap();
        assert_eq!(response.content, "84");
        assert_eq!(response.finish_reason, FinishReason::Stop);
    }

    #[tokio::test]
    async fn fail_fast_stops_the_sequence() {
        let provider = arithmetic_provider();
        let config = WorkflowConfig::new(WorkflowKind::Sequential, agents());
        let workflow = create_workflow(config, provider.clone(), Arc::new(ToolRegistry::new()), None)
            .unwrap();

        let err = workflow
            .execute("go", &mut AgentContext::new("c"))
            .await
            .unwrap_err();
        assert_eq!(err, AgentError::ExecutionFailed("model unavailable".into()));
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn fallback_output_feeds_the_next_agent() {
        let provider = Arc::new(MockProvider::from_fn(|messages| {
            match system_prompt(messages) {
                "echo" => Ok(MockProvider::text(format!("saw: {}", last_user(messages)))),
                _ => Err(anyhow::anyhow!("down")),
            }
        }));
        let config = WorkflowConfig::new(
            WorkflowKind::Sequential,
            vec![
                AgentConfig::new("broken", "m").with_system_prompt("fail"),
                AgentConfig::new("echo", "m").with_system_prompt("echo"),
            ],
        )
        .with_error_handling(ErrorHandlingStrategy::Fallback {
            message: Some("no draft".into()),
        });
        let workflow =
            create_workflow(config, provider, Arc::new(ToolRegistry::new()), None).unwrap();

        let response = workflow
            .execute("go", &mut AgentContext::new("c"))
            .await
            .unwrap();
        assert_eq!(response.content, "saw: no draft");
    }

    #[tokio::test]
    async fn all_skipped_is_a_workflow_failure() {
        let config = WorkflowConfig::new(
            WorkflowKind::Sequential,
            vec![AgentConfig::new("broken", "m").with_system_prompt("fail")],
        )
        .with_error_handling(ErrorHandlingStrategy::Continue);
        let workflow =
            create_workflow(config, arithmetic_provider(), Arc::new(ToolRegistry::new()), None)
                .unwrap();

        let err = workflow
            .execute("go", &mut AgentContext::new("c"))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::WorkflowFailed(_)));
    }
}
