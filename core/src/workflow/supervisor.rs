use super::routing::{CURRENT_AGENT_KEY, ROUND_ROBIN_CURSOR_KEY};
use super::{RoutingLogic, StepOutcome, Workflow, WorkflowAgents, WorkflowKind};
use crate::agent::{AgentContext, AgentResponse, ResponseMetadata};
use crate::error::{AgentError, AgentResult};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Upper bound on agent runs in one supervised execution.
pub const MAX_SUPERVISOR_HOPS: usize = 10;

/// Hands the conversation from agent to agent as routing dictates.
///
/// Each hop receives the previous agent's output as input. Execution stops
/// when routing yields no next agent, or after [`MAX_SUPERVISOR_HOPS`] runs.
pub struct SupervisorWorkflow {
    agents: WorkflowAgents,
    routing: RoutingLogic,
    kind: WorkflowKind,
}

impl SupervisorWorkflow {
    pub fn new(agents: WorkflowAgents, routing: RoutingLogic) -> AgentResult<Self> {
        if let Some(start) = &routing.start_agent {
            agents.get_agent(start)?;
        }
        Ok(Self {
            agents,
            routing,
            kind: WorkflowKind::Supervisor,
        })
    }

    pub fn with_kind(mut self, kind: WorkflowKind) -> Self {
        self.kind = kind;
        self
    }

    fn start_agent(&self, names: &[String]) -> AgentResult<String> {
        self.routing
            .start_agent
            .clone()
            .or_else(|| names.first().cloned())
            .ok_or_else(|| AgentError::Config("workflow has no agents".to_string()))
    }

    /// Next declared agent after `current`, used when a step is skipped.
    fn following(names: &[String], current: &str) -> Option<String> {
        let position = names.iter().position(|n| n == current)?;
        names.get(position + 1).cloned()
    }
}

#[async_trait]
impl Workflow for SupervisorWorkflow {
    fn kind(&self) -> WorkflowKind {
        self.kind
    }

    fn agent_names(&self) -> Vec<String> {
        self.agents.names()
    }

    async fn execute(
        &self,
        input: &str,
        context: &mut AgentContext,
    ) -> AgentResult<AgentResponse> {
        context.metadata.remove(ROUND_ROBIN_CURSOR_KEY);
        context.metadata.remove(CURRENT_AGENT_KEY);

        let names = self.agents.names();
        let mut current = self.start_agent(&names)?;
        let mut current_input = input.to_string();
        let mut totals = ResponseMetadata::default();
        let mut last: Option<AgentResponse> = None;
        let mut finished = false;

        for hop in 1..=MAX_SUPERVISOR_HOPS {
            let agent = self.agents.get_agent(&current)?;
            context
                .metadata
                .insert(CURRENT_AGENT_KEY.to_string(), Value::from(current.as_str()));
            debug!(agent = %current, hop, "Supervisor dispatching");

            let next = match self.agents.run_step(agent, &current_input, context).await? {
                StepOutcome::Completed(response) => {
                    totals.absorb(&response.metadata);
                    current_input = response.content.clone();
                    let next = self.routing.next_agent(&names, context, &response);
                    last = Some(response);
                    next
                }
                StepOutcome::Skipped(_) => Self::following(&names, &current),
            };

            match next {
                Some(name) => current = name,
                None => {
                    finished = true;
                    break;
                }
            }
        }

        if !finished {
            warn!(
                max_hops = MAX_SUPERVISOR_HOPS,
                pending = %current,
                "Supervisor hop limit reached, returning last response"
            );
        }

        let mut response = last.ok_or_else(|| {
            AgentError::WorkflowFailed("no supervised agent produced a response".to_string())
        })?;
        response.metadata = totals;
        response.next_agent = None;

        info!(
            iterations = totals.iterations,
            tokens = totals.tokens_used,
            "Supervisor workflow complete"
        );
        Ok(response)
    }
}
