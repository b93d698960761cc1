pub mod parallel;
pub mod policy;
pub mod routing;
pub mod sequential;
pub mod supervisor;

pub use parallel::ParallelWorkflow;
pub use policy::{ErrorHandlingStrategy, StepOutcome};
pub use routing::{RoutingCondition, RoutingLogic, RoutingRule, RoutingStrategy};
pub use sequential::SequentialWorkflow;
pub use supervisor::SupervisorWorkflow;

use crate::agent::{Agent, AgentConfig, AgentContext, AgentResponse, ToolRegistry};
use crate::error::{AgentError, AgentResult};
use crate::traits::{Memory, Provider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    Sequential,
    Parallel,
    Supervisor,
    /// Supervisor-style execution driven entirely by routing rules.
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(rename = "type")]
    pub kind: WorkflowKind,
    pub agents: Vec<AgentConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing: Option<RoutingLogic>,
    #[serde(default)]
    pub error_handling: ErrorHandlingStrategy,
}

impl WorkflowConfig {
    pub fn new(kind: WorkflowKind, agents: Vec<AgentConfig>) -> Self {
        Self {
            kind,
            agents,
            routing: None,
            error_handling: ErrorHandlingStrategy::default(),
        }
    }

    pub fn with_routing(mut self, routing: RoutingLogic) -> Self {
        self.routing = Some(routing);
        self
    }

    pub fn with_error_handling(mut self, strategy: ErrorHandlingStrategy) -> Self {
        self.error_handling = strategy;
        self
    }
}

/// Coordinates several agents to answer one input.
#[async_trait]
pub trait Workflow: Send + Sync {
    fn kind(&self) -> WorkflowKind;

    /// Agent names in declaration order.
    fn agent_names(&self) -> Vec<String>;

    async fn execute(&self, input: &str, context: &mut AgentContext)
    -> AgentResult<AgentResponse>;
}

/// Agents shared by every workflow kind, looked up by name.
pub struct WorkflowAgents {
    agents: Vec<Agent>,
    index: HashMap<String, usize>,
    error_handling: ErrorHandlingStrategy,
}

impl WorkflowAgents {
    pub fn new(
        config: &WorkflowConfig,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        memory: Option<Arc<dyn Memory>>,
    ) -> AgentResult<Self> {
        if config.agents.is_empty() {
            return Err(AgentError::Config(
                "a workflow needs at least one agent".to_string(),
            ));
        }

        let mut agents = Vec::with_capacity(config.agents.len());
        let mut index = HashMap::new();
        for agent_config in &config.agents {
            if index
                .insert(agent_config.name.clone(), agents.len())
                .is_some()
            {
                return Err(AgentError::Config(format!(
                    "duplicate agent name '{}'",
                    agent_config.name
                )));
            }
            agents.push(
                Agent::new(agent_config.clone(), provider.clone(), tools.clone())
                    .with_optional_memory(memory.clone()),
            );
        }

        Ok(Self {
            agents,
            index,
            error_handling: config.error_handling.clone(),
        })
    }

    pub fn get_agent(&self, name: &str) -> AgentResult<&Agent> {
        self.index
            .get(name)
            .map(|&i| &self.agents[i])
            .ok_or_else(|| AgentError::AgentNotFound(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.agents.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.agents.iter().map(|a| a.name().to_string()).collect()
    }

    pub fn error_handling(&self) -> &ErrorHandlingStrategy {
        &self.error_handling
    }

    /// Runs one agent under the workflow's error policy.
    pub async fn run_step(
        &self,
        agent: &Agent,
        input: &str,
        context: &AgentContext,
    ) -> AgentResult<StepOutcome> {
        self.error_handling
            .run(agent, input, &step_context(context, agent.name()))
            .await
    }

    /// Runs one agent with retries only; failures are returned to the caller.
    pub async fn attempt_step(
        &self,
        agent: &Agent,
        input: &str,
        context: &AgentContext,
    ) -> AgentResult<AgentResponse> {
        self.error_handling
            .attempt(agent, input, &step_context(context, agent.name()))
            .await
    }
}

/// Each agent keeps its own memory thread inside the workflow conversation.
fn step_context(context: &AgentContext, agent_name: &str) -> AgentContext {
    AgentContext {
        conversation_id: format!("{}:{}", context.conversation_id, agent_name),
        ..context.clone()
    }
}

pub fn create_workflow(
    config: WorkflowConfig,
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    memory: Option<Arc<dyn Memory>>,
) -> AgentResult<Box<dyn Workflow>> {
    let agents = WorkflowAgents::new(&config, provider, tools, memory)?;

    let workflow: Box<dyn Workflow> = match config.kind {
        WorkflowKind::Sequential => Box::new(SequentialWorkflow::new(agents)),
        WorkflowKind::Parallel => Box::new(ParallelWorkflow::new(agents)),
        WorkflowKind::Supervisor => Box::new(SupervisorWorkflow::new(
            agents,
            config.routing.unwrap_or_default(),
        )?),
        WorkflowKind::Custom => {
            let routing = config
                .routing
                .filter(|r| !r.rules.is_empty())
                .ok_or_else(|| {
                    AgentError::Config(
                        "custom workflows need routing with at least one rule".to_string(),
                    )
                })?;
            Box::new(SupervisorWorkflow::new(agents, routing)?.with_kind(WorkflowKind::Custom))
        }
    };

    Ok(workflow)
}
