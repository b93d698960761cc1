use crate::error::{AgentError, AgentResult};
use crate::tools::validate_parameters;
use crate::traits::{Tool, ToolCall, ToolContext, ToolSpec};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Named set of tools, and the single entry point for running a tool call.
pub struct ToolRegistry {
    tools: RwLock<Vec<Arc<dyn Tool>>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(Vec::new()),
        }
    }

    /// Registers a tool, replacing any tool with the same name.
    pub fn register(&self, tool: Arc<dyn Tool>) {
        let mut tools = self.tools.write().unwrap_or_else(|e| e.into_inner());
        tools.retain(|t| t.name() != tool.name());
        tools.push(tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        let tools = self.tools.read().unwrap_or_else(|e| e.into_inner());
        tools.iter().find(|t| t.name() == name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        let tools = self.tools.read().unwrap_or_else(|e| e.into_inner());
        tools.iter().map(|t| t.name().to_string()).collect()
    }

    /// Specs for the tools an agent may use; `None` means every tool.
    pub fn specs(&self, allowed: Option<&[String]>) -> Vec<ToolSpec> {
        let tools = self.tools.read().unwrap_or_else(|e| e.into_inner());
        tools
            .iter()
            .filter(|t| is_allowed(allowed, t.name()))
            .map(|t| t.spec())
            .collect()
    }

    /// Resolves, validates and runs one call, retrying per the tool's policy.
    pub async fn invoke(
        &self,
        call: &ToolCall,
        allowed: Option<&[String]>,
        context: &ToolContext,
    ) -> AgentResult<serde_json::Value> {
        let tool = self
            .get(&call.name)
            .filter(|_| is_allowed(allowed, &call.name))
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;

        validate_parameters(&tool.parameters_schema(), &call.parameters)
            .map_err(AgentError::InvalidParameters)?;

        let Some(policy) = tool.retry_config() else {
            return tool
                .execute(call.parameters.clone(), context)
                .await
                .map_err(|e| AgentError::ToolExecution(e.to_string()));
        };

        let attempts = policy.attempts();
        let mut attempt = 0;
        loop {
            match tool.execute(call.parameters.clone(), context).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let message = e.to_string();
                    let is_last = attempt + 1 >= attempts;
                    if is_last || !policy.is_retryable(&message) {
                        return Err(AgentError::ToolExecution(message));
                    }

                    let delay = policy.delay_for_attempt(attempt);
                    warn!(
                        tool = %call.name,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Tool failed, retrying: {}",
                        message
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Runs every call concurrently and waits for all of them to settle.
    /// Returned calls keep the input order.
    pub async fn invoke_all(
        &self,
        calls: Vec<ToolCall>,
        allowed: Option<&[String]>,
        context: &ToolContext,
    ) -> Vec<ToolCall> {
        let futures = calls.into_iter().map(|mut call| async move {
            match self.invoke(&call, allowed, context).await {
                Ok(value) => {
                    call.set_result(value);
                }
                Err(e) => {
                    debug!(tool = %call.name, "Tool call failed: {}", e);
                    call.set_error(e.to_string());
                }
            }
            call
        });

        futures_util::future::join_all(futures).await
    }
}

fn is_allowed(allowed: Option<&[String]>, name: &str) -> bool {
    allowed.is_none_or(|names| names.iter().any(|n| n == name))
}
