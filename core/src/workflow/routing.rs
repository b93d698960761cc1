use crate::agent::{AgentContext, AgentResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Metadata key holding the name of the agent a supervisor is running.
pub const CURRENT_AGENT_KEY: &str = "current_agent";
/// Metadata key counting agents visited in the current round-robin cycle.
pub const ROUND_ROBIN_CURSOR_KEY: &str = "round_robin_cursor";

pub type RoutePredicate = Arc<dyn Fn(&AgentContext, &AgentResponse) -> bool + Send + Sync>;

#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "when", rename_all = "snake_case")]
pub enum RoutingCondition {
    ContentContains { text: String },
    FromAgent { name: String },
    MetadataEquals { key: String, value: Value },
    /// Only constructible from code.
    #[serde(skip)]
    Custom(RoutePredicate),
}

impl fmt::Debug for RoutingCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContentContains { text } => {
                f.debug_struct("ContentContains").field("text", text).finish()
            }
            Self::FromAgent { name } => f.debug_struct("FromAgent").field("name", name).finish(),
            Self::MetadataEquals { key, value } => f
                .debug_struct("MetadataEquals")
                .field("key", key)
                .field("value", value)
                .finish(),
            Self::Custom(_) => f.write_str("Custom(<fn>)"),
        }
    }
}

impl RoutingCondition {
    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&AgentContext, &AgentResponse) -> bool + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(predicate))
    }

    pub fn matches(&self, context: &AgentContext, response: &AgentResponse) -> bool {
        match self {
            Self::ContentContains { text } => response.content.contains(text.as_str()),
            Self::FromAgent { name } => context.metadata_str(CURRENT_AGENT_KEY) == Some(name.as_str()),
            Self::MetadataEquals { key, value } => context.metadata.get(key) == Some(value),
            Self::Custom(predicate) => predicate(context, response),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRule {
    pub condition: RoutingCondition,
    pub next_agent: String,
}

impl RoutingRule {
    pub fn new(condition: RoutingCondition, next_agent: impl Into<String>) -> Self {
        Self {
            condition,
            next_agent: next_agent.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
    #[default]
    RuleBased,
    RoundRobin,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingLogic {
    #[serde(default)]
    pub strategy: RoutingStrategy,
    #[serde(default)]
    pub rules: Vec<RoutingRule>,
    /// First agent to run; defaults to the first declared agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_agent: Option<String>,
}

impl RoutingLogic {
    pub fn round_robin() -> Self {
        Self {
            strategy: RoutingStrategy::RoundRobin,
            ..Self::default()
        }
    }

    pub fn with_rule(mut self, rule: RoutingRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Picks the agent to run after `response`, or `None` to stop.
    ///
    /// An explicit hand-off in the response wins, then the first matching
    /// rule. Round-robin moves to the next declared agent and stops once
    /// every agent has had a turn.
    pub fn next_agent(
        &self,
        agents: &[String],
        context: &mut AgentContext,
        response: &AgentResponse,
    ) -> Option<String> {
        if let Some(next) = response.next_agent.as_ref().filter(|n| !n.is_empty()) {
            return Some(next.clone());
        }

        if let Some(rule) = self
            .rules
            .iter()
            .find(|rule| rule.condition.matches(context, response))
        {
            return Some(rule.next_agent.clone());
        }

        match self.strategy {
            RoutingStrategy::RuleBased => None,
            RoutingStrategy::RoundRobin => Self::advance_round_robin(agents, context),
        }
    }

    fn advance_round_robin(agents: &[String], context: &mut AgentContext) -> Option<String> {
        let visited = context
            .metadata
            .get(ROUND_ROBIN_CURSOR_KEY)
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize
            + 1;
        context
            .metadata
            .insert(ROUND_ROBIN_CURSOR_KEY.to_string(), Value::from(visited));

        if visited >= agents.len() {
            return None;
        }

        let current = context
            .metadata_str(CURRENT_AGENT_KEY)
            .and_then(|name| agents.iter().position(|a| a == name))
            .unwrap_or(0);
        Some(agents[(current + 1) % agents.len()].clone())
    }
}
