use crate::agent::format::OutputFormat;
use crate::traits::{ToolCall, Usage};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_ITERATIONS: usize = 10;
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

/// Price per thousand tokens, in whatever currency the caller tracks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Pricing {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

impl Pricing {
    pub fn cost(&self, usage: &Usage) -> f64 {
        usage.input_tokens as f64 / 1000.0 * self.input_per_1k
            + usage.output_tokens as f64 / 1000.0 * self.output_per_1k
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    pub name: String,
    pub model: String,
    /// Provider name, used by the CLI to pick an implementation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Tool names this agent may call; `None` binds every registered tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<String>>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<OutputFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing: Option<Pricing>,
}

impl AgentConfig {
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            provider: None,
            system_prompt: None,
            tools: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
            top_p: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            output_format: None,
            pricing: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    pub fn with_pricing(mut self, pricing: Pricing) -> Self {
        self.pricing = Some(pricing);
        self
    }

    /// System prompt plus any output-format instructions.
    pub fn effective_system_prompt(&self) -> Option<String> {
        let instructions = self.output_format.as_ref().and_then(OutputFormat::instructions);
        match (&self.system_prompt, instructions) {
            (Some(prompt), Some(extra)) => Some(format!("{prompt}\n\n{extra}")),
            (Some(prompt), None) => Some(prompt.clone()),
            (None, extra) => extra,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ResponseMetadata {
    pub tokens_used: u64,
    pub latency_ms: u64,
    pub iterations: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

impl ResponseMetadata {
    /// Adds another response's counters into this one.
    pub fn absorb(&mut self, other: &ResponseMetadata) {
        self.tokens_used += other.tokens_used;
        self.latency_ms += other.latency_ms;
        self.iterations += other.iterations;
        self.cost = match (self.cost, other.cost) {
            (None, None) => None,
            (a, b) => Some(a.unwrap_or(0.0) + b.unwrap_or(0.0)),
        };
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    #[default]
    Stop,
    Error,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AgentResponse {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted: Option<serde_json::Value>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    pub metadata: ResponseMetadata,
    #[serde(default)]
    pub finish_reason: FinishReason,
    /// Agent the producer asked to hand off to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_agent: Option<String>,
}

impl AgentResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            finish_reason: FinishReason::Error,
            ..Self::default()
        }
    }
}
