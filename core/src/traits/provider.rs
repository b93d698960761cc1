use crate::traits::ToolSpec;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a conversation. Order within a message list is conversation
/// order and is replayed to providers as-is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call_id: None,
            name: None,
            tool_calls: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn assistant_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: Some(tool_calls),
            ..Self::new(Role::Assistant, content)
        }
    }

    pub fn tool_result(call: &ToolCall) -> Self {
        Self {
            tool_call_id: Some(call.id.clone()),
            name: Some(call.name.clone()),
            ..Self::new(Role::Tool, call.result_text())
        }
    }
}

/// A tool invocation requested by the model. Settled exactly once with
/// either a result or an error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, parameters: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parameters,
            result: None,
            error: None,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.result.is_some() || self.error.is_some()
    }

    /// Returns false if the call was already settled.
    pub fn set_result(&mut self, result: serde_json::Value) -> bool {
        if self.is_settled() {
            return false;
        }
        self.result = Some(result);
        true
    }

    /// Returns false if the call was already settled.
    pub fn set_error(&mut self, error: impl Into<String>) -> bool {
        if self.is_settled() {
            return false;
        }
        self.error = Some(error.into());
        true
    }

    /// Text fed back to the model as the tool-role message.
    pub fn result_text(&self) -> String {
        match (&self.result, &self.error) {
            (_, Some(error)) => format!("Error: {error}"),
            (Some(serde_json::Value::String(s)), None) => s.clone(),
            (Some(value), None) => value.to_string(),
            (None, None) => String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Usage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    #[default]
    EndTurn,
    ToolUse,
    MaxTokens,
    Other(String),
}

#[derive(Debug, Clone, Default)]
pub struct ProviderResponse {
    pub content: String,
    pub stop_reason: StopReason,
    pub usage: Usage,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, Default)]
pub struct GenerationConfig {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f64>,
    pub tools: Vec<ToolSpec>,
}

/// Partial output of a streaming provider call. The sequence is finite and
/// ends with `Done`.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    Content(String),
    ToolCallDelta {
        index: usize,
        id: Option<String>,
        name: Option<String>,
        arguments: String,
    },
    Usage(Usage),
    Done,
}

#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    async fn generate_response(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> anyhow::Result<ProviderResponse>;

    fn supports_streaming(&self) -> bool {
        false
    }

    async fn stream_response(
        &self,
        _messages: &[Message],
        _config: &GenerationConfig,
    ) -> anyhow::Result<BoxStream<'static, anyhow::Result<StreamChunk>>> {
        Err(anyhow::anyhow!(
            "Provider '{}' does not support streaming",
            self.name()
        ))
    }

    fn parse_tool_calls(&self, response: &ProviderResponse) -> Vec<ToolCall>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_call_settles_once() {
        let mut call = ToolCall::new("1", "calculator", json!({}));
        assert!(call.set_result(json!(4)));
        assert!(!call.set_error("late"));
        assert_eq!(call.result, Some(json!(4)));
        assert!(call.error.is_none());
    }

    #[test]
    fn tool_result_message_carries_error_text() {
        let mut call = ToolCall::new("c1", "calculator", json!({}));
        call.set_error("Cannot divide by zero");
        let msg = Message::tool_result(&call);
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("c1"));
        assert_eq!(msg.content, "Error: Cannot divide by zero");
    }

    #[test]
    fn string_results_are_not_quoted() {
        let mut call = ToolCall::new("c1", "file_read", json!({}));
        call.set_result(json!("hello"));
        assert_eq!(call.result_text(), "hello");
    }

    #[test]
    fn message_serializes_lowercase_role() {
        let value = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(value, json!({"role": "user", "content": "hi"}));
    }
}
