use crate::traits::{Message, Role, ToolContext};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-invocation state handed to an agent or workflow.
///
/// `metadata` is scratch space for the orchestration layer (routing cursors,
/// the agent currently running). Tools only ever see a [`ToolContext`] copy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentContext {
    pub conversation_id: String,
    pub session: HashMap<String, serde_json::Value>,
    pub history: Vec<Message>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl AgentContext {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            ..Self::default()
        }
    }

    /// A context with a fresh random conversation id.
    pub fn ephemeral() -> Self {
        Self::new(format!("conv_{}", uuid::Uuid::new_v4()))
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    pub fn with_session(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.session.insert(key.into(), value);
        self
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }

    pub fn tool_context(&self, agent_name: &str) -> ToolContext {
        ToolContext {
            conversation_id: self.conversation_id.clone(),
            agent_name: agent_name.to_string(),
            session: self.session.clone(),
        }
    }
}

/// Seeds the working message list: system prompt, prior history, new input.
/// System messages found in history are dropped in favour of `system_prompt`.
pub fn build_messages(
    system_prompt: Option<&str>,
    history: Vec<Message>,
    input: &str,
) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 2);

    if let Some(prompt) = system_prompt.filter(|p| !p.trim().is_empty()) {
        messages.push(Message::system(prompt));
    }

    messages.extend(history.into_iter().filter(|m| m.role != Role::System));
    messages.push(Message::user(input));
    messages
}

/// Messages worth persisting: everything except the system prompt.
pub fn persistable(messages: &[Message]) -> Vec<Message> {
    messages
        .iter()
        .filter(|m| m.role != Role::System)
        .cloned()
        .collect()
}
