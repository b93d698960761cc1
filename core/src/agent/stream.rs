use crate::agent::types::ResponseMetadata;
use crate::traits::ToolCall;
use serde::Serialize;
use std::collections::BTreeMap;

/// Events emitted by [`Agent::execute_stream`](crate::agent::Agent::execute_stream),
/// in order. A run ends with exactly one `Done` or `Error`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Iteration { number: usize },
    /// `delta` is false when the whole turn arrived in one piece.
    Content { text: String, delta: bool },
    ToolCalls { calls: Vec<ToolCall> },
    ToolResult { call: ToolCall },
    Done { content: String, metadata: ResponseMetadata },
    Error { message: String },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }
}

#[derive(Debug, Default)]
struct PendingToolCall {
    id: String,
    name: String,
    json_buf: String,
}

/// Reassembles tool calls from streamed fragments, keyed by the provider's
/// per-turn index.
#[derive(Debug, Default)]
pub struct ToolCallBuffer {
    pending: BTreeMap<usize, PendingToolCall>,
}

impl ToolCallBuffer {
    pub fn push(&mut self, index: usize, id: Option<String>, name: Option<String>, arguments: &str) {
        let entry = self.pending.entry(index).or_default();
        if let Some(id) = id.filter(|s| !s.is_empty()) {
            entry.id = id;
        }
        if let Some(name) = name.filter(|s| !s.is_empty()) {
            entry.name = name;
        }
        entry.json_buf.push_str(arguments);
    }

    /// Drains the buffer into complete calls. Unparseable argument text is
    /// kept as a JSON string so validation reports it to the model.
    pub fn finish(&mut self) -> Vec<ToolCall> {
        std::mem::take(&mut self.pending)
            .into_iter()
            .map(|(index, pending)| {
                let parameters = if pending.json_buf.trim().is_empty() {
                    serde_json::json!({})
                } else {
                    serde_json::from_str(&pending.json_buf)
                        .unwrap_or(serde_json::Value::String(pending.json_buf))
                };
                let id = if pending.id.is_empty() {
                    format!("call_{}_{}", index, uuid::Uuid::new_v4().simple())
                } else {
                    pending.id
                };
                ToolCall::new(id, pending.name, parameters)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn joins_fragments_by_index() {
        let mut buffer = ToolCallBuffer::default();
        buffer.push(1, Some("b".into()), Some("file_read".into()), "{\"path\":");
        buffer.push(0, Some("a".into()), Some("calculator".into()), "{\"a\": 1,");
        buffer.push(1, None, None, " \"x.txt\"}");
        buffer.push(0, None, None, " \"b\": 2, \"operation\": \"add\"}");

        let calls = buffer.finish();
        assert_eq!(calls.len(), 2);
        assert!(buffer.finish().is_empty());
        assert_eq!(calls[0].id, "a");
        assert_eq!(calls[0].parameters, json!({"a": 1, "b": 2, "operation": "add"}));
        assert_eq!(calls[1].name, "file_read");
        assert_eq!(calls[1].parameters, json!({"path": "x.txt"}));
    }

    #[test]
    fn missing_id_and_arguments_are_filled() {
        let mut buffer = ToolCallBuffer::default();
        buffer.push(0, None, Some("clock".into()), "");
        let calls = buffer.finish();
        assert!(calls[0].id.starts_with("call_0_"));
        assert_eq!(calls[0].parameters, json!({}));
    }

    #[test]
    fn broken_arguments_become_a_string() {
        let mut buffer = ToolCallBuffer::default();
        buffer.push(0, Some("x".into()), Some("calculator".into()), "{\"a\": ");
        let calls = buffer.finish();
        assert_eq!(calls[0].parameters, json!("{\"a\": "));
    }
}
