use crate::traits::{
    GenerationConfig, Message, Provider, ProviderResponse, StopReason, StreamChunk, ToolCall,
    Usage,
};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures_util::stream::{self, BoxStream};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

type Responder = Box<dyn Fn(&[Message]) -> Result<ProviderResponse> + Send + Sync>;

/// Usage reported by the response helpers below.
pub const MOCK_USAGE: Usage = Usage {
    input_tokens: 10,
    output_tokens: 5,
};

/// A provider that replays scripted responses, or computes them from the
/// conversation with a closure. Tool calls live in `raw["tool_calls"]`.
pub struct MockProvider {
    script: Mutex<VecDeque<Result<ProviderResponse>>>,
    responder: Option<Responder>,
    streaming: bool,
    calls: AtomicUsize,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl MockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::scripted(responses.into_iter().map(Ok).collect())
    }

    pub fn scripted(script: Vec<Result<ProviderResponse>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            responder: None,
            streaming: false,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&[Message]) -> Result<ProviderResponse> + Send + Sync + 'static,
    {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::scripted(Vec::new())
        }
    }

    /// Serve responses through `stream_response`, one word per chunk.
    pub fn with_streaming(mut self) -> Self {
        self.streaming = true;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every message list the provider was called with, in call order.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn text(content: impl Into<String>) -> ProviderResponse {
        ProviderResponse {
            content: content.into(),
            stop_reason: StopReason::EndTurn,
            usage: MOCK_USAGE,
            raw: json!({}),
        }
    }

    pub fn tool_calls(content: impl Into<String>, calls: Vec<ToolCall>) -> ProviderResponse {
        let raw_calls: Vec<_> = calls
            .iter()
            .map(|c| json!({"id": c.id, "name": c.name, "arguments": c.parameters}))
            .collect();
        ProviderResponse {
            content: content.into(),
            stop_reason: StopReason::ToolUse,
            usage: MOCK_USAGE,
            raw: json!({ "tool_calls": raw_calls }),
        }
    }

    fn next_response(&self, messages: &[Message]) -> Result<ProviderResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(messages.to_vec());

        if let Some(responder) = &self.responder {
            return responder(messages);
        }

        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("MockProvider script exhausted")))
    }

    fn into_chunks(&self, response: ProviderResponse) -> Vec<Result<StreamChunk>> {
        let mut chunks: Vec<Result<StreamChunk>> = response
            .content
            .split_inclusive(' ')
            .map(|word| Ok(StreamChunk::Content(word.to_string())))
            .collect();

        for (index, call) in self.parse_tool_calls(&response).into_iter().enumerate() {
            let arguments = call.parameters.to_string();
            let mid = (0..=arguments.len() / 2)
                .rev()
                .find(|i| arguments.is_char_boundary(*i))
                .unwrap_or(0);
            let (head, tail) = arguments.split_at(mid);
            chunks.push(Ok(StreamChunk::ToolCallDelta {
                index,
                id: Some(call.id),
                name: Some(call.name),
                arguments: head.to_string(),
            }));
            chunks.push(Ok(StreamChunk::ToolCallDelta {
                index,
                id: None,
                name: None,
                arguments: tail.to_string(),
            }));
        }

        chunks.push(Ok(StreamChunk::Usage(response.usage)));
        chunks.push(Ok(StreamChunk::Done));
        chunks
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate_response(
        &self,
        messages: &[Message],
        _config: &GenerationConfig,
    ) -> Result<ProviderResponse> {
        self.next_response(messages)
    }

    fn supports_streaming(&self) -> bool {
        self.streaming
    }

    async fn stream_response(
        &self,
        messages: &[Message],
        _config: &GenerationConfig,
    ) -> Result<BoxStream<'static, Result<StreamChunk>>> {
        let response = self.next_response(messages)?;
        Ok(Box::pin(stream::iter(self.into_chunks(response))))
    }

    fn parse_tool_calls(&self, response: &ProviderResponse) -> Vec<ToolCall> {
        response
            .raw
            .get("tool_calls")
            .and_then(|v| v.as_array())
            .map(|calls| {
                calls
                    .iter()
                    .filter_map(|c| {
                        Some(ToolCall::new(
                            c.get("id")?.as_str()?,
                            c.get("name")?.as_str()?,
                            c.get("arguments").cloned().unwrap_or_else(|| json!({})),
                        ))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}
