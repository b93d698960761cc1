use super::tag_parser::extract_tagged_calls;
use crate::traits::{
    GenerationConfig, Message, Provider, ProviderResponse, Role, StopReason, StreamChunk,
    ToolCall, ToolSpec, Usage,
};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OllamaTool<'a>>,
    options: OllamaOptions,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OllamaMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OllamaToolCall>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaToolCall {
    function: OllamaFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Serialize)]
struct OllamaTool<'a> {
    r#type: &'a str,
    function: OllamaToolFunction<'a>,
}

#[derive(Debug, Serialize)]
struct OllamaToolFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Shared by the one-shot body and every streamed NDJSON line.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    message: Option<ResponseMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Option<Vec<OllamaToolCall>>,
}

impl OllamaResponse {
    fn usage(&self) -> Usage {
        Usage {
            input_tokens: self.prompt_eval_count,
            output_tokens: self.eval_count,
        }
    }
}

/// Per-stream state carried across NDJSON lines.
#[derive(Debug, Default)]
struct StreamState {
    next_index: usize,
    content: String,
}

impl StreamState {
    fn parse_line(&mut self, line: &str) -> Vec<StreamChunk> {
        let line = line.trim();
        if line.is_empty() {
            return Vec::new();
        }
        let response: OllamaResponse = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(e) => {
                debug!("Skipping unparseable Ollama line: {}", e);
                return Vec::new();
            }
        };

        let mut chunks = Vec::new();
        if let Some(message) = &response.message {
            if !message.content.is_empty() {
                self.content.push_str(&message.content);
                chunks.push(StreamChunk::Content(message.content.clone()));
            }
            for call in message.tool_calls.iter().flatten() {
                chunks.push(self.delta(None, call.function.name.clone(), &call.function.arguments));
            }
        }

        if response.done {
            // Models without native tool support write calls into their text.
            if self.next_index == 0 {
                let (_, tagged) = extract_tagged_calls(&self.content);
                for call in tagged {
                    chunks.push(self.delta(Some(call.id), call.name, &call.parameters));
                }
            }
            chunks.push(StreamChunk::Usage(response.usage()));
            chunks.push(StreamChunk::Done);
        }
        chunks
    }

    fn delta(&mut self, id: Option<String>, name: String, arguments: &Value) -> StreamChunk {
        let index = self.next_index;
        self.next_index += 1;
        StreamChunk::ToolCallDelta {
            index,
            id,
            name: Some(name),
            arguments: arguments.to_string(),
        }
    }
}

pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaProvider {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: DEFAULT_OLLAMA_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Tool results are folded into a user turn, which every Ollama model
    /// understands regardless of native tool support.
    fn convert_messages(messages: &[Message]) -> Vec<OllamaMessage> {
        let mut result = Vec::with_capacity(messages.len());
        let mut pending_results: Vec<String> = Vec::new();

        let flush = |pending: &mut Vec<String>, result: &mut Vec<OllamaMessage>| {
            if !pending.is_empty() {
                result.push(OllamaMessage {
                    role: Role::User.as_str(),
                    content: format!("[Tool results]\n{}", pending.join("\n")),
                    tool_calls: None,
                });
                pending.clear();
            }
        };

        for m in messages {
            if m.role == Role::Tool {
                pending_results.push(format!(
                    "<tool_result name=\"{}\" id=\"{}\">\n{}\n</tool_result>",
                    m.name.as_deref().unwrap_or("unknown"),
                    m.tool_call_id.as_deref().unwrap_or("unknown"),
                    m.content
                ));
                continue;
            }
            flush(&mut pending_results, &mut result);

            let tool_calls = m.tool_calls.as_ref().map(|calls| {
                calls
                    .iter()
                    .map(|c| OllamaToolCall {
                        function: OllamaFunction {
                            name: c.name.clone(),
                            arguments: c.parameters.clone(),
                        },
                    })
                    .collect()
            });
            result.push(OllamaMessage {
                role: m.role.as_str(),
                content: m.content.clone(),
                tool_calls,
            });
        }
        flush(&mut pending_results, &mut result);

        result
    }

    fn convert_tools(tools: &[ToolSpec]) -> Vec<OllamaTool<'_>> {
        tools
            .iter()
            .map(|t| OllamaTool {
                r#type: "function",
                function: OllamaToolFunction {
                    name: &t.name,
                    description: &t.description,
                    parameters: &t.parameters_schema,
                },
            })
            .collect()
    }

    fn build_request<'a>(
        messages: &[Message],
        config: &'a GenerationConfig,
        stream: bool,
    ) -> OllamaRequest<'a> {
        OllamaRequest {
            model: &config.model,
            messages: Self::convert_messages(messages),
            tools: Self::convert_tools(&config.tools),
            options: OllamaOptions {
                temperature: config.temperature,
                top_p: config.top_p,
                num_predict: config.max_tokens,
            },
            stream,
        }
    }

    async fn post(&self, request: &OllamaRequest<'_>) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(request)
            .send()
            .await
            .with_context(|| format!("Failed to reach Ollama at {}", self.base_url))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Ollama API error ({}): {}", status, error_text));
        }
        Ok(response)
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate_response(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> Result<ProviderResponse> {
        let request = Self::build_request(messages, config, false);
        let raw: Value = self
            .post(&request)
            .await?
            .json()
            .await
            .context("Ollama returned an unreadable body")?;

        let parsed: OllamaResponse =
            serde_json::from_value(raw.clone()).context("Unexpected Ollama response shape")?;
        let has_native_calls = parsed
            .message
            .as_ref()
            .and_then(|m| m.tool_calls.as_ref())
            .is_some_and(|c| !c.is_empty());
        let stop_reason = match parsed.done_reason.as_deref() {
            _ if has_native_calls => StopReason::ToolUse,
            None | Some("stop") => StopReason::EndTurn,
            Some("length") => StopReason::MaxTokens,
            Some(other) => StopReason::Other(other.to_string()),
        };

        Ok(ProviderResponse {
            content: parsed.message.as_ref().map(|m| m.content.clone()).unwrap_or_default(),
            stop_reason,
            usage: parsed.usage(),
            raw,
        })
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    async fn stream_response(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> Result<BoxStream<'static, Result<StreamChunk>>> {
        let request = Self::build_request(messages, config, true);
        let response = self.post(&request).await?;

        let (tx, rx) = tokio::sync::mpsc::channel::<Result<StreamChunk>>(256);

        tokio::spawn(async move {
            use futures_util::StreamExt as _;
            let mut bytes = response.bytes_stream();
            let mut buffer = String::new();
            let mut state = StreamState::default();

            while let Some(next) = bytes.next().await {
                let chunk = match next {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        warn!("Ollama stream interrupted: {}", e);
                        let _ = tx.send(Err(anyhow!("Ollama stream interrupted: {e}"))).await;
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(pos) = buffer.find('\n') {
                    let line: String = buffer.drain(..=pos).collect();
                    for parsed in state.parse_line(&line) {
                        let done = parsed == StreamChunk::Done;
                        if tx.send(Ok(parsed)).await.is_err() || done {
                            return;
                        }
                    }
                }
            }

            let _ = tx.send(Ok(StreamChunk::Done)).await;
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    fn parse_tool_calls(&self, response: &ProviderResponse) -> Vec<ToolCall> {
        let native: Vec<ToolCall> = response
            .raw
            .pointer("/message/tool_calls")
            .and_then(Value::as_array)
            .map(|calls| {
                calls
                    .iter()
                    .filter_map(|c| {
                        let function = c.get("function")?;
                        let name = function.get("name")?.as_str()?;
                        let arguments = function
                            .get("arguments")
                            .cloned()
                            .unwrap_or_else(|| Value::Object(Default::default()));
                        Some(ToolCall::new(
                            format!("ollama_{}", uuid::Uuid::new_v4().simple()),
                            name,
                            arguments,
                        ))
                    })
                    .collect()
            })
            .unwrap_or_default();

        if !native.is_empty() {
            return native;
        }
        extract_tagged_calls(&response.content).1
    }
}
