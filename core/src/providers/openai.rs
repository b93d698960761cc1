use crate::traits::{
    GenerationConfig, Message, Provider, ProviderResponse, StopReason, StreamChunk, ToolCall,
    ToolSpec, Usage,
};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct WireToolCall<'a> {
    id: &'a str,
    r#type: &'a str,
    function: WireFunctionCall<'a>,
}

#[derive(Debug, Serialize)]
struct WireFunctionCall<'a> {
    name: &'a str,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    r#type: &'a str,
    function: WireToolFunction<'a>,
}

#[derive(Debug, Serialize)]
struct WireToolFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

impl From<WireUsage> for Usage {
    fn from(u: WireUsage) -> Self {
        Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCall>>,
}

#[derive(Debug, Deserialize)]
struct StreamToolCall {
    #[serde(default)]
    index: usize,
    id: Option<String>,
    function: Option<StreamFunction>,
}

#[derive(Debug, Deserialize)]
struct StreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}

/// Chat Completions client. Works against any OpenAI-compatible endpoint.
pub struct OpenAIProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAIProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn convert_messages(messages: &[Message]) -> Vec<WireMessage<'_>> {
        messages
            .iter()
            .map(|m| {
                let tool_calls = m.tool_calls.as_ref().map(|calls| {
                    calls
                        .iter()
                        .map(|c| WireToolCall {
                            id: &c.id,
                            r#type: "function",
                            function: WireFunctionCall {
                                name: &c.name,
                                arguments: c.parameters.to_string(),
                            },
                        })
                        .collect()
                });

                WireMessage {
                    role: m.role.as_str(),
                    content: if m.content.is_empty() && tool_calls.is_some() {
                        None
                    } else {
                        Some(m.content.as_str())
                    },
                    tool_calls,
                    tool_call_id: m.tool_call_id.as_deref(),
                }
            })
            .collect()
    }

    fn convert_tools(tools: &[ToolSpec]) -> Vec<WireTool<'_>> {
        tools
            .iter()
            .map(|t| WireTool {
                r#type: "function",
                function: WireToolFunction {
                    name: &t.name,
                    description: &t.description,
                    parameters: &t.parameters_schema,
                },
            })
            .collect()
    }

    fn build_request<'a>(
        messages: &'a [Message],
        config: &'a GenerationConfig,
        stream: bool,
    ) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &config.model,
            messages: Self::convert_messages(messages),
            tools: Self::convert_tools(&config.tools),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            top_p: config.top_p,
            stream,
            stream_options: stream.then_some(StreamOptions {
                include_usage: true,
            }),
        }
    }

    async fn post(&self, request: &ChatCompletionRequest<'_>) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .context("OpenAI request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("OpenAI API error ({}): {}", status, error_text));
        }
        Ok(response)
    }

    fn stop_reason(finish_reason: Option<&str>) -> StopReason {
        match finish_reason {
            None | Some("stop") => StopReason::EndTurn,
            Some("tool_calls") | Some("function_call") => StopReason::ToolUse,
            Some("length") => StopReason::MaxTokens,
            Some(other) => StopReason::Other(other.to_string()),
        }
    }

    /// Translates one server-sent-events line into stream chunks.
    fn parse_sse_line(line: &str) -> Vec<StreamChunk> {
        let Some(data) = line.trim().strip_prefix("data:").map(str::trim) else {
            return Vec::new();
        };
        if data == "[DONE]" {
            return vec![StreamChunk::Done];
        }

        let response: StreamResponse = match serde_json::from_str(data) {
            Ok(r) => r,
            Err(e) => {
                debug!("Skipping unparseable SSE payload: {}", e);
                return Vec::new();
            }
        };

        let mut chunks = Vec::new();
        for choice in response.choices {
            if let Some(content) = choice.delta.content
                && !content.is_empty()
            {
                chunks.push(StreamChunk::Content(content));
            }
            for call in choice.delta.tool_calls.unwrap_or_default() {
                let (name, arguments) = match call.function {
                    Some(f) => (f.name, f.arguments.unwrap_or_default()),
                    None => (None, String::new()),
                };
                chunks.push(StreamChunk::ToolCallDelta {
                    index: call.index,
                    id: call.id,
                    name,
                    arguments,
                });
            }
        }
        if let Some(usage) = response.usage {
            chunks.push(StreamChunk::Usage(usage.into()));
        }
        chunks
    }
}

#[async_trait]
impl Provider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
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
            .context("OpenAI returned an unreadable body")?;

        let parsed: ChatCompletionResponse =
            serde_json::from_value(raw.clone()).context("Unexpected OpenAI response shape")?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No choices in OpenAI response"))?;

        Ok(ProviderResponse {
            content: choice.message.content.unwrap_or_default(),
            stop_reason: Self::stop_reason(choice.finish_reason.as_deref()),
            usage: parsed.usage.map(Usage::from).unwrap_or_default(),
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

            while let Some(next) = bytes.next().await {
                let chunk = match next {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        warn!("OpenAI stream interrupted: {}", e);
                        let _ = tx.send(Err(anyhow!("OpenAI stream interrupted: {e}"))).await;
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(pos) = buffer.find('\n') {
                    let line: String = buffer.drain(..=pos).collect();
                    for parsed in Self::parse_sse_line(&line) {
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
        let Some(calls) = response
            .raw
            .pointer("/choices/0/message/tool_calls")
            .and_then(Value::as_array)
        else {
            return Vec::new();
        };

        calls
            .iter()
            .filter_map(|c| {
                let id = c.get("id")?.as_str()?;
                let function = c.get("function")?;
                let name = function.get("name")?.as_str()?;
                let parameters = match function.get("arguments") {
                    Some(Value::String(s)) if s.trim().is_empty() => Value::Object(Default::default()),
                    Some(Value::String(s)) => {
                        serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.clone()))
                    }
                    Some(other) => other.clone(),
                    None => Value::Object(Default::default()),
                };
                Some(ToolCall::new(id, name, parameters))
            })
            .collect()
    }
}
