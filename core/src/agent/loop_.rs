use crate::agent::context::{AgentContext, build_messages, persistable};
use crate::agent::format::Formatted;
use crate::agent::registry::ToolRegistry;
use crate::agent::stream::{StreamEvent, ToolCallBuffer};
use crate::agent::types::{AgentConfig, AgentResponse, FinishReason, ResponseMetadata};
use crate::error::{AgentError, AgentResult};
use crate::traits::{
    GenerationConfig, Memory, Message, Provider, StreamChunk, ToolCall, ToolContext, Usage,
};
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

const STREAM_BUFFER: usize = 256;

/// One configured model + tools + prompt, able to run the tool-calling loop.
///
/// Cheap to clone; clones share the provider, registry and memory.
#[derive(Clone)]
pub struct Agent {
    config: Arc<AgentConfig>,
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    memory: Option<Arc<dyn Memory>>,
}

/// What a single provider turn produced.
struct Turn {
    content: String,
    calls: Vec<ToolCall>,
}

impl Agent {
    pub fn new(config: AgentConfig, provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            config: Arc::new(config),
            provider,
            tools,
            memory: None,
        }
    }

    pub fn with_memory(mut self, memory: Arc<dyn Memory>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_optional_memory(mut self, memory: Option<Arc<dyn Memory>>) -> Self {
        self.memory = memory;
        self
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    fn generation_config(&self) -> GenerationConfig {
        GenerationConfig {
            model: self.config.model.clone(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            top_p: self.config.top_p,
            tools: self.tools.specs(self.config.tools.as_deref()),
        }
    }

    async fn seed_messages(&self, input: &str, context: &AgentContext) -> Vec<Message> {
        let history = self.load_history(context).await;
        build_messages(
            self.config.effective_system_prompt().as_deref(),
            history,
            input,
        )
    }

    /// Stored history wins when present; otherwise the caller's history.
    async fn load_history(&self, context: &AgentContext) -> Vec<Message> {
        let Some(memory) = &self.memory else {
            return context.history.clone();
        };

        match memory.load(&context.conversation_id).await {
            Ok(stored) if !stored.is_empty() => stored,
            Ok(_) => context.history.clone(),
            Err(e) => {
                warn!(
                    agent = %self.config.name,
                    conversation = %context.conversation_id,
                    "Failed to load history from {} memory: {}",
                    memory.name(),
                    e
                );
                context.history.clone()
            }
        }
    }

    async fn persist(&self, conversation_id: &str, messages: &[Message]) {
        if let Some(memory) = &self.memory
            && let Err(e) = memory.save(conversation_id, &persistable(messages)).await
        {
            warn!(
                agent = %self.config.name,
                conversation = %conversation_id,
                "Failed to save history to {} memory: {}",
                memory.name(),
                e
            );
        }
    }

    fn provider_failure(&self, e: anyhow::Error) -> AgentError {
        error!(agent = %self.config.name, "Provider call failed: {:#}", e);
        AgentError::ExecutionFailed(format!("{e:#}"))
    }

    fn finish(
        &self,
        content: String,
        tool_calls: Vec<ToolCall>,
        usage: Usage,
        iterations: usize,
        started: Instant,
    ) -> AgentResponse {
        let formatted = match &self.config.output_format {
            Some(format) => format.apply(&content),
            None => Formatted {
                content,
                ..Formatted::default()
            },
        };

        let metadata = ResponseMetadata {
            tokens_used: usage.total(),
            latency_ms: started.elapsed().as_millis() as u64,
            iterations,
            cost: self.config.pricing.map(|p| p.cost(&usage)),
        };

        info!(
            agent = %self.config.name,
            iterations,
            tokens = metadata.tokens_used,
            latency_ms = metadata.latency_ms,
            "Agent finished"
        );

        AgentResponse {
            content: formatted.content,
            formatted: formatted.formatted,
            tool_calls,
            metadata,
            finish_reason: FinishReason::Stop,
            next_agent: formatted.next_agent,
        }
    }

    /// Appends the assistant turn and the settled tool results to the history.
    async fn dispatch(
        &self,
        messages: &mut Vec<Message>,
        turn: Turn,
        tool_context: &ToolContext,
    ) -> Vec<ToolCall> {
        messages.push(Message::assistant_with_tool_calls(
            turn.content,
            turn.calls.clone(),
        ));

        let settled = self
            .tools
            .invoke_all(turn.calls, self.config.tools.as_deref(), tool_context)
            .await;

        messages.extend(settled.iter().map(Message::tool_result));
        settled
    }

    /// Runs the loop to completion and returns the final answer.
    pub async fn execute(&self, input: &str, context: &AgentContext) -> AgentResult<AgentResponse> {
        let started = Instant::now();
        let mut messages = self.seed_messages(input, context).await;

        let outcome = self.run(&mut messages, context, started).await;
        self.persist(&context.conversation_id, &messages).await;
        outcome
    }

    async fn run(
        &self,
        messages: &mut Vec<Message>,
        context: &AgentContext,
        started: Instant,
    ) -> AgentResult<AgentResponse> {
        let generation = self.generation_config();
        let tool_context = context.tool_context(&self.config.name);
        let mut usage = Usage::default();
        let mut all_calls = Vec::new();

        for iteration in 1..=self.config.max_iterations {
            debug!(agent = %self.config.name, iteration, "Calling provider");

            let response = self
                .provider
                .generate_response(messages, &generation)
                .await
                .map_err(|e| self.provider_failure(e))?;

            usage.input_tokens += response.usage.input_tokens;
            usage.output_tokens += response.usage.output_tokens;

            let calls = self.provider.parse_tool_calls(&response);
            if calls.is_empty() {
                messages.push(Message::assistant(response.content.clone()));
                return Ok(self.finish(response.content, all_calls, usage, iteration, started));
            }

            let turn = Turn {
                content: response.content,
                calls,
            };
            all_calls.extend(self.dispatch(messages, turn, &tool_context).await);
        }

        Err(AgentError::MaxIterationsExceeded {
            max: self.config.max_iterations,
        })
    }

    /// Runs the loop on a background task and yields its events.
    ///
    /// Dropping the stream stops the loop at its next event; tool calls
    /// already dispatched still run to completion. Failures arrive as a
    /// final [`StreamEvent::Error`].
    pub fn execute_stream(&self, input: &str, context: &AgentContext) -> BoxStream<'static, StreamEvent> {
        let (tx, rx) = mpsc::channel::<StreamEvent>(STREAM_BUFFER);
        let agent = self.clone();
        let input = input.to_string();
        let context = context.clone();

        tokio::spawn(async move {
            let started = Instant::now();
            let mut messages = agent.seed_messages(&input, &context).await;

            let outcome = agent.run_streaming(&mut messages, &context, started, &tx).await;
            agent.persist(&context.conversation_id, &messages).await;

            let terminal = match outcome {
                Ok(Some(response)) => StreamEvent::Done {
                    content: response.content,
                    metadata: response.metadata,
                },
                Ok(None) => {
                    debug!(agent = %agent.config.name, "Stream consumer went away");
                    return;
                }
                Err(e) => StreamEvent::Error {
                    message: e.to_string(),
                },
            };
            let _ = tx.send(terminal).await;
        });

        Box::pin(ReceiverStream::new(rx))
    }

    /// `Ok(None)` means the receiver was dropped.
    async fn run_streaming(
        &self,
        messages: &mut Vec<Message>,
        context: &AgentContext,
        started: Instant,
        tx: &mpsc::Sender<StreamEvent>,
    ) -> AgentResult<Option<AgentResponse>> {
        let generation = self.generation_config();
        let tool_context = context.tool_context(&self.config.name);
        let mut usage = Usage::default();
        let mut all_calls = Vec::new();

        for iteration in 1..=self.config.max_iterations {
            if tx.send(StreamEvent::Iteration { number: iteration }).await.is_err() {
                return Ok(None);
            }

            let Some(turn) = self
                .stream_turn(messages, &generation, &mut usage, tx)
                .await?
            else {
                return Ok(None);
            };

            if turn.calls.is_empty() {
                messages.push(Message::assistant(turn.content.clone()));
                return Ok(Some(self.finish(
                    turn.content,
                    all_calls,
                    usage,
                    iteration,
                    started,
                )));
            }

            let announced = StreamEvent::ToolCalls {
                calls: turn.calls.clone(),
            };
            if tx.send(announced).await.is_err() {
                return Ok(None);
            }

            let settled = self.dispatch(messages, turn, &tool_context).await;
            for call in &settled {
                let event = StreamEvent::ToolResult { call: call.clone() };
                if tx.send(event).await.is_err() {
                    return Ok(None);
                }
            }
            all_calls.extend(settled);
        }

        Err(AgentError::MaxIterationsExceeded {
            max: self.config.max_iterations,
        })
    }

    /// One provider round-trip, streamed when the provider can, otherwise a
    /// single batched call that emits the same events.
    async fn stream_turn(
        &self,
        messages: &[Message],
        generation: &GenerationConfig,
        usage: &mut Usage,
        tx: &mpsc::Sender<StreamEvent>,
    ) -> AgentResult<Option<Turn>> {
        if !self.provider.supports_streaming() {
            let response = self
                .provider
                .generate_response(messages, generation)
                .await
                .map_err(|e| self.provider_failure(e))?;

            usage.input_tokens += response.usage.input_tokens;
            usage.output_tokens += response.usage.output_tokens;

            let calls = self.provider.parse_tool_calls(&response);
            if !response.content.is_empty() {
                let event = StreamEvent::Content {
                    text: response.content.clone(),
                    delta: false,
                };
                if tx.send(event).await.is_err() {
                    return Ok(None);
                }
            }
            return Ok(Some(Turn {
                content: response.content,
                calls,
            }));
        }

        let mut chunks = self
            .provider
            .stream_response(messages, generation)
            .await
            .map_err(|e| self.provider_failure(e))?;

        let mut content = String::new();
        let mut buffer = ToolCallBuffer::default();

        while let Some(chunk) = chunks.next().await {
            match chunk.map_err(|e| self.provider_failure(e))? {
                StreamChunk::Content(text) => {
                    content.push_str(&text);
                    let event = StreamEvent::Content { text, delta: true };
                    if tx.send(event).await.is_err() {
                        return Ok(None);
                    }
                }
                StreamChunk::ToolCallDelta {
                    index,
                    id,
                    name,
                    arguments,
                } => buffer.push(index, id, name, &arguments),
                StreamChunk::Usage(turn_usage) => {
                    usage.input_tokens += turn_usage.input_tokens;
                    usage.output_tokens += turn_usage.output_tokens;
                }
                StreamChunk::Done => break,
            }
        }

        Ok(Some(Turn {
            content,
            calls: buffer.finish(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::format::OutputFormat;
    use crate::agent::types::Pricing;
    use crate::memory::InMemoryStore;
    use crate::providers::MockProvider;
    use crate::tools::CalculatorTool;
    use crate::traits::{Role, Tool};
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    fn registry() -> Arc<ToolRegistry> {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(CalculatorTool));
        Arc::new(registry)
    }

    fn divide(id: &str, a: i64, b: i64) -> ToolCall {
        ToolCall::new(id, "calculator", json!({"operation": "divide", "a": a, "b": b}))
    }

    fn agent(provider: Arc<MockProvider>) -> Agent {
        Agent::new(AgentConfig::new("math", "mock-model"), provider, registry())
    }

    async fn collect(stream: BoxStream<'static, StreamEvent>) -> Vec<StreamEvent> {
        stream.collect().await
    }

    #[tokio::test]
    async fn answers_without_tools_in_one_iteration() {
        let provider = Arc::new(MockProvider::new(vec![MockProvider::text("hello")]));
        let response = agent(provider.clone())
            .execute("hi", &AgentContext::new("c"))
            .await
            .unwrap();

        assert_eq!(response.content, "hello");
        assert_eq!(response.metadata.iterations, 1);
        assert_eq!(response.metadata.tokens_used, 15);
        assert_eq!(response.finish_reason, FinishReason::Stop);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn tool_round_trip_feeds_results_back() {
        let provider = Arc::new(MockProvider::new(vec![
            MockProvider::tool_calls("", vec![divide("t1", 8, 2)]),
            MockProvider::text("8 / 2 = 4"),
        ]));
        let response = agent(provider.clone())
            .execute("what is 8/2?", &AgentContext::new("c"))
            .await
            .unwrap();

        assert_eq!(response.content, "8 / 2 = 4");
        assert_eq!(response.metadata.iterations, provider.call_count());
        assert_eq!(response.metadata.iterations, 2);
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].result, Some(json!(4.0)));

        let second = &provider.requests()[1];
        let roles: Vec<Role> = second.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool]);
        assert_eq!(second[2].content, "4.0");
        assert_eq!(second[2].tool_call_id.as_deref(), Some("t1"));
    }

    #[tokio::test]
    async fn divide_by_zero_is_reported_to_the_model() {
        let provider = Arc::new(MockProvider::new(vec![
            MockProvider::tool_calls("", vec![divide("t1", 1, 0)]),
            MockProvider::text("You cannot divide by zero."),
        ]));
        let response = agent(provider.clone())
            .execute("1/0?", &AgentContext::new("c"))
            .await
            .unwrap();

        assert_eq!(response.content, "You cannot divide by zero.");
        let call = &response.tool_calls[0];
        assert!(call.result.is_none());
        assert!(call.error.as_deref().unwrap().contains("Cannot divide by zero"));
        let tool_message = &provider.requests()[1][2];
        assert!(tool_message.content.contains("Cannot divide by zero"));
    }

    #[tokio::test]
    async fn runaway_tool_use_hits_the_iteration_ceiling() {
        let provider = Arc::new(MockProvider::from_fn(|_| {
            Ok(MockProvider::tool_calls("again", vec![divide("t", 1, 1)]))
        }));
        let agent = Agent::new(
            AgentConfig::new("loop", "m").with_max_iterations(3),
            provider.clone(),
            registry(),
        );

        let err = agent.execute("go", &AgentContext::new("c")).await.unwrap_err();
        assert_eq!(err, AgentError::MaxIterationsExceeded { max: 3 });
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn provider_failure_is_wrapped() {
        let provider = Arc::new(MockProvider::scripted(vec![Err(anyhow::anyhow!(
            "connection reset"
        ))]));
        let err = agent(provider)
            .execute("hi", &AgentContext::new("c"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Agent execution failed: connection reset");
    }

    struct SlowTool {
        name: &'static str,
        delay: Duration,
    }

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "sleeps"
        }

        fn parameters_schema(&self) -> serde_json::Value {
            json!({"type": "object"})
        }

        async fn execute(
            &self,
            _params: serde_json::Value,
            _context: &ToolContext,
        ) -> anyhow::Result<serde_json::Value> {
            tokio::time::sleep(self.delay).await;
            if self.name == "broken" {
                anyhow::bail!("broken on purpose");
            }
            Ok(json!(self.name))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sibling_tool_calls_run_concurrently() {
        let tools = ToolRegistry::new();
        tools.register(Arc::new(SlowTool {
            name: "slow",
            delay: Duration::from_millis(300),
        }));
        tools.register(Arc::new(SlowTool {
            name: "broken",
            delay: Duration::from_millis(100),
        }));
        let provider = Arc::new(MockProvider::new(vec![
            MockProvider::tool_calls(
                "",
                vec![
                    ToolCall::new("a", "slow", json!({})),
                    ToolCall::new("b", "broken", json!({})),
                ],
            ),
            MockProvider::text("done"),
        ]));
        let agent = Agent::new(AgentConfig::new("p", "m"), provider, Arc::new(tools));

        let started = tokio::time::Instant::now();
        let response = agent.execute("go", &AgentContext::new("c")).await.unwrap();

        assert_eq!(started.elapsed(), Duration::from_millis(300));
        assert_eq!(response.tool_calls[0].result, Some(json!("slow")));
        assert!(response.tool_calls[1].error.is_some());
    }

    #[tokio::test]
    async fn json_output_is_formatted_and_priced() {
        let provider = Arc::new(MockProvider::new(vec![MockProvider::text(
            "```json\n{\"answer\": 4, \"next_agent\": \"reviewer\"}\n```",
        )]));
        let config = AgentConfig::new("fmt", "m")
            .with_output_format(OutputFormat::Json { schema: None })
            .with_pricing(Pricing {
                input_per_1k: 1.0,
                output_per_1k: 1.0,
            });
        let response = Agent::new(config, provider, registry())
            .execute("x", &AgentContext::new("c"))
            .await
            .unwrap();

        assert_eq!(response.formatted, Some(json!({"answer": 4, "next_agent": "reviewer"})));
        assert_eq!(response.next_agent.as_deref(), Some("reviewer"));
        assert!((response.metadata.cost.unwrap() - 0.015).abs() < 1e-9);
    }

    #[tokio::test]
    async fn history_round_trips_through_memory() {
        let memory = Arc::new(InMemoryStore::new());
        let provider = Arc::new(MockProvider::new(vec![
            MockProvider::tool_calls("checking", vec![divide("t1", 6, 3)]),
            MockProvider::text("2"),
            MockProvider::text("you asked about 6/3"),
        ]));
        let agent = Agent::new(
            AgentConfig::new("mem", "m").with_system_prompt("be exact"),
            provider.clone(),
            registry(),
        )
        .with_memory(memory.clone());

        let ctx = AgentContext::new("conv-1");
        agent.execute("6/3?", &ctx).await.unwrap();

        let stored = memory.load("conv-1").await.unwrap();
        let shape: Vec<(Role, &str)> = stored.iter().map(|m| (m.role, m.content.as_str())).collect();
        assert_eq!(
            shape,
            vec![
                (Role::User, "6/3?"),
                (Role::Assistant, "checking"),
                (Role::Tool, "2.0"),
                (Role::Assistant, "2"),
            ]
        );

        agent.execute("what did I ask?", &ctx).await.unwrap();
        let third = &provider.requests()[2];
        assert_eq!(third[0], Message::system("be exact"));
        assert_eq!(&third[1..5], &stored[..]);
        assert_eq!(third[5], Message::user("what did I ask?"));
    }

    struct FailingMemory;

    #[async_trait]
    impl Memory for FailingMemory {
        fn name(&self) -> &str {
            "failing"
        }

        async fn save(&self, _id: &str, _messages: &[Message]) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }

        async fn load(&self, _id: &str) -> anyhow::Result<Vec<Message>> {
            anyhow::bail!("disk gone")
        }

        async fn clear(&self, _id: &str) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn memory_failures_fall_back_to_caller_history() {
        let provider = Arc::new(MockProvider::new(vec![MockProvider::text("ok")]));
        let ctx = AgentContext::new("c").with_history(vec![Message::user("earlier")]);

        let response = agent(provider.clone())
            .with_memory(Arc::new(FailingMemory))
            .execute("now", &ctx)
            .await
            .unwrap();

        assert_eq!(response.content, "ok");
        let request = &provider.requests()[0];
        assert_eq!(request[0], Message::user("earlier"));
        assert_eq!(request[1], Message::user("now"));
    }

    #[tokio::test]
    async fn iteration_limit_still_persists_history() {
        let memory = Arc::new(InMemoryStore::new());
        let provider = Arc::new(MockProvider::from_fn(|_| {
            Ok(MockProvider::tool_calls("", vec![divide("t", 2, 1)]))
        }));
        let agent = Agent::new(
            AgentConfig::new("loop", "m").with_max_iterations(1),
            provider,
            registry(),
        )
        .with_memory(memory.clone());

        assert!(agent.execute("go", &AgentContext::new("c")).await.is_err());
        assert_eq!(memory.load("c").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn streaming_emits_deltas_tool_events_and_done() {
        let provider = Arc::new(
            MockProvider::new(vec![
                MockProvider::tool_calls("dividing now", vec![divide("t1", 9, 3)]),
                MockProvider::text("the answer is 3"),
            ])
            .with_streaming(),
        );
        let events = collect(agent(provider).execute_stream("9/3?", &AgentContext::new("c"))).await;

        assert_eq!(events[0], StreamEvent::Iteration { number: 1 });
        assert_eq!(
            events[1],
            StreamEvent::Content {
                text: "dividing ".into(),
                delta: true
            }
        );
        let StreamEvent::ToolCalls { calls } = &events[3] else {
            panic!("expected tool calls, got {:?}", events[3]);
        };
        assert_eq!(calls[0].parameters, json!({"operation": "divide", "a": 9, "b": 3}));
        let StreamEvent::ToolResult { call } = &events[4] else {
            panic!("expected tool result, got {:?}", events[4]);
        };
        assert_eq!(call.result, Some(json!(3.0)));
        assert_eq!(events[5], StreamEvent::Iteration { number: 2 });

        let streamed: String = events
            .iter()
            .skip(5)
            .filter_map(|e| match e {
                StreamEvent::Content { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(streamed, "the answer is 3");

        let StreamEvent::Done { content, metadata } = events.last().unwrap() else {
            panic!("expected done");
        };
        assert_eq!(content, "the answer is 3");
        assert_eq!(metadata.iterations, 2);
        assert_eq!(metadata.tokens_used, 30);
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn non_streaming_provider_emits_the_same_shape() {
        let provider = Arc::new(MockProvider::new(vec![
            MockProvider::tool_calls("dividing now", vec![divide("t1", 9, 3)]),
            MockProvider::text("the answer is 3"),
        ]));
        let events = collect(agent(provider).execute_stream("9/3?", &AgentContext::new("c"))).await;

        let tags: Vec<&str> = events
            .iter()
            .map(|e| match e {
                StreamEvent::Iteration { .. } => "iteration",
                StreamEvent::Content { delta: false, .. } => "content",
                StreamEvent::Content { delta: true, .. } => "delta",
                StreamEvent::ToolCalls { .. } => "tool_calls",
                StreamEvent::ToolResult { .. } => "tool_result",
                StreamEvent::Done { .. } => "done",
                StreamEvent::Error { .. } => "error",
            })
            .collect();
        assert_eq!(
            tags,
            vec![
                "iteration",
                "content",
                "tool_calls",
                "tool_result",
                "iteration",
                "content",
                "done"
            ]
        );
    }

    #[tokio::test]
    async fn streaming_failures_end_with_an_error_event() {
        let provider = Arc::new(
            MockProvider::from_fn(|_| Ok(MockProvider::tool_calls("", vec![divide("t", 1, 1)])))
                .with_streaming(),
        );
        let agent = Agent::new(
            AgentConfig::new("loop", "m").with_max_iterations(2),
            provider,
            registry(),
        );
        let events = collect(agent.execute_stream("go", &AgentContext::new("c"))).await;

        let last = events.last().unwrap();
        assert_eq!(
            last,
            &StreamEvent::Error {
                message: AgentError::MaxIterationsExceeded { max: 2 }.to_string()
            }
        );
        assert!(!events.iter().any(|e| matches!(e, StreamEvent::Done { .. })));
    }

    #[tokio::test]
    async fn dropping_the_stream_stops_the_loop() {
        let provider = Arc::new(MockProvider::from_fn(|_| {
            Ok(MockProvider::tool_calls("", vec![divide("t", 1, 1)]))
        }));
        let agent = Agent::new(
            AgentConfig::new("loop", "m").with_max_iterations(1_000),
            provider.clone(),
            registry(),
        );

        let mut stream = agent.execute_stream("go", &AgentContext::new("c"));
        assert_eq!(stream.next().await, Some(StreamEvent::Iteration { number: 1 }));
        drop(stream);

        // the producer blocks once the channel buffer is full, long before 1000 turns
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(provider.call_count() < 1_000);
    }
}
