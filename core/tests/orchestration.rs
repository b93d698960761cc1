use serde_json::json;
use std::sync::Arc;
use troupe_core::{
    Agent, AgentConfig, AgentContext, CalculatorTool, ErrorHandlingStrategy, InMemoryStore,
    Memory, Message, MockProvider, Role, StreamEvent, ToolCall, ToolRegistry, WorkflowConfig,
    WorkflowKind, create_workflow,
};

fn registry() -> Arc<ToolRegistry> {
    let tools = Arc::new(ToolRegistry::new());
    tools.register(Arc::new(CalculatorTool));
    tools
}

fn system_prompt(messages: &[Message]) -> &str {
    messages
        .iter()
        .find(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .unwrap_or("")
}

/// "math" agents ask the calculator to multiply 6 by 7 and then report the
/// tool result; "critic" agents wrap their input.
fn scripted_team() -> Arc<MockProvider> {
    Arc::new(MockProvider::from_fn(|messages| {
        let last = messages.last().cloned().unwrap_or_else(|| Message::user(""));
        match system_prompt(messages) {
            "math" if last.role == Role::Tool => {
                Ok(MockProvider::text(format!("The product is {}", last.content)))
            }
            "math" => Ok(MockProvider::tool_calls(
                "",
                vec![ToolCall::new(
                    "mul-1",
                    "calculator",
                    json!({"operation": "multiply", "a": 6, "b": 7}),
                )],
            )),
            "critic" => Ok(MockProvider::text(format!("Reviewed: {}", last.content))),
            _ => Err(anyhow::anyhow!("no script for this agent")),
        }
    }))
}

#[tokio::test]
async fn sequential_team_uses_tools_and_hands_off() {
    let provider = scripted_team();
    let config = WorkflowConfig::new(
        WorkflowKind::Sequential,
        vec![
            AgentConfig::new("solver", "m")
                .with_system_prompt("math")
                .with_tools(vec!["calculator".into()]),
            AgentConfig::new("critic", "m").with_system_prompt("critic"),
        ],
    );
    let workflow = create_workflow(config, provider.clone(), registry(), None).unwrap();

    let mut context = AgentContext::new("team");
    let response = workflow.execute("What is 6 x 7?", &mut context).await.unwrap();

    assert_eq!(response.content, "Reviewed: The product is 42.0");
    assert_eq!(provider.call_count(), 3);
    assert_eq!(response.metadata.iterations, 3);
    assert_eq!(response.metadata.tokens_used, 45);
}

#[tokio::test]
async fn workflow_agents_keep_separate_memory_threads() {
    let store = Arc::new(InMemoryStore::new());
    let config = WorkflowConfig::new(
        WorkflowKind::Parallel,
        vec![
            AgentConfig::new("solver", "m").with_system_prompt("math"),
            AgentConfig::new("critic", "m").with_system_prompt("critic"),
        ],
    );
    let workflow = create_workflow(
        config,
        scripted_team(),
        registry(),
        Some(store.clone() as Arc<dyn Memory>),
    )
    .unwrap();

    let response = workflow
        .execute("6 x 7", &mut AgentContext::new("conv"))
        .await
        .unwrap();
    assert!(response.content.starts_with("[solver]: The product is 42"));
    assert!(response.content.contains("[critic]: Reviewed: 6 x 7"));

    let solver = store.load("conv:solver").await.unwrap();
    let roles: Vec<Role> = solver.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]
    );
    assert_eq!(store.load("conv:critic").await.unwrap().len(), 2);
    assert!(store.load("conv").await.unwrap().is_empty());
}

#[tokio::test]
async fn fallback_keeps_a_sequence_alive() {
    let config = WorkflowConfig::new(
        WorkflowKind::Sequential,
        vec![
            AgentConfig::new("ghostwriter", "m").with_system_prompt("unscripted"),
            AgentConfig::new("critic", "m").with_system_prompt("critic"),
        ],
    )
    .with_error_handling(ErrorHandlingStrategy::Fallback {
        message: Some("(no draft)".into()),
    });
    let workflow = create_workflow(config, scripted_team(), registry(), None).unwrap();

    let response = workflow
        .execute("write", &mut AgentContext::new("c"))
        .await
        .unwrap();
    assert_eq!(response.content, "Reviewed: (no draft)");
}

#[tokio::test]
async fn streamed_agent_reports_tool_round_trip() {
    use futures_util::StreamExt;

    let agent = Agent::new(
        AgentConfig::new("solver", "m").with_system_prompt("math"),
        scripted_team(),
        registry(),
    );
    let events: Vec<StreamEvent> = agent
        .execute_stream("6 x 7", &AgentContext::new("s"))
        .collect()
        .await;

    let results: Vec<&ToolCall> = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::ToolResult { call } => Some(call),
            _ => None,
        })
        .collect();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].result, Some(json!(42.0)));

    match events.last() {
        Some(StreamEvent::Done { content, metadata }) => {
            assert_eq!(content, "The product is 42.0");
            assert_eq!(metadata.iterations, 2);
        }
        other => panic!("expected Done, got {other:?}"),
    }
}
