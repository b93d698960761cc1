use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use futures_util::StreamExt;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use troupe_core::agent::{
    Agent, AgentConfig, AgentContext, ResponseMetadata, StreamEvent, ToolRegistry,
};
use troupe_core::traits::{Memory, Message};
use troupe_core::workflow::Workflow;
use troupe_core::{config, memory, providers, tools, workflow};

mod onboard;

const CHAT_SYSTEM_PROMPT: &str = "You are a helpful assistant working in the user's terminal. \
Use the available tools when they help, and answer concisely.";

#[derive(Parser)]
#[command(name = "troupe")]
#[command(about = "troupe - tool-using agents and multi-agent workflows", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure provider, model and memory
    Onboard,
    /// Talk to a single agent
    Chat {
        #[arg(short, long)]
        message: Option<String>,
        /// Wait for the full answer instead of streaming it
        #[arg(long)]
        no_stream: bool,
        /// Conversation id used for memory
        #[arg(long, default_value = "chat")]
        conversation: String,
    },
    /// Run a workflow declared in a TOML file
    Run {
        workflow: PathBuf,
        input: String,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn build_tools(config: &config::Config) -> Result<Arc<ToolRegistry>> {
    if !config.workspace_dir.exists() {
        std::fs::create_dir_all(&config.workspace_dir).with_context(|| {
            format!(
                "Could not create workspace at {}",
                config.workspace_dir.display()
            )
        })?;
    }

    let registry = Arc::new(ToolRegistry::new());
    registry.register(Arc::new(tools::CalculatorTool));
    registry.register(Arc::new(tools::FileReadTool::new(&config.workspace_dir)));
    registry.register(Arc::new(tools::FileWriteTool::new(&config.workspace_dir)));
    registry.register(Arc::new(tools::ShellTool::new(&config.workspace_dir)));
    Ok(registry)
}

fn chat_agent_config(config: &config::Config) -> AgentConfig {
    let mut agent = AgentConfig::new("assistant", config.model.clone())
        .with_system_prompt(CHAT_SYSTEM_PROMPT)
        .with_max_iterations(config.max_iterations);
    agent.temperature = config.temperature;
    agent.max_tokens = config.max_tokens;
    agent.provider = config.provider.clone();
    agent
}

fn print_metadata(meta: &ResponseMetadata) {
    let mut line = format!(
        "{} tokens · {} ms · {} iteration(s)",
        meta.tokens_used, meta.latency_ms, meta.iterations
    );
    if let Some(cost) = meta.cost {
        line.push_str(&format!(" · cost {cost:.4}"));
    }
    println!("{}", style(line).dim());
}

/// Streams one turn to stdout and returns the final content, if any.
async fn stream_turn(agent: &Agent, input: &str, context: &AgentContext) -> Option<String> {
    let mut events = agent.execute_stream(input, context);
    let mut final_content = None;

    while let Some(event) = events.next().await {
        match event {
            StreamEvent::Iteration { .. } => {}
            StreamEvent::Content { text, .. } => {
                print!("{text}");
                let _ = std::io::Write::flush(&mut std::io::stdout());
            }
            StreamEvent::ToolCalls { calls } => {
                let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
                println!("\n{}", style(format!("⚙ {}", names.join(", "))).dim());
            }
            StreamEvent::ToolResult { call } => {
                if let Some(error) = &call.error {
                    println!("{}", style(format!("  {} failed: {}", call.name, error)).yellow());
                }
            }
            StreamEvent::Done { content, metadata } => {
                println!();
                print_metadata(&metadata);
                final_content = Some(content);
            }
            StreamEvent::Error { message } => {
                eprintln!("\n{} {}", style("❌ Error:").red(), message);
            }
        }
    }

    final_content
}

async fn answer(
    agent: &Agent,
    input: &str,
    context: &mut AgentContext,
    stream: bool,
    has_memory: bool,
) {
    let content = if stream {
        stream_turn(agent, input, context).await
    } else {
        match agent.execute(input, context).await {
            Ok(response) => {
                println!("{}", response.content);
                print_metadata(&response.metadata);
                Some(response.content)
            }
            Err(e) => {
                eprintln!("{} {}", style("❌ Error:").red(), e);
                None
            }
        }
    };

    // Without a memory store the REPL carries history itself.
    if !has_memory && let Some(content) = content {
        context.history.push(Message::user(input));
        context.history.push(Message::assistant(content));
    }
}

async fn run_chat(message: Option<String>, no_stream: bool, conversation: String) -> Result<()> {
    let config = config::load_config()?;
    let provider = providers::create_provider(&config)?;
    let tools = build_tools(&config)?;
    let memory: Option<Arc<dyn Memory>> = memory::create_memory(&config.memory)?;
    let has_memory = memory.is_some();

    let agent = Agent::new(chat_agent_config(&config), provider, tools).with_optional_memory(memory);
    let stream = config.stream.enabled && !no_stream;
    let mut context = AgentContext::new(conversation);

    if let Some(msg) = message {
        answer(&agent, &msg, &mut context, stream, has_memory).await;
        return Ok(());
    }

    println!("{}", style("troupe chat").cyan().bold());
    println!("Type your message (Ctrl+D to exit):\n");

    let mut editor = DefaultEditor::new()?;
    loop {
        match editor.readline("> ") {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(input);
                println!();
                answer(&agent, input, &mut context, stream, has_memory).await;
                println!();
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => {
                println!("\n👋 Goodbye!");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

/// Agents may name a provider; they must agree, and override the config's.
fn workflow_provider(
    config: &config::Config,
    workflow: &workflow::WorkflowConfig,
) -> Result<config::Config> {
    let mut named = workflow.agents.iter().filter_map(|a| a.provider.as_deref());
    let Some(first) = named.next() else {
        return Ok(config.clone());
    };
    if let Some(other) = named.find(|p| !p.eq_ignore_ascii_case(first)) {
        anyhow::bail!(
            "Agents in one workflow must share a provider (found '{}' and '{}')",
            first,
            other
        );
    }
    Ok(config::Config {
        provider: Some(first.to_string()),
        ..config.clone()
    })
}

async fn run_workflow(path: PathBuf, input: String) -> Result<()> {
    let config = config::Config::load_or_init()?;
    let workflow_config = config::load_workflow_config(&path)?;

    let provider = providers::create_provider(&workflow_provider(&config, &workflow_config)?)?;
    let tools = build_tools(&config)?;
    let memory = memory::create_memory(&config.memory)?;

    let workflow = workflow::create_workflow(workflow_config, provider, tools, memory)?;
    println!(
        "{} {:?} workflow: {}",
        style("▶").green(),
        workflow.kind(),
        workflow.agent_names().join(" → ")
    );

    let mut context = AgentContext::ephemeral();
    let response = workflow.execute(&input, &mut context).await?;

    println!("\n{}", response.content);
    print_metadata(&response.metadata);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let command = cli.command.unwrap_or_else(|| {
        if !config::config_exists() {
            Commands::Onboard
        } else {
            Commands::Chat {
                message: None,
                no_stream: false,
                conversation: "chat".to_string(),
            }
        }
    });

    match command {
        Commands::Onboard => {
            let onboard_config = onboard::run_onboard().map_err(|e| {
                eprintln!("❌ Onboarding failed: {}", e);
                anyhow::anyhow!("Onboarding failed: {}", e)
            })?;
            config::save_config(&onboard_config)?;
        }
        Commands::Chat {
            message,
            no_stream,
            conversation,
        } => run_chat(message, no_stream, conversation).await?,
        Commands::Run { workflow, input } => run_workflow(workflow, input).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_run() {
        let cli = Cli::try_parse_from(["troupe", "run", "flow.toml", "hello there"]).unwrap();
        match cli.command {
            Some(Commands::Run { workflow, input }) => {
                assert_eq!(workflow, PathBuf::from("flow.toml"));
                assert_eq!(input, "hello there");
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn cli_parses_chat_flags() {
        let cli = Cli::try_parse_from(["troupe", "chat", "-m", "hi", "--no-stream"]).unwrap();
        match cli.command {
            Some(Commands::Chat {
                message,
                no_stream,
                conversation,
            }) => {
                assert_eq!(message.as_deref(), Some("hi"));
                assert!(no_stream);
                assert_eq!(conversation, "chat");
            }
            _ => panic!("expected chat"),
        }
    }

    #[test]
    fn chat_agent_follows_config() {
        let config = config::Config {
            max_iterations: 4,
            max_tokens: Some(256),
            ..config::Config::default()
        };
        let agent = chat_agent_config(&config);
        assert_eq!(agent.max_iterations, 4);
        assert_eq!(agent.max_tokens, Some(256));
        assert_eq!(agent.model, config.model);
    }

    #[test]
    fn workflow_agents_must_share_a_provider() {
        let base = config::Config::default();
        let mut flow = workflow::WorkflowConfig::new(
            workflow::WorkflowKind::Parallel,
            vec![AgentConfig::new("a", "m"), AgentConfig::new("b", "m")],
        );
        assert_eq!(workflow_provider(&base, &flow).unwrap().provider, None);

        flow.agents[0].provider = Some("ollama".into());
        assert_eq!(
            workflow_provider(&base, &flow).unwrap().provider.as_deref(),
            Some("ollama")
        );

        flow.agents[1].provider = Some("openai".into());
        assert!(workflow_provider(&base, &flow).is_err());
    }
}
