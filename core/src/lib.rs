pub mod agent;
pub mod config;
pub mod error;
pub mod memory;
pub mod providers;
pub mod tools;
pub mod traits;
pub mod workflow;

pub use agent::{
    Agent, AgentConfig, AgentContext, AgentResponse, FinishReason, OutputFormat, Pricing,
    ResponseMetadata, StreamEvent, ToolRegistry,
};
pub use config::{
    Config, StreamConfig, config_exists, ensure_troupe_dir, get_config_path, get_troupe_dir,
    load_config, load_workflow_config, save_config,
};
pub use error::{AgentError, AgentResult};
pub use memory::{FileMemory, InMemoryStore, MemoryBackend, MemoryConfig, create_memory};
pub use providers::{MockProvider, OllamaProvider, OpenAIProvider, create_provider};
pub use tools::{
    BackoffStrategy, CalculatorTool, FileReadTool, FileWriteTool, RetryConfig, ShellTool,
};
pub use traits::{
    GenerationConfig, Memory, Message, Provider, ProviderResponse, Role, StopReason, StreamChunk,
    Tool, ToolCall, ToolContext, ToolSpec, Usage,
};
pub use workflow::{
    ErrorHandlingStrategy, RoutingCondition, RoutingLogic, RoutingRule, RoutingStrategy, Workflow,
    WorkflowConfig, WorkflowKind, create_workflow,
};
