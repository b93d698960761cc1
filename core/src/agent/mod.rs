pub mod context;
pub mod format;
pub mod loop_;
pub mod registry;
pub mod stream;
pub mod types;

pub use context::AgentContext;
pub use format::OutputFormat;
pub use loop_::Agent;
pub use registry::ToolRegistry;
pub use stream::StreamEvent;
pub use types::{
    AgentConfig, AgentResponse, DEFAULT_MAX_ITERATIONS, DEFAULT_TEMPERATURE, FinishReason, Pricing,
    ResponseMetadata,
};
