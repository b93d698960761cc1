pub mod memory;
pub mod provider;
pub mod tool;

pub use memory::Memory;
pub use provider::{
    GenerationConfig, Message, Provider, ProviderResponse, Role, StopReason, StreamChunk,
    ToolCall, Usage,
};
pub use tool::{Tool, ToolContext, ToolSpec};
