pub mod factory;
pub mod mock;
pub mod ollama;
pub mod openai;
mod tag_parser;

pub use factory::create_provider;
pub use mock::MockProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAIProvider;
pub use tag_parser::extract_tagged_calls;
