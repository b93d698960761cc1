pub mod factory;
pub mod file;
pub mod in_memory;

pub use factory::{MemoryBackend, MemoryConfig, create_memory};
pub use file::FileMemory;
pub use in_memory::InMemoryStore;
