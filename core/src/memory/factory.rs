use crate::memory::{FileMemory, InMemoryStore};
use crate::traits::Memory;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MemoryBackend {
    #[default]
    None,
    InMemory,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct MemoryConfig {
    pub backend: MemoryBackend,
    pub path: Option<PathBuf>,
}

pub fn create_memory(config: &MemoryConfig) -> Result<Option<Arc<dyn Memory>>> {
    match config.backend {
        MemoryBackend::None => Ok(None),
        MemoryBackend::InMemory => Ok(Some(Arc::new(InMemoryStore::new()))),
        MemoryBackend::File => {
            let path = config
                .path
                .clone()
                .ok_or_else(|| anyhow!("File memory requires a 'path'"))?;
            Ok(Some(Arc::new(FileMemory::new(path))))
        }
    }
}
