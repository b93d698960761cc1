use crate::traits::{Memory, Message};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local conversation store.
#[derive(Default)]
pub struct InMemoryStore {
    conversations: RwLock<HashMap<String, Vec<Message>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn conversation_count(&self) -> usize {
        self.conversations.read().await.len()
    }
}

#[async_trait]
impl Memory for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn save(&self, conversation_id: &str, messages: &[Message]) -> anyhow::Result<()> {
        self.conversations
            .write()
            .await
            .insert(conversation_id.to_string(), messages.to_vec());
        Ok(())
    }

    async fn load(&self, conversation_id: &str) -> anyhow::Result<Vec<Message>> {
        Ok(self
            .conversations
            .read()
            .await
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn clear(&self, conversation_id: &str) -> anyhow::Result<()> {
        self.conversations.write().await.remove(conversation_id);
        Ok(())
    }
}
