use crate::traits::Message;
use async_trait::async_trait;

/// Conversation store addressed by conversation id. Each id is independent;
/// concurrent writers to the same id are the caller's problem.
#[async_trait]
pub trait Memory: Send + Sync {
    fn name(&self) -> &str;

    async fn save(&self, conversation_id: &str, messages: &[Message]) -> anyhow::Result<()>;

    /// Returns an empty list for unknown conversations.
    async fn load(&self, conversation_id: &str) -> anyhow::Result<Vec<Message>>;

    async fn clear(&self, conversation_id: &str) -> anyhow::Result<()>;
}
