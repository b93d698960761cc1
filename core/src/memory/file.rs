use crate::traits::{Memory, Message};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize)]
struct ConversationRecord {
    conversation_id: String,
    saved_at: DateTime<Utc>,
    messages: Vec<Message>,
}

/// One pretty-printed JSON file per conversation under `dir`. File names
/// carry a readable prefix plus a digest of the exact id.
pub struct FileMemory {
    dir: PathBuf,
}

impl FileMemory {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, conversation_id: &str) -> PathBuf {
        let safe: String = conversation_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let digest = md5::compute(conversation_id.as_bytes());
        self.dir.join(format!("{safe}-{digest:x}.json"))
    }
}

#[async_trait]
impl Memory for FileMemory {
    fn name(&self) -> &str {
        "file"
    }

    async fn save(&self, conversation_id: &str, messages: &[Message]) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create memory directory {}", self.dir.display()))?;

        let record = ConversationRecord {
            conversation_id: conversation_id.to_string(),
            saved_at: Utc::now(),
            messages: messages.to_vec(),
        };
        let path = self.path_for(conversation_id);
        let body = serde_json::to_vec_pretty(&record)?;
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("Failed to write conversation to {}", path.display()))
    }

    async fn load(&self, conversation_id: &str) -> anyhow::Result<Vec<Message>> {
        let path = self.path_for(conversation_id);
        let body = match tokio::fs::read(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };
        let record: ConversationRecord = serde_json::from_slice(&body)
            .with_context(|| format!("Failed to parse conversation file {}", path.display()))?;
        Ok(record.messages)
    }

    async fn clear(&self, conversation_id: &str) -> anyhow::Result<()> {
        match tokio::fs::remove_file(self.path_for(conversation_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ToolCall;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn round_trips_roles_content_and_order() {
        let tmp = TempDir::new().unwrap();
        let memory = FileMemory::new(tmp.path().join("conversations"));

        let mut call = ToolCall::new("c1", "calculator", json!({"a": 1}));
        call.set_result(json!(2));
        let messages = vec![
            Message::user("what is 1+1"),
            Message::assistant_with_tool_calls("", vec![call.clone()]),
            Message::tool_result(&call),
            Message::assistant("2"),
        ];

        memory.save("user/42", &messages).await.unwrap();
        assert_eq!(memory.load("user/42").await.unwrap(), messages);
    }

    #[tokio::test]
    async fn unknown_and_cleared_conversations_are_empty() {
        let tmp = TempDir::new().unwrap();
        let memory = FileMemory::new(tmp.path());

        assert!(memory.load("nobody").await.unwrap().is_empty());
        memory.save("c", &[Message::user("x")]).await.unwrap();
        memory.clear("c").await.unwrap();
        memory.clear("c").await.unwrap();
        assert!(memory.load("c").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ids_that_sanitise_alike_stay_separate() {
        let tmp = TempDir::new().unwrap();
        let memory = FileMemory::new(tmp.path());

        memory
            .save("conv:a_b", &[Message::user("notes for a_b")])
            .await
            .unwrap();
        assert!(memory.load("conv_a:b").await.unwrap().is_empty());

        memory.save("conv_a:b", &[Message::user("notes for b")]).await.unwrap();
        assert_eq!(
            memory.load("conv:a_b").await.unwrap(),
            vec![Message::user("notes for a_b")]
        );
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let memory = FileMemory::new(tmp.path());
        std::fs::write(memory.path_for("bad"), "not json").unwrap();
        assert!(memory.load("bad").await.is_err());
    }
}
