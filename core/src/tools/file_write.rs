use crate::tools::{extract_string_arg, resolve_workspace_path};
use crate::traits::{Tool, ToolContext};
use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;

pub struct FileWriteTool {
    workspace: std::path::PathBuf,
}

impl FileWriteTool {
    pub fn new(workspace: impl AsRef<std::path::Path>) -> Self {
        Self {
            workspace: workspace.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "file_write"
    }

    fn description(&self) -> &str {
        "Write content to a file in the workspace, creating parent directories as needed"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file, relative to the workspace"
                },
                "content": {
                    "type": "string",
                    "description": "Content to write"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        _context: &ToolContext,
    ) -> anyhow::Result<serde_json::Value> {
        let path = extract_string_arg(&params, "path")?;
        let content = extract_string_arg(&params, "content")?;
        let full_path = resolve_workspace_path(&self.workspace, &path)?;

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory for {}", path))?;
        }

        tokio::fs::write(&full_path, &content)
            .await
            .with_context(|| format!("Failed to write file {}", path))?;

        Ok(json!(format!("Wrote {} bytes to {}", content.len(), path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::FileReadTool;
    use tempfile::TempDir;

    #[tokio::test]
    async fn write_then_read() {
        let tmp = TempDir::new().unwrap();
        let ctx = ToolContext::default();

        FileWriteTool::new(tmp.path())
            .execute(json!({"path": "nested/a.txt", "content": "hello"}), &ctx)
            .await
            .unwrap();

        let read = FileReadTool::new(tmp.path())
            .execute(json!({"path": "nested/a.txt"}), &ctx)
            .await
            .unwrap();
        assert_eq!(read, json!("hello"));
    }

    #[tokio::test]
    async fn refuses_escaping_paths() {
        let tmp = TempDir::new().unwrap();
        let result = FileWriteTool::new(tmp.path())
            .execute(
                json!({"path": "../outside.txt", "content": "x"}),
                &ToolContext::default(),
            )
            .await;
        assert!(result.is_err());
    }
}
