use crate::tools::{extract_string_arg, resolve_workspace_path};
use crate::traits::{Tool, ToolContext};
use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;

pub struct FileReadTool {
    workspace: std::path::PathBuf,
}

impl FileReadTool {
    pub fn new(workspace: impl AsRef<std::path::Path>) -> Self {
        Self {
            workspace: workspace.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "file_read"
    }

    fn description(&self) -> &str {
        "Read the contents of a file from the workspace"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file, relative to the workspace"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        _context: &ToolContext,
    ) -> anyhow::Result<serde_json::Value> {
        let path = extract_string_arg(&params, "path")?;
        let full_path = resolve_workspace_path(&self.workspace, &path)?;

        let content = tokio::fs::read_to_string(&full_path)
            .await
            .with_context(|| format!("Failed to read file {}", path))?;
        Ok(json!(content))
    }
}
