use crate::tools::{BackoffStrategy, RetryConfig, extract_string_arg};
use crate::traits::{Tool, ToolContext};
use async_trait::async_trait;
use serde_json::json;
use tokio::process::Command;

pub struct ShellTool {
    workspace: std::path::PathBuf,
}

impl ShellTool {
    pub fn new(workspace: impl AsRef<std::path::Path>) -> Self {
        Self {
            workspace: workspace.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Execute a shell command in the workspace directory"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "Shell command to execute"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        _context: &ToolContext,
    ) -> anyhow::Result<serde_json::Value> {
        let command = extract_string_arg(&params, "command")?;

        let output = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .current_dir(&self.workspace)
            .output()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to spawn command: {}", e))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            if stderr.is_empty() {
                anyhow::bail!("Command failed with status: {}", output.status);
            }
            anyhow::bail!("{}", stderr.trim_end());
        }

        Ok(json!({
            "stdout": stdout,
            "stderr": stderr,
        }))
    }

    // Only spawn failures are transient; a non-zero exit is the command's answer.
    fn retry_config(&self) -> Option<RetryConfig> {
        Some(RetryConfig {
            max_attempts: 2,
            backoff: BackoffStrategy::Linear,
            initial_delay_ms: 200,
            max_delay_ms: 1_000,
            retryable_errors: Some(vec!["Failed to spawn command".to_string()]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn captures_stdout() {
        let tmp = TempDir::new().unwrap();
        let out = ShellTool::new(tmp.path())
            .execute(json!({"command": "echo hi"}), &ToolContext::default())
            .await
            .unwrap();
        assert_eq!(out["stdout"], json!("hi\n"));
    }

    #[tokio::test]
    async fn failing_command_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let result = ShellTool::new(tmp.path())
            .execute(json!({"command": "exit 3"}), &ToolContext::default())
            .await;
        assert!(result.is_err());
    }
}
