use serde_json::Value;
use std::path::{Component, Path, PathBuf};

pub mod calculator;
pub mod file_read;
pub mod file_write;
pub mod retry;
pub mod shell;
pub mod validation;

pub use calculator::CalculatorTool;
pub use file_read::FileReadTool;
pub use file_write::FileWriteTool;
pub use retry::{BackoffStrategy, RetryConfig};
pub use shell::ShellTool;
pub use validation::validate_parameters;

pub fn extract_string_arg(args: &Value, key: &str) -> anyhow::Result<String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("Missing '{}' parameter", key))
        .map(|s| s.to_string())
}

pub fn extract_f64_arg(args: &Value, key: &str) -> anyhow::Result<f64> {
    args.get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| anyhow::anyhow!("Missing numeric '{}' parameter", key))
}

/// Joins `relative` onto `workspace`, refusing absolute paths and `..`.
pub fn resolve_workspace_path(workspace: &Path, relative: &str) -> anyhow::Result<PathBuf> {
    let candidate = Path::new(relative);
    let escapes = candidate
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    if escapes {
        anyhow::bail!("Path '{}' is outside the workspace", relative);
    }
    Ok(workspace.join(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_paths_stay_inside() {
        let ws = Path::new("/tmp/ws");
        assert_eq!(
            resolve_workspace_path(ws, "notes/a.txt").unwrap(),
            PathBuf::from("/tmp/ws/notes/a.txt")
        );
        assert!(resolve_workspace_path(ws, "../etc/passwd").is_err());
        assert!(resolve_workspace_path(ws, "/etc/passwd").is_err());
    }
}
