//! Read tool — read file contents with optional offset/limit.

use crate::registry::{ProgressCallback, Tool, ToolResult};
use agenticlaw_core::AbortToken;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

pub struct ReadTool {
    workspace_root: PathBuf,
}

impl ReadTool {
    pub fn new(workspace_root: impl AsRef<Path>) -> Self {
        Self {
            workspace_root: workspace_root.as_ref().to_path_buf(),
        }
    }

    fn resolve_path(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        let expanded = if let Some(rest) = path.strip_prefix("~/") {
            dirs::home_dir().unwrap_or_default().join(rest)
        } else if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.workspace_root.join(p)
        };
        expanded.canonicalize().unwrap_or(expanded)
    }
}

#[async_trait::async_trait]
impl Tool for ReadTool {
    fn name(&self) -> &str {
        "read"
    }

    fn description(&self) -> &str {
        "Read the contents of a file. Returns numbered lines. Use offset/limit for large files."
    }

    fn prompt(&self) -> &str {
        "Use the read tool to view files. Read files before editing them."
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Absolute or workspace-relative path to read"
                },
                "offset": {
                    "type": "integer",
                    "description": "Line number to start from (1-indexed)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of lines to read (default 2000)"
                }
            },
            "required": ["file_path"]
        })
    }

    async fn execute(
        &self,
        _call_id: &str,
        args: Value,
        _abort: AbortToken,
        _on_update: ProgressCallback,
    ) -> ToolResult {
        let path = match args
            .get("file_path")
            .or(args.get("path"))
            .and_then(|v| v.as_str())
        {
            Some(p) => p,
            None => return ToolResult::error("Missing required parameter: file_path"),
        };

        let resolved = self.resolve_path(path);

        let content = match fs::read_to_string(&resolved).await {
            Ok(c) => c,
            Err(e) => return ToolResult::error(format!("Failed to read file: {}", e)),
        };

        let offset = args["offset"].as_u64().unwrap_or(1) as usize;
        let limit = args["limit"].as_u64().unwrap_or(2000) as usize;

        let lines: Vec<&str> = content.lines().collect();
        let start = (offset.saturating_sub(1)).min(lines.len());
        let end = (start + limit).min(lines.len());

        let result: Vec<String> = lines[start..end]
            .iter()
            .enumerate()
            .map(|(i, line)| format!("{:>6}\t{}", start + i + 1, line))
            .collect();

        debug!(path, lines = end - start, offset, "read");
        ToolResult::text(result.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::no_op_progress;

    #[tokio::test]
    async fn reads_and_numbers_lines() {
        let dir = std::env::temp_dir().join(format!("agenticlaw-read-test-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let file = dir.join("a.txt");
        tokio::fs::write(&file, "one\ntwo\nthree\n").await.unwrap();

        let tool = ReadTool::new(&dir);
        let result = tool
            .execute(
                "call-1",
                json!({"file_path": "a.txt"}),
                AbortToken::new(),
                no_op_progress(),
            )
            .await;

        match result {
            ToolResult::Text(text) => {
                assert!(text.contains("1\tone"));
                assert!(text.contains("3\tthree"));
            }
            other => panic!("expected Text, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn missing_file_path_is_an_error() {
        let tool = ReadTool::new(std::env::temp_dir());
        let result = tool
            .execute("call-1", json!({}), AbortToken::new(), no_op_progress())
            .await;
        assert!(result.is_error());
    }
}
