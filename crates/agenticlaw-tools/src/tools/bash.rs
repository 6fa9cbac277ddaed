//! Bash tool — execute shell commands with timeout and cooperative abort.

use crate::registry::{ProgressCallback, Tool, ToolResult};
use agenticlaw_core::AbortToken;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

const ABORT_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct BashTool {
    workspace_root: PathBuf,
    default_timeout_secs: u64,
}

impl BashTool {
    pub fn new(workspace_root: impl AsRef<Path>) -> Self {
        Self {
            workspace_root: workspace_root.as_ref().to_path_buf(),
            default_timeout_secs: 120,
        }
    }
}

#[async_trait::async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Execute a bash command. Captures stdout and stderr. \
         Set timeout in seconds (default 120, max 600)."
    }

    fn prompt(&self) -> &str {
        "Use the bash tool for terminal operations. Quote paths with spaces."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The bash command to execute"
                },
                "timeout": {
                    "type": "integer",
                    "description": "Timeout in seconds (default 120, max 600)"
                },
                "description": {
                    "type": "string",
                    "description": "Short description of what this command does"
                }
            },
            "required": ["command"]
        })
    }

    /// Spawns with `kill_on_drop(true)` and polls `abort` on a short
    /// interval alongside the process wait, killing the child the moment
    /// the loop's abort token trips rather than waiting for it to exit.
    async fn execute(
        &self,
        _call_id: &str,
        args: Value,
        abort: AbortToken,
        _on_update: ProgressCallback,
    ) -> ToolResult {
        let command = match args["command"].as_str() {
            Some(c) => c,
            None => return ToolResult::error("Missing required parameter: command"),
        };

        let timeout_secs = args["timeout"].as_u64().unwrap_or(self.default_timeout_secs).min(600);

        if let Some(desc) = args["description"].as_str() {
            debug!(desc, command, "bash");
        } else {
            debug!(command = &command[..command.len().min(80)], "bash");
        }

        let mut child = match Command::new("bash")
            .arg("-c")
            .arg(command)
            .current_dir(&self.workspace_root)
            .kill_on_drop(true)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => return ToolResult::error(format!("Failed to spawn: {}", e)),
        };

        let deadline = tokio::time::Instant::now() + Duration::from_secs(timeout_secs);

        loop {
            if abort.is_aborted() {
                let _ = child.kill().await;
                return ToolResult::text("Tool execution aborted");
            }
            if tokio::time::Instant::now() >= deadline {
                let _ = child.kill().await;
                return ToolResult::error(format!("Command timed out after {}s", timeout_secs));
            }

            match tokio::time::timeout(ABORT_POLL_INTERVAL, child.wait()).await {
                Ok(Ok(status)) => {
                    let stdout = read_pipe(child.stdout.take()).await;
                    let stderr = read_pipe(child.stderr.take()).await;
                    let output = std::process::Output {
                        status,
                        stdout: stdout.into_bytes(),
                        stderr: stderr.into_bytes(),
                    };
                    return format_output(&output);
                }
                Ok(Err(e)) => return ToolResult::error(format!("Failed to wait: {}", e)),
                Err(_) => continue,
            }
        }
    }
}

/// Read all bytes from an optional child pipe into a string.
async fn read_pipe(pipe: Option<impl tokio::io::AsyncRead + Unpin>) -> String {
    use tokio::io::AsyncReadExt;
    match pipe {
        Some(mut p) => {
            let mut buf = Vec::new();
            let _ = p.read_to_end(&mut buf).await;
            String::from_utf8_lossy(&buf).to_string()
        }
        None => String::new(),
    }
}

fn format_output(output: &std::process::Output) -> ToolResult {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    let result = if output.status.success() {
        if stderr.is_empty() {
            stdout.trim().to_string()
        } else {
            format!("{}\n{}", stdout.trim(), stderr.trim())
        }
    } else {
        format!(
            "Exit code: {}\n{}\n{}",
            output.status.code().unwrap_or(-1),
            stdout.trim(),
            stderr.trim()
        )
    };

    if result.is_empty() {
        ToolResult::text("(no output)")
    } else if result.len() > 30_000 {
        ToolResult::text(format!("{}\n... [truncated, {} total chars]", &result[..30_000], result.len()))
    } else {
        ToolResult::text(result)
    }
}
