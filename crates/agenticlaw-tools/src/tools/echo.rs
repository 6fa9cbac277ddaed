//! Echo tool — trivial, side-effect-free tool used to exercise the loop's
//! parallel tool fan-out and abort paths without needing a real backend.

use crate::registry::{ProgressCallback, Tool, ToolResult};
use agenticlaw_core::AbortToken;
use serde_json::{json, Value};
use std::time::Duration;

pub struct EchoTool {
    /// Artificial per-call delay, so tests can exercise concurrent
    /// in-flight tool calls and mid-flight abort deterministically.
    pub delay: Duration,
}

impl EchoTool {
    pub fn new() -> Self {
        Self {
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for EchoTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo back the given message. Useful for testing."
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "message": { "type": "string", "description": "Text to echo back" }
            },
            "required": ["message"]
        })
    }

    async fn execute(
        &self,
        _call_id: &str,
        args: Value,
        abort: AbortToken,
        on_update: ProgressCallback,
    ) -> ToolResult {
        let message = match args["message"].as_str() {
            Some(m) => m.to_string(),
            None => return ToolResult::error("Missing required parameter: message"),
        };

        if !self.delay.is_zero() {
            on_update(format!("echoing: {}", message));
            let step = Duration::from_millis(20);
            let mut waited = Duration::ZERO;
            while waited < self.delay {
                if abort.is_aborted() {
                    return ToolResult::text("Tool execution aborted");
                }
                tokio::time::sleep(step).await;
                waited += step;
            }
        }

        ToolResult::text(message)
    }
}
