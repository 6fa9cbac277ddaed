//! Wire-level request/response shapes and the normalized streaming event
//! alphabet every provider adapter must emit.

use agenticlaw_core::Usage;
use serde::{Deserialize, Serialize};

/// Request sent to a provider's streaming completion endpoint.
#[derive(Clone, Debug, Serialize)]
pub struct LlmRequest {
    pub model: String,
    pub messages: Vec<LlmMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<LlmTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Provider-specific thinking-budget token count, derived from the
    /// session's configured reasoning level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_budget: Option<u32>,
    /// Per-call credential override. Lets a caller refresh a short-lived key
    /// between turns instead of baking one into the provider at construction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for LlmRequest {
    fn default() -> Self {
        Self {
            model: "claude-opus-4-6".to_string(),
            messages: Vec::new(),
            tools: None,
            max_tokens: Some(8192),
            temperature: None,
            system: None,
            thinking_budget: None,
            api_key: None,
        }
    }
}

/// One message in the provider-shaped conversation, as produced by a
/// `convert_to_llm` bridge.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: String,
    pub content: LlmContent,
}

/// Message content - plain text or an array of content blocks.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LlmContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl From<String> for LlmContent {
    fn from(s: String) -> Self {
        LlmContent::Text(s)
    }
}

impl From<&str> for LlmContent {
    fn from(s: &str) -> Self {
        LlmContent::Text(s.to_string())
    }
}

/// Provider-shaped content block, distinct from [`agenticlaw_core::ContentBlock`]
/// which is the runtime's own post-normalization representation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

/// Tool definition as sent to the provider.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmTool {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// One normalized streaming event from a provider adapter. Content blocks
/// are addressed by `index`: a `*Start` establishes the block, `*Delta`
/// events append to it, `*End` finalizes it (and, for thinking blocks,
/// carries a provider signature).
#[derive(Clone, Debug)]
pub enum StreamEvent {
    Start,
    TextStart { index: u32 },
    TextDelta { index: u32, text: String },
    TextEnd { index: u32 },
    ThinkingStart { index: u32 },
    ThinkingDelta { index: u32, thinking: String },
    ThinkingEnd { index: u32, signature: Option<String> },
    ToolCallStart { index: u32, id: String, name: String },
    ToolCallDelta { index: u32, partial_json: String },
    ToolCallEnd { index: u32 },
    Done { stop_reason: String, usage: Usage },
    Error { reason: String },
    Canceled { reason: String },
}

/// One block accumulated from a stream while it's still in flight.
#[derive(Clone, Debug, Default)]
pub struct AccumulatedToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl AccumulatedToolCall {
    /// Parse accumulated argument JSON, closing any unmatched brackets/braces
    /// left open by a stream cut mid-delta. Falls back to an empty object.
    pub fn parse_arguments(&self) -> serde_json::Value {
        if let Ok(v) = serde_json::from_str(&self.arguments) {
            return v;
        }
        let repaired = close_unmatched_brackets(&self.arguments);
        serde_json::from_str(&repaired).unwrap_or_else(|_| serde_json::json!({}))
    }
}

/// Close unmatched `{`/`[` in a truncated JSON fragment, brackets before
/// braces, so a best-effort parse can still succeed mid-stream.
pub fn close_unmatched_brackets(partial: &str) -> String {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for ch in partial.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
            }
            _ => {}
        }
    }

    let mut repaired = partial.to_string();
    if in_string {
        repaired.push('"');
    }
    while let Some(closer) = stack.pop() {
        repaired.push(closer);
    }
    repaired
}
