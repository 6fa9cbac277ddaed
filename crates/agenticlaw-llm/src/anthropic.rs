//! Anthropic Claude API provider with SSE streaming.

use crate::provider::{LlmError, LlmProvider, LlmResult, LlmStream};
use crate::types::{LlmRequest, StreamEvent};
use agenticlaw_core::{AbortToken, Usage};
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, error};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn models(&self) -> &[&str] {
        &[
            "claude-opus-4-6",
            "claude-sonnet-4-6",
            "claude-haiku-4-5",
        ]
    }

    async fn complete_stream(
        &self,
        request: LlmRequest,
        abort: Option<AbortToken>,
    ) -> LlmResult<LlmStream> {
        if abort.as_ref().is_some_and(|a| a.is_aborted()) {
            return Err(LlmError::Cancelled);
        }

        let api_key = request.api_key.clone().unwrap_or_else(|| self.api_key.clone());

        let body = AnthropicRequest {
            model: request.model.clone(),
            messages: request
                .messages
                .iter()
                .map(|m| AnthropicMessage {
                    role: m.role.clone(),
                    content: match &m.content {
                        crate::types::LlmContent::Text(s) => serde_json::json!(s),
                        crate::types::LlmContent::Blocks(blocks) => {
                            serde_json::to_value(blocks).unwrap_or_default()
                        }
                    },
                })
                .collect(),
            max_tokens: request.max_tokens.unwrap_or(8192),
            stream: true,
            system: request.system.clone(),
            thinking: request.thinking_budget.map(|budget| AnthropicThinking {
                thinking_type: "enabled".to_string(),
                budget_tokens: budget,
            }),
            tools: request.tools.as_ref().map(|tools| {
                tools
                    .iter()
                    .map(|t| AnthropicTool {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        input_schema: t.input_schema.clone(),
                    })
                    .collect()
            }),
        };

        debug!(model = %body.model, "sending anthropic request");

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, body = %error_text, "anthropic request failed");

            return Err(match status.as_u16() {
                401 => LlmError::AuthFailed(error_text),
                429 => LlmError::RateLimited { retry_after_ms: 60_000 },
                _ => LlmError::RequestFailed(format!("{}: {}", status, error_text)),
            });
        }

        let stream = parse_sse_stream(response.bytes_stream(), abort, body.model);
        Ok(Box::pin(stream))
    }
}

#[derive(Clone, Copy)]
enum BlockKind {
    Text,
    Thinking,
    ToolCall,
}

/// Flat per-1M-token USD pricing; unknown models cost nothing rather than
/// guessing, since a silent wrong number is worse than an absent one.
fn price_per_million(model: &str) -> Option<(f64, f64)> {
    if model.starts_with("claude-opus") {
        Some((15.0, 75.0))
    } else if model.starts_with("claude-sonnet") {
        Some((3.0, 15.0))
    } else if model.starts_with("claude-haiku") {
        Some((0.8, 4.0))
    } else {
        None
    }
}

fn estimate_cost(model: &str, usage: &Usage) -> f64 {
    match price_per_million(model) {
        Some((in_price, out_price)) => {
            (usage.input_tokens as f64 / 1_000_000.0) * in_price
                + (usage.output_tokens as f64 / 1_000_000.0) * out_price
        }
        None => 0.0,
    }
}

fn parse_sse_stream(
    bytes_stream: impl futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
    abort: Option<AbortToken>,
    model: String,
) -> impl futures::Stream<Item = LlmResult<StreamEvent>> + Send {
    async_stream::stream! {
        let mut buffer = String::new();
        let mut block_kinds: HashMap<u32, BlockKind> = HashMap::new();
        let mut usage = Usage::default();

        tokio::pin!(bytes_stream);
        let mut last_stop_reason = "end_turn".to_string();

        while let Some(chunk_result) = bytes_stream.next().await {
            if abort.as_ref().is_some_and(|a| a.is_aborted()) {
                yield Err(LlmError::Cancelled);
                return;
            }

            let chunk = match chunk_result {
                Ok(c) => c,
                Err(e) => {
                    yield Err(LlmError::StreamError(e.to_string()));
                    continue;
                }
            };

            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(event_end) = buffer.find("\n\n") {
                let event_str = buffer[..event_end].to_string();
                buffer = buffer[event_end + 2..].to_string();

                let mut event_type = String::new();
                let mut event_data = String::new();

                for line in event_str.lines() {
                    if let Some(rest) = line.strip_prefix("event: ") {
                        event_type = rest.to_string();
                    } else if let Some(rest) = line.strip_prefix("data: ") {
                        event_data = rest.to_string();
                    }
                }

                if event_data.is_empty() { continue; }

                match event_type.as_str() {
                    "message_start" => {
                        if let Ok(data) = serde_json::from_str::<MessageStart>(&event_data) {
                            usage.input_tokens = data.message.usage.input_tokens;
                            usage.cache_read_tokens = data.message.usage.cache_read_input_tokens.unwrap_or(0);
                            usage.cache_write_tokens = data.message.usage.cache_creation_input_tokens.unwrap_or(0);
                        }
                        yield Ok(StreamEvent::Start);
                    }
                    "content_block_start" => {
                        if let Ok(data) = serde_json::from_str::<ContentBlockStart>(&event_data) {
                            match data.content_block {
                                ContentBlockType::ToolUse { id, name } => {
                                    block_kinds.insert(data.index, BlockKind::ToolCall);
                                    yield Ok(StreamEvent::ToolCallStart { index: data.index, id, name });
                                }
                                ContentBlockType::Text { .. } => {
                                    block_kinds.insert(data.index, BlockKind::Text);
                                    yield Ok(StreamEvent::TextStart { index: data.index });
                                }
                                ContentBlockType::Thinking { .. } => {
                                    block_kinds.insert(data.index, BlockKind::Thinking);
                                    yield Ok(StreamEvent::ThinkingStart { index: data.index });
                                }
                            }
                        }
                    }
                    "content_block_delta" => {
                        if let Ok(data) = serde_json::from_str::<ContentBlockDelta>(&event_data) {
                            match data.delta {
                                DeltaType::TextDelta { text } => {
                                    yield Ok(StreamEvent::TextDelta { index: data.index, text });
                                }
                                DeltaType::ThinkingDelta { thinking } => {
                                    yield Ok(StreamEvent::ThinkingDelta { index: data.index, thinking });
                                }
                                DeltaType::SignatureDelta { .. } => {}
                                DeltaType::InputJsonDelta { partial_json } => {
                                    yield Ok(StreamEvent::ToolCallDelta { index: data.index, partial_json });
                                }
                            }
                        }
                    }
                    "content_block_stop" => {
                        if let Ok(data) = serde_json::from_str::<ContentBlockStop>(&event_data) {
                            match block_kinds.remove(&data.index) {
                                Some(BlockKind::ToolCall) => yield Ok(StreamEvent::ToolCallEnd { index: data.index }),
                                Some(BlockKind::Thinking) => yield Ok(StreamEvent::ThinkingEnd { index: data.index, signature: None }),
                                Some(BlockKind::Text) | None => yield Ok(StreamEvent::TextEnd { index: data.index }),
                            }
                        }
                    }
                    "message_delta" => {
                        if let Ok(data) = serde_json::from_str::<MessageDelta>(&event_data) {
                            usage.output_tokens = data.usage.output_tokens;
                            if let Some(reason) = &data.delta.stop_reason {
                                debug!(stop_reason = %reason, "assistant message complete");
                                last_stop_reason = reason.clone();
                            }
                        }
                    }
                    "message_stop" => {
                        usage.cost_usd = estimate_cost(&model, &usage);
                        yield Ok(StreamEvent::Done {
                            stop_reason: last_stop_reason.clone(),
                            usage: usage.clone(),
                        });
                    }
                    "error" => {
                        if let Ok(data) = serde_json::from_str::<ErrorEvent>(&event_data) {
                            yield Err(LlmError::StreamError(data.error.message));
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking: Option<AnthropicThinking>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<AnthropicTool>>,
}

#[derive(Serialize)]
struct AnthropicThinking {
    #[serde(rename = "type")]
    thinking_type: String,
    budget_tokens: u32,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: String,
    content: serde_json::Value,
}

#[derive(Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Deserialize)]
struct MessageStart {
    message: MessageStartInner,
}

#[derive(Deserialize)]
struct MessageStartInner {
    usage: AnthropicUsage,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
    cache_creation_input_tokens: Option<u32>,
    cache_read_input_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ContentBlockStart {
    index: u32,
    content_block: ContentBlockType,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum ContentBlockType {
    #[serde(rename = "tool_use")]
    ToolUse { id: String, name: String },
    #[serde(rename = "text")]
    Text {
        #[allow(dead_code)]
        text: String,
    },
    #[serde(rename = "thinking")]
    Thinking {
        #[allow(dead_code)]
        #[serde(default)]
        thinking: String,
    },
}

#[derive(Deserialize)]
struct ContentBlockDelta {
    index: u32,
    delta: DeltaType,
}

#[derive(Deserialize)]
struct ContentBlockStop {
    index: u32,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum DeltaType {
    #[serde(rename = "text_delta")]
    TextDelta { text: String },
    #[serde(rename = "thinking_delta")]
    ThinkingDelta { thinking: String },
    #[serde(rename = "signature_delta")]
    SignatureDelta {
        #[allow(dead_code)]
        signature: String,
    },
    #[serde(rename = "input_json_delta")]
    InputJsonDelta { partial_json: String },
}

#[derive(Deserialize)]
struct MessageDelta {
    delta: MessageDeltaContent,
    usage: MessageDeltaUsage,
}

#[derive(Deserialize)]
struct MessageDeltaContent {
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct MessageDeltaUsage {
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorEvent {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[allow(dead_code)]
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}
