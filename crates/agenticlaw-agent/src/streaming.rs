//! Loop/Streaming — turns one model call into a finalized [`AssistantMessage`],
//! publishing `message_start`/`message_update`/`message_end` along the way.
//!
//! Tool-call argument deltas are repaired with the same streaming-JSON
//! best-effort parse already proven out in `agenticlaw_llm` (full parse,
//! then close unmatched brackets, then give up to `{}`), so a
//! `tool_execution_update` always has *something* parseable to show even
//! mid-stream.

use std::collections::HashMap;
use std::time::Duration;

use agenticlaw_core::{now_ms, AbortToken, AssistantMessage, ContentBlock, Message, StopReason, Usage};
use agenticlaw_llm::{close_unmatched_brackets, LlmRequest, StreamEvent};
use futures::StreamExt;

use crate::agent_loop::AgentLoopConfig;
use crate::event_stream::EventStream;
use crate::events::{AgentEvent, MessageDelta};

const ABORT_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct TurnOutcome {
    pub assistant: AssistantMessage,
}

enum BlockKind {
    Text,
    Thinking,
    ToolCall { id: String, name: String },
}

#[derive(Default)]
struct PartialAssistant {
    order: Vec<u32>,
    kinds: HashMap<u32, BlockKind>,
    text: HashMap<u32, String>,
    thinking: HashMap<u32, (String, Option<String>)>,
    tool_args_raw: HashMap<u32, String>,
}

impl PartialAssistant {
    fn ensure_order(&mut self, index: u32) {
        if !self.order.contains(&index) {
            self.order.push(index);
        }
    }

    fn finalize_blocks(&self) -> Vec<ContentBlock> {
        self.order
            .iter()
            .filter_map(|idx| match self.kinds.get(idx) {
                Some(BlockKind::Text) => self.text.get(idx).map(|t| ContentBlock::Text { text: t.clone() }),
                Some(BlockKind::Thinking) => self.thinking.get(idx).map(|(t, sig)| ContentBlock::Thinking {
                    thinking: t.clone(),
                    signature: sig.clone(),
                }),
                Some(BlockKind::ToolCall { id, name }) => {
                    let raw = self.tool_args_raw.get(idx).cloned().unwrap_or_default();
                    Some(ContentBlock::ToolCall { id: id.clone(), name: name.clone(), arguments: parse_streaming_json(&raw) })
                }
                None => None,
            })
            .collect()
    }
}

fn parse_streaming_json(raw: &str) -> serde_json::Value {
    if let Ok(v) = serde_json::from_str(raw) {
        return v;
    }
    let repaired = close_unmatched_brackets(raw);
    serde_json::from_str(&repaired).unwrap_or_else(|_| serde_json::json!({}))
}

fn map_stop_reason(raw: &str) -> StopReason {
    match raw {
        "tool_use" => StopReason::ToolUse,
        "max_tokens" => StopReason::Length,
        _ => StopReason::Stop,
    }
}

fn placeholder_message(assistant: &AssistantMessage) -> Message {
    Message::Assistant(assistant.clone())
}

pub async fn stream_turn(
    history: &[Message],
    config: &AgentLoopConfig,
    abort: &AbortToken,
    events: &EventStream,
) -> TurnOutcome {
    if abort.is_aborted() {
        let assistant = AssistantMessage::empty(config.model.clone(), StopReason::Aborted);
        announce_as_single_shot(events, &assistant);
        return TurnOutcome { assistant };
    }

    let transformed = match &config.transform_context {
        Some(f) => match f(history, abort) {
            Ok(v) => v,
            Err(reason) => return error_outcome(config, events, format!("transform_context failed: {reason}")),
        },
        None => history.to_vec(),
    };

    let llm_messages = match (config.convert_to_llm)(&transformed) {
        Ok(v) => v,
        Err(reason) => return error_outcome(config, events, format!("convert_to_llm failed: {reason}")),
    };

    let api_key = resolve_api_key(config);
    let thinking_budget = config.thinking_budgets.get(&config.reasoning).copied();

    let request = LlmRequest {
        model: config.model.model.clone(),
        messages: llm_messages,
        tools: Some(config.tools.get_definitions()),
        max_tokens: config.max_tokens,
        temperature: config.temperature,
        system: config.system_prompt.clone(),
        thinking_budget,
        api_key,
    };

    let stream = match config.provider.complete_stream(request, Some(abort.clone())).await {
        Ok(s) => s,
        Err(e) => return error_outcome(config, events, e.to_string()),
    };

    consume_stream(stream, config, abort, events).await
}

fn resolve_api_key(config: &AgentLoopConfig) -> Option<String> {
    if let Some(f) = &config.get_api_key {
        if let Some(key) = f(&config.model.provider) {
            return Some(key);
        }
    }
    config.api_key.clone()
}

async fn consume_stream(
    stream: agenticlaw_llm::LlmStream,
    config: &AgentLoopConfig,
    abort: &AbortToken,
    events: &EventStream,
) -> TurnOutcome {
    let mut partial = PartialAssistant::default();
    let mut usage = Usage::default();
    let mut stop_reason = StopReason::Stop;
    let mut error_text: Option<String> = None;
    let mut started = false;

    tokio::pin!(stream);

    loop {
        if abort.is_aborted() {
            stop_reason = StopReason::Aborted;
            break;
        }

        match tokio::time::timeout(ABORT_POLL_INTERVAL, stream.next()).await {
            Ok(Some(Ok(ev))) => {
                if !started {
                    started = true;
                    let placeholder = AssistantMessage::empty(config.model.clone(), StopReason::Stop);
                    let _ = events.push(AgentEvent::MessageStart { message: placeholder_message(&placeholder) });
                }
                match ev {
                    StreamEvent::Start => {}
                    StreamEvent::TextStart { index } => {
                        partial.ensure_order(index);
                        partial.kinds.insert(index, BlockKind::Text);
                        partial.text.insert(index, String::new());
                    }
                    StreamEvent::TextDelta { index, text } => {
                        partial.text.entry(index).or_default().push_str(&text);
                        push_delta(events, config, &partial, MessageDelta::Text(text));
                    }
                    StreamEvent::TextEnd { .. } => {}
                    StreamEvent::ThinkingStart { index } => {
                        partial.ensure_order(index);
                        partial.kinds.insert(index, BlockKind::Thinking);
                        partial.thinking.insert(index, (String::new(), None));
                    }
                    StreamEvent::ThinkingDelta { index, thinking } => {
                        partial.thinking.entry(index).or_insert_with(|| (String::new(), None)).0.push_str(&thinking);
                        push_delta(events, config, &partial, MessageDelta::Thinking(thinking));
                    }
                    StreamEvent::ThinkingEnd { index, signature } => {
                        if let Some(entry) = partial.thinking.get_mut(&index) {
                            entry.1 = signature;
                        }
                    }
                    StreamEvent::ToolCallStart { index, id, name } => {
                        partial.ensure_order(index);
                        partial.kinds.insert(index, BlockKind::ToolCall { id, name });
                        partial.tool_args_raw.insert(index, String::new());
                    }
                    StreamEvent::ToolCallDelta { index, partial_json } => {
                        partial.tool_args_raw.entry(index).or_default().push_str(&partial_json);
                        push_delta(events, config, &partial, MessageDelta::ToolArgs(partial_json));
                    }
                    StreamEvent::ToolCallEnd { .. } => {}
                    StreamEvent::Done { stop_reason: sr, usage: u } => {
                        usage = u;
                        stop_reason = map_stop_reason(&sr);
                        break;
                    }
                    StreamEvent::Error { reason } => {
                        error_text = Some(reason);
                        stop_reason = StopReason::Error;
                        break;
                    }
                    StreamEvent::Canceled { reason } => {
                        error_text = Some(reason);
                        stop_reason = StopReason::Aborted;
                        break;
                    }
                }
            }
            Ok(Some(Err(e))) => {
                error_text = Some(e.to_string());
                stop_reason = StopReason::Error;
                break;
            }
            Ok(None) => break,
            Err(_) => continue,
        }
    }

    let content = partial.finalize_blocks();
    if error_text.is_none() && stop_reason != StopReason::Aborted {
        let has_tool_calls = content.iter().any(|b| matches!(b, ContentBlock::ToolCall { .. }));
        if has_tool_calls {
            stop_reason = StopReason::ToolUse;
        }
    }

    let assistant = AssistantMessage {
        content,
        model: config.model.clone(),
        usage,
        stop_reason,
        error: error_text,
        created_at: now_ms(),
    };

    if started {
        let _ = events.push(AgentEvent::MessageEnd { message: placeholder_message(&assistant) });
    } else {
        announce_as_single_shot(events, &assistant);
    }

    TurnOutcome { assistant }
}

fn push_delta(events: &EventStream, config: &AgentLoopConfig, partial: &PartialAssistant, delta: MessageDelta) {
    let snapshot = AssistantMessage {
        content: partial.finalize_blocks(),
        model: config.model.clone(),
        usage: Usage::default(),
        stop_reason: StopReason::Stop,
        error: None,
        created_at: now_ms(),
    };
    let _ = events.push(AgentEvent::MessageUpdate { message: placeholder_message(&snapshot), delta });
}

fn error_outcome(config: &AgentLoopConfig, events: &EventStream, reason: String) -> TurnOutcome {
    let assistant = AssistantMessage {
        content: Vec::new(),
        model: config.model.clone(),
        usage: Usage::default(),
        stop_reason: StopReason::Error,
        error: Some(reason),
        created_at: now_ms(),
    };
    announce_as_single_shot(events, &assistant);
    TurnOutcome { assistant }
}

fn announce_as_single_shot(events: &EventStream, assistant: &AssistantMessage) {
    let message = placeholder_message(assistant);
    let _ = events.push(AgentEvent::MessageStart { message: message.clone() });
    let _ = events.push(AgentEvent::MessageEnd { message });
}
