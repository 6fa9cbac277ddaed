//! Default `convert_to_llm` bridge — turns runtime [`Message`]s into the
//! provider-shaped [`LlmMessage`]s a stream call actually sends.
//!
//! Only `User`, `Assistant`, and `ToolResult` roles survive; everything else
//! (there is nothing else yet) is dropped silently. Consecutive tool results
//! are folded into a single `user`-role message, mirroring the merge the
//! teacher's old `Session::add_tool_result` did for the same Anthropic
//! constraint (every tool_result for a turn must share one message).

use agenticlaw_core::{ContentBlock as CoreBlock, Message};
use agenticlaw_llm::{ContentBlock as LlmBlock, LlmContent, LlmMessage};

pub fn default_convert_to_llm(messages: &[Message]) -> Result<Vec<LlmMessage>, String> {
    let mut out: Vec<LlmMessage> = Vec::with_capacity(messages.len());

    for message in messages {
        match message {
            Message::ToolResult(t) => {
                let block = LlmBlock::ToolResult {
                    tool_use_id: t.tool_call_id.clone(),
                    content: t.as_text(),
                    is_error: t.is_error.then_some(true),
                };
                if let Some(LlmMessage { role, content: LlmContent::Blocks(blocks) }) = out.last_mut() {
                    if role == "user" && blocks.iter().all(|b| matches!(b, LlmBlock::ToolResult { .. })) {
                        blocks.push(block);
                        continue;
                    }
                }
                out.push(LlmMessage { role: "user".to_string(), content: LlmContent::Blocks(vec![block]) });
            }
            Message::User(u) => {
                let blocks: Vec<LlmBlock> = u.content.iter().filter_map(core_to_llm_block).collect();
                out.push(LlmMessage { role: "user".to_string(), content: LlmContent::Blocks(blocks) });
            }
            Message::Assistant(a) => {
                let blocks: Vec<LlmBlock> = a.content.iter().filter_map(core_to_llm_block).collect();
                out.push(LlmMessage { role: "assistant".to_string(), content: LlmContent::Blocks(blocks) });
            }
        }
    }

    Ok(out)
}

fn core_to_llm_block(block: &CoreBlock) -> Option<LlmBlock> {
    match block {
        CoreBlock::Text { text } => Some(LlmBlock::Text { text: text.clone() }),
        CoreBlock::ToolCall { id, name, arguments } => Some(LlmBlock::ToolUse {
            id: id.clone(),
            name: name.clone(),
            input: arguments.clone(),
        }),
        // Thinking isn't replayed to the provider by the default bridge, and
        // images aren't supported by the provider-shaped block set yet.
        CoreBlock::Thinking { .. } | CoreBlock::Image(_) => None,
    }
}
