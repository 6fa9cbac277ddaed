//! Context Sizer — cheap, provider-agnostic size estimation and truncation.
//!
//! The char-count-over-four heuristic and the "drop from the middle, keep
//! the edges" shape are lifted straight from the teacher's old
//! `ContextManager::compact()`, generalized into two named strategies
//! instead of one hardcoded pass.

use agenticlaw_core::{ContentBlock, Message, ToolResultBlock};

const CHARS_PER_TOKEN: usize = 4;
const IMAGE_CHAR_COST: usize = 100;
const UNSERIALIZABLE_ARGS_CHAR_COST: usize = 50;

/// Character count for one message, summed over its content blocks.
fn message_chars(message: &Message) -> usize {
    match message {
        Message::User(u) => u.content.iter().map(block_chars).sum(),
        Message::Assistant(a) => a.content.iter().map(block_chars).sum(),
        Message::ToolResult(t) => t.content.iter().map(tool_result_chars).sum(),
    }
}

fn block_chars(block: &ContentBlock) -> usize {
    match block {
        ContentBlock::Text { text } => text.len(),
        ContentBlock::Thinking { thinking, .. } => thinking.len(),
        ContentBlock::ToolCall { arguments, .. } => serde_json::to_string(arguments)
            .map(|s| s.len())
            .unwrap_or(UNSERIALIZABLE_ARGS_CHAR_COST),
        ContentBlock::Image(_) => IMAGE_CHAR_COST,
    }
}

fn tool_result_chars(block: &ToolResultBlock) -> usize {
    match block {
        ToolResultBlock::Text { text } => text.len(),
        ToolResultBlock::Image(_) => IMAGE_CHAR_COST,
    }
}

/// Character count for a whole context, including an optional system prompt.
pub fn estimate_size(messages: &[Message], system_prompt: Option<&str>) -> usize {
    system_prompt.map(str::len).unwrap_or(0) + messages.iter().map(message_chars).sum::<usize>()
}

/// `chars / 4`, rounded down — a rough but cheap stand-in for a real
/// tokenizer, good enough to drive truncation decisions.
pub fn estimate_tokens(chars: usize) -> usize {
    chars / CHARS_PER_TOKEN
}

#[derive(Clone, Copy, Debug)]
pub struct SizeCheck {
    pub chars: usize,
    pub tokens: usize,
    pub warning: bool,
    pub critical: bool,
}

/// Estimate size and classify it against warning/critical token thresholds,
/// logging at the appropriate level as a side effect.
pub fn check_size(
    messages: &[Message],
    system_prompt: Option<&str>,
    warning_tokens: usize,
    critical_tokens: usize,
) -> SizeCheck {
    let chars = estimate_size(messages, system_prompt);
    let tokens = estimate_tokens(chars);
    let warning = tokens >= warning_tokens;
    let critical = tokens >= critical_tokens;
    if critical {
        tracing::warn!(tokens, critical_tokens, "context size is critical");
    } else if warning {
        tracing::debug!(tokens, warning_tokens, "context size warning");
    }
    SizeCheck { chars, tokens, warning, critical }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TruncateStrategy {
    /// Keep the most recent messages (and, optionally, the first user turn)
    /// until both the message-count and char budgets are satisfied.
    #[default]
    SlidingWindow,
    /// Keep a prefix and a suffix of the conversation, dropping the middle.
    KeepBookends,
}

#[derive(Clone, Debug)]
pub struct TruncateOptions {
    pub max_messages: usize,
    pub max_chars: usize,
    pub strategy: TruncateStrategy,
    /// Pin the first user message so it survives truncation even once it
    /// falls outside the retained window — useful for task instructions
    /// given once at the start of a long-running conversation.
    pub keep_first_user: bool,
}

impl Default for TruncateOptions {
    fn default() -> Self {
        Self {
            max_messages: 200,
            max_chars: 400_000,
            strategy: TruncateStrategy::default(),
            keep_first_user: true,
        }
    }
}

pub struct Truncated {
    pub messages: Vec<Message>,
    pub dropped: usize,
}

pub fn truncate(messages: &[Message], opts: &TruncateOptions) -> Truncated {
    if messages.len() <= opts.max_messages && estimate_size(messages, None) <= opts.max_chars {
        return Truncated { messages: messages.to_vec(), dropped: 0 };
    }
    match opts.strategy {
        TruncateStrategy::SlidingWindow => sliding_window(messages, opts),
        TruncateStrategy::KeepBookends => keep_bookends(messages, opts),
    }
}

fn sliding_window(messages: &[Message], opts: &TruncateOptions) -> Truncated {
    let n = messages.len();
    let first_user_idx = if opts.keep_first_user {
        messages.iter().position(|m| matches!(m, Message::User(_)))
    } else {
        None
    };

    let mut kept_idx: Vec<usize> = Vec::new();
    let mut chars = 0usize;
    for i in (0..n).rev() {
        if kept_idx.len() >= opts.max_messages {
            break;
        }
        let c = message_chars(&messages[i]);
        if chars + c > opts.max_chars && !kept_idx.is_empty() {
            break;
        }
        chars += c;
        kept_idx.push(i);
    }
    kept_idx.reverse();

    if let Some(first_user_idx) = first_user_idx {
        if !kept_idx.contains(&first_user_idx) && !kept_idx.is_empty() {
            kept_idx.insert(0, first_user_idx);
            if kept_idx.len() > opts.max_messages && kept_idx.len() > 1 {
                kept_idx.remove(1);
            }
        }
    }

    let dropped = n - kept_idx.len();
    tracing::info!(dropped, kept = kept_idx.len(), "truncated context (sliding window)");
    Truncated {
        messages: kept_idx.into_iter().map(|i| messages[i].clone()).collect(),
        dropped,
    }
}

fn keep_bookends(messages: &[Message], opts: &TruncateOptions) -> Truncated {
    let n = messages.len();
    let half = (opts.max_messages / 2).max(1);
    if n <= half * 2 {
        return Truncated { messages: messages.to_vec(), dropped: 0 };
    }
    let mut kept: Vec<Message> = messages[..half].to_vec();
    kept.extend(messages[n - half..].iter().cloned());
    tracing::info!(dropped = n - kept.len(), kept = kept.len(), "truncated context (bookends)");
    Truncated { dropped: n - kept.len(), messages: kept }
}

/// Build a `transform_context` closure around [`truncate`] — the default
/// wiring for [`crate::agent_loop::AgentLoopConfig::transform_context`].
pub fn make_transform(
    opts: TruncateOptions,
) -> impl Fn(&[Message], &agenticlaw_core::AbortToken) -> Result<Vec<Message>, String> + Send + Sync + 'static {
    move |messages: &[Message], _abort: &agenticlaw_core::AbortToken| Ok(truncate(messages, &opts).messages)
}
