//! The event alphabet a run publishes, and what subscribers actually see.
//!
//! Every event funnels through exactly one of these variants; the terminal
//! set — `AgentEnd`, `Error`, `Canceled` — is what an [`crate::event_stream::EventStream`]
//! treats as "the run is over."

use agenticlaw_core::Message;
use serde_json::Value;

/// One incremental fragment of an in-flight assistant message.
#[derive(Clone, Debug)]
pub enum MessageDelta {
    Text(String),
    Thinking(String),
    ToolArgs(String),
}

#[derive(Clone, Debug)]
pub enum AgentEvent {
    AgentStart,
    AgentEnd {
        new_messages: Vec<Message>,
    },
    TurnStart,
    TurnEnd {
        assistant: agenticlaw_core::AssistantMessage,
        tool_results: Vec<agenticlaw_core::ToolResultMessage>,
    },
    MessageStart {
        message: Message,
    },
    MessageUpdate {
        message: Message,
        delta: MessageDelta,
    },
    MessageEnd {
        message: Message,
    },
    ToolExecutionStart {
        id: String,
        name: String,
        args: Value,
    },
    ToolExecutionUpdate {
        id: String,
        name: String,
        args: Value,
        partial: String,
    },
    ToolExecutionEnd {
        id: String,
        name: String,
        result: agenticlaw_core::ToolResultMessage,
        is_error: bool,
    },
    Error {
        reason: String,
        partial: Option<Message>,
    },
    Canceled {
        reason: String,
    },
}

impl AgentEvent {
    /// Terminal events close the stream: nothing else is published after one.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::AgentEnd { .. } | Self::Error { .. } | Self::Canceled { .. })
    }
}
