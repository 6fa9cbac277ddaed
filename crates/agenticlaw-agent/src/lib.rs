//! Agenticlaw Agent — the runtime driving one multi-turn conversation with a
//! streaming LLM backend: the turn/tool state machine (`agent_loop`), the
//! event stream callers actually subscribe to (`event_stream`), the actor
//! wrapping both into a long-lived session (`session`), and the supporting
//! pieces (context sizing, message conversion, subagent bookkeeping).

pub mod agent_loop;
pub mod convert;
pub mod event_stream;
pub mod events;
pub mod session;
pub mod sizer;
pub mod streaming;
pub mod subagent;
pub mod tool_exec;

pub use agent_loop::{AgentLoop, AgentLoopConfig, NoSteering, StartError, SteeringProvider};
pub use convert::default_convert_to_llm;
pub use event_stream::{DropStrategy, EventStream, EventStreamConfig, EventStreamStats, OwnerGuard, PushError, RunResult};
pub use events::{AgentEvent, MessageDelta};
pub use session::{
    AgentSession, AgentStateSnapshot, Prompt, QueueMode, SessionConfig, SessionError, Subscription,
};
pub use sizer::{
    check_size, estimate_size, estimate_tokens, truncate, SizeCheck, TruncateOptions, TruncateStrategy, Truncated,
};
pub use subagent::{SubagentEntry, SubagentKey, SubagentOptions, SubagentRegistry, SubagentStatus};
pub use tool_exec::{execute_tool_calls, ToolCallRequest};
