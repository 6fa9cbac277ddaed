//! Agent Loop — the outer/inner turn state machine tying streaming and tool
//! execution together into one run.
//!
//! A run is two nested loops. The inner loop streams a turn, executes any
//! tool calls it produced, and keeps going as long as there were tool calls
//! or a steering message arrived mid-turn. Once a turn produces no tool
//! calls and nothing is pending, the outer loop asks for follow-up messages
//! (giving a caller one last chance to keep the conversation going without a
//! fresh top-level prompt) before finally closing out the run.

use std::collections::HashMap;
use std::sync::Arc;

use agenticlaw_core::{AbortToken, Message, ModelId, ReasoningLevel, StopReason};
use agenticlaw_llm::{LlmMessage, LlmProvider};
use agenticlaw_tools::ToolRegistry;
use tracing::{debug, info};

use crate::event_stream::{EventStream, EventStreamConfig, OwnerGuard};
use crate::events::AgentEvent;
use crate::streaming::stream_turn;
use crate::tool_exec::{execute_tool_calls, ToolCallRequest};

/// Supplies the steering and follow-up messages a live run should fold in.
/// The default, [`NoSteering`], never has anything to offer; `AgentSession`
/// is the real implementation, answering out of its own queues.
#[async_trait::async_trait]
pub trait SteeringProvider: Send + Sync {
    async fn get_steering_messages(&self, abort: &AbortToken) -> Vec<Message>;
    async fn get_follow_up_messages(&self, abort: &AbortToken) -> Vec<Message>;
}

pub struct NoSteering;

#[async_trait::async_trait]
impl SteeringProvider for NoSteering {
    async fn get_steering_messages(&self, _abort: &AbortToken) -> Vec<Message> {
        Vec::new()
    }
    async fn get_follow_up_messages(&self, _abort: &AbortToken) -> Vec<Message> {
        Vec::new()
    }
}

pub struct AgentLoopConfig {
    pub model: ModelId,
    pub provider: Arc<dyn LlmProvider>,
    pub tools: Arc<ToolRegistry>,
    pub system_prompt: Option<String>,
    pub convert_to_llm: Arc<dyn Fn(&[Message]) -> Result<Vec<LlmMessage>, String> + Send + Sync>,
    pub transform_context: Option<Arc<dyn Fn(&[Message], &AbortToken) -> Result<Vec<Message>, String> + Send + Sync>>,
    pub get_api_key: Option<Arc<dyn Fn(&str) -> Option<String> + Send + Sync>>,
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub reasoning: ReasoningLevel,
    pub thinking_budgets: HashMap<ReasoningLevel, u32>,
    pub max_tool_concurrency: Option<usize>,
    pub steering: Arc<dyn SteeringProvider>,
    pub stream_config: EventStreamConfig,
}

impl AgentLoopConfig {
    pub fn new(model: ModelId, provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            model,
            provider,
            tools,
            system_prompt: None,
            convert_to_llm: Arc::new(crate::convert::default_convert_to_llm),
            transform_context: None,
            get_api_key: None,
            api_key: None,
            temperature: None,
            max_tokens: Some(8192),
            reasoning: ReasoningLevel::Off,
            thinking_budgets: HashMap::new(),
            max_tool_concurrency: None,
            steering: Arc::new(NoSteering),
            stream_config: EventStreamConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StartError {
    #[error("context is empty")]
    EmptyContext,
    #[error("cannot continue: the last message is from the assistant")]
    CannotContinue,
}

pub struct AgentLoop;

impl AgentLoop {
    /// Start a fresh run: `prompts` are appended to `context` and announced
    /// as already-seen messages before the first turn streams.
    pub fn run(prompts: Vec<Message>, context: Vec<Message>, config: AgentLoopConfig, abort: AbortToken) -> (EventStream, OwnerGuard) {
        let (events, guard) = EventStream::new(config.stream_config.clone());
        let task_events = events.clone();
        let handle = tokio::spawn(run_task(context, prompts, config, abort, task_events, true));
        events.attach_task(handle);
        (events, guard)
    }

    /// Resume from an existing context with no new prompt — used when the
    /// prior run ended on a dangling tool result or user message.
    pub fn continue_run(context: Vec<Message>, config: AgentLoopConfig, abort: AbortToken) -> Result<(EventStream, OwnerGuard), StartError> {
        if context.is_empty() {
            return Err(StartError::EmptyContext);
        }
        if context.last().map(Message::is_assistant).unwrap_or(false) {
            return Err(StartError::CannotContinue);
        }
        let (events, guard) = EventStream::new(config.stream_config.clone());
        let task_events = events.clone();
        let handle = tokio::spawn(run_task(context, Vec::new(), config, abort, task_events, false));
        events.attach_task(handle);
        Ok((events, guard))
    }
}

async fn run_task(
    context: Vec<Message>,
    prompts: Vec<Message>,
    config: AgentLoopConfig,
    abort: AbortToken,
    events: EventStream,
    skip_first_turn_start: bool,
) {
    use futures::FutureExt;

    let result = std::panic::AssertUnwindSafe(run_inner(context, prompts, config, abort, events.clone(), skip_first_turn_start))
        .catch_unwind()
        .await;

    if let Err(panic) = result {
        let message = panic_message(&panic);
        events.error(format!("agent loop task panicked: {message}"), None);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

async fn run_inner(
    initial_context: Vec<Message>,
    initial_prompts: Vec<Message>,
    config: AgentLoopConfig,
    abort: AbortToken,
    events: EventStream,
    skip_first_turn_start: bool,
) {
    let _ = events.push(AgentEvent::AgentStart);
    info!(model = %config.model.model, "agent run started");

    let mut context = initial_context;
    let mut new_messages: Vec<Message> = Vec::new();
    let mut pending: Vec<Message> = Vec::new();

    for m in &initial_prompts {
        let _ = events.push(AgentEvent::MessageStart { message: m.clone() });
        let _ = events.push(AgentEvent::MessageEnd { message: m.clone() });
        context.push(m.clone());
        new_messages.push(m.clone());
    }

    let mut first_turn = skip_first_turn_start;

    loop {
        loop {
            if !first_turn {
                let _ = events.push(AgentEvent::TurnStart);
            }
            first_turn = false;

            for m in pending.drain(..) {
                let _ = events.push(AgentEvent::MessageStart { message: m.clone() });
                let _ = events.push(AgentEvent::MessageEnd { message: m.clone() });
                context.push(m.clone());
                new_messages.push(m);
            }

            if abort.is_aborted() {
                events.cancel("aborted");
                return;
            }

            let outcome = stream_turn(&context, &config, &abort, &events).await;
            let assistant = outcome.assistant;
            context.push(Message::Assistant(assistant.clone()));
            new_messages.push(Message::Assistant(assistant.clone()));

            if assistant.stop_reason == StopReason::Error {
                let _ = events.push(AgentEvent::TurnEnd { assistant: assistant.clone(), tool_results: Vec::new() });
                events.error(assistant.error.clone().unwrap_or_else(|| "assistant error".into()), Some(Message::Assistant(assistant)));
                return;
            }
            if assistant.stop_reason == StopReason::Aborted {
                let _ = events.push(AgentEvent::TurnEnd { assistant: assistant.clone(), tool_results: Vec::new() });
                events.cancel("aborted");
                return;
            }

            let tool_calls: Vec<ToolCallRequest> = assistant
                .tool_calls()
                .map(|(id, name, args)| ToolCallRequest { id: id.to_string(), name: name.to_string(), args: args.clone() })
                .collect();

            let tool_results = if tool_calls.is_empty() {
                Vec::new()
            } else {
                let results = execute_tool_calls(tool_calls.clone(), config.tools.clone(), abort.clone(), events.clone(), config.max_tool_concurrency).await;
                for r in &results {
                    context.push(Message::ToolResult(r.clone()));
                    new_messages.push(Message::ToolResult(r.clone()));
                }
                results
            };

            let _ = events.push(AgentEvent::TurnEnd { assistant: assistant.clone(), tool_results: tool_results.clone() });

            if abort.is_aborted() {
                events.cancel("aborted");
                return;
            }

            pending.extend(config.steering.get_steering_messages(&abort).await);

            if tool_calls.is_empty() && pending.is_empty() {
                break;
            }
        }

        let follow_up = config.steering.get_follow_up_messages(&abort).await;
        if follow_up.is_empty() {
            let _ = events.push(AgentEvent::AgentEnd { new_messages: new_messages.clone() });
            events.complete(new_messages);
            debug!("agent run finished");
            return;
        }
        pending.extend(follow_up);
    }
}
