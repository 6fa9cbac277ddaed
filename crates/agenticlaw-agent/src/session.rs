//! Agent Session — the stateful actor a caller actually talks to.
//!
//! Modeled as a single-threaded actor: one tokio task owns all mutable state
//! and a command channel is the only way in, so there's never a shared lock
//! to reason about. Everything else (the run itself, tool execution, the
//! event stream) is driven from inside that task's command loop.
//!
//! The steering/follow-up queues and the event stream fan-out are grounded
//! in the teacher's actor-style registries (`DashMap`-backed, liveness
//! detected by a failed `send`); the follow-up queue's short long-poll is
//! new here — see the 50ms constant below for why.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use agenticlaw_core::{AbortToken, Message, ModelId, ReasoningLevel, SessionKey};
use agenticlaw_llm::{LlmMessage, LlmProvider};
use agenticlaw_tools::ToolRegistry;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::agent_loop::{AgentLoop, AgentLoopConfig, SteeringProvider, StartError};
use crate::event_stream::{EventStreamConfig, OwnerGuard};
use crate::events::AgentEvent;

/// How long a `follow_up` poll waits for a message before giving up and
/// letting the run close out. Short enough that a run never stalls
/// noticeably, long enough to absorb the round-trip of a caller reacting to
/// `agent_end` by immediately calling `follow_up`.
const FOLLOW_UP_LONG_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueMode {
    All,
    OneAtATime,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("a run is already in progress")]
    AlreadyStreaming,
    #[error("no messages to continue from")]
    NoMessages,
    #[error("cannot continue: the last message is from the assistant")]
    CannotContinue,
}

impl From<StartError> for SessionError {
    fn from(e: StartError) -> Self {
        match e {
            StartError::EmptyContext => Self::NoMessages,
            StartError::CannotContinue => Self::CannotContinue,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AgentStateSnapshot {
    pub system_prompt: Option<String>,
    pub model: ModelId,
    pub reasoning: ReasoningLevel,
    pub messages: Vec<Message>,
    pub streaming: bool,
    pub partial: Option<Message>,
    pub pending_tool_ids: Vec<String>,
    pub last_error: Option<String>,
}

pub struct SessionConfig {
    pub provider: Arc<dyn LlmProvider>,
    pub tools: Arc<ToolRegistry>,
    pub model: ModelId,
    pub system_prompt: Option<String>,
    pub reasoning: ReasoningLevel,
    pub convert_to_llm: Option<Arc<dyn Fn(&[Message]) -> Result<Vec<LlmMessage>, String> + Send + Sync>>,
    pub transform_context: Option<Arc<dyn Fn(&[Message], &AbortToken) -> Result<Vec<Message>, String> + Send + Sync>>,
    pub get_api_key: Option<Arc<dyn Fn(&str) -> Option<String> + Send + Sync>>,
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub thinking_budgets: HashMap<ReasoningLevel, u32>,
    pub max_tool_concurrency: Option<usize>,
    pub steering_mode: QueueMode,
    pub follow_up_mode: QueueMode,
    pub stream_config: EventStreamConfig,
}

impl SessionConfig {
    pub fn new(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>, model: ModelId) -> Self {
        Self {
            provider,
            tools,
            model,
            system_prompt: None,
            reasoning: ReasoningLevel::Off,
            convert_to_llm: None,
            transform_context: None,
            get_api_key: None,
            api_key: None,
            temperature: None,
            max_tokens: Some(8192),
            thinking_budgets: HashMap::new(),
            max_tool_concurrency: None,
            steering_mode: QueueMode::All,
            follow_up_mode: QueueMode::All,
            stream_config: EventStreamConfig::default(),
        }
    }
}

pub enum Prompt {
    Text(String),
    Message(Message),
    Messages(Vec<Message>),
}

impl From<&str> for Prompt {
    fn from(s: &str) -> Self {
        Prompt::Text(s.to_string())
    }
}
impl From<String> for Prompt {
    fn from(s: String) -> Self {
        Prompt::Text(s)
    }
}
impl From<Message> for Prompt {
    fn from(m: Message) -> Self {
        Prompt::Message(m)
    }
}
impl From<Vec<Message>> for Prompt {
    fn from(m: Vec<Message>) -> Self {
        Prompt::Messages(m)
    }
}

fn prompt_to_messages(p: Prompt) -> Vec<Message> {
    match p {
        Prompt::Text(s) => vec![Message::user(s)],
        Prompt::Message(m) => vec![m],
        Prompt::Messages(m) => m,
    }
}

struct PendingPoll {
    reply: oneshot::Sender<Vec<Message>>,
    deadline: tokio::time::Instant,
}

enum Command {
    Prompt { prompt: Prompt, reply: oneshot::Sender<Result<(), SessionError>> },
    Continue { reply: oneshot::Sender<Result<(), SessionError>> },
    Abort,
    Subscribe { reply: oneshot::Sender<(u64, mpsc::UnboundedReceiver<AgentEvent>)> },
    Unsubscribe { id: u64 },
    WaitForIdle { reply: oneshot::Sender<bool> },
    Reset { reply: oneshot::Sender<()> },
    Steer(Message),
    FollowUp(Message),
    ClearSteeringQueue { reply: oneshot::Sender<()> },
    ClearFollowUpQueue { reply: oneshot::Sender<()> },
    ClearAllQueues { reply: oneshot::Sender<()> },
    SetSystemPrompt { value: Option<String>, reply: oneshot::Sender<()> },
    GetSystemPrompt { reply: oneshot::Sender<Option<String>> },
    SetModel { value: ModelId, reply: oneshot::Sender<()> },
    GetModel { reply: oneshot::Sender<ModelId> },
    SetReasoning { value: ReasoningLevel, reply: oneshot::Sender<()> },
    GetReasoning { reply: oneshot::Sender<ReasoningLevel> },
    SetSteeringMode { value: QueueMode, reply: oneshot::Sender<()> },
    SetFollowUpMode { value: QueueMode, reply: oneshot::Sender<()> },
    GetMessages { reply: oneshot::Sender<Vec<Message>> },
    GetState { reply: oneshot::Sender<AgentStateSnapshot> },
    RunEvent(AgentEvent),
    RunFinished,
    PollSteering { reply: oneshot::Sender<Vec<Message>> },
    PollFollowUp { reply: oneshot::Sender<Vec<Message>> },
}

struct SessionSteering(mpsc::Sender<Command>);

#[async_trait::async_trait]
impl SteeringProvider for SessionSteering {
    async fn get_steering_messages(&self, _abort: &AbortToken) -> Vec<Message> {
        let (tx, rx) = oneshot::channel();
        if self.0.send(Command::PollSteering { reply: tx }).await.is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    async fn get_follow_up_messages(&self, _abort: &AbortToken) -> Vec<Message> {
        let (tx, rx) = oneshot::channel();
        if self.0.send(Command::PollFollowUp { reply: tx }).await.is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }
}

fn drain_queue(queue: &mut VecDeque<Message>, mode: QueueMode) -> Vec<Message> {
    match mode {
        QueueMode::All => queue.drain(..).collect(),
        QueueMode::OneAtATime => queue.pop_front().into_iter().collect(),
    }
}

struct ActorState {
    session_id: SessionKey,
    system_prompt: Option<String>,
    model: ModelId,
    reasoning: ReasoningLevel,
    tools: Arc<ToolRegistry>,
    provider: Arc<dyn LlmProvider>,
    convert_to_llm: Arc<dyn Fn(&[Message]) -> Result<Vec<LlmMessage>, String> + Send + Sync>,
    transform_context: Option<Arc<dyn Fn(&[Message], &AbortToken) -> Result<Vec<Message>, String> + Send + Sync>>,
    get_api_key: Option<Arc<dyn Fn(&str) -> Option<String> + Send + Sync>>,
    api_key: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    thinking_budgets: HashMap<ReasoningLevel, u32>,
    max_tool_concurrency: Option<usize>,
    stream_config: EventStreamConfig,

    messages: Vec<Message>,
    streaming: bool,
    partial: Option<Message>,
    pending_tool_ids: std::collections::HashSet<String>,
    last_error: Option<String>,

    steering_queue: VecDeque<Message>,
    steering_mode: QueueMode,
    follow_up_queue: VecDeque<Message>,
    follow_up_mode: QueueMode,
    pending_follow_up_poll: Option<PendingPoll>,

    subscribers: Vec<(u64, mpsc::UnboundedSender<AgentEvent>)>,
    next_sub_id: u64,
    idle_waiters: Vec<oneshot::Sender<bool>>,
    current_abort: Option<AbortToken>,
    current_owner_guard: Option<OwnerGuard>,

    cmd_tx: mpsc::Sender<Command>,
}

impl ActorState {
    fn build_loop_config(&self) -> AgentLoopConfig {
        let mut cfg = AgentLoopConfig::new(self.model.clone(), self.provider.clone(), self.tools.clone());
        cfg.system_prompt = self.system_prompt.clone();
        cfg.convert_to_llm = self.convert_to_llm.clone();
        cfg.transform_context = self.transform_context.clone();
        cfg.get_api_key = self.get_api_key.clone();
        cfg.api_key = self.api_key.clone();
        cfg.temperature = self.temperature;
        cfg.max_tokens = self.max_tokens;
        cfg.reasoning = self.reasoning;
        cfg.thinking_budgets = self.thinking_budgets.clone();
        cfg.max_tool_concurrency = self.max_tool_concurrency;
        cfg.steering = Arc::new(SessionSteering(self.cmd_tx.clone()));
        cfg.stream_config = self.stream_config.clone();
        cfg
    }

    fn spawn_forwarder(&self, events: crate::event_stream::EventStream) {
        let forwarder_tx = self.cmd_tx.clone();
        tokio::spawn(async move {
            while let Some(ev) = events.next().await {
                if forwarder_tx.send(Command::RunEvent(ev)).await.is_err() {
                    return;
                }
            }
            let _ = forwarder_tx.send(Command::RunFinished).await;
        });
    }

    fn begin_run(&mut self, context: Vec<Message>, prompts: Vec<Message>) {
        let abort = AbortToken::new();
        let config = self.build_loop_config();
        let (events, guard) = AgentLoop::run(prompts, context, config, abort.clone());
        self.current_abort = Some(abort);
        self.current_owner_guard = Some(guard);
        self.streaming = true;
        self.pending_tool_ids.clear();
        self.last_error = None;
        self.spawn_forwarder(events);
    }

    fn apply_event(&mut self, ev: &AgentEvent) {
        match ev {
            AgentEvent::MessageStart { message } | AgentEvent::MessageUpdate { message, .. } => {
                if message.is_assistant() {
                    self.partial = Some(message.clone());
                }
            }
            AgentEvent::MessageEnd { message } => {
                if message.is_assistant() {
                    self.partial = None;
                }
                self.messages.push(message.clone());
            }
            AgentEvent::ToolExecutionStart { id, .. } => {
                self.pending_tool_ids.insert(id.clone());
            }
            AgentEvent::ToolExecutionEnd { id, .. } => {
                self.pending_tool_ids.remove(id);
            }
            AgentEvent::Error { reason, .. } => {
                self.last_error = Some(reason.clone());
            }
            _ => {}
        }
    }

    fn fan_out(&mut self, ev: AgentEvent) {
        self.subscribers.retain(|(_, tx)| tx.send(ev.clone()).is_ok());
    }

    fn snapshot(&self) -> AgentStateSnapshot {
        AgentStateSnapshot {
            system_prompt: self.system_prompt.clone(),
            model: self.model.clone(),
            reasoning: self.reasoning,
            messages: self.messages.clone(),
            streaming: self.streaming,
            partial: self.partial.clone(),
            pending_tool_ids: self.pending_tool_ids.iter().cloned().collect(),
            last_error: self.last_error.clone(),
        }
    }
}

fn handle_command(state: &mut ActorState, cmd: Command) {
    match cmd {
        Command::Prompt { prompt, reply } => {
            if state.streaming {
                let _ = reply.send(Err(SessionError::AlreadyStreaming));
                return;
            }
            let messages = prompt_to_messages(prompt);
            let context = state.messages.clone();
            state.begin_run(context, messages);
            let _ = reply.send(Ok(()));
        }
        Command::Continue { reply } => {
            if state.streaming {
                let _ = reply.send(Err(SessionError::AlreadyStreaming));
                return;
            }
            if state.messages.is_empty() {
                let _ = reply.send(Err(SessionError::NoMessages));
                return;
            }
            let abort = AbortToken::new();
            let config = state.build_loop_config();
            match AgentLoop::continue_run(state.messages.clone(), config, abort.clone()) {
                Ok((events, guard)) => {
                    state.current_abort = Some(abort);
                    state.current_owner_guard = Some(guard);
                    state.streaming = true;
                    state.pending_tool_ids.clear();
                    state.last_error = None;
                    state.spawn_forwarder(events);
                    let _ = reply.send(Ok(()));
                }
                Err(e) => {
                    let _ = reply.send(Err(e.into()));
                }
            }
        }
        Command::Abort => {
            if let Some(abort) = &state.current_abort {
                abort.abort();
            }
        }
        Command::Subscribe { reply } => {
            let id = state.next_sub_id;
            state.next_sub_id += 1;
            let (tx, rx) = mpsc::unbounded_channel();
            state.subscribers.push((id, tx));
            let _ = reply.send((id, rx));
        }
        Command::Unsubscribe { id } => {
            state.subscribers.retain(|(sub_id, _)| *sub_id != id);
        }
        Command::WaitForIdle { reply } => {
            if state.streaming {
                state.idle_waiters.push(reply);
            } else {
                let _ = reply.send(true);
            }
        }
        Command::Reset { reply } => {
            state.messages.clear();
            state.steering_queue.clear();
            state.follow_up_queue.clear();
            state.last_error = None;
            state.partial = None;
            let _ = reply.send(());
        }
        Command::Steer(msg) => {
            state.steering_queue.push_back(msg);
        }
        Command::FollowUp(msg) => {
            if let Some(poller) = state.pending_follow_up_poll.take() {
                let _ = poller.reply.send(vec![msg]);
            } else {
                state.follow_up_queue.push_back(msg);
            }
        }
        Command::ClearSteeringQueue { reply } => {
            state.steering_queue.clear();
            let _ = reply.send(());
        }
        Command::ClearFollowUpQueue { reply } => {
            state.follow_up_queue.clear();
            let _ = reply.send(());
        }
        Command::ClearAllQueues { reply } => {
            state.steering_queue.clear();
            state.follow_up_queue.clear();
            let _ = reply.send(());
        }
        Command::SetSystemPrompt { value, reply } => {
            state.system_prompt = value;
            let _ = reply.send(());
        }
        Command::GetSystemPrompt { reply } => {
            let _ = reply.send(state.system_prompt.clone());
        }
        Command::SetModel { value, reply } => {
            state.model = value;
            let _ = reply.send(());
        }
        Command::GetModel { reply } => {
            let _ = reply.send(state.model.clone());
        }
        Command::SetReasoning { value, reply } => {
            state.reasoning = value;
            let _ = reply.send(());
        }
        Command::GetReasoning { reply } => {
            let _ = reply.send(state.reasoning);
        }
        Command::SetSteeringMode { value, reply } => {
            state.steering_mode = value;
            let _ = reply.send(());
        }
        Command::SetFollowUpMode { value, reply } => {
            state.follow_up_mode = value;
            let _ = reply.send(());
        }
        Command::GetMessages { reply } => {
            let _ = reply.send(state.messages.clone());
        }
        Command::GetState { reply } => {
            let _ = reply.send(state.snapshot());
        }
        Command::RunEvent(ev) => {
            state.apply_event(&ev);
            state.fan_out(ev);
        }
        Command::RunFinished => {
            let was_aborted = state.current_abort.as_ref().map(|a| a.is_aborted()).unwrap_or(false);
            state.streaming = false;
            state.current_abort = None;
            state.current_owner_guard = None;
            state.pending_tool_ids.clear();

            if let Some(Message::Assistant(mut am)) = state.partial.take() {
                am.stop_reason = if was_aborted { agenticlaw_core::StopReason::Aborted } else { agenticlaw_core::StopReason::Error };
                am.error = Some(if was_aborted { "aborted".to_string() } else { "run terminated unexpectedly".to_string() });
                let msg = Message::Assistant(am);
                state.messages.push(msg.clone());
                state.fan_out(AgentEvent::MessageEnd { message: msg });
            }

            for waiter in state.idle_waiters.drain(..) {
                let _ = waiter.send(true);
            }
        }
        Command::PollSteering { reply } => {
            let drained = drain_queue(&mut state.steering_queue, state.steering_mode);
            let _ = reply.send(drained);
        }
        Command::PollFollowUp { reply } => {
            if !state.follow_up_queue.is_empty() {
                let drained = drain_queue(&mut state.follow_up_queue, state.follow_up_mode);
                let _ = reply.send(drained);
            } else {
                state.pending_follow_up_poll = Some(PendingPoll { reply, deadline: tokio::time::Instant::now() + FOLLOW_UP_LONG_POLL });
            }
        }
    }
}

async fn run_actor(mut state: ActorState, mut cmd_rx: mpsc::Receiver<Command>) {
    loop {
        tokio::select! {
            biased;
            maybe_cmd = cmd_rx.recv() => {
                match maybe_cmd {
                    Some(cmd) => handle_command(&mut state, cmd),
                    None => break,
                }
            }
            _ = async {
                match &state.pending_follow_up_poll {
                    Some(p) => tokio::time::sleep_until(p.deadline).await,
                    None => std::future::pending::<()>().await,
                }
            }, if state.pending_follow_up_poll.is_some() => {
                if let Some(poller) = state.pending_follow_up_poll.take() {
                    let _ = poller.reply.send(Vec::new());
                }
            }
        }
    }
    debug!("session actor exiting");
}

/// A cheap, cloneable handle to a running session actor.
#[derive(Clone)]
pub struct AgentSession {
    cmd_tx: mpsc::Sender<Command>,
}

/// A live subscription to a session's event fan-out; call [`unsubscribe`]
/// when done, or just drop it — the session notices the channel close on
/// its next event and prunes it lazily.
///
/// [`unsubscribe`]: Subscription::unsubscribe
pub struct Subscription {
    id: u64,
    cmd_tx: mpsc::Sender<Command>,
}

impl Subscription {
    pub async fn unsubscribe(self) {
        let _ = self.cmd_tx.send(Command::Unsubscribe { id: self.id }).await;
    }
}

impl AgentSession {
    pub fn start(session_id: impl Into<SessionKey>, config: SessionConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(256);
        let state = ActorState {
            session_id: session_id.into(),
            system_prompt: config.system_prompt,
            model: config.model,
            reasoning: config.reasoning,
            tools: config.tools,
            provider: config.provider,
            convert_to_llm: config.convert_to_llm.unwrap_or_else(|| Arc::new(crate::convert::default_convert_to_llm)),
            transform_context: config.transform_context,
            get_api_key: config.get_api_key,
            api_key: config.api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            thinking_budgets: config.thinking_budgets,
            max_tool_concurrency: config.max_tool_concurrency,
            stream_config: config.stream_config,
            messages: Vec::new(),
            streaming: false,
            partial: None,
            pending_tool_ids: std::collections::HashSet::new(),
            last_error: None,
            steering_queue: VecDeque::new(),
            steering_mode: config.steering_mode,
            follow_up_queue: VecDeque::new(),
            follow_up_mode: config.follow_up_mode,
            pending_follow_up_poll: None,
            subscribers: Vec::new(),
            next_sub_id: 0,
            idle_waiters: Vec::new(),
            current_abort: None,
            current_owner_guard: None,
            cmd_tx: cmd_tx.clone(),
        };
        info!("session started");
        tokio::spawn(run_actor(state, cmd_rx));
        Self { cmd_tx }
    }

    pub async fn prompt(&self, p: impl Into<Prompt>) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::Prompt { prompt: p.into(), reply: tx }).await;
        rx.await.unwrap_or(Err(SessionError::AlreadyStreaming))
    }

    pub async fn continue_run(&self) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::Continue { reply: tx }).await;
        rx.await.unwrap_or(Err(SessionError::AlreadyStreaming))
    }

    pub async fn abort(&self) {
        let _ = self.cmd_tx.send(Command::Abort).await;
    }

    pub async fn subscribe(&self) -> (Subscription, mpsc::UnboundedReceiver<AgentEvent>) {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::Subscribe { reply: tx }).await;
        let (id, events_rx) = rx.await.expect("session actor is alive");
        (Subscription { id, cmd_tx: self.cmd_tx.clone() }, events_rx)
    }

    pub async fn wait_for_idle(&self, timeout: Option<Duration>) -> bool {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::WaitForIdle { reply: tx }).await.is_err() {
            return true;
        }
        match timeout {
            Some(d) => matches!(tokio::time::timeout(d, rx).await, Ok(Ok(true))),
            None => matches!(rx.await, Ok(true)),
        }
    }

    pub async fn reset(&self) {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::Reset { reply: tx }).await;
        let _ = rx.await;
    }

    pub async fn steer(&self, msg: Message) {
        let _ = self.cmd_tx.send(Command::Steer(msg)).await;
    }

    pub async fn follow_up(&self, msg: Message) {
        let _ = self.cmd_tx.send(Command::FollowUp(msg)).await;
    }

    pub async fn clear_steering_queue(&self) {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::ClearSteeringQueue { reply: tx }).await;
        let _ = rx.await;
    }

    pub async fn clear_follow_up_queue(&self) {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::ClearFollowUpQueue { reply: tx }).await;
        let _ = rx.await;
    }

    pub async fn clear_all_queues(&self) {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::ClearAllQueues { reply: tx }).await;
        let _ = rx.await;
    }

    pub async fn set_system_prompt(&self, value: Option<String>) {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::SetSystemPrompt { value, reply: tx }).await;
        let _ = rx.await;
    }

    pub async fn get_system_prompt(&self) -> Option<String> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::GetSystemPrompt { reply: tx }).await;
        rx.await.unwrap_or(None)
    }

    pub async fn set_model(&self, value: ModelId) {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::SetModel { value, reply: tx }).await;
        let _ = rx.await;
    }

    pub async fn get_model(&self) -> ModelId {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::GetModel { reply: tx }).await;
        rx.await.unwrap_or_default()
    }

    pub async fn set_reasoning(&self, value: ReasoningLevel) {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::SetReasoning { value, reply: tx }).await;
        let _ = rx.await;
    }

    pub async fn get_reasoning(&self) -> ReasoningLevel {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::GetReasoning { reply: tx }).await;
        rx.await.unwrap_or_default()
    }

    pub async fn set_steering_mode(&self, value: QueueMode) {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::SetSteeringMode { value, reply: tx }).await;
        let _ = rx.await;
    }

    pub async fn set_follow_up_mode(&self, value: QueueMode) {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::SetFollowUpMode { value, reply: tx }).await;
        let _ = rx.await;
    }

    pub async fn get_messages(&self) -> Vec<Message> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::GetMessages { reply: tx }).await;
        rx.await.unwrap_or_default()
    }

    pub async fn get_state(&self) -> Option<AgentStateSnapshot> {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::GetState { reply: tx }).await.is_err() {
            return None;
        }
        rx.await.ok()
    }
}
