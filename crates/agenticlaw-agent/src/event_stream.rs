//! Event Stream — a bounded, owner-monitored channel a run publishes
//! [`AgentEvent`]s into.
//!
//! Grounded in the teacher's queue-actor style (`DashMap`-backed registries,
//! `tokio::sync::Notify` wakeups) but built from scratch: the teacher's
//! `queue.rs` models a layered "consciousness" priority queue with no
//! counterpart here, so only its wake-up idiom carries over.
//!
//! Liveness is two-way. The stream can die on its own (it reaches a
//! terminal event) or its owner can die out from under it (the task that
//! created it panics or is dropped) — in the latter case a subsequent
//! `push` must notice and fail closed rather than buffer forever. We detect
//! that with a "dead man's switch": the owner holds a `oneshot::Sender`
//! it never sends on, the stream holds the `Receiver`, and a `push` probes
//! it with `try_recv`. Once the sender is dropped, `try_recv` reports
//! `Closed` and the stream cancels itself.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agenticlaw_core::Message;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::events::AgentEvent;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropStrategy {
    DropOldest,
    DropNewest,
    Error,
}

#[derive(Clone, Debug)]
pub struct EventStreamConfig {
    pub max_queue: usize,
    pub drop_strategy: DropStrategy,
    /// Caps the lifetime of one run's stream — `None` means "never", a
    /// stuck run's stream just sits open until its owner drops it. `Some(d)`
    /// arms a watchdog that cancels the run if it's still open after `d`.
    pub timeout: Option<Duration>,
}

impl Default for EventStreamConfig {
    fn default() -> Self {
        Self {
            max_queue: 1024,
            drop_strategy: DropStrategy::DropOldest,
            timeout: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushError {
    /// Queue was full and the configured strategy is `Error`.
    Overflow,
    /// The stream already reached a terminal event, or its owner died.
    Closed,
}

#[derive(Debug, Clone, Copy)]
pub struct EventStreamStats {
    pub queue_size: usize,
    pub max_queue: usize,
    pub dropped: u64,
}

#[derive(Debug, Clone)]
enum RunOutcome {
    Messages(Vec<Message>),
    Error { reason: String, partial: Option<Message> },
    Canceled { reason: String },
}

pub enum RunResult {
    Ok(Vec<Message>),
    Err { reason: String, partial: Option<Message> },
}

struct Inner {
    buffer: Mutex<VecDeque<AgentEvent>>,
    max_queue: usize,
    drop_strategy: DropStrategy,
    dropped: AtomicU64,
    done: AtomicBool,
    /// Guards `finish` so only the first of several racing terminal calls
    /// (normal completion, owner death, a timeout watchdog) takes effect.
    finishing: AtomicBool,
    outcome: Mutex<Option<RunOutcome>>,
    notify: Notify,
    owner_dead: Mutex<oneshot::Receiver<std::convert::Infallible>>,
    attached: Mutex<Option<JoinHandle<()>>>,
    timeout_watchdog: Mutex<Option<JoinHandle<()>>>,
}

/// Held by the stream's creator. Dropping it (or letting the owning task
/// panic/exit) is what tells the stream the owner is gone.
pub struct OwnerGuard(#[allow(dead_code)] oneshot::Sender<std::convert::Infallible>);

#[derive(Clone)]
pub struct EventStream {
    inner: Arc<Inner>,
}

impl EventStream {
    pub fn new(config: EventStreamConfig) -> (Self, OwnerGuard) {
        let (tx, rx) = oneshot::channel();
        let inner = Arc::new(Inner {
            buffer: Mutex::new(VecDeque::new()),
            max_queue: config.max_queue.max(1),
            drop_strategy: config.drop_strategy,
            dropped: AtomicU64::new(0),
            done: AtomicBool::new(false),
            finishing: AtomicBool::new(false),
            outcome: Mutex::new(None),
            notify: Notify::new(),
            owner_dead: Mutex::new(rx),
            attached: Mutex::new(None),
            timeout_watchdog: Mutex::new(None),
        });
        let stream = Self { inner };
        if let Some(deadline) = config.timeout {
            let watched = stream.clone();
            let watchdog = tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                watched.cancel("stream timeout exceeded");
            });
            *stream.inner.timeout_watchdog.lock().unwrap() = Some(watchdog);
        }
        (stream, OwnerGuard(tx))
    }

    fn owner_is_dead(&self) -> bool {
        match self.inner.owner_dead.lock().unwrap().try_recv() {
            Err(oneshot::error::TryRecvError::Empty) => false,
            _ => true,
        }
    }

    fn is_done(&self) -> bool {
        self.inner.done.load(Ordering::SeqCst)
    }

    /// Supervise a spawned task: if it's still running when the stream
    /// reaches a terminal event, it's aborted rather than left to run on.
    pub fn attach_task(&self, handle: JoinHandle<()>) {
        let mut slot = self.inner.attached.lock().unwrap();
        if let Some(old) = slot.replace(handle) {
            old.abort();
        }
    }

    pub fn push(&self, event: AgentEvent) -> Result<(), PushError> {
        if self.is_done() {
            return Err(PushError::Closed);
        }
        if self.owner_is_dead() {
            self.cancel("owner_dead");
            return Err(PushError::Closed);
        }

        let terminal = event.is_terminal();
        {
            let mut buf = self.inner.buffer.lock().unwrap();
            if buf.len() >= self.inner.max_queue && !terminal {
                match self.inner.drop_strategy {
                    DropStrategy::DropOldest => {
                        buf.pop_front();
                        self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                        buf.push_back(event);
                    }
                    DropStrategy::DropNewest => {
                        self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    DropStrategy::Error => {
                        self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                        return Err(PushError::Overflow);
                    }
                }
            } else {
                buf.push_back(event);
            }
        }
        if terminal {
            self.inner.done.store(true, Ordering::SeqCst);
        }
        self.inner.notify.notify_waiters();
        Ok(())
    }

    /// Push without surfacing a backpressure error; an `Overflow` under the
    /// `Error` strategy is logged and otherwise ignored.
    pub fn push_async(&self, event: AgentEvent) {
        if let Err(PushError::Overflow) = self.push(event) {
            warn!("event stream overflow, event dropped");
        }
    }

    /// Only the first caller among several racing terminal paths (normal
    /// completion, owner death, a timeout watchdog) gets to set the outcome
    /// — later ones are no-ops, so a timeout firing just after a clean finish
    /// can't clobber the real result.
    fn finish(&self, outcome: RunOutcome, event: AgentEvent) {
        if self.inner.finishing.swap(true, Ordering::SeqCst) {
            return;
        }
        *self.inner.outcome.lock().unwrap() = Some(outcome);
        let _ = self.push(event);
        if let Some(handle) = self.inner.attached.lock().unwrap().take() {
            handle.abort();
        }
        if let Some(handle) = self.inner.timeout_watchdog.lock().unwrap().take() {
            handle.abort();
        }
        self.inner.notify.notify_waiters();
    }

    pub fn complete(&self, messages: Vec<Message>) {
        self.finish(
            RunOutcome::Messages(messages.clone()),
            AgentEvent::AgentEnd { new_messages: messages },
        );
    }

    pub fn error(&self, reason: impl Into<String>, partial: Option<Message>) {
        let reason = reason.into();
        self.finish(
            RunOutcome::Error { reason: reason.clone(), partial: partial.clone() },
            AgentEvent::Error { reason, partial },
        );
    }

    pub fn cancel(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.finish(
            RunOutcome::Canceled { reason: reason.clone() },
            AgentEvent::Canceled { reason },
        );
    }

    /// Pop the next event, waiting if none is buffered yet. Returns `None`
    /// once the terminal event has already been handed out.
    pub async fn next(&self) -> Option<AgentEvent> {
        loop {
            let notified = self.inner.notify.notified();
            if let Some(event) = self.inner.buffer.lock().unwrap().pop_front() {
                return Some(event);
            }
            if self.is_done() {
                return None;
            }
            notified.await;
        }
    }

    /// Wait for the run's outcome, independent of whether every event has
    /// been drained from the buffer yet.
    pub async fn result(&self, timeout: Option<Duration>) -> RunResult {
        let wait = async {
            loop {
                let notified = self.inner.notify.notified();
                if let Some(outcome) = self.inner.outcome.lock().unwrap().clone() {
                    return outcome;
                }
                notified.await;
            }
        };
        let outcome = match timeout {
            Some(d) => match tokio::time::timeout(d, wait).await {
                Ok(o) => o,
                Err(_) => RunOutcome::Error { reason: "timed out waiting for result".into(), partial: None },
            },
            None => wait.await,
        };
        match outcome {
            RunOutcome::Messages(m) => RunResult::Ok(m),
            RunOutcome::Error { reason, partial } => RunResult::Err { reason, partial },
            RunOutcome::Canceled { reason } => RunResult::Err { reason: format!("canceled: {reason}"), partial: None },
        }
    }

    pub fn stats(&self) -> EventStreamStats {
        EventStreamStats {
            queue_size: self.inner.buffer.lock().unwrap().len(),
            max_queue: self.inner.max_queue,
            dropped: self.inner.dropped.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agenticlaw_core::Message;

    #[tokio::test]
    async fn pushes_are_drained_in_order() {
        let (stream, _guard) = EventStream::new(EventStreamConfig::default());
        stream.push(AgentEvent::AgentStart).unwrap();
        stream.push(AgentEvent::TurnStart).unwrap();
        assert!(matches!(stream.next().await, Some(AgentEvent::AgentStart)));
        assert!(matches!(stream.next().await, Some(AgentEvent::TurnStart)));
    }

    #[tokio::test]
    async fn terminal_event_closes_the_stream() {
        let (stream, _guard) = EventStream::new(EventStreamConfig::default());
        stream.complete(vec![Message::user("hi")]);
        assert!(matches!(stream.next().await, Some(AgentEvent::AgentEnd { .. })));
        assert!(stream.next().await.is_none());
        assert!(matches!(stream.push(AgentEvent::TurnStart), Err(PushError::Closed)));
    }

    #[tokio::test]
    async fn owner_death_cancels_pending_stream() {
        let (stream, guard) = EventStream::new(EventStreamConfig::default());
        drop(guard);
        assert!(matches!(stream.push(AgentEvent::TurnStart), Err(PushError::Closed)));
        let result = stream.result(None).await;
        assert!(matches!(result, RunResult::Err { .. }));
    }

    #[tokio::test]
    async fn drop_oldest_keeps_the_newest_events() {
        let (stream, _guard) = EventStream::new(EventStreamConfig {
            max_queue: 2,
            drop_strategy: DropStrategy::DropOldest,
            ..EventStreamConfig::default()
        });
        stream.push(AgentEvent::AgentStart).unwrap();
        stream.push(AgentEvent::TurnStart).unwrap();
        stream.push(AgentEvent::TurnStart).unwrap();
        let stats = stream.stats();
        assert_eq!(stats.queue_size, 2);
        assert_eq!(stats.dropped, 1);
        assert!(matches!(stream.next().await, Some(AgentEvent::TurnStart)));
    }

    #[tokio::test]
    async fn error_strategy_reports_overflow() {
        let (stream, _guard) = EventStream::new(EventStreamConfig {
            max_queue: 1,
            drop_strategy: DropStrategy::Error,
            ..EventStreamConfig::default()
        });
        stream.push(AgentEvent::AgentStart).unwrap();
        assert!(matches!(stream.push(AgentEvent::TurnStart), Err(PushError::Overflow)));
    }

    #[tokio::test]
    async fn result_reflects_error_outcome() {
        let (stream, _guard) = EventStream::new(EventStreamConfig::default());
        stream.error("boom", None);
        match stream.result(None).await {
            RunResult::Err { reason, .. } => assert_eq!(reason, "boom"),
            RunResult::Ok(_) => panic!("expected an error outcome"),
        }
    }

    #[tokio::test]
    async fn stream_timeout_cancels_a_stuck_run() {
        let (stream, _guard) = EventStream::new(EventStreamConfig {
            timeout: Some(Duration::from_millis(20)),
            ..EventStreamConfig::default()
        });
        match stream.result(Some(Duration::from_secs(1))).await {
            RunResult::Err { reason, .. } => assert!(reason.contains("timeout")),
            RunResult::Ok(_) => panic!("expected the timeout watchdog to cancel the stream"),
        }
    }

    #[tokio::test]
    async fn stream_timeout_does_not_clobber_a_clean_finish() {
        let (stream, _guard) = EventStream::new(EventStreamConfig {
            timeout: Some(Duration::from_millis(50)),
            ..EventStreamConfig::default()
        });
        stream.complete(vec![Message::user("done")]);
        match stream.result(None).await {
            RunResult::Ok(messages) => assert_eq!(messages.len(), 1),
            RunResult::Err { reason, .. } => panic!("expected the clean finish to win, got {reason}"),
        }
        // Give the watchdog a chance to fire; `finish`'s guard must keep it a no-op.
        tokio::time::sleep(Duration::from_millis(80)).await;
        match stream.result(None).await {
            RunResult::Ok(messages) => assert_eq!(messages.len(), 1),
            RunResult::Err { reason, .. } => panic!("timeout clobbered the completed outcome: {reason}"),
        }
    }
}
