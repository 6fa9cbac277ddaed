//! Loop/Tool Execution — parallel, abortable tool fan-out.
//!
//! Each call runs as its own task; a bounded `Semaphore` caps concurrency
//! when configured. Every ~100ms (the same cadence `BashTool` itself polls
//! its child process at) the fan-out checks the shared abort token; once
//! tripped, every still-running task is aborted and the calls that didn't
//! make it back in time are reported with the same "Tool execution aborted"
//! text `EchoTool` uses for its own abort path.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use agenticlaw_core::{AbortToken, Message, ToolResultMessage};
use agenticlaw_tools::{ProgressCallback, ToolRegistry};
use serde_json::Value;
use tokio::task::JoinSet;

use crate::event_stream::EventStream;
use crate::events::AgentEvent;

const ABORT_POLL_INTERVAL: Duration = Duration::from_millis(100);
const ABORTED_TEXT: &str = "Tool execution aborted";

#[derive(Clone, Debug)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub args: Value,
}

pub async fn execute_tool_calls(
    calls: Vec<ToolCallRequest>,
    tools: Arc<ToolRegistry>,
    abort: AbortToken,
    events: EventStream,
    max_concurrency: Option<usize>,
) -> Vec<ToolResultMessage> {
    let n = calls.len();
    if n == 0 {
        return Vec::new();
    }

    for call in &calls {
        let _ = events.push(AgentEvent::ToolExecutionStart {
            id: call.id.clone(),
            name: call.name.clone(),
            args: call.args.clone(),
        });
    }

    let semaphore = Arc::new(tokio::sync::Semaphore::new(max_concurrency.unwrap_or(n).max(1)));
    let mut set: JoinSet<ToolResultMessage> = JoinSet::new();
    let mut id_to_idx: HashMap<tokio::task::Id, usize> = HashMap::new();

    for (idx, call) in calls.iter().enumerate() {
        let tools = tools.clone();
        let abort_for_task = abort.clone();
        let events_for_task = events.clone();
        let sem = semaphore.clone();
        let id = call.id.clone();
        let name = call.name.clone();
        let args = call.args.clone();

        let handle = set.spawn(async move {
            let _permit = sem.acquire_owned().await.ok();
            let id_for_update = id.clone();
            let name_for_update = name.clone();
            let args_for_update = args.clone();
            let on_update: ProgressCallback = Arc::new(move |partial: String| {
                let _ = events_for_task.push(AgentEvent::ToolExecutionUpdate {
                    id: id_for_update.clone(),
                    name: name_for_update.clone(),
                    args: args_for_update.clone(),
                    partial,
                });
            });
            let result = tools.execute(&name, &id, args, abort_for_task, on_update).await;
            ToolResultMessage::text(id, name, result.to_content_string(), result.is_error())
        });
        id_to_idx.insert(handle.id(), idx);
    }

    let mut results: Vec<Option<ToolResultMessage>> = (0..n).map(|_| None).collect();

    while !set.is_empty() {
        tokio::select! {
            biased;
            _ = tokio::time::sleep(ABORT_POLL_INTERVAL) => {
                if abort.is_aborted() {
                    set.abort_all();
                }
            }
            joined = set.join_next_with_id() => {
                match joined {
                    Some(Ok((task_id, msg))) => {
                        if let Some(&idx) = id_to_idx.get(&task_id) {
                            results[idx] = Some(msg);
                        }
                    }
                    Some(Err(join_err)) => {
                        if let Some(&idx) = id_to_idx.get(&join_err.id()) {
                            let call = &calls[idx];
                            let reason = if join_err.is_cancelled() {
                                ABORTED_TEXT.to_string()
                            } else {
                                format!("tool task crashed: {join_err}")
                            };
                            results[idx] = Some(ToolResultMessage::text(call.id.clone(), call.name.clone(), reason, true));
                        }
                    }
                    None => break,
                }
            }
        }
    }

    let mut finals = Vec::with_capacity(n);
    for (idx, call) in calls.iter().enumerate() {
        let msg = results[idx]
            .take()
            .unwrap_or_else(|| ToolResultMessage::text(call.id.clone(), call.name.clone(), ABORTED_TEXT, true));

        let _ = events.push(AgentEvent::ToolExecutionEnd {
            id: msg.tool_call_id.clone(),
            name: msg.tool_name.clone(),
            result: msg.clone(),
            is_error: msg.is_error,
        });
        let message = Message::ToolResult(msg.clone());
        let _ = events.push(AgentEvent::MessageStart { message: message.clone() });
        let _ = events.push(AgentEvent::MessageEnd { message });

        finals.push(msg);
    }
    finals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_stream::EventStreamConfig;
    use agenticlaw_tools::tools::echo::EchoTool;

    fn registry() -> Arc<ToolRegistry> {
        let mut r = ToolRegistry::new();
        r.register(EchoTool::new());
        Arc::new(r)
    }

    #[tokio::test]
    async fn runs_multiple_calls_and_preserves_order() {
        let (events, _guard) = EventStream::new(EventStreamConfig::default());
        let calls = vec![
            ToolCallRequest { id: "1".into(), name: "echo".into(), args: serde_json::json!({"message": "a"}) },
            ToolCallRequest { id: "2".into(), name: "echo".into(), args: serde_json::json!({"message": "b"}) },
        ];
        let results = execute_tool_calls(calls, registry(), AbortToken::new(), events, None).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_text(), "a");
        assert_eq!(results[1].as_text(), "b");
    }

    #[tokio::test]
    async fn unknown_tool_reports_not_found() {
        let (events, _guard) = EventStream::new(EventStreamConfig::default());
        let calls = vec![ToolCallRequest { id: "1".into(), name: "nope".into(), args: serde_json::json!({}) }];
        let results = execute_tool_calls(calls, registry(), AbortToken::new(), events, None).await;
        assert!(results[0].is_error);
        assert!(results[0].as_text().contains("not found"));
    }

    #[tokio::test]
    async fn abort_mid_flight_is_reported_per_call() {
        let mut r = ToolRegistry::new();
        r.register(EchoTool::with_delay(Duration::from_millis(500)));
        let (events, _guard) = EventStream::new(EventStreamConfig::default());
        let abort = AbortToken::new();
        let abort_handle = abort.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            abort_handle.abort();
        });
        let calls = vec![ToolCallRequest { id: "1".into(), name: "echo".into(), args: serde_json::json!({"message": "hi"}) }];
        let results = execute_tool_calls(calls, Arc::new(r), abort, events, None).await;
        assert_eq!(results[0].as_text(), ABORTED_TEXT);
    }
}
