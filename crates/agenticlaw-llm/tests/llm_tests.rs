//! Tests for agenticlaw-llm: wire types and the provider trait contract.
//!
//! No network calls — provider adapters are exercised against literal SSE
//! fixtures in `anthropic.rs`'s own `#[cfg(test)]` module. Here we only
//! cover the provider-agnostic surface: request/content serde and a fake
//! in-memory [`LlmProvider`] standing in for a real backend.

use agenticlaw_core::AbortToken;
use agenticlaw_llm::*;

// ===========================================================================
// LlmRequest
// ===========================================================================

#[test]
fn llm_request_default() {
    let req = LlmRequest::default();
    assert!(req.model.contains("claude"));
    assert!(req.messages.is_empty());
    assert!(req.tools.is_none());
    assert_eq!(req.max_tokens, Some(8192));
    assert!(req.temperature.is_none());
    assert!(req.system.is_none());
    assert!(req.thinking_budget.is_none());
}

// ===========================================================================
// LlmContent
// ===========================================================================

#[test]
fn llm_content_from_string() {
    let c: LlmContent = "hello".into();
    match c {
        LlmContent::Text(s) => assert_eq!(s, "hello"),
        _ => panic!("Expected Text"),
    }
}

#[test]
fn llm_content_blocks_serde() {
    let c = LlmContent::Blocks(vec![ContentBlock::Text { text: "hi".into() }]);
    let json = serde_json::to_string(&c).unwrap();
    assert!(json.contains(r#""type":"text""#));
    let back: LlmContent = serde_json::from_str(&json).unwrap();
    match back {
        LlmContent::Blocks(blocks) => {
            assert_eq!(blocks.len(), 1);
        }
        _ => panic!("Expected Blocks"),
    }
}

// ===========================================================================
// ContentBlock
// ===========================================================================

#[test]
fn content_block_tool_use_serde() {
    let b = ContentBlock::ToolUse {
        id: "tc-1".into(),
        name: "read".into(),
        input: serde_json::json!({"path": "/tmp/foo"}),
    };
    let json = serde_json::to_string(&b).unwrap();
    assert!(json.contains(r#""type":"tool_use""#));
    let back: ContentBlock = serde_json::from_str(&json).unwrap();
    match back {
        ContentBlock::ToolUse { id, name, input } => {
            assert_eq!(id, "tc-1");
            assert_eq!(name, "read");
            assert_eq!(input["path"], "/tmp/foo");
        }
        _ => panic!("Expected ToolUse"),
    }
}

#[test]
fn content_block_tool_result_no_error_skipped() {
    let b = ContentBlock::ToolResult {
        tool_use_id: "tc-1".into(),
        content: "ok".into(),
        is_error: None,
    };
    let json = serde_json::to_string(&b).unwrap();
    assert!(!json.contains("is_error"));
}

// ===========================================================================
// LlmTool / LlmMessage
// ===========================================================================

#[test]
fn llm_tool_serde() {
    let tool = LlmTool {
        name: "read".into(),
        description: "Read a file".into(),
        input_schema: serde_json::json!({"type": "object", "properties": {"path": {"type": "string"}}}),
    };
    let json = serde_json::to_string(&tool).unwrap();
    let back: LlmTool = serde_json::from_str(&json).unwrap();
    assert_eq!(back.name, "read");
}

#[test]
fn llm_message_serde() {
    let msg = LlmMessage {
        role: "user".into(),
        content: LlmContent::Text("hello".into()),
    };
    let json = serde_json::to_string(&msg).unwrap();
    let back: LlmMessage = serde_json::from_str(&json).unwrap();
    assert_eq!(back.role, "user");
}

// ===========================================================================
// AccumulatedToolCall
// ===========================================================================

#[test]
fn accumulated_tool_call_parse_valid() {
    let tc = AccumulatedToolCall {
        id: "tc-1".into(),
        name: "read".into(),
        arguments: r#"{"path":"/tmp/foo"}"#.into(),
    };
    let parsed = tc.parse_arguments();
    assert_eq!(parsed["path"], "/tmp/foo");
}

#[test]
fn accumulated_tool_call_default() {
    let tc = AccumulatedToolCall::default();
    assert!(tc.id.is_empty());
    assert!(tc.name.is_empty());
    assert!(tc.arguments.is_empty());
}

// ===========================================================================
// A fake provider, in-memory only, for exercising the LlmProvider contract
// the way the agent loop will.
// ===========================================================================

struct FakeProvider;

#[async_trait::async_trait]
impl LlmProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    fn models(&self) -> &[&str] {
        &["fake-model"]
    }

    async fn complete_stream(
        &self,
        _request: LlmRequest,
        abort: Option<AbortToken>,
    ) -> LlmResult<LlmStream> {
        if abort.as_ref().is_some_and(|a| a.is_aborted()) {
            return Err(LlmError::Cancelled);
        }
        let events = vec![
            Ok(StreamEvent::Start),
            Ok(StreamEvent::TextStart { index: 0 }),
            Ok(StreamEvent::TextDelta { index: 0, text: "pong".into() }),
            Ok(StreamEvent::TextEnd { index: 0 }),
            Ok(StreamEvent::Done {
                stop_reason: "end_turn".into(),
                usage: agenticlaw_core::Usage::default(),
            }),
        ];
        Ok(Box::pin(futures::stream::iter(events)))
    }
}

#[tokio::test]
async fn fake_provider_streams_to_completion() {
    use futures::StreamExt;

    let provider = FakeProvider;
    assert!(provider.supports_model("fake-model"));
    assert!(!provider.supports_model("claude-opus-4-6"));

    let stream = provider
        .complete_stream(LlmRequest::default(), None)
        .await
        .expect("fake provider never errors unprompted");
    tokio::pin!(stream);

    let mut text = String::new();
    let mut got_done = false;
    while let Some(ev) = stream.next().await {
        match ev.expect("fake stream never yields Err") {
            StreamEvent::TextDelta { text: t, .. } => text.push_str(&t),
            StreamEvent::Done { .. } => got_done = true,
            _ => {}
        }
    }
    assert_eq!(text, "pong");
    assert!(got_done);
}

#[tokio::test]
async fn fake_provider_refuses_already_aborted_token() {
    let provider = FakeProvider;
    let abort = AbortToken::new();
    abort.abort();
    let result = provider.complete_stream(LlmRequest::default(), Some(abort)).await;
    assert!(matches!(result, Err(LlmError::Cancelled)));
}
