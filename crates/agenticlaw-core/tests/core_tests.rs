//! Tests for agenticlaw-core: the shared data model, error type, and abort signal.

use agenticlaw_core::*;

// ===========================================================================
// SessionKey
// ===========================================================================

#[test]
fn session_key_new_and_display() {
    let key = SessionKey::new("abc-123");
    assert_eq!(key.as_str(), "abc-123");
    assert_eq!(format!("{}", key), "abc-123");
}

#[test]
fn session_key_clone_is_cheap() {
    let key = SessionKey::new("test");
    let cloned = key.clone();
    assert_eq!(key, cloned);
    assert_eq!(key.as_str(), cloned.as_str());
}

#[test]
fn session_key_from_string() {
    let key: SessionKey = "hello".into();
    assert_eq!(key.as_str(), "hello");
    let key2: SessionKey = String::from("world").into();
    assert_eq!(key2.as_str(), "world");
}

#[test]
fn session_key_equality_and_hash() {
    use std::collections::HashSet;
    let a = SessionKey::new("same");
    let b = SessionKey::new("same");
    let c = SessionKey::new("different");
    assert_eq!(a, b);
    assert_ne!(a, c);
    let mut set = HashSet::new();
    set.insert(a.clone());
    assert!(set.contains(&b));
    assert!(!set.contains(&c));
}

// ===========================================================================
// ReasoningLevel / ModelId / StopReason
// ===========================================================================

#[test]
fn reasoning_level_default_is_off() {
    assert_eq!(ReasoningLevel::default(), ReasoningLevel::Off);
}

#[test]
fn reasoning_level_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&ReasoningLevel::XHigh).unwrap(), r#""xhigh""#);
    assert_eq!(serde_json::to_string(&ReasoningLevel::Low).unwrap(), r#""low""#);
}

#[test]
fn model_id_roundtrip() {
    let m = ModelId::new("anthropic", "claude-opus-4-6");
    let json = serde_json::to_string(&m).unwrap();
    let back: ModelId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, m);
}

#[test]
fn stop_reason_serializes_snake_case() {
    assert_eq!(serde_json::to_string(&StopReason::ToolUse).unwrap(), r#""tool_use""#);
    assert_eq!(serde_json::to_string(&StopReason::Aborted).unwrap(), r#""aborted""#);
}

// ===========================================================================
// Usage
// ===========================================================================

#[test]
fn usage_add_accumulates_every_field() {
    let mut total = Usage {
        input_tokens: 10,
        output_tokens: 5,
        cache_read_tokens: 1,
        cache_write_tokens: 2,
        cost_usd: 0.01,
    };
    total.add(&Usage {
        input_tokens: 3,
        output_tokens: 4,
        cache_read_tokens: 0,
        cache_write_tokens: 1,
        cost_usd: 0.02,
    });
    assert_eq!(total.input_tokens, 13);
    assert_eq!(total.output_tokens, 9);
    assert_eq!(total.cache_read_tokens, 1);
    assert_eq!(total.cache_write_tokens, 3);
    assert!((total.cost_usd - 0.03).abs() < 1e-9);
}

// ===========================================================================
// ContentBlock
// ===========================================================================

#[test]
fn content_block_text_roundtrip() {
    let b = ContentBlock::text("hi");
    let json = serde_json::to_string(&b).unwrap();
    assert!(json.contains(r#""type":"text""#));
    let back: ContentBlock = serde_json::from_str(&json).unwrap();
    assert_eq!(back, b);
}

#[test]
fn content_block_tool_call_accessor() {
    let b = ContentBlock::ToolCall {
        id: "tc-1".into(),
        name: "read".into(),
        arguments: serde_json::json!({"path": "/tmp/foo"}),
    };
    let (id, name, args) = b.as_tool_call().expect("should be a tool call");
    assert_eq!(id, "tc-1");
    assert_eq!(name, "read");
    assert_eq!(args["path"], "/tmp/foo");
}

#[test]
fn content_block_text_is_not_a_tool_call() {
    assert!(ContentBlock::text("hi").as_tool_call().is_none());
}

// ===========================================================================
// UserMessage / AssistantMessage / ToolResultMessage
// ===========================================================================

#[test]
fn user_message_as_text_concatenates_text_blocks_only() {
    let msg = UserMessage {
        content: vec![
            ContentBlock::text("hello "),
            ContentBlock::ToolCall {
                id: "x".into(),
                name: "y".into(),
                arguments: serde_json::Value::Null,
            },
            ContentBlock::text("world"),
        ],
        created_at: now_ms(),
    };
    assert_eq!(msg.as_text(), "hello world");
}

#[test]
fn assistant_message_empty_has_no_tool_calls() {
    let msg = AssistantMessage::empty(ModelId::new("anthropic", "claude-opus-4-6"), StopReason::Stop);
    assert!(!msg.has_tool_calls());
    assert_eq!(msg.text(), "");
    assert_eq!(msg.tool_calls().count(), 0);
}

#[test]
fn assistant_message_detects_and_iterates_tool_calls() {
    let mut msg = AssistantMessage::empty(ModelId::new("anthropic", "claude-opus-4-6"), StopReason::ToolUse);
    msg.content.push(ContentBlock::text("let me check"));
    msg.content.push(ContentBlock::ToolCall {
        id: "tc-1".into(),
        name: "bash".into(),
        arguments: serde_json::json!({"command": "ls"}),
    });
    assert!(msg.has_tool_calls());
    assert_eq!(msg.text(), "let me check");
    let calls: Vec<_> = msg.tool_calls().collect();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, "bash");
}

#[test]
fn tool_result_message_text_ctor_and_as_text() {
    let r = ToolResultMessage::text("tc-1", "bash", "output here", false);
    assert_eq!(r.tool_call_id, "tc-1");
    assert_eq!(r.tool_name, "bash");
    assert!(!r.is_error);
    assert_eq!(r.as_text(), "output here");
}

// ===========================================================================
// Message
// ===========================================================================

#[test]
fn message_user_constructor_wraps_user_message() {
    let msg = Message::user("hello");
    assert!(!msg.is_assistant());
    assert!(msg.as_assistant().is_none());
    match msg {
        Message::User(u) => assert_eq!(u.as_text(), "hello"),
        _ => panic!("expected Message::User"),
    }
}

#[test]
fn message_is_assistant_and_as_assistant() {
    let msg = Message::Assistant(AssistantMessage::empty(
        ModelId::new("anthropic", "claude-opus-4-6"),
        StopReason::Stop,
    ));
    assert!(msg.is_assistant());
    assert!(msg.as_assistant().is_some());
}

#[test]
fn message_serde_tags_on_role() {
    let msg = Message::user("test message");
    let json = serde_json::to_string(&msg).unwrap();
    assert!(json.contains(r#""role":"user""#));
    let back: Message = serde_json::from_str(&json).unwrap();
    assert_eq!(back, msg);
}

#[test]
fn message_created_at_reads_through_variants() {
    let msg = Message::user("hi");
    assert!(msg.created_at() > 0);
}

// ===========================================================================
// Error
// ===========================================================================

#[test]
fn error_auth_failed() {
    let e = Error::auth_failed("bad creds");
    assert!(e.to_string().contains("bad creds"));
    assert!(matches!(e, Error::AuthFailed { .. }));
}

#[test]
fn error_llm_error() {
    let e = Error::llm_error("anthropic", "rate limited");
    assert!(e.to_string().contains("anthropic"));
    assert!(e.to_string().contains("rate limited"));
}

#[test]
fn error_tool_error() {
    let e = Error::tool_error("read", "file not found");
    assert!(e.to_string().contains("read"));
    assert!(e.to_string().contains("file not found"));
}

#[test]
fn error_from_io() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    let e: Error = io_err.into();
    assert!(matches!(e, Error::IoError(_)));
}

#[test]
fn error_from_json() {
    let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
    let e: Error = json_err.into();
    assert!(matches!(e, Error::JsonError(_)));
}

#[test]
fn error_display_all_variants() {
    let errors: Vec<Error> = vec![
        Error::AuthFailed { reason: "x".into() },
        Error::ConnectionClosed("x".into()),
        Error::InvalidMessage("x".into()),
        Error::SessionNotFound("x".into()),
        Error::LlmError { provider: "p".into(), message: "m".into() },
        Error::ToolError { name: "n".into(), message: "m".into() },
        Error::Internal("x".into()),
    ];
    for e in errors {
        let _ = format!("{}", e);
    }
}

// ===========================================================================
// AbortToken
// ===========================================================================

#[test]
fn abort_token_lookup_across_clones() {
    let token = AbortToken::new();
    let id = token.id();
    assert!(!AbortToken::is_aborted_by_id(id));
    token.abort();
    assert!(AbortToken::is_aborted_by_id(id));
    let resolved = AbortToken::lookup(id).expect("token still registered");
    assert!(resolved.is_aborted());
}

#[test]
fn abort_token_equality_is_by_id() {
    let a = AbortToken::new();
    let b = a.clone();
    let c = AbortToken::new();
    assert_eq!(a, b);
    assert_ne!(a, c);
}
