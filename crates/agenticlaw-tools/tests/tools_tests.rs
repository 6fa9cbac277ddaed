//! Tests for agenticlaw-tools: ToolResult, ToolRegistry, and the builtin tools
//! against the real filesystem/process boundary they wrap.

use agenticlaw_core::AbortToken;
use agenticlaw_tools::*;
use serde_json::json;
use std::path::PathBuf;

fn test_workspace() -> PathBuf {
    let id = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("agenticlaw-tools-test-{}-{}", std::process::id(), id));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn cleanup(dir: &std::path::Path) {
    let _ = std::fs::remove_dir_all(dir);
}

async fn run(reg: &ToolRegistry, name: &str, args: serde_json::Value) -> ToolResult {
    reg.execute(name, "call-1", args, AbortToken::new(), no_op_progress()).await
}

// ===========================================================================
// ToolResult
// ===========================================================================

#[test]
fn tool_result_text() {
    let r = ToolResult::text("hello");
    assert!(!r.is_error());
    assert_eq!(r.to_content_string(), "hello");
}

#[test]
fn tool_result_error() {
    let r = ToolResult::error("boom");
    assert!(r.is_error());
    assert_eq!(r.to_content_string(), "boom");
}

#[test]
fn tool_result_json() {
    let r = ToolResult::Json(json!({"key": "value"}));
    assert!(!r.is_error());
    let s = r.to_content_string();
    assert!(s.contains("key"));
    assert!(s.contains("value"));
}

// ===========================================================================
// ToolRegistry
// ===========================================================================

#[tokio::test]
async fn registry_default_is_empty() {
    let reg = ToolRegistry::new();
    assert!(reg.list().is_empty());
    assert!(reg.get_definitions().is_empty());
}

#[tokio::test]
async fn registry_execute_missing_tool() {
    let reg = ToolRegistry::new();
    let result = run(&reg, "nonexistent", json!({})).await;
    assert!(result.is_error());
    assert!(result.to_content_string().contains("not found"));
}

#[tokio::test]
async fn create_default_registry_has_all_tools() {
    let ws = test_workspace();
    let reg = create_default_registry(&ws);
    let names = reg.list();
    assert!(names.contains(&"read"));
    assert!(names.contains(&"bash"));
    assert!(names.contains(&"echo"));
    assert_eq!(names.len(), 3);
    assert_eq!(reg.get_definitions().len(), 3);
    cleanup(&ws);
}

#[tokio::test]
async fn registry_get_tool() {
    let ws = test_workspace();
    let reg = create_default_registry(&ws);
    assert!(reg.get("read").is_some());
    assert!(reg.get("nonexistent").is_none());
    cleanup(&ws);
}

#[tokio::test]
async fn registry_tool_has_schema() {
    let ws = test_workspace();
    let reg = create_default_registry(&ws);
    let defs = reg.get_definitions();
    for def in &defs {
        assert!(!def.name.is_empty());
        assert!(!def.description.is_empty());
        assert!(def.input_schema.is_object());
    }
    cleanup(&ws);
}

#[test]
fn policy_registry_only_registers_allowed_tools() {
    let ws = test_workspace();
    let reg = create_policy_registry(&ws, &["read", "echo"]);
    assert_eq!(reg.list().len(), 2);
    assert!(reg.get("read").is_some());
    assert!(reg.get("echo").is_some());
    assert!(reg.get("bash").is_none());
    cleanup(&ws);
}

// ===========================================================================
// ReadTool — real filesystem
// ===========================================================================

#[tokio::test]
async fn read_tool_reads_file() {
    let ws = test_workspace();
    std::fs::write(ws.join("readable.txt"), "line1\nline2\nline3").unwrap();
    let reg = create_default_registry(&ws);
    let result = run(&reg, "read", json!({"file_path": "readable.txt"})).await;
    assert!(!result.is_error());
    let content = result.to_content_string();
    assert!(content.contains("line1"));
    assert!(content.contains("line3"));
    cleanup(&ws);
}

#[tokio::test]
async fn read_tool_with_offset_and_limit() {
    let ws = test_workspace();
    let lines: Vec<String> = (1..=100).map(|i| format!("line {}", i)).collect();
    std::fs::write(ws.join("big.txt"), lines.join("\n")).unwrap();
    let reg = create_default_registry(&ws);

    let result = run(&reg, "read", json!({"file_path": "big.txt", "offset": 10, "limit": 5})).await;
    assert!(!result.is_error());
    let content = result.to_content_string();
    assert!(content.contains("line 10"));
    assert!(content.contains("line 14"));
    assert!(!content.contains("line 9"));
    assert!(!content.contains("line 15"));
    cleanup(&ws);
}

#[tokio::test]
async fn read_tool_missing_file() {
    let ws = test_workspace();
    let reg = create_default_registry(&ws);
    let result = run(&reg, "read", json!({"file_path": "nonexistent.txt"})).await;
    assert!(result.is_error());
    cleanup(&ws);
}

#[tokio::test]
async fn read_tool_missing_path_param() {
    let ws = test_workspace();
    let reg = create_default_registry(&ws);
    let result = run(&reg, "read", json!({})).await;
    assert!(result.is_error());
    cleanup(&ws);
}

// ===========================================================================
// BashTool — real commands
// ===========================================================================

#[tokio::test]
async fn bash_tool_runs_command() {
    let ws = test_workspace();
    let reg = create_default_registry(&ws);
    let result = run(&reg, "bash", json!({"command": "echo hello"})).await;
    assert!(!result.is_error());
    assert_eq!(result.to_content_string(), "hello");
    cleanup(&ws);
}

#[tokio::test]
async fn bash_tool_captures_exit_code() {
    let ws = test_workspace();
    let reg = create_default_registry(&ws);
    let result = run(&reg, "bash", json!({"command": "exit 42"})).await;
    let content = result.to_content_string();
    assert!(content.contains("42"), "should contain exit code 42: {}", content);
    cleanup(&ws);
}

#[tokio::test]
async fn bash_tool_captures_stderr() {
    let ws = test_workspace();
    let reg = create_default_registry(&ws);
    let result = run(&reg, "bash", json!({"command": "echo err >&2"})).await;
    assert!(result.to_content_string().contains("err"));
    cleanup(&ws);
}

#[tokio::test]
async fn bash_tool_runs_in_workspace() {
    let ws = test_workspace();
    let reg = create_default_registry(&ws);
    let result = run(&reg, "bash", json!({"command": "pwd"})).await;
    assert!(result.to_content_string().contains(&ws.to_string_lossy().to_string()));
    cleanup(&ws);
}

#[tokio::test]
async fn bash_tool_missing_command() {
    let ws = test_workspace();
    let reg = create_default_registry(&ws);
    let result = run(&reg, "bash", json!({})).await;
    assert!(result.is_error());
    cleanup(&ws);
}

#[tokio::test]
async fn bash_tool_empty_output() {
    let ws = test_workspace();
    let reg = create_default_registry(&ws);
    let result = run(&reg, "bash", json!({"command": "true"})).await;
    assert!(!result.is_error());
    assert_eq!(result.to_content_string(), "(no output)");
    cleanup(&ws);
}

#[tokio::test]
async fn bash_tool_aborts_on_tripped_token() {
    let ws = test_workspace();
    let reg = create_default_registry(&ws);
    let abort = AbortToken::new();
    abort.abort();
    let result = reg
        .execute("bash", "call-1", json!({"command": "sleep 30"}), abort, no_op_progress())
        .await;
    assert_eq!(result.to_content_string(), "Tool execution aborted");
    cleanup(&ws);
}

// ===========================================================================
// EchoTool
// ===========================================================================

#[tokio::test]
async fn echo_tool_roundtrips_message() {
    let ws = test_workspace();
    let reg = create_default_registry(&ws);
    let result = run(&reg, "echo", json!({"message": "hi there"})).await;
    assert_eq!(result.to_content_string(), "hi there");
    cleanup(&ws);
}

#[tokio::test]
async fn many_echo_calls_run_concurrently() {
    let ws = test_workspace();
    let reg = std::sync::Arc::new(create_default_registry(&ws));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let reg = reg.clone();
            tokio::spawn(async move {
                reg.execute(
                    "echo",
                    &format!("call-{}", i),
                    json!({"message": format!("msg-{}", i)}),
                    AbortToken::new(),
                    no_op_progress(),
                )
                .await
            })
        })
        .collect();

    for (i, h) in handles.into_iter().enumerate() {
        let result = h.await.unwrap();
        assert_eq!(result.to_content_string(), format!("msg-{}", i));
    }
    cleanup(&ws);
}
