//! Agenticlaw Tools — modular tool implementations.
//!
//! Each tool is a self-contained file in src/tools/.
//! To add a tool: create the file, implement Tool trait, register below.
//! To remove a tool: delete the file, remove from mod.rs and registry below.

pub mod registry;
pub mod tools;

pub use registry::{no_op_progress, ProgressCallback, Tool, ToolRegistry, ToolResult};

use std::path::Path;

/// Create the default tool registry with all builtin tools.
///
/// Edit this function to add or remove tools from the agent.
pub fn create_default_registry(workspace_root: impl AsRef<Path>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    let root = workspace_root.as_ref();

    registry.register(tools::read::ReadTool::new(root));
    registry.register(tools::bash::BashTool::new(root));
    registry.register(tools::echo::EchoTool::new());

    registry
}

/// Create a policy-scoped tool registry.
///
/// Only registers tools whose names appear in `allowed_tools`. If a tool
/// isn't registered, the model never sees it and can't call it.
pub fn create_policy_registry(workspace_root: impl AsRef<Path>, allowed_tools: &[&str]) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    let root = workspace_root.as_ref();

    for name in allowed_tools {
        match *name {
            "read" => registry.register(tools::read::ReadTool::new(root)),
            "bash" => registry.register(tools::bash::BashTool::new(root)),
            "echo" => registry.register(tools::echo::EchoTool::new()),
            _ => tracing::warn!(tool = name, "unknown tool in policy"),
        }
    }

    registry
}
