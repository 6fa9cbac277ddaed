//! A minimal CLI that wires a single [`AgentSession`] to the real Anthropic
//! provider and streams one prompt to stdout, the same way the teacher's own
//! binaries parse their flags with `clap` and read credentials from the
//! environment rather than a flag.
//!
//! ```text
//! ANTHROPIC_API_KEY=... cargo run -p agenticlaw-agent --example chat -- \
//!     --model claude-sonnet-4-6 --system "be brief" "what's 2+2?"
//! ```

use std::sync::Arc;

use agenticlaw_agent::{AgentEvent, AgentSession, MessageDelta, SessionConfig};
use agenticlaw_core::ModelId;
use agenticlaw_llm::AnthropicProvider;
use agenticlaw_tools::create_default_registry;
use clap::Parser;

#[derive(Parser)]
#[command(name = "chat", about = "Send one prompt through an AgentSession and print the response")]
struct Cli {
    /// The prompt to send.
    prompt: String,

    /// Model id to request.
    #[arg(short, long, default_value = "claude-sonnet-4-6")]
    model: String,

    /// System prompt.
    #[arg(short, long)]
    system: Option<String>,

    /// Workspace directory the illustrative tools (read/bash) are scoped to.
    #[arg(short, long, default_value = ".")]
    workspace: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "agenticlaw_agent=info".into()))
        .init();

    let cli = Cli::parse();
    let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| anyhow::anyhow!("ANTHROPIC_API_KEY not set"))?;

    let provider = Arc::new(AnthropicProvider::new(api_key));
    let tools = Arc::new(create_default_registry(&cli.workspace));
    let model = ModelId::new("anthropic", cli.model);

    let mut config = SessionConfig::new(provider, tools, model);
    config.system_prompt = cli.system;

    let session = AgentSession::start("chat-example", config);
    let (_subscription, mut events) = session.subscribe().await;

    session.prompt(cli.prompt).await.map_err(|e| anyhow::anyhow!(e.to_string()))?;

    while let Some(event) = events.recv().await {
        match event {
            AgentEvent::MessageUpdate { delta: MessageDelta::Text(text), .. } => {
                print!("{text}");
                use std::io::Write;
                std::io::stdout().flush().ok();
            }
            AgentEvent::ToolExecutionStart { name, .. } => {
                eprintln!("\n[tool call: {name}]");
            }
            AgentEvent::Error { reason, .. } => {
                eprintln!("\n[error: {reason}]");
            }
            AgentEvent::Canceled { reason } => {
                eprintln!("\n[canceled: {reason}]");
            }
            AgentEvent::AgentEnd { .. } => {
                println!();
                break;
            }
            _ => {}
        }
    }

    Ok(())
}
