//! Headless CLI glue for the agentcore kernel. Per-spec this is explicitly
//! out of scope for the core (§1: "thin CLI glue... [is] not covered") —
//! this binary exists only so the crates in this workspace have a runnable
//! entry point, the way the teacher ships a thin `engine` binary alongside
//! its library crates.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use agentcore_journal::Journal;
use agentcore_observability::{init_process_logging, ProcessKind};
use agentcore_kernel::{Kernel, KernelConfig};
use agentcore_providers::{ChatMessage, LocalEchoProvider, MessageRole, OpenAiCompatibleProvider, Provider};
use agentcore_tools::ToolRegistry;
use agentcore_trace::TraceCollector;

#[derive(Parser, Debug)]
#[command(name = "agentcore")]
#[command(about = "Headless runner for the agentcore execution kernel")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single iteration of the kernel loop against one prompt.
    Run {
        prompt: String,
        #[arg(long)]
        state_dir: Option<String>,
        #[arg(long, env = "AGENTCORE_OPENAI_BASE_URL")]
        openai_base_url: Option<String>,
        #[arg(long, env = "AGENTCORE_OPENAI_API_KEY")]
        openai_api_key: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run { prompt, state_dir, openai_base_url, openai_api_key } => {
            let state_dir = resolve_state_dir(state_dir);
            tokio::fs::create_dir_all(&state_dir).await.context("creating state dir")?;
            let _log_guard = init_process_logging(ProcessKind::Demo, &state_dir.join("logs"), 14)?;

            let session_id = agentcore_kernel::new_session_id();
            info!(%session_id, state_dir = %state_dir.display(), "starting session");

            let journal = Arc::new(Journal::open(&state_dir.join("journal.sqlite")).await?);
            let trace = TraceCollector::open(state_dir.join(format!("{session_id}.jsonl")), session_id.clone()).await?;
            let tools = Arc::new(ToolRegistry::with_builtins());

            let mut providers: Vec<Arc<dyn Provider>> = Vec::new();
            if let Some(base_url) = openai_base_url {
                providers.push(Arc::new(OpenAiCompatibleProvider::new("openai-compatible", base_url, openai_api_key)));
            }
            providers.push(Arc::new(LocalEchoProvider::new("local-echo")));

            let mut kernel = Kernel::new(
                session_id,
                KernelConfig::default(),
                "You are a headless coding agent core.",
                providers,
                tools,
                journal,
                trace,
                state_dir.clone(),
            );

            let messages = vec![ChatMessage { role: MessageRole::User, content: prompt }];
            let outcome = kernel.run_iteration(&messages).await?;

            println!("{}", outcome.assistant_text);
            info!(
                iteration = outcome.iteration,
                tool_calls = outcome.tool_results.len(),
                can_continue = outcome.verdict.can_continue,
                "iteration settled"
            );
        }
    }

    Ok(())
}

fn resolve_state_dir(flag: Option<String>) -> PathBuf {
    if let Some(dir) = flag {
        return PathBuf::from(dir);
    }
    if let Ok(dir) = std::env::var("AGENTCORE_STATE_DIR") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    PathBuf::from(".agentcore")
}
