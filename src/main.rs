// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use arbiter_config::Config;
use arbiter_core::{AgenticLoop, TaskTool, TurnRequest};
use arbiter_events::{EventBus, EventPayload, RunId};
use arbiter_hooks::{ApprovalHook, AuditHook, HookChain, RateLimitHook, SandboxHook};
use arbiter_metrics::RunMetrics;
use arbiter_model::{EchoModelProvider, ModelProvider};
use arbiter_session::SessionStore;
use arbiter_tools::{
    EditFileTool, GlobTool, GrepTool, ListDirTool, MultiEditTool, ReadFileTool, ShellTool,
    ToolRegistry, WebFetchTool, WebSearchTool, WriteTool,
};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Some(Commands::Completions { shell }) => {
            cli::print_completions(*shell);
            return Ok(());
        }
        Some(Commands::ShowConfig) => {
            let config = arbiter_config::load(cli.config.as_deref())?;
            println!("{}", serde_yaml::to_string(&config).unwrap_or_default());
            return Ok(());
        }
        _ => {}
    }

    let config = arbiter_config::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Some(Commands::Run { message, max_tokens }) => run_turn(config, message, max_tokens).await,
        Some(Commands::ShowConfig) | Some(Commands::Completions { .. }) => unreachable!(),
        None => {
            println!("arbiterd: no subcommand given. Try `arbiterd run \"<message>\"` or `arbiterd --help`.");
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose { EnvFilter::new("debug") } else { EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")) };
    tracing_subscriber::registry().with(fmt::layer().with_writer(std::io::stderr)).with(filter).init();
}

fn build_tool_registry(
    model: Arc<dyn ModelProvider>,
    agent_config: Arc<arbiter_config::AgentConfig>,
    tools_config: &arbiter_config::ToolsConfig,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(GrepTool);
    registry.register(ListDirTool);
    registry.register(ReadFileTool);
    registry.register(WriteTool);
    registry.register(EditFileTool);
    registry.register(MultiEditTool);
    registry.register(GlobTool);
    registry.register(WebFetchTool);
    registry.register(WebSearchTool::default());
    registry.register(ShellTool {
        timeout_secs: tools_config.timeout_secs,
        deny_substrings: tools_config.shell.deny_substrings.clone(),
        allow_substrings: tools_config.shell.allow_substrings.clone(),
    });
    registry.register(TaskTool::new(model, agent_config, Arc::new(AtomicUsize::new(0))));
    registry
}

fn build_hook_chain(config: &Config, bus: Arc<EventBus>) -> HookChain {
    let mut chain = HookChain::new();
    chain.register(Arc::new(AuditHook));
    chain.register(Arc::new(RateLimitHook::new(60, 4)));
    chain.register(Arc::new(SandboxHook::new(arbiter_hooks::SandboxConfig {
        allowed_roots: vec![],
        deny_globs: config.tools.deny_patterns.clone(),
    })));
    let approval_manager = Arc::new(arbiter_approval::ApprovalManager::new());
    chain.register(Arc::new(
        ApprovalHook::new(approval_manager)
            .with_timeout(std::time::Duration::from_secs(config.approval.default_timeout_secs))
            .with_event_bus(bus),
    ));
    chain
}

fn build_model_provider(config: &Config) -> Arc<dyn ModelProvider> {
    // Vendor backends (OpenAI, Anthropic, ...) are not yet wired into a
    // constructible provider registry; fall back to the deterministic echo
    // provider for any configured name until that lands.
    if config.model.provider != "echo" {
        tracing::warn!(provider = %config.model.provider, "unknown model provider, falling back to echo");
    }
    Arc::new(EchoModelProvider)
}

async fn run_turn(config: Config, message: String, max_tokens: Option<usize>) -> anyhow::Result<()> {
    let model = build_model_provider(&config);
    let agent_config = Arc::new(config.agent.clone());
    let registry = Arc::new(build_tool_registry(model.clone(), agent_config.clone(), &config.tools));
    let store = Arc::new(SessionStore::in_memory());
    let metrics = Arc::new(RunMetrics::new());

    let session_tokens = max_tokens.unwrap_or(config.model.max_tokens.unwrap_or(4096) as usize * 20);
    let session_id = store.create(session_tokens).await?;

    let bus = EventBus::new(RunId::new(), Some(session_id));
    let hooks = Arc::new(build_hook_chain(&config, bus.clone()));
    let agent_loop = AgenticLoop::new(model, registry, hooks, store.clone(), metrics, agent_config);

    let mut subscriber = bus.subscribe().await;
    let printer = tokio::spawn(async move {
        while let Some(event) = subscriber.recv().await {
            print_event(&event);
            if event.is_terminal() {
                break;
            }
        }
    });

    let (_handle, token) = arbiter_core::new_pair();
    agent_loop.run(TurnRequest { session_id, user_text: message, deadline: None }, bus, token).await?;
    printer.await.ok();
    Ok(())
}

fn print_event(event: &arbiter_events::Event) {
    use std::io::Write;
    match &event.payload {
        EventPayload::TextMessageContent { delta, .. } => {
            print!("{delta}");
            let _ = std::io::stdout().flush();
        }
        EventPayload::ToolCallStart { tool_name, .. } => {
            eprintln!("\n[tool] {tool_name} ->");
        }
        EventPayload::ToolCallEnd { outcome, .. } => {
            eprintln!("[tool] {outcome:?}");
        }
        EventPayload::RunError { kind, message, .. } => {
            eprintln!("\n[error] {kind:?}: {message}");
        }
        EventPayload::RunFinished => {
            println!();
        }
        _ => {}
    }
}
