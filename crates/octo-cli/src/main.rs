//! Octo CLI — entry point.
//!
//! # Commands
//!
//! - `octo [chat] [-m MODEL] [--base-url URL] [--root DIR] [--yes] [--logs]`
//!   runs pre-flight checks, then the interactive REPL
//! - `octo status` — show configuration and backend status

mod helpers;
mod repl;
mod status;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use octo_agent::{AgentLoop, Sandbox};
use octo_core::config::{load_config, Config};
use octo_providers::{preflight, OllamaClient};

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// 🐙 Octo — a terminal coding agent backed by a local Ollama model
#[derive(Parser)]
#[command(name = "octo", version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    session: SessionArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Options shared by every command.
#[derive(Args, Clone, Debug, Default)]
struct SessionArgs {
    /// Model to chat with
    #[arg(short, long, env = "OCTO_MODEL", global = true)]
    model: Option<String>,

    /// Ollama server URL
    #[arg(long, env = "OLLAMA_URL", global = true)]
    base_url: Option<String>,

    /// Project root the tools are confined to (defaults to the current directory)
    #[arg(long, global = true)]
    root: Option<String>,

    /// Run file writes and shell commands without asking
    #[arg(short = 'y', long, default_value_t = false, global = true)]
    yes: bool,

    /// Enable debug logging
    #[arg(long, default_value_t = false, global = true)]
    logs: bool,
}

#[derive(Subcommand, Clone, Copy, Debug, PartialEq, Eq)]
enum Commands {
    /// Start an interactive chat session (default)
    Chat,

    /// Show configuration and backend status
    Status,
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.session.logs);

    let config = resolve_config(load_config(None), &cli.session);
    let root = resolve_root(&cli.session)?;

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => run_chat(config, root).await,
        Commands::Status => {
            status::run(&config, &root).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ─────────────────────────────────────────────
// Chat command
// ─────────────────────────────────────────────

async fn run_chat(config: Config, root: PathBuf) -> Result<ExitCode> {
    let sandbox = Sandbox::new(&root)
        .with_context(|| format!("invalid project root: {}", root.display()))?;
    let client = OllamaClient::from_config(&config.backend).context("failed to build HTTP client")?;

    if let Err(e) = preflight(&client).await {
        helpers::print_error(&format!("Pre-flight check failed: {e}"));
        return Ok(ExitCode::FAILURE);
    }

    info!(model = %config.backend.model, root = %sandbox.root().display(), "starting session");
    let agent = AgentLoop::new(Arc::new(client), sandbox, &config);
    repl::run(agent).await?;

    Ok(ExitCode::SUCCESS)
}

/// Layer command-line flags over the loaded configuration.
fn resolve_config(mut config: Config, args: &SessionArgs) -> Config {
    if let Some(model) = args.model.as_deref().filter(|m| !m.is_empty()) {
        config.backend.model = model.to_string();
    }
    if let Some(url) = args.base_url.as_deref().filter(|u| !u.is_empty()) {
        config.backend.base_url = url.to_string();
    }
    if args.yes {
        config.agent.auto_approve = true;
    }
    config
}

/// The sandbox root: `--root` with `~` expanded, else the current directory.
fn resolve_root(args: &SessionArgs) -> Result<PathBuf> {
    match args.root.as_deref() {
        Some(root) => Ok(helpers::expand_tilde(root)),
        None => std::env::current_dir().context("failed to read current directory"),
    }
}

/// Initialize tracing/logging. Logs go to stderr so they never mix with
/// streamed model output.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("octo=debug,octo_agent=debug,octo_providers=debug,octo_core=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
