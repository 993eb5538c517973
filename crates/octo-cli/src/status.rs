//! `octo status` — show configuration and backend status.
//!
//! Always exits successfully; an unhealthy backend is reported, not fatal.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use octo_core::config::{get_config_path, Config};
use octo_providers::traits::ChatBackend;
use octo_providers::OllamaClient;

/// Run the status command.
pub async fn run(config: &Config, root: &Path) -> Result<()> {
    let config_path = get_config_path();

    println!();
    println!("{}", "🐙 Octo Status".blue().bold());
    println!();

    // Config
    println!(
        "  {:<18} {} {}",
        "Config:".bold(),
        config_path.display(),
        mark(config_path.exists(), "(not found, using defaults)")
    );

    // Project root
    println!(
        "  {:<18} {} {}",
        "Project root:".bold(),
        root.display(),
        mark(root.is_dir(), "(not a directory)")
    );

    // Agent settings
    let rounds = match config.agent.max_tool_rounds {
        0 => "unlimited".to_string(),
        n => n.to_string(),
    };
    println!(
        "  {:<18} {}",
        "Agent:".bold(),
        format!(
            "parse order: {:?} | tool rounds: {rounds} | auto-approve: {}",
            config.agent.parse_order, config.agent.auto_approve
        )
        .dimmed()
    );
    println!(
        "  {:<18} {}",
        "Shell:".bold(),
        format!(
            "timeout: {}s | output cap: {} chars",
            config.tools.shell_timeout_secs, config.tools.max_output_chars
        )
        .dimmed()
    );

    // Backend
    println!();
    println!("  {}", "Backend:".bold());
    let client = OllamaClient::from_config(&config.backend).context("failed to build HTTP client")?;

    let reachable = client.check_availability().await;
    println!(
        "    {:<16} {} {}",
        "Ollama:",
        client.endpoint(),
        mark(reachable, "(unreachable)")
    );

    let model_present = reachable && client.is_model_present().await;
    println!(
        "    {:<16} {} {}",
        "Model:",
        client.model(),
        if reachable {
            mark(model_present, "(not installed)")
        } else {
            "(unknown)".dimmed().to_string()
        }
    );

    if reachable {
        if let Ok(models) = client.list_models().await {
            if !models.is_empty() {
                println!("    {:<16} {}", "Installed:", models.join(", ").dimmed());
            }
        }
    }

    println!();

    Ok(())
}

fn mark(ok: bool, failure: &str) -> String {
    if ok {
        "✓".green().to_string()
    } else {
        failure.red().to_string()
    }
}
