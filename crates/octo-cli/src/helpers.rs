//! Shared CLI helpers — path expansion and colored console output.

use std::io::Write;
use std::path::{Path, PathBuf};

use colored::Colorize;
use octo_agent::parser::{ToolCall, CONTENT_KEY};
use octo_core::utils::{one_line, truncate_string};

/// Expand `~` at the start of a path to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_next::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs_next::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

/// Print the banner shown at REPL start.
pub fn print_banner(model: &str, root: &Path) {
    let version = env!("CARGO_PKG_VERSION");
    println!();
    println!(
        "{}  v{}  {}",
        "🐙 octo".blue().bold(),
        version.dimmed(),
        format!("(model: {model})").dimmed()
    );
    println!("{}", format!("Project root: {}", root.display()).dimmed());
    println!(
        "{}",
        "Type a message, '/help' for commands, or 'exit' to quit.".dimmed()
    );
    println!();
}

/// Print the REPL command summary.
pub fn print_help() {
    println!("{}", "Commands:".cyan().bold());
    println!("  /add <file>  Add file content to the conversation");
    println!("  /help        Show this help");
    println!("  exit, quit   End the session");
    println!();
}

/// Label printed before each streamed response.
pub fn print_assistant_prefix() {
    print!("{} ", "octo:".blue().bold());
    flush();
}

/// Write one streamed fragment without a newline.
pub fn print_fragment(fragment: &str) {
    print!("{fragment}");
    flush();
}

/// Announce a parsed tool call.
pub fn print_tool_call(call: &ToolCall) {
    let args: Vec<String> = call
        .params
        .iter()
        .filter(|(k, _)| k.as_str() != CONTENT_KEY)
        .map(|(k, v)| format!("{k}={}", one_line(v, 60)))
        .collect();
    println!("{} {} {}", "⚙".yellow(), call.name.yellow().bold(), args.join(" ").dimmed());
}

/// Show what a sensitive call would do before asking for approval.
pub fn print_confirmation_details(call: &ToolCall) {
    if let Some(command) = call.param("command") {
        println!("  {} {}", "$".bold(), command);
    }
    if let Some(content) = call.param(CONTENT_KEY) {
        let lines = content.lines().count();
        println!(
            "  {}",
            format!("{lines} line(s), {} bytes:", content.len()).dimmed()
        );
        for line in content.lines().take(10) {
            println!("  {} {}", "│".dimmed(), line);
        }
        if lines > 10 {
            println!("  {}", "│ ...".dimmed());
        }
    }
}

/// Show a shortened observation.
pub fn print_observation(observation: &str) {
    let preview = truncate_string(observation.trim_end(), 400);
    if observation.starts_with("Error") || observation.starts_with("Tool execution denied") {
        println!("{}", preview.red());
    } else {
        println!("{}", preview.dimmed());
    }
}

pub fn print_info(message: &str) {
    println!("{}", message.yellow().bold());
}

pub fn print_error(message: &str) {
    eprintln!("{} {message}", "Error:".red().bold());
}

fn flush() {
    let _ = std::io::stdout().flush();
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_tilde_home() {
        let result = expand_tilde("~/foo/bar");
        assert!(result.ends_with("foo/bar"));
        assert!(!result.starts_with("~"));
    }

    #[test]
    fn expand_tilde_no_tilde() {
        let result = expand_tilde("/absolute/path");
        assert_eq!(result, PathBuf::from("/absolute/path"));
    }

    #[test]
    fn expand_tilde_bare() {
        let result = expand_tilde("~");
        assert!(!result.to_string_lossy().contains('~'));
    }

    #[test]
    fn expand_tilde_relative() {
        let result = expand_tilde("relative/path");
        assert_eq!(result, PathBuf::from("relative/path"));
    }
}
