//! Interactive REPL.
//!
//! Uses `rustyline` for readline-style editing with persistent history.
//! Each turn gets a fresh cancellation token tripped by Ctrl-C, so an
//! interrupt stops the current response or tool and returns to the prompt.

use anyhow::Result;
use rustyline::config::Configurer;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{DefaultEditor, Editor};
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use octo_agent::parser::ToolCall;
use octo_agent::{AgentLoop, TurnHandler, TurnOutcome};

use crate::helpers;

/// Exit commands (case-insensitive match).
const EXIT_COMMANDS: &[&str] = &["exit", "quit", "/exit", "/quit"];

type LineEditor = Editor<(), DefaultHistory>;

/// One line of REPL input, classified.
#[derive(Debug, PartialEq, Eq)]
enum ReplInput<'a> {
    Empty,
    Exit,
    Help,
    AddFile(&'a str),
    /// `/add` with no path.
    AddUsage,
    Message(&'a str),
}

fn classify(line: &str) -> ReplInput<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ReplInput::Empty;
    }
    if is_exit_command(trimmed) {
        return ReplInput::Exit;
    }
    if trimmed == "/help" {
        return ReplInput::Help;
    }
    if trimmed == "/add" {
        return ReplInput::AddUsage;
    }
    if let Some(path) = trimmed.strip_prefix("/add ") {
        let path = path.trim();
        return if path.is_empty() {
            ReplInput::AddUsage
        } else {
            ReplInput::AddFile(path)
        };
    }
    ReplInput::Message(line)
}

/// Run the interactive REPL loop.
pub async fn run(mut agent: AgentLoop) -> Result<()> {
    helpers::print_banner(agent.model(), agent.root());

    let mut editor = create_editor()?;

    loop {
        // Read input
        let line = match editor.readline(">>> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                helpers::print_info("Session interrupted. Type 'exit' to quit.");
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                helpers::print_error(&format!("input error: {e}"));
                break;
            }
        };

        match classify(&line) {
            ReplInput::Empty => continue,
            ReplInput::Exit => {
                println!("\nGoodbye! 👋");
                break;
            }
            ReplInput::Help => {
                helpers::print_help();
            }
            ReplInput::AddUsage => {
                helpers::print_error("usage: /add <file>");
            }
            ReplInput::AddFile(path) => {
                let _ = editor.add_history_entry(line.as_str());
                match agent.add_file_to_context(path) {
                    Ok(()) => helpers::print_info(&format!("Added {path} to context.")),
                    Err(e) => helpers::print_error(&e),
                }
            }
            ReplInput::Message(text) => {
                let _ = editor.add_history_entry(text);
                run_turn(&mut agent, text, &mut editor).await;
            }
        }
    }

    // Save history
    save_history(&mut editor);

    Ok(())
}

/// Drive one turn, cancelling it on Ctrl-C.
async fn run_turn(agent: &mut AgentLoop, text: &str, editor: &mut LineEditor) {
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let mut handler = ConsoleHandler { editor };
    let outcome = agent.process_message(text, &mut handler, &cancel).await;
    watcher.abort();

    debug!(?outcome, transcript = agent.transcript().len(), "turn finished");
    match outcome {
        TurnOutcome::Completed { .. } => {}
        TurnOutcome::Interrupted => helpers::print_info("\nInterrupted."),
        TurnOutcome::RoundLimit { tool_rounds } => helpers::print_info(&format!(
            "Stopped after {tool_rounds} tool rounds. Send a message to continue."
        )),
    }
    println!();
}

// ─────────────────────────────────────────────
// Console handler
// ─────────────────────────────────────────────

/// Streams output to the terminal and asks for approval on the same editor.
struct ConsoleHandler<'a> {
    editor: &'a mut LineEditor,
}

impl TurnHandler for ConsoleHandler<'_> {
    fn on_response_start(&mut self) {
        helpers::print_assistant_prefix();
    }

    fn on_fragment(&mut self, fragment: &str) {
        helpers::print_fragment(fragment);
    }

    fn on_response_end(&mut self, _response: &str) {
        println!();
    }

    fn on_tool_call(&mut self, call: &ToolCall) {
        helpers::print_tool_call(call);
    }

    fn confirm(&mut self, call: &ToolCall) -> bool {
        helpers::print_confirmation_details(call);
        let prompt = format!("Allow {}? [y/N] ", call.name);
        match read_blocking(|| self.editor.readline(&prompt)) {
            Ok(answer) => is_approval(&answer),
            // Ctrl-C or Ctrl-D at the prompt counts as a refusal.
            Err(_) => false,
        }
    }

    fn on_observation(&mut self, _call: &ToolCall, observation: &str) {
        helpers::print_observation(observation);
    }
}

/// Run a blocking terminal read without stalling the runtime's other
/// tasks, such as the Ctrl-C watcher.
fn read_blocking<T>(read: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(read)
        }
        _ => read(),
    }
}

fn is_approval(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Create a rustyline editor with history.
fn create_editor() -> Result<LineEditor> {
    let mut editor = DefaultEditor::new()?;
    editor.set_max_history_size(1000)?;
    editor.set_auto_add_history(false);

    // Load history from ~/.octo/history
    let history_path = history_path();
    if history_path.exists() {
        let _ = editor.load_history(&history_path);
        debug!("loaded REPL history from {}", history_path.display());
    }

    Ok(editor)
}

/// Save history to disk.
fn save_history(editor: &mut LineEditor) {
    let path = history_path();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(e) = editor.save_history(&path) {
        debug!("failed to save history: {e}");
    }
}

/// Path to the history file.
fn history_path() -> std::path::PathBuf {
    octo_core::utils::get_data_path().join("history")
}

/// Check if input is an exit command.
fn is_exit_command(input: &str) -> bool {
    let lower = input.to_lowercase();
    EXIT_COMMANDS.contains(&lower.as_str())
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
