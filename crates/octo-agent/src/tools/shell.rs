//! Shell tool — execute commands in a subprocess rooted at the sandbox.
//!
//! Commands run through `sh -c` (or `cmd /C` on Windows) with a hard timeout.
//! On unix the shell leads its own process group, and a timed-out or
//! abandoned call kills the whole group, so nothing the command forked
//! outlives the call.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use octo_core::config::ToolsConfig;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::base::{require_param, Tool, ToolError, ToolKind, ToolParams};

// ─────────────────────────────────────────────
// RunShellTool
// ─────────────────────────────────────────────

/// Execute shell commands in a subprocess.
pub struct RunShellTool {
    /// Working directory for commands.
    working_dir: PathBuf,
    /// Command timeout.
    timeout: Duration,
    /// Output is truncated past this many characters.
    max_output_chars: usize,
}

impl RunShellTool {
    pub fn new(working_dir: PathBuf, timeout: Duration, max_output_chars: usize) -> Self {
        Self {
            working_dir,
            timeout,
            max_output_chars,
        }
    }

    pub fn from_config(working_dir: PathBuf, config: &ToolsConfig) -> Self {
        Self::new(
            working_dir,
            Duration::from_secs(config.shell_timeout_secs),
            config.max_output_chars,
        )
    }

    fn shell_command(command: &str) -> Command {
        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            #[cfg(unix)]
            c.process_group(0);
            c
        };
        cmd.kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Tool for RunShellTool {
    fn name(&self) -> &str {
        ToolKind::RunShell.name()
    }

    fn description(&self) -> &str {
        "Execute a shell command in the project root and return its exit code and \
         combined output. Use this for running builds, tests, git, or any CLI tool."
    }

    fn usage(&self) -> &str {
        r#"<tool_call:run_shell command="ls -la" />"#
    }

    fn requires_confirmation(&self) -> bool {
        ToolKind::RunShell.is_sensitive()
    }

    async fn execute(&self, params: &ToolParams) -> Result<String, ToolError> {
        let command = require_param(params, "command")?;

        info!(command = %command, cwd = %self.working_dir.display(), "executing shell command");

        let child = Self::shell_command(command)
            .current_dir(&self.working_dir)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .context("failed to spawn shell")?;

        let group = ProcessGroup::new(child.id());

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => {
                group.release();
                result.context("failed to wait for command")?
            }
            Err(_) => {
                warn!(command = %command, secs = self.timeout.as_secs(), "command timed out");
                return Ok(format!(
                    "Error: Command timed out after {} seconds",
                    self.timeout.as_secs()
                ));
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        let code = output.status.code().unwrap_or(-1);

        Ok(format!(
            "Command: {command}\nExit Code: {code}\nOutput:\n{}",
            truncate_output(combined, self.max_output_chars)
        ))
    }
}

// ─────────────────────────────────────────────
// Process group cleanup
// ─────────────────────────────────────────────

/// Kills the shell's process group when dropped, unless released.
///
/// Covers both the timeout path and a cancelled turn dropping the future
/// mid-run. `kill_on_drop` alone only reaches the shell itself.
struct ProcessGroup {
    leader: Option<u32>,
}

impl ProcessGroup {
    fn new(leader: Option<u32>) -> Self {
        Self { leader }
    }

    /// The command finished on its own; leave any background jobs alone.
    fn release(mut self) {
        self.leader = None;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        if let Some(pgid) = self.leader.take() {
            kill_group(pgid);
        }
    }
}

#[cfg(unix)]
fn kill_group(pgid: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pgid) else {
        return;
    };
    match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) => debug!(pgid, "killed shell process group"),
        Err(Errno::ESRCH) => {}
        Err(e) => warn!(pgid, error = %e, "failed to kill shell process group"),
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}

/// Cut `output` to at most `max_chars` characters, noting how many were dropped.
fn truncate_output(mut output: String, max_chars: usize) -> String {
    let total = output.chars().count();
    if total <= max_chars {
        return output;
    }
    let cut = output
        .char_indices()
        .nth(max_chars)
        .map(|(idx, _)| idx)
        .unwrap_or(output.len());
    output.truncate(cut);
    output.push_str(&format!("\n... (truncated, {} more chars)", total - max_chars));
    output
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
