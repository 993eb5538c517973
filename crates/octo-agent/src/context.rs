//! Context builder — project snapshot and system prompt.
//!
//! Builds the one-time system message from an identity block, a directory
//! tree of the sandbox root honoring `.gitignore`, usage guidelines and the
//! tool catalogue. Also renders file blocks for the `/add` command.

use chrono::Utc;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::WalkBuilder;
use tracing::{debug, warn};

use crate::tools::{Sandbox, ToolError, ToolRegistry};

/// Always ignored, even without a `.gitignore`.
const DEFAULT_IGNORES: &[&str] = &[".git/", "__pycache__/", "venv/", ".env", "target/"];

/// Upper bound on tree lines embedded in the prompt.
const MAX_TREE_ENTRIES: usize = 500;

// ─────────────────────────────────────────────
// Context builder
// ─────────────────────────────────────────────

/// Builds the system prompt and file blocks for the agent loop.
pub struct ContextBuilder {
    sandbox: Sandbox,
    defaults: Gitignore,
}

impl ContextBuilder {
    /// Create a builder for `sandbox`.
    ///
    /// `.gitignore` files (nested ones included) are read during each walk;
    /// the built-in ignores apply on top of them.
    pub fn new(sandbox: Sandbox) -> Self {
        let defaults = default_ignores(sandbox.root());
        debug!(rules = defaults.num_ignores(), root = %sandbox.root().display(), "prepared ignore rules");
        Self { sandbox, defaults }
    }

    /// The sandbox this builder reads from.
    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    /// Indented listing of the root, two spaces per level, directories suffixed `/`.
    pub fn directory_tree(&self) -> String {
        let defaults = self.defaults.clone();
        let walker = WalkBuilder::new(self.sandbox.root())
            .hidden(false)
            .parents(false)
            .ignore(false)
            .git_global(false)
            .git_exclude(false)
            .require_git(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                !defaults.matched(entry.path(), is_dir).is_ignore()
            })
            .build();

        let mut lines = Vec::new();
        let mut skipped = 0usize;
        for entry in walker.filter_map(Result::ok) {
            if entry.depth() == 0 {
                continue;
            }
            if lines.len() >= MAX_TREE_ENTRIES {
                skipped += 1;
                continue;
            }
            let indent = "  ".repeat(entry.depth());
            let name = entry.file_name().to_string_lossy();
            if entry.file_type().is_some_and(|t| t.is_dir()) {
                lines.push(format!("{indent}{name}/"));
            } else {
                lines.push(format!("{indent}{name}"));
            }
        }
        if skipped > 0 {
            lines.push(format!("... ({skipped} more entries)"));
        }

        lines.join("\n")
    }

    /// Build the initial system prompt.
    pub fn build_system_prompt(&self, tools: &ToolRegistry) -> String {
        let mut parts: Vec<String> = Vec::new();

        parts.push(self.build_identity());
        parts.push(format!(
            "Current Directory Structure:\n```\n{}\n```",
            self.directory_tree()
        ));
        parts.push(
            "Guidelines:\n\
             1. Be concise and professional.\n\
             2. When suggesting code changes, provide the full file content or clear diffs.\n\
             3. If you need to see a file's content, read it with a tool instead of guessing."
                .to_string(),
        );
        parts.push(build_tools_section(tools));

        parts.join("\n\n")
    }

    fn build_identity(&self) -> String {
        let today = Utc::now().format("%Y-%m-%d");
        let os = std::env::consts::OS;
        let arch = std::env::consts::ARCH;

        format!(
            "You are octo, an AI coding assistant powered by a local model served by Ollama.\n\
             You have access to the user's project files and can help with coding tasks, \
             refactoring, debugging, and explaining code.\n\n\
             - Date: {today}\n\
             - Platform: {os}/{arch}\n\
             - Project root: `{root}`",
            root = self.sandbox.root().display(),
        )
    }

    /// Render a file as a delimited block for the transcript.
    ///
    /// `Err` carries the error text shown to the user.
    pub fn file_content(&self, path: &str) -> Result<String, String> {
        let resolved = self
            .sandbox
            .resolve(path)
            .map_err(|e| e.to_observation("add"))?;

        if !resolved.exists() {
            return Err(format!("Error: File {path} not found."));
        }

        let content = std::fs::read_to_string(&resolved)
            .map_err(|e| ToolError::io("reading", path, e).to_observation("add"))?;
        Ok(format!("--- FILE: {path} ---\n{content}\n--- END FILE ---"))
    }
}

fn build_tools_section(tools: &ToolRegistry) -> String {
    let mut section = String::from(
        "Tools:\n\
         You can act on the project by writing tool calls anywhere in your reply. \
         Use a self-closing tag for simple calls:\n\
         <tool_call:NAME attr=\"value\" />\n\
         Put multi-line payloads between an opening and a matching closing tag:\n\
         <tool_call:NAME attr=\"value\">BODY</tool_call:NAME>\n\
         After your reply, each call is executed and its result is sent back to you. \
         Stop emitting tool calls once the task is complete.\n\nAvailable tools:",
    );

    for tool in tools.tools() {
        section.push_str(&format!("\n- {}: {}", tool.name(), tool.description()));
        if tool.requires_confirmation() {
            section.push_str(" (requires user approval)");
        }
        section.push_str(&format!("\n  Usage: {}", tool.usage().replace('\n', "\n  ")));
    }

    section
}

/// Matcher for the built-in ignores, rooted at `root`.
fn default_ignores(root: &std::path::Path) -> Gitignore {
    let mut builder = GitignoreBuilder::new(root);
    for pattern in DEFAULT_IGNORES {
        if let Err(e) = builder.add_line(None, pattern) {
            warn!(pattern, error = %e, "skipping invalid ignore pattern");
        }
    }
    builder.build().unwrap_or_else(|e| {
        warn!(error = %e, "failed to build default ignores");
        Gitignore::empty()
    })
}
