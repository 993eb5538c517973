//! Tool trait — the abstract interface every agent tool must implement.

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

/// Tool parameters as parsed from markup: attribute name → value.
pub type ToolParams = BTreeMap<String, String>;

// ─────────────────────────────────────────────
// Built-in tool kinds
// ─────────────────────────────────────────────

/// The built-in capabilities every session starts with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ToolKind {
    ReadFile,
    WriteFile,
    RunShell,
    ListFiles,
}

impl ToolKind {
    /// All built-in kinds, in the order they are documented to the model.
    pub const ALL: [ToolKind; 4] = [
        ToolKind::ReadFile,
        ToolKind::WriteFile,
        ToolKind::ListFiles,
        ToolKind::RunShell,
    ];

    /// Name used in `<tool_call:NAME ...>` markup.
    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::ReadFile => "read_file",
            ToolKind::WriteFile => "write_file",
            ToolKind::RunShell => "run_shell",
            ToolKind::ListFiles => "list_files",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Whether the user must approve each invocation.
    pub fn is_sensitive(&self) -> bool {
        matches!(self, ToolKind::WriteFile | ToolKind::RunShell)
    }
}

// ─────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────

/// Failure inside a tool. Always rendered to text for the model, never
/// propagated past the registry.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Path resolves outside the sandbox root.
    #[error("Access denied to {0}")]
    AccessDenied(String),

    /// Filesystem operation failed; `action` reads like "reading" or "writing".
    #[error("{action} {path}: {source}")]
    Io {
        action: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ToolError {
    pub fn io(action: &'static str, path: impl Into<String>, source: std::io::Error) -> Self {
        ToolError::Io {
            action,
            path: path.into(),
            source,
        }
    }

    /// The observation text the model sees for this failure.
    pub fn to_observation(&self, tool_name: &str) -> String {
        match self {
            ToolError::AccessDenied(path) => format!("Error: Access denied to {path}"),
            ToolError::Io { .. } => format!("Error: {self}"),
            _ => format!("Error executing '{tool_name}': {self}"),
        }
    }
}

// ─────────────────────────────────────────────
// Tool trait
// ─────────────────────────────────────────────

/// Every agent tool implements this trait.
///
/// The agent loop documents tools to the model via `name()`, `description()`
/// and `usage()`, and dispatches parsed calls via `execute()`.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name used in markup (e.g. `"read_file"`).
    fn name(&self) -> &str;

    /// Human-readable description shown to the model.
    fn description(&self) -> &str;

    /// Example markup showing how to invoke the tool.
    fn usage(&self) -> &str;

    /// Whether each call needs explicit user approval.
    fn requires_confirmation(&self) -> bool {
        false
    }

    /// Execute the tool with the given parameters.
    ///
    /// Returns the observation text. Failures are returned as `Err` and the
    /// registry converts them to text.
    async fn execute(&self, params: &ToolParams) -> Result<String, ToolError>;
}

// ─────────────────────────────────────────────
// Param helpers
// ─────────────────────────────────────────────

/// Extract a required param.
pub fn require_param<'a>(params: &'a ToolParams, key: &str) -> Result<&'a str, ToolError> {
    params
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| ToolError::MissingParameter(key.to_string()))
}

/// Extract an optional param.
pub fn optional_param<'a>(params: &'a ToolParams, key: &str) -> Option<&'a str> {
    params.get(key).map(String::as_str)
}
