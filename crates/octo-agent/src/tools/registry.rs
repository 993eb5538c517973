//! Tool Registry — the capability table the agent loop dispatches through.
//!
//! The four built-ins are registered by [`ToolKind`]; anything else
//! implementing [`Tool`] can be added without touching the parser or loop.

use std::collections::HashMap;
use std::sync::Arc;

use octo_core::config::ToolsConfig;
use tracing::{debug, warn};

use super::base::{Tool, ToolKind, ToolParams};
use super::filesystem::{ListFilesTool, ReadFileTool, WriteFileTool};
use super::sandbox::Sandbox;
use super::shell::RunShellTool;

// ─────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────

/// Stores tools keyed by name and dispatches calls.
///
/// Owns `Arc<dyn Tool>` so tools can be shared across tasks.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// A registry holding the four built-in tools, all confined to `sandbox`.
    pub fn builtin(sandbox: &Sandbox, config: &ToolsConfig) -> Self {
        let mut registry = Self::new();
        for kind in ToolKind::ALL {
            registry.register(builtin_tool(kind, sandbox, config));
        }
        registry
    }

    /// Register a tool. Overwrites any previous tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        debug!(tool = tool.name(), "registered tool");
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Registered tools in documentation order: built-ins first, then the rest by name.
    pub fn tools(&self) -> Vec<&Arc<dyn Tool>> {
        let mut tools: Vec<&Arc<dyn Tool>> = self.tools.values().collect();
        tools.sort_by_key(|t| {
            let rank = ToolKind::ALL
                .iter()
                .position(|k| k.name() == t.name())
                .unwrap_or(ToolKind::ALL.len());
            (rank, t.name().to_string())
        });
        tools
    }

    /// Whether a call to `name` must be approved first.
    ///
    /// Unknown names need no approval; they only produce a not-found observation.
    pub fn requires_confirmation(&self, name: &str) -> bool {
        match self.tools.get(name) {
            Some(tool) => tool.requires_confirmation(),
            None => ToolKind::from_name(name).is_some_and(|k| k.is_sensitive()),
        }
    }

    /// Execute a tool by name with the given parameters.
    ///
    /// The caller always gets a `String` back, even on failure.
    pub async fn execute(&self, name: &str, params: &ToolParams) -> String {
        let tool = match self.tools.get(name) {
            Some(t) => t,
            None => {
                warn!(tool = name, "tool not found");
                return format!("Error: Tool '{name}' not found.");
            }
        };

        match tool.execute(params).await {
            Ok(result) => result,
            Err(e) => {
                warn!(tool = name, error = %e, "tool execution failed");
                e.to_observation(name)
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Construct the built-in implementation of `kind`.
fn builtin_tool(kind: ToolKind, sandbox: &Sandbox, config: &ToolsConfig) -> Arc<dyn Tool> {
    match kind {
        ToolKind::ReadFile => Arc::new(ReadFileTool::new(sandbox.clone())),
        ToolKind::WriteFile => Arc::new(WriteFileTool::new(sandbox.clone())),
        ToolKind::ListFiles => Arc::new(ListFilesTool::new(sandbox.clone())),
        ToolKind::RunShell => Arc::new(RunShellTool::from_config(
            sandbox.root().to_path_buf(),
            config,
        )),
    }
}
