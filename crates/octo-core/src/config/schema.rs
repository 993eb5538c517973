//! Configuration schema.
//!
//! Hierarchy: `Config` → `BackendConfig`, `AgentConfig`, `ToolsConfig`.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.
//! We use `#[serde(rename_all = "camelCase")]` to handle the conversion.

use serde::{Deserialize, Serialize};

/// Default Ollama endpoint.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Default model name.
pub const DEFAULT_MODEL: &str = "qwen2.5-coder:7b";

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration — loaded from `~/.octo/config.json` + env vars.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub backend: BackendConfig,
    pub agent: AgentConfig,
    pub tools: ToolsConfig,
}

// ─────────────────────────────────────────────
// Backend
// ─────────────────────────────────────────────

/// Model backend connection settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendConfig {
    /// Base URL of the Ollama server.
    pub base_url: String,
    /// Model identifier (e.g. `"qwen2.5-coder:7b"`).
    pub model: String,
    /// Timeout for the availability and model probes.
    pub probe_timeout_secs: u64,
    /// TCP connect timeout for streaming requests. The stream itself is unbounded.
    pub connect_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            probe_timeout_secs: 5,
            connect_timeout_secs: 10,
        }
    }
}

// ─────────────────────────────────────────────
// Agent
// ─────────────────────────────────────────────

/// Order in which parsed tool calls are reported.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParseOrder {
    /// All content-bearing calls first, then all self-closing calls.
    #[default]
    TwoPass,
    /// Strict position order within the response text.
    Document,
}

impl std::str::FromStr for ParseOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "two_pass" | "two-pass" | "twopass" => Ok(Self::TwoPass),
            "document" | "strict" => Ok(Self::Document),
            other => Err(format!("unknown parse order '{other}'")),
        }
    }
}

/// Agent loop settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentConfig {
    pub parse_order: ParseOrder,
    /// Maximum model re-prompts per user message. `0` means unlimited.
    pub max_tool_rounds: u32,
    /// Run sensitive tools without asking.
    pub auto_approve: bool,
}

// ─────────────────────────────────────────────
// Tools
// ─────────────────────────────────────────────

/// Tool execution settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolsConfig {
    /// Shell command timeout in seconds.
    pub shell_timeout_secs: u64,
    /// Shell output longer than this is truncated.
    pub max_output_chars: usize,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            shell_timeout_secs: 60,
            max_output_chars: 10_000,
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
