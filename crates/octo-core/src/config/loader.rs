//! Config loader — reads `~/.octo/config.json` and merges env vars.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.octo/config.json`
//! 3. Environment variables (override JSON)
//!
//! Command-line flags are applied on top by the CLI.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::schema::Config;

/// Backend URL override.
pub const ENV_BASE_URL: &str = "OLLAMA_URL";
/// Model name override.
pub const ENV_MODEL: &str = "OCTO_MODEL";

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from the default path + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't be parsed.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    apply_env_overrides(load_config_from_path(&config_path))
}

/// Load config from a specific file path, without env overrides.
fn load_config_from_path(path: &Path) -> Config {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return Config::default();
    }

    debug!("Loading config from {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return Config::default();
        }
    };

    match serde_json::from_str(&content) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to parse config JSON: {}", e);
            Config::default()
        }
    }
}

/// Apply environment variable overrides on top of a loaded config.
///
/// Supported overrides:
/// - `OLLAMA_URL` → `backend.base_url`
/// - `OCTO_MODEL` → `backend.model`
/// - `OCTO_TOOLS__SHELL_TIMEOUT` → `tools.shell_timeout_secs`
/// - `OCTO_TOOLS__MAX_OUTPUT_CHARS` → `tools.max_output_chars`
/// - `OCTO_AGENT__PARSE_ORDER` → `agent.parse_order`
/// - `OCTO_AGENT__MAX_TOOL_ROUNDS` → `agent.max_tool_rounds`
fn apply_env_overrides(config: Config) -> Config {
    apply_overrides(config, |key| std::env::var(key).ok())
}

/// Apply overrides from an arbitrary lookup (env in production, a map in tests).
fn apply_overrides(mut config: Config, lookup: impl Fn(&str) -> Option<String>) -> Config {
    if let Some(val) = lookup(ENV_BASE_URL).filter(|v| !v.is_empty()) {
        config.backend.base_url = val;
    }
    if let Some(val) = lookup(ENV_MODEL).filter(|v| !v.is_empty()) {
        config.backend.model = val;
    }

    if let Some(val) = lookup("OCTO_TOOLS__SHELL_TIMEOUT") {
        match val.parse::<u64>() {
            Ok(n) => config.tools.shell_timeout_secs = n,
            Err(_) => warn!(value = %val, "ignoring invalid OCTO_TOOLS__SHELL_TIMEOUT"),
        }
    }
    if let Some(val) = lookup("OCTO_TOOLS__MAX_OUTPUT_CHARS") {
        match val.parse::<usize>() {
            Ok(n) => config.tools.max_output_chars = n,
            Err(_) => warn!(value = %val, "ignoring invalid OCTO_TOOLS__MAX_OUTPUT_CHARS"),
        }
    }

    if let Some(val) = lookup("OCTO_AGENT__PARSE_ORDER") {
        match val.parse() {
            Ok(order) => config.agent.parse_order = order,
            Err(e) => warn!(error = %e, "ignoring OCTO_AGENT__PARSE_ORDER"),
        }
    }
    if let Some(val) = lookup("OCTO_AGENT__MAX_TOOL_ROUNDS") {
        match val.parse::<u32>() {
            Ok(n) => config.agent.max_tool_rounds = n,
            Err(_) => warn!(value = %val, "ignoring invalid OCTO_AGENT__MAX_TOOL_ROUNDS"),
        }
    }

    config
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
