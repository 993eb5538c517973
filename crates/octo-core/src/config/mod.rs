//! Configuration system — schema, loading, and env var overrides.
//!
//! # Usage
//! ```no_run
//! use octo_core::config;
//!
//! let cfg = config::load_config(None);
//! println!("Model: {}", cfg.backend.model);
//! ```

pub mod loader;
pub mod schema;

// Re-export key types
pub use loader::{get_config_path, load_config, ENV_BASE_URL, ENV_MODEL};
pub use schema::{AgentConfig, BackendConfig, Config, ParseOrder, ToolsConfig};
