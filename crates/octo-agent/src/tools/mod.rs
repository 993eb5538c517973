//! Tool modules for the Octo agent.

pub mod base;
pub mod registry;
pub mod sandbox;
pub mod filesystem;
pub mod shell;

pub use base::{optional_param, require_param, Tool, ToolError, ToolKind, ToolParams};
pub use registry::ToolRegistry;
pub use sandbox::Sandbox;
