//! Octo Agent — core loop, tool-call parser, tools, and context builder.
//!
//! This crate contains:
//! - **parser**: extracts `<tool_call:NAME ...>` markup from model output
//! - **tools**: Tool trait, registry, path sandbox, and the built-in tools
//! - **context**: project snapshot and system prompt construction
//! - **agent_loop**: the model ↔ tool-calling main loop

pub mod parser;
pub mod tools;
pub mod context;
pub mod agent_loop;

pub use agent_loop::{AgentLoop, TurnHandler, TurnOutcome};
pub use context::ContextBuilder;
pub use parser::{parse_tool_calls, ToolCall};
pub use tools::{Sandbox, Tool, ToolRegistry};
