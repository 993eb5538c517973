//! Model backend layer for Octo.
//!
//! # Architecture
//!
//! - [`traits::ChatBackend`] — trait that all backends implement
//! - [`traits::ChatStream`] — cancellable stream of text fragments for one turn
//! - [`ollama::OllamaClient`] — NDJSON streaming client for Ollama's `/api/chat`
//! - [`preflight::preflight`] — reachability and model checks before a session

pub mod ollama;
pub mod preflight;
pub mod traits;

// Re-export main types for convenience
pub use ollama::OllamaClient;
pub use preflight::{preflight, PreflightError};
pub use traits::{ChatBackend, ChatStream};
