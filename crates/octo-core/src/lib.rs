//! Octo Core — shared types, configuration and utilities.

pub mod config;
pub mod types;
pub mod utils;

pub use types::{Message, Role, Transcript};
