//! Core types for Octo — chat messages and the conversation transcript.
//!
//! Messages follow the Ollama `/api/chat` shape: a `role` string plus plain
//! text `content`. Tool observations travel as ordinary `user` messages, so
//! there is no dedicated tool role.

use serde::{Deserialize, Serialize};
use std::fmt;

// ─────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────

/// Author of a chat message.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single chat message.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ─────────────────────────────────────────────
// Transcript
// ─────────────────────────────────────────────

/// Ordered, append-only conversation history.
///
/// The whole transcript is sent to the model on every turn. Entries are
/// never edited or removed, which is why the only mutator is [`push`].
///
/// [`push`]: Transcript::push
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    /// Create an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transcript seeded with a system prompt.
    pub fn with_system(prompt: impl Into<String>) -> Self {
        let mut transcript = Self::new();
        transcript.push(Message::system(prompt));
        transcript
    }

    /// Append a message.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// All messages, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The most recent message, if any.
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Total characters of content across all messages.
    pub fn content_chars(&self) -> usize {
        self.messages.iter().map(|m| m.content.chars().count()).sum()
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
