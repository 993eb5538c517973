//! Chat backend trait — the streaming model client abstraction.
//!
//! `OllamaClient` in `ollama.rs` is the production implementation; tests
//! substitute scripted backends.

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use octo_core::types::Message;

// ─────────────────────────────────────────────
// ChatStream
// ─────────────────────────────────────────────

/// A finite, single-use sequence of text fragments from one model turn.
///
/// Fragments are pulled lazily on the caller's task. Dropping the stream
/// abandons the underlying request, which is how an in-flight turn is
/// cancelled. Failures never surface as `Err`: the backend yields one final
/// fragment describing the problem instead.
pub struct ChatStream {
    inner: BoxStream<'static, String>,
}

impl ChatStream {
    /// Wrap any `Send` stream of fragments.
    pub fn new(stream: impl Stream<Item = String> + Send + 'static) -> Self {
        Self {
            inner: stream.boxed(),
        }
    }

    /// A stream that yields the given fragments in order.
    pub fn from_fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fragments: Vec<String> = fragments.into_iter().map(Into::into).collect();
        Self::new(stream::iter(fragments))
    }

    /// A stream consisting of a single error fragment.
    pub fn error(message: impl Into<String>) -> Self {
        Self::from_fragments([message.into()])
    }

    /// Await the next fragment, or `None` once the turn is complete.
    pub async fn next_fragment(&mut self) -> Option<String> {
        self.inner.next().await
    }
}

impl Stream for ChatStream {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<String>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl std::fmt::Debug for ChatStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatStream").finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────
// ChatBackend
// ─────────────────────────────────────────────

/// Trait that all model backends implement.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Start a streaming chat turn over the full transcript.
    ///
    /// A fresh call is required for every turn; the returned stream cannot
    /// be restarted.
    async fn stream_chat(&self, messages: &[Message]) -> ChatStream;

    /// Short, side-effect-free probe: is the backend reachable?
    async fn check_availability(&self) -> bool;

    /// Short, side-effect-free probe: is the configured model installed?
    async fn is_model_present(&self) -> bool;

    /// The model used for chat turns.
    fn model(&self) -> &str;

    /// Base URL or other human-readable location of the backend.
    fn endpoint(&self) -> &str;

    /// Display name for logging.
    fn display_name(&self) -> &str;
}
