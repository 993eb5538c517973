//! Ollama HTTP client — streams `/api/chat` as newline-delimited JSON.
//!
//! Each response line is a JSON object that may carry `message.content`
//! (a text fragment) and `done` (end of turn). The client stops reading as
//! soon as `done` is true, even if the server sends more bytes.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use octo_core::config::BackendConfig;
use octo_core::types::Message;

use crate::traits::{ChatBackend, ChatStream};

// ─────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    stream: bool,
}

/// One NDJSON line of a streaming chat response.
#[derive(Debug, Default, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// What one decoded line means for the stream.
#[derive(Debug, PartialEq)]
enum LineEvent {
    /// Blank line.
    Skip,
    /// Text to yield (possibly empty) and whether the turn is over.
    Fragment { text: String, done: bool },
    /// Terminal error to yield.
    Failed(String),
}

fn decode_line(line: &[u8]) -> LineEvent {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    if line.is_empty() {
        return LineEvent::Skip;
    }

    match serde_json::from_str::<ChatChunk>(line) {
        Ok(ChatChunk {
            error: Some(message),
            ..
        }) => LineEvent::Failed(format!("\nError: {message}")),
        Ok(chunk) => LineEvent::Fragment {
            text: chunk
                .message
                .and_then(|m| m.content)
                .unwrap_or_default(),
            done: chunk.done,
        },
        Err(e) => LineEvent::Failed(format!("\nError: invalid response from backend: {e}")),
    }
}

/// Whether an installed model tag satisfies the requested model name.
///
/// A name without a tag refers to `:latest`.
fn model_matches(installed: &str, wanted: &str) -> bool {
    installed == wanted || (!wanted.contains(':') && installed == format!("{wanted}:latest"))
}

// ─────────────────────────────────────────────
// OllamaClient
// ─────────────────────────────────────────────

/// Streaming client for a local or remote Ollama server.
pub struct OllamaClient {
    /// HTTP client (shared, connection-pooled). No overall timeout so
    /// long generations are never cut off.
    client: reqwest::Client,
    /// Server base URL (e.g. `"http://localhost:11434"`).
    base_url: String,
    /// Model used for chat turns.
    model: String,
    /// Timeout for the non-streaming probes.
    probe_timeout: Duration,
}

impl std::fmt::Debug for OllamaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl OllamaClient {
    /// Create a client with default timeouts.
    pub fn new(base_url: &str, model: &str) -> Result<Self, reqwest::Error> {
        let config = BackendConfig {
            base_url: base_url.to_string(),
            model: model.to_string(),
            ..BackendConfig::default()
        };
        Self::from_config(&config)
    }

    /// Create a client from backend configuration.
    pub fn from_config(config: &BackendConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            probe_timeout: Duration::from_secs(config.probe_timeout_secs),
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    fn tags_url(&self) -> String {
        format!("{}/api/tags", self.base_url)
    }

    /// Names of all models installed on the server.
    pub async fn list_models(&self) -> Result<Vec<String>, reqwest::Error> {
        let response = self
            .client
            .get(self.tags_url())
            .timeout(self.probe_timeout)
            .send()
            .await?
            .error_for_status()?;
        let tags: TagsResponse = response.json().await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

#[async_trait]
impl ChatBackend for OllamaClient {
    async fn stream_chat(&self, messages: &[Message]) -> ChatStream {
        debug!(
            model = %self.model,
            messages = messages.len(),
            "starting chat stream"
        );

        let request = self.client.post(self.chat_url()).json(&ChatRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            stream: true,
        });
        let base_url = self.base_url.clone();

        ChatStream::new(async_stream::stream! {
            let response = match request.send().await {
                Ok(resp) => resp,
                Err(e) if e.is_connect() => {
                    error!(url = %base_url, error = %e, "backend unreachable");
                    yield format!("\nError: Could not connect to Ollama at {base_url}. Is it running?");
                    return;
                }
                Err(e) => {
                    error!(error = %e, "chat request failed");
                    yield format!("\nError: {e}");
                    return;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Failed to read error body".to_string());
                error!(status = %status, body = %body, "chat request rejected");
                yield format!("\nError: {status} — {body}");
                return;
            }

            let mut bytes = response.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();

            while let Some(chunk) = bytes.next().await {
                match chunk {
                    Ok(b) => buffer.extend_from_slice(&b),
                    Err(e) => {
                        warn!(error = %e, "chat stream interrupted");
                        yield format!("\nError: stream interrupted: {e}");
                        return;
                    }
                }

                while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=pos).collect();
                    match decode_line(&line) {
                        LineEvent::Skip => {}
                        LineEvent::Fragment { text, done } => {
                            if !text.is_empty() {
                                yield text;
                            }
                            if done {
                                debug!("chat stream done");
                                return;
                            }
                        }
                        LineEvent::Failed(message) => {
                            yield message;
                            return;
                        }
                    }
                }
            }

            // Final line without a trailing newline.
            match decode_line(&buffer) {
                LineEvent::Skip => {}
                LineEvent::Fragment { text, .. } => {
                    if !text.is_empty() {
                        yield text;
                    }
                }
                LineEvent::Failed(message) => yield message,
            }
        })
    }

    async fn check_availability(&self) -> bool {
        match self
            .client
            .get(self.tags_url())
            .timeout(self.probe_timeout)
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(url = %self.base_url, error = %e, "availability probe failed");
                false
            }
        }
    }

    async fn is_model_present(&self) -> bool {
        match self.list_models().await {
            Ok(models) => models.iter().any(|m| model_matches(m, &self.model)),
            Err(e) => {
                debug!(error = %e, "model probe failed");
                false
            }
        }
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> &str {
        &self.base_url
    }

    fn display_name(&self) -> &str {
        "Ollama"
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
