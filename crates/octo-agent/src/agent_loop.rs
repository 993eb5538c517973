//! Agent loop — the model ↔ tool-calling main loop.
//!
//! One user message drives a turn: stream a response, parse tool calls out
//! of it, gate sensitive calls on user approval, execute, append each
//! observation as a user message, and re-prompt until a response carries no
//! calls. Console I/O goes through [`TurnHandler`] so the loop runs the same
//! under the REPL and under tests.

use std::sync::Arc;

use octo_core::config::{AgentConfig, Config, ParseOrder};
use octo_core::types::{Message, Transcript};
use octo_core::utils::one_line;
use octo_providers::traits::ChatBackend;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::context::ContextBuilder;
use crate::parser::{parse_tool_calls_with_order, ToolCall};
use crate::tools::{Sandbox, ToolRegistry};

/// Observation recorded when the user refuses a sensitive call.
pub const DENIED_OBSERVATION: &str = "Tool execution denied by user.";

/// Observation recorded when a running tool is cancelled.
pub const INTERRUPTED_OBSERVATION: &str = "Error: Tool execution interrupted by user.";

// ─────────────────────────────────────────────
// Turn handler
// ─────────────────────────────────────────────

/// Receives progress from a running turn and answers confirmation prompts.
///
/// Every method except [`confirm`](TurnHandler::confirm) defaults to a no-op.
pub trait TurnHandler {
    /// A model response is about to stream.
    fn on_response_start(&mut self) {}

    /// One streamed fragment, in arrival order.
    fn on_fragment(&mut self, _fragment: &str) {}

    /// The response finished (or was cut short); `response` is the full text.
    fn on_response_end(&mut self, _response: &str) {}

    /// A parsed call is about to be confirmed or executed.
    fn on_tool_call(&mut self, _call: &ToolCall) {}

    /// Ask the user whether a sensitive call may run.
    fn confirm(&mut self, call: &ToolCall) -> bool;

    /// An observation was appended for `call`.
    fn on_observation(&mut self, _call: &ToolCall, _observation: &str) {}
}

/// How a turn ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The model produced a response with no tool calls.
    Completed { tool_rounds: u32 },
    /// The user interrupted streaming or tool execution.
    Interrupted,
    /// `max_tool_rounds` tool batches ran without the model finishing.
    RoundLimit { tool_rounds: u32 },
}

// ─────────────────────────────────────────────
// AgentLoop
// ─────────────────────────────────────────────

/// Owns the transcript and drives one session.
pub struct AgentLoop {
    /// Model backend.
    backend: Arc<dyn ChatBackend>,
    /// Tool registry.
    tools: ToolRegistry,
    /// Context builder (system prompt, `/add` file blocks).
    context: ContextBuilder,
    /// Full conversation, fed to the model on every request.
    transcript: Transcript,
    /// How parsed calls are ordered.
    parse_order: ParseOrder,
    /// Tool batches allowed per user message; `None` is unlimited.
    max_tool_rounds: Option<u32>,
    /// Skip confirmation for sensitive tools.
    auto_approve: bool,
}

impl AgentLoop {
    /// Create a loop with the built-in tools confined to `sandbox`.
    pub fn new(backend: Arc<dyn ChatBackend>, sandbox: Sandbox, config: &Config) -> Self {
        let tools = ToolRegistry::builtin(&sandbox, &config.tools);
        Self::with_registry(backend, sandbox, tools, &config.agent)
    }

    /// Create a loop with a caller-supplied registry.
    pub fn with_registry(
        backend: Arc<dyn ChatBackend>,
        sandbox: Sandbox,
        tools: ToolRegistry,
        config: &AgentConfig,
    ) -> Self {
        let context = ContextBuilder::new(sandbox);
        let system_prompt = context.build_system_prompt(&tools);
        debug!(chars = system_prompt.len(), tools = tools.tools().len(), "built system prompt");

        Self {
            backend,
            tools,
            context,
            transcript: Transcript::with_system(system_prompt),
            parse_order: config.parse_order,
            max_tool_rounds: (config.max_tool_rounds > 0).then_some(config.max_tool_rounds),
            auto_approve: config.auto_approve,
        }
    }

    /// Process one user message through to the end of the turn.
    pub async fn process_message(
        &mut self,
        input: &str,
        handler: &mut dyn TurnHandler,
        cancel: &CancellationToken,
    ) -> TurnOutcome {
        self.transcript.push(Message::user(input));
        self.run_turn(handler, cancel).await
    }

    async fn run_turn(
        &mut self,
        handler: &mut dyn TurnHandler,
        cancel: &CancellationToken,
    ) -> TurnOutcome {
        let mut tool_rounds = 0u32;

        loop {
            let (response, interrupted) = self.stream_response(handler, cancel).await;

            if interrupted {
                info!(chars = response.len(), "response interrupted");
                if !response.is_empty() {
                    self.transcript.push(Message::assistant(response));
                }
                return TurnOutcome::Interrupted;
            }

            let calls = parse_tool_calls_with_order(&response, self.parse_order);
            self.transcript.push(Message::assistant(response));

            if calls.is_empty() {
                debug!(tool_rounds, "turn complete");
                return TurnOutcome::Completed { tool_rounds };
            }

            tool_rounds += 1;
            info!(round = tool_rounds, calls = calls.len(), "executing tool calls");

            for call in &calls {
                if !self.resolve_call(call, handler, cancel).await {
                    return TurnOutcome::Interrupted;
                }
            }

            if self.max_tool_rounds.is_some_and(|max| tool_rounds >= max) {
                warn!(tool_rounds, "tool round limit reached");
                return TurnOutcome::RoundLimit { tool_rounds };
            }
        }
    }

    /// Stream one model response. Returns the text and whether it was cut short.
    async fn stream_response(
        &self,
        handler: &mut dyn TurnHandler,
        cancel: &CancellationToken,
    ) -> (String, bool) {
        handler.on_response_start();

        let mut response = String::new();
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            stream = self.backend.stream_chat(self.transcript.messages()) => Some(stream),
        };

        let mut interrupted = opened.is_none();
        if let Some(mut stream) = opened {
            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    fragment = stream.next_fragment() => Some(fragment),
                };
                match next {
                    Some(Some(fragment)) => {
                        handler.on_fragment(&fragment);
                        response.push_str(&fragment);
                    }
                    Some(None) => break,
                    None => {
                        interrupted = true;
                        break;
                    }
                }
            }
            // Dropping the stream here abandons any in-flight request.
        }

        handler.on_response_end(&response);
        (response, interrupted)
    }

    /// Confirm and execute one call, appending its observation.
    ///
    /// Returns `false` if the user interrupted execution.
    async fn resolve_call(
        &mut self,
        call: &ToolCall,
        handler: &mut dyn TurnHandler,
        cancel: &CancellationToken,
    ) -> bool {
        handler.on_tool_call(call);

        let gated = !self.auto_approve && self.tools.requires_confirmation(&call.name);
        if gated && !handler.confirm(call) {
            info!(tool = %call.name, "tool call denied");
            self.push_observation(call, DENIED_OBSERVATION.to_string(), handler);
            return true;
        }

        debug!(tool = %call.name, params = %one_line(&format!("{:?}", call.params), 120), "running tool");
        let observation = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = self.tools.execute(&call.name, &call.params) => Some(result),
        };

        match observation {
            Some(text) => {
                self.push_observation(call, text, handler);
                true
            }
            None => {
                info!(tool = %call.name, "tool execution interrupted");
                self.push_observation(call, INTERRUPTED_OBSERVATION.to_string(), handler);
                false
            }
        }
    }

    fn push_observation(&mut self, call: &ToolCall, text: String, handler: &mut dyn TurnHandler) {
        handler.on_observation(call, &text);
        self.transcript.push(Message::user(text));
    }

    /// Append a file block to the transcript as a user message.
    ///
    /// On failure nothing is appended and the error text is returned.
    pub fn add_file_to_context(&mut self, path: &str) -> Result<(), String> {
        let block = self.context.file_content(path)?;
        self.transcript
            .push(Message::user(format!("Here is the content of {path}:\n{block}")));
        info!(path, "added file to context");
        Ok(())
    }

    /// The conversation so far.
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// The model chat turns go to.
    pub fn model(&self) -> &str {
        self.backend.model()
    }

    /// The sandbox root every tool is confined to.
    pub fn root(&self) -> &std::path::Path {
        self.context.sandbox().root()
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream::{self, StreamExt};
    use octo_core::types::Role;
    use octo_providers::traits::ChatStream;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// One scripted model reply.
    enum Reply {
        /// Streams the text in two fragments, then completes.
        Text(String),
        /// Streams the text, then never completes.
        Stall(String),
    }

    /// A mock backend that returns canned replies and records each request.
    struct MockBackend {
        replies: Mutex<VecDeque<Reply>>,
        requests: Mutex<Vec<Vec<Message>>>,
    }

    impl MockBackend {
        fn new(replies: Vec<Reply>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn texts(replies: &[&str]) -> Arc<Self> {
            Self::new(replies.iter().map(|r| Reply::Text(r.to_string())).collect())
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn request(&self, index: usize) -> Vec<Message> {
            self.requests.lock().unwrap()[index].clone()
        }
    }

    #[async_trait]
    impl ChatBackend for MockBackend {
        async fn stream_chat(&self, messages: &[Message]) -> ChatStream {
            self.requests.lock().unwrap().push(messages.to_vec());
            match self.replies.lock().unwrap().pop_front() {
                Some(Reply::Text(text)) => {
                    let mid = text.char_indices().nth(text.chars().count() / 2).map_or(0, |(i, _)| i);
                    let (head, tail) = text.split_at(mid);
                    ChatStream::from_fragments([head.to_string(), tail.to_string()])
                }
                Some(Reply::Stall(text)) => {
                    ChatStream::new(stream::iter([text]).chain(stream::pending()))
                }
                None => ChatStream::from_fragments(["(no more responses)"]),
            }
        }

        async fn check_availability(&self) -> bool {
            true
        }

        async fn is_model_present(&self) -> bool {
            true
        }

        fn model(&self) -> &str {
            "mock-model"
        }

        fn endpoint(&self) -> &str {
            "mock://"
        }

        fn display_name(&self) -> &str {
            "MockBackend"
        }
    }

    /// Answers confirmations from a script and records what it saw.
    #[derive(Default)]
    struct ScriptedHandler {
        approvals: VecDeque<bool>,
        confirmed: Vec<String>,
        fragments: String,
        observations: Vec<String>,
        /// Cancelled on the first streamed fragment when set.
        cancel_on_fragment: Option<CancellationToken>,
    }

    impl ScriptedHandler {
        fn approving(answers: &[bool]) -> Self {
            Self {
                approvals: answers.iter().copied().collect(),
                ..Default::default()
            }
        }
    }

    impl TurnHandler for ScriptedHandler {
        fn on_fragment(&mut self, fragment: &str) {
            self.fragments.push_str(fragment);
            if let Some(token) = &self.cancel_on_fragment {
                token.cancel();
            }
        }

        fn confirm(&mut self, call: &ToolCall) -> bool {
            self.confirmed.push(call.name.clone());
            self.approvals.pop_front().unwrap_or(false)
        }

        fn on_observation(&mut self, _call: &ToolCall, observation: &str) {
            self.observations.push(observation.to_string());
        }
    }

    fn create_test_loop(backend: Arc<MockBackend>, dir: &tempfile::TempDir) -> AgentLoop {
        create_loop_with(backend, dir, Config::default())
    }

    fn create_loop_with(backend: Arc<MockBackend>, dir: &tempfile::TempDir, config: Config) -> AgentLoop {
        AgentLoop::new(backend, Sandbox::new(dir.path()).unwrap(), &config)
    }

    #[tokio::test]
    async fn test_simple_response() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MockBackend::texts(&["Hello from Octo!"]);
        let mut agent = create_test_loop(backend.clone(), &dir);
        let mut handler = ScriptedHandler::default();

        let outcome = agent
            .process_message("Hi", &mut handler, &CancellationToken::new())
            .await;

        assert_eq!(outcome, TurnOutcome::Completed { tool_rounds: 0 });
        assert_eq!(handler.fragments, "Hello from Octo!");
        let messages = agent.transcript().messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1], Message::user("Hi"));
        assert_eq!(messages[2], Message::assistant("Hello from Octo!"));
        assert_eq!(backend.request_count(), 1);
    }

    #[tokio::test]
    async fn test_list_files_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/a.py"), "print('a')").unwrap();

        let backend = MockBackend::texts(&[
            r#"Let me look. <tool_call:list_files path="src" />"#,
            "The src directory contains a.py.",
        ]);
        let mut agent = create_test_loop(backend.clone(), &dir);
        let mut handler = ScriptedHandler::default();

        let outcome = agent
            .process_message("list files in src", &mut handler, &CancellationToken::new())
            .await;

        assert_eq!(outcome, TurnOutcome::Completed { tool_rounds: 1 });
        // read-only tools never ask
        assert!(handler.confirmed.is_empty());

        // The re-prompt saw the observation as the last, user-role message.
        assert_eq!(backend.request_count(), 2);
        let second = backend.request(1);
        let last = second.last().unwrap();
        assert_eq!(last.role, Role::User);
        assert!(last.content.contains("a.py"));

        let roles: Vec<Role> = agent.transcript().messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
    }

    #[tokio::test]
    async fn test_denied_write_does_not_touch_disk_and_reprompts() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MockBackend::texts(&[
            r#"<tool_call:write_file path="out.txt">data</tool_call:write_file>"#,
            "Okay, I won't write it.",
        ]);
        let mut agent = create_test_loop(backend.clone(), &dir);
        let mut handler = ScriptedHandler::approving(&[false]);

        let outcome = agent
            .process_message("write out.txt", &mut handler, &CancellationToken::new())
            .await;

        assert_eq!(outcome, TurnOutcome::Completed { tool_rounds: 1 });
        assert_eq!(handler.confirmed, vec!["write_file"]);
        assert!(!dir.path().join("out.txt").exists());
        assert_eq!(backend.request_count(), 2);
        assert_eq!(
            backend.request(1).last().unwrap(),
            &Message::user(DENIED_OBSERVATION)
        );
    }

    #[tokio::test]
    async fn test_approved_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MockBackend::texts(&[
            concat!(
                "<tool_call:write_file path=\"notes/hello.txt\">Hello\nWorld</tool_call:write_file>\n",
                "<tool_call:read_file path=\"notes/hello.txt\" />",
            ),
            "Done.",
        ]);
        let mut agent = create_test_loop(backend, &dir);
        let mut handler = ScriptedHandler::approving(&[true]);

        agent
            .process_message("make a note", &mut handler, &CancellationToken::new())
            .await;

        assert_eq!(
            std::fs::read_to_string(dir.path().join("notes/hello.txt")).unwrap(),
            "Hello\nWorld"
        );
        assert_eq!(
            handler.observations,
            vec![
                "Successfully wrote 11 bytes to notes/hello.txt.".to_string(),
                "Hello\nWorld".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_auto_approve_skips_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MockBackend::texts(&[
            r#"<tool_call:write_file path="a.txt">x</tool_call:write_file>"#,
            "Done.",
        ]);
        let mut config = Config::default();
        config.agent.auto_approve = true;
        let mut agent = create_loop_with(backend, &dir, config);
        let mut handler = ScriptedHandler::default();

        agent
            .process_message("go", &mut handler, &CancellationToken::new())
            .await;

        assert!(handler.confirmed.is_empty());
        assert!(dir.path().join("a.txt").exists());
    }

    #[tokio::test]
    async fn test_unknown_tool_observation() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MockBackend::texts(&[r#"<tool_call:delete_all path="." />"#, "Sorry."]);
        let mut agent = create_test_loop(backend, &dir);
        let mut handler = ScriptedHandler::default();

        agent
            .process_message("clean up", &mut handler, &CancellationToken::new())
            .await;

        assert_eq!(handler.observations, vec!["Error: Tool 'delete_all' not found.".to_string()]);
    }

    #[tokio::test]
    async fn test_sandbox_violation_is_observation() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MockBackend::texts(&[r#"<tool_call:read_file path="../../etc/passwd" />"#, "Denied."]);
        let mut agent = create_test_loop(backend, &dir);
        let mut handler = ScriptedHandler::default();

        let outcome = agent
            .process_message("read passwd", &mut handler, &CancellationToken::new())
            .await;

        assert_eq!(outcome, TurnOutcome::Completed { tool_rounds: 1 });
        assert_eq!(
            handler.observations,
            vec!["Error: Access denied to ../../etc/passwd".to_string()]
        );
    }

    #[tokio::test]
    async fn test_interrupt_during_stream() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MockBackend::new(vec![Reply::Stall("Thinking about".into())]);
        let mut agent = create_test_loop(backend.clone(), &dir);
        let cancel = CancellationToken::new();
        let mut handler = ScriptedHandler {
            cancel_on_fragment: Some(cancel.clone()),
            ..Default::default()
        };

        let outcome = agent.process_message("question", &mut handler, &cancel).await;

        assert_eq!(outcome, TurnOutcome::Interrupted);
        assert_eq!(
            agent.transcript().last(),
            Some(&Message::assistant("Thinking about"))
        );
        assert_eq!(backend.request_count(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_stream_appends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MockBackend::texts(&["never seen"]);
        let mut agent = create_test_loop(backend, &dir);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = agent
            .process_message("hi", &mut ScriptedHandler::default(), &cancel)
            .await;

        assert_eq!(outcome, TurnOutcome::Interrupted);
        assert_eq!(agent.transcript().last(), Some(&Message::user("hi")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_interrupt_during_shell() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MockBackend::texts(&[
            concat!(
                "<tool_call:run_shell command=\"sleep 5\" />",
                "<tool_call:list_files />",
            ),
            "unreachable",
        ]);
        let mut agent = create_test_loop(backend.clone(), &dir);
        let mut handler = ScriptedHandler::approving(&[true]);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let outcome = agent.process_message("run it", &mut handler, &cancel).await;

        assert_eq!(outcome, TurnOutcome::Interrupted);
        assert!(started.elapsed() < std::time::Duration::from_secs(4));
        assert_eq!(handler.observations, vec![INTERRUPTED_OBSERVATION.to_string()]);
        assert_eq!(
            agent.transcript().last(),
            Some(&Message::user(INTERRUPTED_OBSERVATION))
        );
        assert_eq!(backend.request_count(), 1);
    }

    #[tokio::test]
    async fn test_round_limit() {
        let dir = tempfile::tempdir().unwrap();
        let looping = r#"<tool_call:list_files path="." />"#;
        let backend = MockBackend::texts(&[looping, looping, looping, looping]);
        let mut config = Config::default();
        config.agent.max_tool_rounds = 2;
        let mut agent = create_loop_with(backend.clone(), &dir, config);

        let outcome = agent
            .process_message("loop forever", &mut ScriptedHandler::default(), &CancellationToken::new())
            .await;

        assert_eq!(outcome, TurnOutcome::RoundLimit { tool_rounds: 2 });
        assert_eq!(backend.request_count(), 2);
    }

    #[tokio::test]
    async fn test_document_order_execution() {
        let dir = tempfile::tempdir().unwrap();
        let reply = concat!(
            "<tool_call:list_files path=\".\" />",
            "<tool_call:write_file path=\"new.txt\">hi</tool_call:write_file>",
        );

        // Default order runs the write before the listing.
        let backend = MockBackend::texts(&[reply, "done"]);
        let mut agent = create_test_loop(backend, &dir);
        let mut handler = ScriptedHandler::approving(&[true]);
        agent.process_message("go", &mut handler, &CancellationToken::new()).await;
        assert_eq!(handler.observations[1], "new.txt");

        // Document order lists first, before the file exists.
        let dir = tempfile::tempdir().unwrap();
        let backend = MockBackend::texts(&[reply, "done"]);
        let mut config = Config::default();
        config.agent.parse_order = ParseOrder::Document;
        let mut agent = create_loop_with(backend, &dir, config);
        let mut handler = ScriptedHandler::approving(&[true]);
        agent.process_message("go", &mut handler, &CancellationToken::new()).await;
        assert_eq!(handler.observations[0], "(empty directory)");
    }

    #[tokio::test]
    async fn test_add_file_to_context() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.py"), "print(1)").unwrap();
        let mut agent = create_test_loop(MockBackend::texts(&[]), &dir);

        agent.add_file_to_context("main.py").unwrap();
        assert_eq!(
            agent.transcript().last().unwrap().content,
            "Here is the content of main.py:\n--- FILE: main.py ---\nprint(1)\n--- END FILE ---"
        );

        let before = agent.transcript().len();
        let err = agent.add_file_to_context("missing.py").unwrap_err();
        assert_eq!(err, "Error: File missing.py not found.");
        assert_eq!(agent.transcript().len(), before);
    }

    #[test]
    fn test_system_prompt_lists_tools() {
        let dir = tempfile::tempdir().unwrap();
        let agent = create_test_loop(MockBackend::texts(&[]), &dir);
        let system = &agent.transcript().messages()[0];
        assert_eq!(system.role, Role::System);
        for name in ["read_file", "write_file", "list_files", "run_shell"] {
            assert!(system.content.contains(name));
        }
        assert_eq!(agent.model(), "mock-model");
        assert_eq!(agent.root(), dir.path().canonicalize().unwrap());
    }
}
