//! Session orchestrator: drives one user turn from prompt to final answer.
//!
//! # Turn state machine
//!
//! ```text
//! Idle ──prompt──▶ AwaitingFirstResponse ──▶ StreamingText ──────────────────────────▶ Idle
//!                                        └─▶ ToolDetected ──▶ AwaitingFollowupResponse
//!                                                               ──▶ AwaitingFollowupStream ──▶ Idle
//! ```
//!
//! The first request carries the capability catalog. If its response ends with a
//! completed tool call, the capability runs once, the conversation grows by one
//! `assistant` and one `tool` message, and a follow-up request is sent without the
//! catalog so the model has to answer in text. A tool call in the follow-up
//! response is ignored: a turn makes at most one capability round-trip.
//!
//! # Cancellation
//!
//! Every turn runs under a [`CancellationToken`] from
//! [`Session::begin_turn`]. The token is checked before each request, before the
//! capability runs, and at every read of a response body; a signalled token ends
//! the turn with [`Error::Cancelled`].
//!
//! ```rust,no_run
//! use search_chat::{ApiConfig, Session, WebSearch};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ApiConfig::from_env()?;
//! let session = Session::new(&config, Arc::new(WebSearch::new()?))?;
//!
//! let token = session.begin_turn();
//! let mut out = std::io::stdout();
//! session.ask("What's new in Rust 1.85?", &token, &mut out).await?;
//! # Ok(())
//! # }
//! ```

use crate::cancel::{CancellationToken, TurnController};
use crate::capability::{CapabilityExecutor, SearchArguments, SearchBackend, compose_tool_result};
use crate::config::{ApiConfig, RequestConfig};
use crate::decoder::decode;
use crate::prompt::system_prompt;
use crate::transport::{ByteStream, ChatTransport, HttpTransport};
use crate::types::{ChatRequest, Message, ToolCall};
use crate::{Error, Result};
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Where a turn currently is. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AwaitingFirstResponse,
    StreamingText,
    ToolDetected,
    AwaitingFollowupResponse,
    AwaitingFollowupStream,
}

/// What a finished turn produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// The conversation as it stood when the final answer finished streaming
    pub messages: Vec<Message>,
    /// The capability call made during the turn, if any
    pub tool_call: Option<ToolCall>,
}

impl TurnOutcome {
    pub fn used_tool(&self) -> bool {
        self.tool_call.is_some()
    }
}

/// Orchestrates turns against one chat endpoint.
///
/// All methods take `&self`; wrap the session in an `Arc` to run each turn on
/// its own task. The conversation of a turn lives inside that turn only.
pub struct Session {
    transport: Arc<dyn ChatTransport>,
    executor: CapabilityExecutor,
    request: RequestConfig,
    turns: TurnController,
    turn_timeout: Option<Duration>,
    status_lines: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("executor", &self.executor)
            .field("request", &self.request)
            .field("turns", &self.turns)
            .field("turn_timeout", &self.turn_timeout)
            .field("status_lines", &self.status_lines)
            .finish()
    }
}

impl Session {
    /// Creates a session talking HTTP to the configured endpoint.
    pub fn new(config: &ApiConfig, backend: Arc<dyn SearchBackend>) -> Result<Self> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::with_transport(Arc::new(transport), backend, config.request.clone())
            .with_turn_timeout(config.turn_timeout))
    }

    /// Creates a session over any transport.
    pub fn with_transport(
        transport: Arc<dyn ChatTransport>,
        backend: Arc<dyn SearchBackend>,
        request: RequestConfig,
    ) -> Self {
        Self {
            transport,
            executor: CapabilityExecutor::new(backend),
            request,
            turns: TurnController::new(),
            turn_timeout: None,
            status_lines: true,
        }
    }

    /// Limits how long a whole turn may take. Expiry signals the turn's token.
    pub fn with_turn_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.turn_timeout = timeout;
        self
    }

    /// Whether to write "Tool call detected" style status lines to the output.
    pub fn with_status_lines(mut self, enabled: bool) -> Self {
        self.status_lines = enabled;
        self
    }

    /// Starts a new turn, cancelling the one in flight.
    pub fn begin_turn(&self) -> CancellationToken {
        self.turns.begin_turn()
    }

    /// Cancels the turn in flight at session end.
    pub fn shutdown(&self) {
        self.turns.shutdown();
    }

    /// The messages a turn starts from.
    pub fn initial_messages(&self, prompt: &str) -> Vec<Message> {
        vec![
            Message::system(system_prompt(self.executor.declaration())),
            Message::user(prompt),
        ]
    }

    /// Runs one turn, streaming the answer into `out`.
    ///
    /// # Errors
    ///
    /// - [`Error::Transport`] when either request gets a non-success status
    /// - [`Error::MalformedToolArguments`] when the tool call cannot be parsed
    /// - [`Error::Cancelled`] when `token` is signalled
    /// - [`Error::Timeout`] when the configured turn deadline passes
    pub async fn ask<W>(
        &self,
        prompt: &str,
        token: &CancellationToken,
        out: &mut W,
    ) -> Result<TurnOutcome>
    where
        W: Write + Send + ?Sized,
    {
        let Some(timeout) = self.turn_timeout else {
            return self.run_turn(prompt, token, out).await;
        };

        let expired = Arc::new(AtomicBool::new(false));
        let watchdog = tokio::spawn({
            let token = token.clone();
            let expired = Arc::clone(&expired);
            async move {
                tokio::select! {
                    _ = tokio::time::sleep(timeout) => {
                        expired.store(true, Ordering::SeqCst);
                        token.signal();
                    }
                    _ = token.cancelled() => {}
                }
            }
        });

        let result = self.run_turn(prompt, token, out).await;
        watchdog.abort();

        match result {
            Err(Error::Cancelled) if expired.load(Ordering::SeqCst) => {
                log::debug!("turn {} exceeded {:?}", token.generation(), timeout);
                Err(Error::Timeout)
            }
            other => other,
        }
    }

    async fn run_turn<W>(
        &self,
        prompt: &str,
        token: &CancellationToken,
        out: &mut W,
    ) -> Result<TurnOutcome>
    where
        W: Write + Send + ?Sized,
    {
        let mut state = TurnState::Idle;
        let mut messages = self.initial_messages(prompt);

        self.transition(&mut state, TurnState::AwaitingFirstResponse, token);
        let catalog = self
            .executor
            .catalog()
            .into_iter()
            .map(|tool| tool.to_openai_format())
            .collect();
        let body = self.send(&messages, Some(catalog), token).await?;
        let call = decode(body, token, out).await?;

        if !call.is_complete() {
            self.transition(&mut state, TurnState::StreamingText, token);
            self.transition(&mut state, TurnState::Idle, token);
            return Ok(TurnOutcome {
                messages,
                tool_call: None,
            });
        }

        self.transition(&mut state, TurnState::ToolDetected, token);
        ensure_active(token)?;
        self.status(out, "\nTool call detected, handling...\n")?;

        let arguments = SearchArguments::parse(&call)?;
        self.status(out, "\nSearching the web for more information...\n\n")?;

        let documents = until_cancelled(
            token,
            self.executor.execute(&call.function.name, &arguments.query),
        )
        .await?;

        messages.push(Message::assistant_tool_call(call.clone()));
        messages.push(Message::tool_result(&call, compose_tool_result(&documents)));

        ensure_active(token)?;
        self.transition(&mut state, TurnState::AwaitingFollowupResponse, token);
        let body = self.send(&messages, None, token).await?;

        self.transition(&mut state, TurnState::AwaitingFollowupStream, token);
        let ignored = decode(body, token, out).await?;
        if ignored.is_complete() {
            log::debug!(
                "ignoring tool call {} ({}) in follow-up response",
                ignored.id,
                ignored.function.name
            );
        }

        self.transition(&mut state, TurnState::Idle, token);
        Ok(TurnOutcome {
            messages,
            tool_call: Some(call),
        })
    }

    async fn send(
        &self,
        messages: &[Message],
        tools: Option<Vec<serde_json::Value>>,
        token: &CancellationToken,
    ) -> Result<ByteStream> {
        ensure_active(token)?;
        let request = ChatRequest {
            config: &self.request,
            messages,
            tools,
        };
        until_cancelled(token, self.transport.send(&request)).await?
    }

    fn transition(&self, state: &mut TurnState, next: TurnState, token: &CancellationToken) {
        log::debug!("turn {}: {:?} -> {:?}", token.generation(), state, next);
        *state = next;
    }

    fn status<W>(&self, out: &mut W, line: &str) -> Result<()>
    where
        W: Write + ?Sized,
    {
        if self.status_lines {
            out.write_all(line.as_bytes())?;
            out.flush()?;
        }
        Ok(())
    }
}

fn ensure_active(token: &CancellationToken) -> Result<()> {
    if token.is_signaled() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}

/// Awaits `work` unless the token is signalled first.
async fn until_cancelled<F, T>(token: &CancellationToken, work: F) -> Result<T>
where
    F: Future<Output = T>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Error::Cancelled),
        value = work => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageRole;
    use async_trait::async_trait;

    struct Unreachable;

    #[async_trait]
    impl ChatTransport for Unreachable {
        async fn send(&self, _request: &ChatRequest<'_>) -> Result<ByteStream> {
            Err(Error::other("transport should not be used"))
        }
    }

    #[async_trait]
    impl SearchBackend for Unreachable {
        async fn search(&self, _query: &str) -> Vec<String> {
            Vec::new()
        }
    }

    fn session() -> Session {
        Session::with_transport(
            Arc::new(Unreachable),
            Arc::new(Unreachable),
            RequestConfig::new("test-model"),
        )
    }

    #[test]
    fn test_initial_messages() {
        let messages = session().initial_messages("What is Rust?");

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::System);
        assert!(messages[0].content.as_deref().unwrap().contains("webSearch"));
        assert_eq!(messages[1], Message::user("What is Rust?"));
    }

    #[test]
    fn test_begin_turn_cancels_previous() {
        let session = session();
        let first = session.begin_turn();
        let second = session.begin_turn();

        assert!(first.is_signaled());
        assert!(!second.is_signaled());

        session.shutdown();
        assert!(second.is_signaled());
    }

    #[tokio::test]
    async fn test_signaled_token_sends_nothing() {
        let session = session();
        let token = session.begin_turn();
        token.signal();

        let mut out = Vec::new();
        let err = session.ask("hi", &token, &mut out).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_until_cancelled_prefers_cancellation() {
        let token = CancellationToken::default();
        token.signal();
        let result = until_cancelled(&token, async { 42 }).await;
        assert!(matches!(result, Err(Error::Cancelled)));

        let live = CancellationToken::default();
        assert_eq!(until_cancelled(&live, async { 42 }).await.unwrap(), 42);
    }
}
