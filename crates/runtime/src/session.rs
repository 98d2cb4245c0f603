//! The per-turn orchestration loop.
//!
//! A turn drives the model/tool cycle to a terminal state: send the
//! conversation to the backend, execute any tool calls it requests, feed the
//! results back, repeat under an iteration bound and a wall-clock deadline.
//! Faults local to one tool call become conversation content the model can
//! react to; only authentication failures, exhausted retries, and a lost tool
//! session abort the turn.

use crate::conversation::Conversation;
use crate::model::{
    Backend, Message, ModelError, ModelRequest, ModelResponse, ToolArguments, ToolCall,
    ToolChoice, ToolResult, ToolSpec, Usage,
};
use crate::tools::{ToolError, ToolHost};
use std::time::Duration;
use thiserror::Error;

/// Appended to the transcript when a turn runs out of iterations.
pub const ITERATION_LIMIT_MARKER: &str = "could not complete within the iteration budget";

// ─────────────────────────────────────────────────────────────────────────────
// Options
// ─────────────────────────────────────────────────────────────────────────────

/// Which half of a mixed response wins when a provider emits both final text
/// and tool calls. Provider behavior here is inconsistent, so it is a knob.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ToolPrecedence {
    /// Execute the tool calls and ignore the simultaneous text, unless none
    /// of the requested tools exist in the catalog.
    #[default]
    PreferTools,
    /// Take non-empty text as the final answer and skip the tool calls.
    PreferText,
}

/// Backoff schedule for retryable provider faults.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

/// Knobs for a single turn.
#[derive(Debug, Clone)]
pub struct TurnOptions {
    /// Maximum model/tool cycles before the turn gives up.
    pub max_iterations: u32,
    /// Timeout applied to each individual model call.
    pub call_timeout: Duration,
    /// Wall-clock bound on the whole turn, across all iterations and retries.
    pub turn_deadline: Option<Duration>,
    pub retry: RetryPolicy,
    pub tool_precedence: ToolPrecedence,
    /// How many recent messages to hand the backend per call. The
    /// authoritative transcript is never truncated.
    pub history_window: usize,
}

impl Default for TurnOptions {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            call_timeout: Duration::from_secs(60),
            turn_deadline: Some(Duration::from_secs(300)),
            retry: RetryPolicy::default(),
            tool_precedence: ToolPrecedence::default(),
            history_window: 10,
        }
    }
}

impl TurnOptions {
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_turn_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.turn_deadline = deadline;
        self
    }

    pub fn with_tool_precedence(mut self, precedence: ToolPrecedence) -> Self {
        self.tool_precedence = precedence;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Outcomes
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStatus {
    /// The model produced a final answer.
    Completed,
    /// The iteration bound was hit. Expected outcome, not a failure.
    IterationLimitReached,
}

/// A finished turn: the answer (if any) plus the full updated transcript.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub status: TurnStatus,
    pub final_text: Option<String>,
    pub history: Vec<Message>,
    /// Names of tools invoked, in execution order.
    pub tools_used: Vec<String>,
    pub usage: Usage,
    pub iterations: u32,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TurnErrorKind {
    #[error("provider fault: {0}")]
    Provider(ModelError),
    #[error("provider fault after retries: {0}")]
    RetriesExhausted(ModelError),
    #[error("turn deadline exceeded")]
    DeadlineExceeded,
    #[error("tool session lost: {0}")]
    ToolSession(ToolError),
}

/// A failed turn. The conversation accumulated so far is preserved; whether
/// to persist the partial exchange is the caller's call.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct TurnError {
    pub kind: TurnErrorKind,
    pub history: Vec<Message>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct TurnStats {
    usage: Usage,
    iterations: u32,
    tools_used: Vec<String>,
}

/// A backend plus a tool host, ready to run turns.
///
/// Turns are independent units of work; a shared tool host may serve many
/// sessions concurrently.
pub struct Session<B, T> {
    backend: B,
    tools: T,
    system: Option<String>,
    options: TurnOptions,
}

impl<B: Backend, T: ToolHost> Session<B, T> {
    pub fn new(backend: B, tools: T) -> Self {
        Self {
            backend,
            tools,
            system: None,
            options: TurnOptions::default(),
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_options(mut self, options: TurnOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &TurnOptions {
        &self.options
    }

    /// Run one user turn against the given history.
    ///
    /// Returns the final answer and the updated transcript, or a typed
    /// failure that still carries the transcript accumulated so far.
    pub async fn run_turn(
        &self,
        history: Vec<Message>,
        user_text: impl Into<String>,
    ) -> Result<TurnOutcome, TurnError> {
        let mut conversation = Conversation::new();
        conversation.extend(history);
        conversation.push(Message::user(user_text));

        let mut stats = TurnStats::default();
        let driven = match self.options.turn_deadline {
            Some(deadline) => {
                match tokio::time::timeout(deadline, self.drive(&mut conversation, &mut stats))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(TurnErrorKind::DeadlineExceeded),
                }
            }
            None => self.drive(&mut conversation, &mut stats).await,
        };

        match driven {
            Ok((status, final_text)) => Ok(TurnOutcome {
                status,
                final_text,
                history: conversation.into_messages(),
                tools_used: stats.tools_used,
                usage: stats.usage,
                iterations: stats.iterations,
            }),
            Err(kind) => Err(TurnError {
                kind,
                history: conversation.into_messages(),
            }),
        }
    }

    async fn drive(
        &self,
        conversation: &mut Conversation,
        stats: &mut TurnStats,
    ) -> Result<(TurnStatus, Option<String>), TurnErrorKind> {
        let specs = self.tools.specs();

        loop {
            let window = self.request_window(conversation);
            let response = self.call_model(&window, specs).await?;
            stats.usage.merge(response.usage);

            let message = response.message;
            let calls = message.tool_calls();
            let text = message.text();

            if calls.is_empty() {
                conversation.push(message);
                tracing::debug!(iterations = stats.iterations, "turn completed");
                return Ok((TurnStatus::Completed, Some(text)));
            }

            // Mixed text + tool calls. Tools win by default, but a batch of
            // calls naming only unknown tools is not worth executing when
            // there is text to return instead.
            let any_resolvable = calls
                .iter()
                .any(|call| specs.iter().any(|spec| spec.name == call.name));
            let take_text = !text.is_empty()
                && (self.options.tool_precedence == ToolPrecedence::PreferText || !any_resolvable);
            if take_text {
                conversation.push(message);
                return Ok((TurnStatus::Completed, Some(text)));
            }

            conversation.push(message);
            for call in &calls {
                tracing::debug!(tool = %call.name, id = %call.id, "executing tool call");
                let result = self.execute_call(call).await?;
                stats.tools_used.push(call.name.clone());
                conversation.push(Message::tool_result(result));
            }
            stats.iterations += 1;

            if stats.iterations >= self.options.max_iterations {
                tracing::warn!(
                    max_iterations = self.options.max_iterations,
                    "iteration budget exhausted"
                );
                conversation.push(Message::assistant(ITERATION_LIMIT_MARKER));
                return Ok((TurnStatus::IterationLimitReached, None));
            }
        }
    }

    fn request_window(&self, conversation: &Conversation) -> Vec<Message> {
        let mut window = Vec::new();
        if let Some(system) = &self.system {
            window.push(Message::system(system.clone()));
        }
        window.extend(conversation.recent(self.options.history_window).iter().cloned());
        window
    }

    async fn call_model(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<ModelResponse, TurnErrorKind> {
        let mut attempt = 0u32;
        loop {
            let request = ModelRequest {
                messages,
                tools,
                tool_choice: ToolChoice::Auto,
                timeout: self.options.call_timeout,
            };
            match self.backend.call(request).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.options.retry.max_retries => {
                    let delay = self.options.retry.delay(attempt);
                    tracing::warn!(error = %e, attempt, ?delay, "retrying provider call");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) if e.is_retryable() => return Err(TurnErrorKind::RetriesExhausted(e)),
                Err(e) => return Err(TurnErrorKind::Provider(e)),
            }
        }
    }

    /// One tool call to one result; never fewer, never more.
    ///
    /// Malformed arguments and per-call faults become failure results the
    /// model sees on the next iteration. A lost session is the only error
    /// that escapes.
    async fn execute_call(&self, call: &ToolCall) -> Result<ToolResult, TurnErrorKind> {
        if let ToolArguments::Malformed { error, .. } = &call.arguments {
            return Ok(ToolResult::failure(
                call.id.clone(),
                format!("malformed tool arguments: {error}"),
            ));
        }
        match self.tools.execute(call).await {
            Ok(value) => Ok(ToolResult::success(call.id.clone(), value)),
            Err(ToolError::NotConnected) => {
                Err(TurnErrorKind::ToolSession(ToolError::NotConnected))
            }
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "tool call failed");
                Ok(ToolResult::failure(call.id.clone(), e.to_string()))
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
