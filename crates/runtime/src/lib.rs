//! Multi-provider tool-calling orchestration engine.
//!
//! The core pieces:
//!
//! - [`mcp::McpClient`]: stateful session with an MCP tool server
//!   (handshake, catalog fetch, tool invocation).
//! - [`model`]: provider-neutral conversation, tool, and backend types.
//! - [`providers`]: adapters translating the canonical shapes to and from
//!   the Anthropic, OpenAI, and Gemini wire formats.
//! - [`session::Session`]: the per-turn loop that drives model calls and
//!   tool executions to a final answer under iteration and deadline bounds.

pub mod conversation;
pub mod mcp;
pub mod model;
pub mod providers;
pub mod session;
pub mod tools;

pub use conversation::Conversation;
pub use mcp::{McpClient, McpError};
pub use model::{
    Backend, Message, ModelError, ModelRequest, ModelResponse, Part, Role, ToolArguments,
    ToolCall, ToolChoice, ToolResult, ToolSpec, Usage,
};
pub use providers::{Provider, ProviderKind, UnknownProvider};
pub use session::{
    ITERATION_LIMIT_MARKER, RetryPolicy, Session, ToolPrecedence, TurnError, TurnErrorKind,
    TurnOptions, TurnOutcome, TurnStatus,
};
pub use tools::{EmptyToolHost, McpToolHost, ToolError, ToolHost};
