//! Tool execution seam.
//!
//! The [`ToolHost`] trait is the boundary between the turn loop and side
//! effects: the loop only ever sees canonical specs, calls, and JSON values.

pub mod errors;
mod empty;
mod mcp_host;

pub use empty::EmptyToolHost;
pub use errors::ToolError;
pub use mcp_host::McpToolHost;

use crate::model::{ToolCall, ToolSpec};
use serde_json::Value;
use std::future::Future;

/// Trait for tool execution hosts.
///
/// Implementations provide tool specifications and execute tool calls.
pub trait ToolHost: Send + Sync {
    /// The tool catalog visible to the model, fixed for this host's lifetime.
    fn specs(&self) -> &[ToolSpec];

    /// Execute a tool call.
    fn execute(&self, call: &ToolCall) -> impl Future<Output = Result<Value, ToolError>> + Send;
}
