use thiserror::Error;

/// Errors that can occur during tool execution.
///
/// Everything except `NotConnected` is downgraded by the turn loop into a
/// failed [`ToolResult`](crate::model::ToolResult) so the model can react to
/// it; `NotConnected` is a local programming fault and aborts the turn.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),

    #[error("tool session not initialized")]
    NotConnected,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("transport error: timed out after {0}ms")]
    Timeout(u64),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("execution failed: {0}")]
    Execution(String),
}
