//! MCP-backed tool host.

use super::{ToolError, ToolHost};
use crate::mcp::McpClient;
use crate::model::{ToolArguments, ToolCall, ToolSpec};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Tool host backed by a connected [`McpClient`].
///
/// The catalog is snapshotted at construction, so descriptors handed to a
/// turn stay fixed even if the shared client reconnects underneath.
pub struct McpToolHost {
    client: Arc<McpClient>,
    specs: Vec<ToolSpec>,
    call_timeout: Duration,
}

impl McpToolHost {
    /// Snapshot the client's catalog and build a host for one or more turns.
    ///
    /// Fails if the client has not completed its handshake.
    pub async fn new(client: Arc<McpClient>, call_timeout: Duration) -> Result<Self, ToolError> {
        let specs = client.catalog().await?;
        Ok(Self {
            client,
            specs,
            call_timeout,
        })
    }
}

impl ToolHost for McpToolHost {
    fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    async fn execute(&self, call: &ToolCall) -> Result<Value, ToolError> {
        let arguments = match &call.arguments {
            ToolArguments::Parsed(map) => {
                if map.is_empty() {
                    None
                } else {
                    Some(map.clone())
                }
            }
            ToolArguments::Malformed { error, .. } => {
                return Err(ToolError::InvalidInput(error.clone()));
            }
        };

        self.client
            .call_tool(&call.name, arguments, self.call_timeout)
            .await
    }
}
