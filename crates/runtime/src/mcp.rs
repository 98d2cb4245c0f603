//! MCP (Model Context Protocol) tool-catalog client.
//!
//! Owns the session with the remote tool server, using the official rmcp
//! SDK over the streamable-HTTP transport: connect and handshake exactly
//! once, cache the tool catalog, invoke tools by name, tear down cleanly.
//!
//! # Example
//!
//! ```ignore
//! use runtime::McpClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = McpClient::new();
//! let catalog = client.connect("https://tools.example.com/mcp", &Default::default()).await?;
//! for tool in &catalog {
//!     println!("Tool: {}", tool.name);
//! }
//! # Ok(())
//! # }
//! ```

use crate::model::ToolSpec;
use crate::tools::ToolError;
use rmcp::{
    ServiceExt,
    model::{CallToolRequestParams, CallToolResult, Tool},
    service::{ClientInitializeError, RoleClient, RunningService},
    transport::{
        IntoTransport,
        streamable_http_client::{
            StreamableHttpClientTransport, StreamableHttpClientTransportConfig,
        },
    },
};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

/// Bound on transport setup plus the initialize handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors establishing or tearing down the tool-server session.
///
/// Faults during an individual invocation are reported as [`ToolError`]
/// instead, so the loop can hand them back to the model as data.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum McpError {
    /// Network or transport failure before the handshake completed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The server rejected or timed out the initialize handshake.
    #[error("handshake failed: {0}")]
    Handshake(String),
}

enum State {
    Disconnected,
    Ready(Session),
    Closed,
}

struct Session {
    service: RunningService<RoleClient, ()>,
    catalog: Vec<ToolSpec>,
}

/// A client session with one remote MCP server.
///
/// Lifecycle transitions are serialized behind a write lock, so concurrent
/// `connect` calls collapse into a single handshake with every caller
/// observing its result. Invocations take a read lock only long enough to
/// clone the peer handle, so they interleave freely.
pub struct McpClient {
    state: RwLock<State>,
}

impl McpClient {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::Disconnected),
        }
    }

    /// Connect to the server, perform the handshake, and fetch the catalog.
    ///
    /// Idempotent: calling this on an already-initialized client performs no
    /// second handshake and returns the cached catalog. Connecting a closed
    /// client opens a fresh session (and a fresh catalog).
    pub async fn connect(
        &self,
        endpoint: &str,
        headers: &HashMap<String, String>,
    ) -> Result<Vec<ToolSpec>, McpError> {
        let http = http_client(headers)?;
        let config = StreamableHttpClientTransportConfig::with_uri(endpoint.to_string());
        self.connect_with(endpoint, move || {
            StreamableHttpClientTransport::with_client(http, config)
        })
        .await
    }

    /// Transport-agnostic connect. The transport is only built when the
    /// client is not already `Ready`, so a repeat call never touches the
    /// wire.
    async fn connect_with<T, E, A>(
        &self,
        endpoint: &str,
        transport: impl FnOnce() -> T,
    ) -> Result<Vec<ToolSpec>, McpError>
    where
        T: IntoTransport<RoleClient, E, A>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let mut state = self.state.write().await;
        if let State::Ready(session) = &*state {
            tracing::debug!(tools = session.catalog.len(), "already connected");
            return Ok(session.catalog.clone());
        }

        tracing::info!(endpoint, "connecting to MCP server");

        let service = tokio::time::timeout(HANDSHAKE_TIMEOUT, ().serve(transport()))
            .await
            .map_err(|_| McpError::Handshake(format!("timed out after {HANDSHAKE_TIMEOUT:?}")))?
            .map_err(init_error)?;

        let response = service
            .list_tools(Default::default())
            .await
            .map_err(|e| McpError::Connection(e.to_string()))?;
        let catalog: Vec<ToolSpec> = response.tools.into_iter().map(ToolSpec::from).collect();

        tracing::info!(tools = catalog.len(), "connected to MCP server");

        *state = State::Ready(Session {
            service,
            catalog: catalog.clone(),
        });
        Ok(catalog)
    }

    /// Whether the handshake has completed and the session is usable.
    pub async fn is_connected(&self) -> bool {
        matches!(&*self.state.read().await, State::Ready(_))
    }

    /// The cached tool catalog. Never re-fetches; callers needing freshness
    /// must close and reconnect.
    pub async fn catalog(&self) -> Result<Vec<ToolSpec>, ToolError> {
        match &*self.state.read().await {
            State::Ready(session) => Ok(session.catalog.clone()),
            State::Disconnected | State::Closed => Err(ToolError::NotConnected),
        }
    }

    /// Invoke a tool by name and await its result.
    ///
    /// Unknown names fail fast against the cached catalog; transport
    /// failures and timeouts surface as [`ToolError`] values for the caller
    /// to downgrade into tool-result data. Calling before `connect` is a
    /// programming error (`ToolError::NotConnected`).
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Map<String, Value>>,
        timeout: Duration,
    ) -> Result<Value, ToolError> {
        let peer = {
            let state = self.state.read().await;
            match &*state {
                State::Ready(session) => {
                    if !session.catalog.iter().any(|spec| spec.name == name) {
                        return Err(ToolError::NotFound(name.to_string()));
                    }
                    session.service.peer().clone()
                }
                State::Disconnected | State::Closed => return Err(ToolError::NotConnected),
            }
        };

        tracing::debug!(tool = name, "calling tool");

        let params = CallToolRequestParams {
            name: name.to_string().into(),
            arguments,
            meta: None,
            task: None,
        };

        let result = tokio::time::timeout(timeout, peer.call_tool(params))
            .await
            .map_err(|_| ToolError::Timeout(timeout.as_millis() as u64))?
            .map_err(|e| ToolError::Transport(e.to_string()))?;

        result_to_value(result)
    }

    /// Close the session and release the transport.
    ///
    /// Idempotent; safe to call on an already-closed or broken session.
    pub async fn close(&self) {
        let mut state = self.state.write().await;
        if let State::Ready(session) = std::mem::replace(&mut *state, State::Closed) {
            tracing::info!("disconnecting from MCP server");
            let _ = session.service.cancel().await;
        }
    }
}

impl Default for McpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Tool> for ToolSpec {
    fn from(tool: Tool) -> Self {
        Self {
            name: tool.name.to_string(),
            description: tool
                .description
                .map(|d| d.to_string())
                .unwrap_or_default(),
            schema: Value::Object(tool.input_schema.as_ref().clone()),
        }
    }
}

/// Split initialize failures into transport-level faults and protocol-level
/// rejections. The wire dying mid-handshake is a [`McpError::Connection`];
/// a reachable server answering wrongly is a [`McpError::Handshake`].
fn init_error(e: ClientInitializeError) -> McpError {
    match &e {
        ClientInitializeError::TransportError { .. }
        | ClientInitializeError::ConnectionClosed(_) => McpError::Connection(e.to_string()),
        _ => McpError::Handshake(e.to_string()),
    }
}

fn http_client(headers: &HashMap<String, String>) -> Result<reqwest::Client, McpError> {
    use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

    let mut header_map = HeaderMap::new();
    for (key, value) in headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| McpError::Connection(format!("invalid header name {key:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| McpError::Connection(format!("invalid header value for {key}: {e}")))?;
        header_map.insert(name, value);
    }

    reqwest::Client::builder()
        .default_headers(header_map)
        .build()
        .map_err(|e| McpError::Connection(e.to_string()))
}

/// Flatten an MCP call result into one JSON value.
///
/// Prefers structured content when the server provides it; otherwise the
/// content blocks are serialized as-is. Server-side errors become
/// `ToolError::Execution` with the joined text of the error blocks.
fn result_to_value(result: CallToolResult) -> Result<Value, ToolError> {
    let content = serde_json::to_value(&result.content)
        .map_err(|e| ToolError::Execution(format!("serialize result: {e}")))?;

    if result.is_error.unwrap_or(false) {
        return Err(ToolError::Execution(content_text(&content)));
    }

    if let Some(structured) = result.structured_content {
        return Ok(structured);
    }
    Ok(content)
}

/// Join the text of serialized content blocks, one line per block.
fn content_text(content: &Value) -> String {
    match content {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::ServerHandler;
    use rmcp::model::{
        InitializeRequestParams, InitializeResult, ListToolsResult, PaginatedRequestParams,
        ServerCapabilities, ServerInfo,
    };
    use rmcp::service::{RequestContext, RoleServer};
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// In-process server advertising one tool and counting handshakes.
    #[derive(Clone)]
    struct StaticToolServer {
        handshakes: Arc<AtomicU32>,
    }

    impl ServerHandler for StaticToolServer {
        fn get_info(&self) -> ServerInfo {
            ServerInfo {
                capabilities: ServerCapabilities::builder().enable_tools().build(),
                ..Default::default()
            }
        }

        async fn initialize(
            &self,
            request: InitializeRequestParams,
            context: RequestContext<RoleServer>,
        ) -> Result<InitializeResult, rmcp::ErrorData> {
            self.handshakes.fetch_add(1, Ordering::SeqCst);
            if context.peer.peer_info().is_none() {
                context.peer.set_peer_info(request);
            }
            Ok(self.get_info())
        }

        async fn list_tools(
            &self,
            _request: Option<PaginatedRequestParams>,
            _context: RequestContext<RoleServer>,
        ) -> Result<ListToolsResult, rmcp::ErrorData> {
            let schema: Map<String, Value> = serde_json::from_value(json!({
                "type": "object",
                "properties": {"query": {"type": "string"}},
            }))
            .unwrap();
            Ok(ListToolsResult::with_all_items(vec![Tool::new(
                "lookup",
                "Search the knowledge base",
                schema,
            )]))
        }
    }

    #[tokio::test]
    async fn repeat_connect_performs_no_second_handshake() {
        let handshakes = Arc::new(AtomicU32::new(0));
        let handler = StaticToolServer {
            handshakes: Arc::clone(&handshakes),
        };

        let (client_io, server_io) = tokio::io::duplex(4096);
        tokio::spawn(async move {
            if let Ok(service) = handler.serve(server_io).await {
                let _ = service.waiting().await;
            }
        });

        let client = McpClient::new();
        let first = client
            .connect_with("in-process", move || client_io)
            .await
            .expect("first connect");
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].name, "lookup");
        assert!(client.is_connected().await);

        // The transport closure must not even run on a repeat connect.
        let second = client
            .connect_with("in-process", || -> tokio::io::DuplexStream {
                panic!("transport rebuilt for a repeat connect")
            })
            .await
            .expect("second connect");
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].name, first[0].name);
        assert_eq!(handshakes.load(Ordering::SeqCst), 1);

        client.close().await;
        assert!(!client.is_connected().await);
    }

    #[test]
    fn dropped_connection_is_a_connection_fault() {
        let err = init_error(ClientInitializeError::ConnectionClosed(
            "connection reset by peer".into(),
        ));
        assert!(matches!(err, McpError::Connection(_)));

        let err = init_error(ClientInitializeError::Cancelled);
        assert!(matches!(err, McpError::Handshake(_)));
    }

    #[tokio::test]
    async fn catalog_before_connect_is_a_local_fault() {
        let client = McpClient::new();
        assert!(matches!(
            client.catalog().await,
            Err(ToolError::NotConnected)
        ));
        assert!(!client.is_connected().await);
    }

    #[tokio::test]
    async fn invoke_before_connect_is_a_local_fault() {
        let client = McpClient::new();
        let result = client
            .call_tool("lookup", None, Duration::from_secs(1))
            .await;
        assert!(matches!(result, Err(ToolError::NotConnected)));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let client = McpClient::new();
        client.close().await;
        client.close().await;
        assert!(!client.is_connected().await);
    }

    #[test]
    fn content_text_joins_blocks() {
        let content = json!([
            {"type": "text", "text": "first"},
            {"type": "image", "data": "..."},
            {"type": "text", "text": "second"},
        ]);
        assert_eq!(content_text(&content), "first\nsecond");
    }
}
