//! CLI error types.

use thiserror::Error;

/// CLI errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration is invalid or missing required fields.
    #[error("config error: {0}")]
    Config(String),

    /// No API key available for the selected provider.
    #[error("no API key for provider '{provider}': set {env_var} or backend.api_key")]
    MissingApiKey {
        provider: String,
        env_var: &'static str,
    },

    /// No tool server endpoint configured.
    #[error("no tool server configured: set MCP_SERVER_URL or mcp.url")]
    MissingServerUrl,

    /// The provider name is not one of the supported backends.
    #[error(transparent)]
    UnknownProvider(#[from] runtime::UnknownProvider),

    /// The tool server session could not be established.
    #[error(transparent)]
    Mcp(#[from] runtime::McpError),

    /// The tool catalog could not be materialized.
    #[error(transparent)]
    Tool(#[from] runtime::ToolError),

    /// A turn failed terminally; the partial transcript was discarded by
    /// the caller.
    #[error(transparent)]
    Turn(#[from] runtime::TurnError),

    /// Guardrail configuration failed to load, or input was blocked.
    #[error(transparent)]
    Guardrail(#[from] guardrails::Error),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
