//! Configuration loading from advisor.toml with environment fallbacks.

use crate::error::{Error, Result};
use guardrails::GuardrailConfig;
use runtime::{ProviderKind, RetryPolicy, TurnOptions};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Tool server connection.
    #[serde(default)]
    pub mcp: McpConfig,

    /// Backend provider selection.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Turn loop bounds.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Content screening.
    #[serde(default)]
    pub guardrails: GuardrailConfig,
}

#[derive(Debug, Deserialize, Default)]
pub struct McpConfig {
    /// Streamable-HTTP endpoint of the tool server.
    pub url: Option<String>,

    /// Extra headers sent on every request (e.g. authorization).
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct BackendConfig {
    /// Provider name: "claude", "openai", or "gemini".
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model identifier; the provider's default when unset.
    pub model: Option<String>,

    /// API key; the provider's environment variable when unset.
    pub api_key: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            api_key: None,
        }
    }
}

fn default_provider() -> String {
    "claude".to_string()
}

#[derive(Debug, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    #[serde(default = "default_turn_deadline_secs")]
    pub turn_deadline_secs: u64,
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            call_timeout_secs: default_call_timeout_secs(),
            turn_deadline_secs: default_turn_deadline_secs(),
            history_window: default_history_window(),
        }
    }
}

fn default_max_iterations() -> u32 {
    5
}

fn default_call_timeout_secs() -> u64 {
    60
}

fn default_turn_deadline_secs() -> u64 {
    300
}

fn default_history_window() -> usize {
    10
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml: &str) -> Result<Self> {
        toml::from_str(toml).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load the given file if it exists, defaults otherwise.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Tool server endpoint: config value, then `MCP_SERVER_URL`.
    pub fn server_url(&self) -> Result<String> {
        self.mcp
            .url
            .clone()
            .or_else(|| std::env::var("MCP_SERVER_URL").ok())
            .ok_or(Error::MissingServerUrl)
    }

    /// Selected provider, with an optional command-line override.
    pub fn provider_kind(&self, override_name: Option<&str>) -> Result<ProviderKind> {
        let name = override_name.unwrap_or(&self.backend.provider);
        Ok(name.parse()?)
    }

    /// API key for the given provider: config value, then the provider's
    /// environment variable.
    pub fn api_key(&self, kind: ProviderKind) -> Result<String> {
        let env_var = match kind {
            ProviderKind::Claude => "ANTHROPIC_API_KEY",
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Gemini => "GOOGLE_API_KEY",
        };
        self.backend
            .api_key
            .clone()
            .or_else(|| std::env::var(env_var).ok())
            .ok_or(Error::MissingApiKey {
                provider: kind.as_str().to_string(),
                env_var,
            })
    }

    /// Model identifier: `ADVISOR_MODEL`, then config, then provider default.
    pub fn model(&self) -> Option<String> {
        std::env::var("ADVISOR_MODEL")
            .ok()
            .or_else(|| self.backend.model.clone())
    }

    /// Turn options derived from the limits section.
    pub fn turn_options(&self) -> TurnOptions {
        TurnOptions {
            max_iterations: self.limits.max_iterations,
            call_timeout: Duration::from_secs(self.limits.call_timeout_secs),
            turn_deadline: Some(Duration::from_secs(self.limits.turn_deadline_secs)),
            retry: RetryPolicy::default(),
            tool_precedence: Default::default(),
            history_window: self.limits.history_window,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.backend.provider, "claude");
        assert_eq!(config.limits.max_iterations, 5);
        assert!(config.guardrails.enabled);
    }

    #[test]
    fn sections_parse() {
        let config = Config::parse(
            r#"
            [mcp]
            url = "http://localhost:8000/mcp"

            [backend]
            provider = "openai"
            model = "gpt-4o-mini"

            [limits]
            max_iterations = 3

            [guardrails]
            enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(config.mcp.url.as_deref(), Some("http://localhost:8000/mcp"));
        assert_eq!(config.backend.provider, "openai");
        assert_eq!(config.limits.max_iterations, 3);
        assert!(!config.guardrails.enabled);
        assert_eq!(
            config.turn_options().turn_deadline,
            Some(Duration::from_secs(300))
        );
    }

    #[test]
    fn unknown_provider_is_an_error() {
        let config = Config::parse("[backend]\nprovider = \"grok\"").unwrap();
        assert!(config.provider_kind(None).is_err());
        assert!(config.provider_kind(Some("gemini")).is_ok());
    }
}
