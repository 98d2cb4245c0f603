//! LLM provider adapters.
//!
//! One adapter per supported backend, each converting between canonical
//! types and its provider's wire shape. The rest of the system only ever
//! sees canonical output; provider identity is never branched on outside
//! this module.

mod anthropic;
mod gemini;
mod openai;

pub use anthropic::ClaudeBackend;
pub use gemini::GeminiBackend;
pub use openai::OpenAiBackend;

use crate::model::{Backend, ModelError, ModelRequest, ModelResponse};
use std::fmt;
use std::str::FromStr;

/// The closed set of supported providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Claude,
    OpenAi,
    Gemini,
}

impl ProviderKind {
    pub fn all() -> [ProviderKind; 3] {
        [Self::Claude, Self::OpenAi, Self::Gemini]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
        }
    }

    /// The model used when configuration names none.
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Claude => "claude-sonnet-4-20250514",
            Self::OpenAi => "gpt-4o",
            Self::Gemini => "gemini-2.5-flash",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "claude" => Ok(Self::Claude),
            "openai" => Ok(Self::OpenAi),
            "gemini" => Ok(Self::Gemini),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

/// Error for provider names outside the supported set.
#[derive(Debug, thiserror::Error)]
#[error("unsupported provider '{0}'; available: claude, openai, gemini")]
pub struct UnknownProvider(pub String);

/// A selected provider backend.
///
/// Enum dispatch over the closed adapter set; this is the unit of provider
/// selection handed to a session.
#[derive(Clone)]
pub enum Provider {
    Claude(ClaudeBackend),
    OpenAi(OpenAiBackend),
    Gemini(GeminiBackend),
}

impl Provider {
    /// Build a backend of the given kind with its default or named model.
    pub fn new(kind: ProviderKind, api_key: impl Into<String>, model: Option<String>) -> Self {
        let model = model.unwrap_or_else(|| kind.default_model().to_string());
        match kind {
            ProviderKind::Claude => Self::Claude(ClaudeBackend::builder(api_key, model).build()),
            ProviderKind::OpenAi => Self::OpenAi(OpenAiBackend::new(api_key, model)),
            ProviderKind::Gemini => Self::Gemini(GeminiBackend::new(api_key, model)),
        }
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::Claude(_) => ProviderKind::Claude,
            Self::OpenAi(_) => ProviderKind::OpenAi,
            Self::Gemini(_) => ProviderKind::Gemini,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Claude(b) => b.fmt(f),
            Self::OpenAi(b) => b.fmt(f),
            Self::Gemini(b) => b.fmt(f),
        }
    }
}

impl Backend for Provider {
    async fn call(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        match self {
            Self::Claude(b) => b.call(request).await,
            Self::OpenAi(b) => b.call(request).await,
            Self::Gemini(b) => b.call(request).await,
        }
    }
}

/// Map a non-success HTTP status to a provider fault.
fn status_error(status: u16, body: String) -> ModelError {
    match status {
        401 | 403 => ModelError::Auth(body),
        429 => ModelError::RateLimit(body),
        _ => ModelError::Api { status, body },
    }
}

/// Map a reqwest send failure to a provider fault.
fn send_error(e: reqwest::Error) -> ModelError {
    if e.is_timeout() {
        ModelError::Timeout
    } else {
        ModelError::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_round_trips_names() {
        for kind in ProviderKind::all() {
            assert_eq!(kind.as_str().parse::<ProviderKind>().unwrap(), kind);
        }
        assert!("mistral".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn status_classes() {
        assert!(matches!(status_error(401, String::new()), ModelError::Auth(_)));
        assert!(matches!(
            status_error(429, String::new()),
            ModelError::RateLimit(_)
        ));
        assert!(matches!(
            status_error(500, String::new()),
            ModelError::Api { status: 500, .. }
        ));
    }
}
