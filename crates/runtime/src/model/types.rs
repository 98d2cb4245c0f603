//! Canonical conversation and tool types (provider-agnostic).
//!
//! These types are the universal currency of the orchestration core.
//! Provider-specific wire shapes live in the adapter modules and never
//! escape them.

use super::errors::ModelError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;
use std::time::Duration;

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    /// Carries tool results back to the model.
    Tool,
}

/// Arguments attached to a tool call.
///
/// Providers that serialize arguments as a string can hand back text that
/// does not decode; the `Malformed` variant preserves it so the loop can
/// synthesize a failed result instead of aborting the turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolArguments {
    Parsed(Map<String, Value>),
    Malformed { raw: String, error: String },
}

impl ToolArguments {
    /// Empty argument map.
    pub fn empty() -> Self {
        Self::Parsed(Map::new())
    }

    /// Canonicalize an already-structured argument value.
    ///
    /// Tool arguments are a string-keyed map; anything else is treated as
    /// malformed rather than silently coerced.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Parsed(map),
            Value::Null => Self::Parsed(Map::new()),
            other => Self::Malformed {
                raw: other.to_string(),
                error: "expected a JSON object".to_string(),
            },
        }
    }

    /// Decode a string-serialized argument payload.
    pub fn from_raw(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Self::Parsed(Map::new());
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => Self::from_json(value),
            Err(e) => Self::Malformed {
                raw: raw.to_string(),
                error: e.to_string(),
            },
        }
    }

    pub fn as_map(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Parsed(map) => Some(map),
            Self::Malformed { .. } => None,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }

    /// The JSON value a provider should see when the call is echoed back.
    pub fn to_wire(&self) -> Value {
        match self {
            Self::Parsed(map) => Value::Object(map.clone()),
            Self::Malformed { raw, .. } => Value::String(raw.clone()),
        }
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlation token. Providers without native ids get one synthesized
    /// deterministically by their adapter.
    pub id: String,
    pub name: String,
    pub arguments: ToolArguments,
}

/// The result returned to the model after a tool call.
///
/// The two variants encode the invariant that an error message exists
/// exactly when the call failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResult {
    Success { tool_call_id: String, output: Value },
    Failure { tool_call_id: String, error: String },
}

impl ToolResult {
    pub fn success(tool_call_id: impl Into<String>, output: Value) -> Self {
        Self::Success {
            tool_call_id: tool_call_id.into(),
            output,
        }
    }

    pub fn failure(tool_call_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Failure {
            tool_call_id: tool_call_id.into(),
            error: error.into(),
        }
    }

    pub fn tool_call_id(&self) -> &str {
        match self {
            Self::Success { tool_call_id, .. } | Self::Failure { tool_call_id, .. } => tool_call_id,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }
}

/// A part of a message, which can be text or a tool interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Part {
    Text(String),
    ToolCall(ToolCall),
    ToolResult(ToolResult),
}

/// A message, consisting of a role and one or more parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![Part::Text(text.into())],
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    /// A tool-role message carrying one result.
    pub fn tool_result(result: ToolResult) -> Self {
        Self {
            role: Role::Tool,
            parts: vec![Part::ToolResult(result)],
        }
    }

    pub fn from_parts(role: Role, parts: Vec<Part>) -> Self {
        Self { role, parts }
    }

    /// Get combined text content from all text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Extract all tool calls from this message.
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::ToolCall(call) => Some(call.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn has_tool_calls(&self) -> bool {
        self.parts.iter().any(|p| matches!(p, Part::ToolCall(_)))
    }
}

/// A tool definition exposed to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    /// Empty when the server supplies none, never absent.
    pub description: String,
    /// JSON Schema for the tool's arguments.
    pub schema: Value,
}

/// How the model may choose tools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ToolChoice {
    /// Model decides whether to use tools.
    #[default]
    Auto,
    /// Model cannot use tools, even if provided.
    None,
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn merge(&mut self, other: Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// Everything needed for a model request.
#[derive(Debug, Clone)]
pub struct ModelRequest<'a> {
    pub messages: &'a [Message],
    pub tools: &'a [ToolSpec],
    pub tool_choice: ToolChoice,
    /// Per-call timeout, applied by the adapter to the outbound request.
    pub timeout: Duration,
}

/// The response from a model.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub message: Message,
    pub usage: Usage,
}

/// Trait for LLM provider backends.
pub trait Backend: Send + Sync {
    fn call(
        &self,
        request: ModelRequest<'_>,
    ) -> impl Future<Output = Result<ModelResponse, ModelError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_text_extraction() {
        let msg = Message {
            role: Role::Assistant,
            parts: vec![
                Part::Text("Hello ".into()),
                Part::ToolCall(ToolCall {
                    id: "1".into(),
                    name: "lookup".into(),
                    arguments: ToolArguments::empty(),
                }),
                Part::Text("world".into()),
            ],
        };
        assert_eq!(msg.text(), "Hello world");
    }

    #[test]
    fn message_tool_calls_extraction() {
        let msg = Message {
            role: Role::Assistant,
            parts: vec![
                Part::Text("Let me check".into()),
                Part::ToolCall(ToolCall {
                    id: "1".into(),
                    name: "search".into(),
                    arguments: ToolArguments::from_json(json!({"query": "EARS"})),
                }),
                Part::ToolCall(ToolCall {
                    id: "2".into(),
                    name: "fetch".into(),
                    arguments: ToolArguments::empty(),
                }),
            ],
        };
        let calls = msg.tool_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "search");
        assert_eq!(calls[1].name, "fetch");
    }

    #[test]
    fn arguments_from_raw_decodes_objects() {
        let args = ToolArguments::from_raw(r#"{"query": "traceability", "top_k": 5}"#);
        let map = args.as_map().unwrap();
        assert_eq!(map["query"], "traceability");
        assert_eq!(map["top_k"], 5);
    }

    #[test]
    fn arguments_from_raw_preserves_garbage() {
        let args = ToolArguments::from_raw("{not json");
        assert!(args.is_malformed());
        match &args {
            ToolArguments::Malformed { raw, .. } => assert_eq!(raw, "{not json"),
            ToolArguments::Parsed(_) => unreachable!(),
        }
        assert_eq!(args.to_wire(), json!("{not json"));
    }

    #[test]
    fn arguments_empty_string_is_empty_map() {
        let args = ToolArguments::from_raw("  ");
        assert!(args.as_map().unwrap().is_empty());
    }

    #[test]
    fn tool_result_error_iff_failure() {
        let ok = ToolResult::success("a", json!({"result": "Y"}));
        assert!(!ok.is_failure());
        let err = ToolResult::failure("b", "transport error: connection reset");
        assert!(err.is_failure());
        assert_eq!(err.tool_call_id(), "b");
    }
}
