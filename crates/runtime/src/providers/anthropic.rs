//! Anthropic messages-API backend.

use crate::model::{
    Message, ModelError, ModelRequest, ModelResponse, Part, Role, ToolArguments, ToolCall,
    ToolChoice, ToolResult, ToolSpec, Usage,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ApiToolChoice>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ApiToolChoice {
    Auto,
    None,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: ApiContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ApiContent {
    Text(String),
    Blocks(Vec<ApiContentBlock>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

#[derive(Debug, Serialize)]
struct ApiTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ApiResponseBlock>,
    usage: ApiUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    input_tokens: u32,
    output_tokens: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for creating a Claude backend.
#[derive(Debug, Clone)]
pub struct ClaudeBackendBuilder {
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl ClaudeBackendBuilder {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: 4096,
        }
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn build(self) -> ClaudeBackend {
        ClaudeBackend {
            client: reqwest::Client::new(),
            api_key: self.api_key,
            model: self.model,
            max_tokens: self.max_tokens,
        }
    }
}

/// Anthropic messages-API backend.
#[derive(Clone)]
pub struct ClaudeBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl ClaudeBackend {
    pub fn builder(
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> ClaudeBackendBuilder {
        ClaudeBackendBuilder::new(api_key, model)
    }

    fn role_to_api(role: Role) -> &'static str {
        match role {
            // Tool results travel in user-role messages on this API.
            Role::User | Role::Tool | Role::System => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Join system-role messages into the request's top-level system prompt.
    fn split_system(messages: &[Message]) -> (Option<String>, Vec<&Message>) {
        let mut system_parts: Vec<String> = Vec::new();
        let mut rest: Vec<&Message> = Vec::new();
        for message in messages {
            if message.role == Role::System {
                system_parts.push(message.text());
            } else {
                rest.push(message);
            }
        }
        let system = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        };
        (system, rest)
    }

    fn message_to_api(msg: &Message) -> ApiMessage {
        let role = Self::role_to_api(msg.role);

        // Simple case: single text part
        if msg.parts.len() == 1 {
            if let Part::Text(text) = &msg.parts[0] {
                return ApiMessage {
                    role,
                    content: ApiContent::Text(text.clone()),
                };
            }
        }

        // Complex case: multiple parts or non-text
        ApiMessage {
            role,
            content: ApiContent::Blocks(Self::parts_to_blocks(&msg.parts)),
        }
    }

    /// Convert canonical messages, folding consecutive tool-result messages
    /// into one user message. The API requires every result for an assistant
    /// tool_use turn to arrive in the single user message that follows it.
    fn messages_to_api(messages: &[&Message]) -> Vec<ApiMessage> {
        let mut api: Vec<ApiMessage> = Vec::with_capacity(messages.len());
        let mut prev_tool = false;
        for msg in messages {
            if msg.role == Role::Tool {
                let blocks = Self::parts_to_blocks(&msg.parts);
                match api.last_mut() {
                    Some(ApiMessage {
                        content: ApiContent::Blocks(existing),
                        ..
                    }) if prev_tool => existing.extend(blocks),
                    _ => api.push(ApiMessage {
                        role: "user",
                        content: ApiContent::Blocks(blocks),
                    }),
                }
                prev_tool = true;
            } else {
                api.push(Self::message_to_api(msg));
                prev_tool = false;
            }
        }
        api
    }

    fn parts_to_blocks(parts: &[Part]) -> Vec<ApiContentBlock> {
        parts
            .iter()
            .map(|part| match part {
                Part::Text(text) => ApiContentBlock::Text { text: text.clone() },
                Part::ToolCall(call) => ApiContentBlock::ToolUse {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    input: call.arguments.to_wire(),
                },
                Part::ToolResult(result) => {
                    let (tool_use_id, content, is_error) = match result {
                        ToolResult::Success {
                            tool_call_id,
                            output,
                        } => (tool_call_id.clone(), render_output(output), false),
                        ToolResult::Failure {
                            tool_call_id,
                            error,
                        } => (tool_call_id.clone(), error.clone(), true),
                    };
                    ApiContentBlock::ToolResult {
                        tool_use_id,
                        content,
                        is_error,
                    }
                }
            })
            .collect()
    }

    fn tool_to_api(spec: &ToolSpec) -> ApiTool {
        ApiTool {
            name: spec.name.clone(),
            description: spec.description.clone(),
            input_schema: spec.schema.clone(),
        }
    }

    fn response_to_message(blocks: Vec<ApiResponseBlock>) -> Message {
        let parts: Vec<Part> = blocks
            .into_iter()
            .filter_map(|block| match block {
                ApiResponseBlock::Text { text } => Some(Part::Text(text)),
                ApiResponseBlock::ToolUse { id, name, input } => Some(Part::ToolCall(ToolCall {
                    id,
                    name,
                    arguments: ToolArguments::from_json(input),
                })),
                ApiResponseBlock::Unknown => None,
            })
            .collect();

        Message {
            role: Role::Assistant,
            parts,
        }
    }
}

fn render_output(output: &Value) -> String {
    match output {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl std::fmt::Display for ClaudeBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "claude({})", self.model)
    }
}

impl crate::model::Backend for ClaudeBackend {
    async fn call(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        let (system, messages) = Self::split_system(request.messages);
        let api_messages = Self::messages_to_api(&messages);

        let tools: Vec<ApiTool> = request.tools.iter().map(Self::tool_to_api).collect();
        let tool_choice = if tools.is_empty() {
            None
        } else {
            Some(match request.tool_choice {
                ToolChoice::Auto => ApiToolChoice::Auto,
                ToolChoice::None => ApiToolChoice::None,
            })
        };

        let api_request = ApiRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: api_messages,
            system,
            tools,
            tool_choice,
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .header("accept", "application/json")
            .timeout(request.timeout)
            .json(&api_request)
            .send()
            .await
            .map_err(super::send_error)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(super::status_error(status, body));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        let message = Self::response_to_message(api_response.content);
        let usage = Usage {
            input_tokens: api_response.usage.input_tokens,
            output_tokens: api_response.usage.output_tokens,
        };

        Ok(ModelResponse { message, usage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lookup_spec() -> ToolSpec {
        ToolSpec {
            name: "lookup".into(),
            description: "Search the knowledge base".into(),
            schema: json!({
                "type": "object",
                "properties": {"query": {"type": "string"}},
            }),
        }
    }

    #[test]
    fn tools_serialize_with_input_schema_key() {
        let api = ClaudeBackend::tool_to_api(&lookup_spec());
        let wire = serde_json::to_value(&api).unwrap();
        assert_eq!(wire["name"], "lookup");
        assert_eq!(wire["input_schema"]["type"], "object");
    }

    #[test]
    fn response_round_trips_tool_calls() {
        // A synthetic provider response referencing the advertised tool.
        let blocks: Vec<ApiResponseBlock> = serde_json::from_value(json!([
            {"type": "text", "text": "Checking."},
            {"type": "tool_use", "id": "toolu_01", "name": "lookup", "input": {"query": "X"}},
        ]))
        .unwrap();

        let message = ClaudeBackend::response_to_message(blocks);
        let calls = message.tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "toolu_01");
        assert_eq!(calls[0].name, "lookup");
        assert_eq!(calls[0].arguments.as_map().unwrap()["query"], "X");
        assert_eq!(message.text(), "Checking.");
    }

    #[test]
    fn system_messages_become_the_system_prompt() {
        let messages = vec![
            Message::system("You are an advisor."),
            Message::user("hi"),
        ];
        let (system, rest) = ClaudeBackend::split_system(&messages);
        assert_eq!(system.as_deref(), Some("You are an advisor."));
        assert_eq!(rest.len(), 1);
    }

    #[test]
    fn tool_results_become_user_role_blocks() {
        let msg = Message::tool_result(ToolResult::failure("toolu_01", "transport error: reset"));
        let api = ClaudeBackend::message_to_api(&msg);
        assert_eq!(api.role, "user");
        let wire = serde_json::to_value(&api.content).unwrap();
        assert_eq!(wire[0]["type"], "tool_result");
        assert_eq!(wire[0]["tool_use_id"], "toolu_01");
        assert_eq!(wire[0]["is_error"], true);
    }

    #[test]
    fn successful_result_omits_is_error() {
        let msg = Message::tool_result(ToolResult::success("toolu_02", json!({"result": "Y"})));
        let api = ClaudeBackend::message_to_api(&msg);
        let wire = serde_json::to_value(&api.content).unwrap();
        assert_eq!(wire[0]["content"], r#"{"result":"Y"}"#);
        assert!(wire[0].get("is_error").is_none());
    }

    #[test]
    fn batched_results_share_one_user_message() {
        let messages = vec![
            Message::user("check both feeds"),
            Message {
                role: Role::Assistant,
                parts: vec![
                    Part::ToolCall(ToolCall {
                        id: "toolu_01".into(),
                        name: "lookup".into(),
                        arguments: ToolArguments::from_json(json!({"query": "a"})),
                    }),
                    Part::ToolCall(ToolCall {
                        id: "toolu_02".into(),
                        name: "lookup".into(),
                        arguments: ToolArguments::from_json(json!({"query": "b"})),
                    }),
                ],
            },
            Message::tool_result(ToolResult::success("toolu_01", json!("A"))),
            Message::tool_result(ToolResult::success("toolu_02", json!("B"))),
        ];
        let refs: Vec<&Message> = messages.iter().collect();

        let api = ClaudeBackend::messages_to_api(&refs);

        // Both results must land in the single user message after the
        // assistant turn, not in two consecutive user messages.
        assert_eq!(api.len(), 3);
        assert_eq!(api[2].role, "user");
        let wire = serde_json::to_value(&api[2].content).unwrap();
        let blocks = wire.as_array().unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0]["tool_use_id"], "toolu_01");
        assert_eq!(blocks[1]["tool_use_id"], "toolu_02");
    }

    #[test]
    fn unknown_response_blocks_are_skipped() {
        let blocks: Vec<ApiResponseBlock> = serde_json::from_value(json!([
            {"type": "thinking", "thinking": "..."},
            {"type": "text", "text": "done"},
        ]))
        .unwrap();
        let message = ClaudeBackend::response_to_message(blocks);
        assert_eq!(message.parts.len(), 1);
    }
}
