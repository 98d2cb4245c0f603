//! OpenAI chat-completions backend.
//!
//! Also speaks to any endpoint exposing the same `/chat/completions`
//! surface; override the base URL for compatible gateways.
//!
//! This API serializes tool-call arguments as a JSON *string*. The decode
//! step happens here, and undecodable payloads become
//! [`ToolArguments::Malformed`] so the loop can answer the call with a
//! synthetic failure instead of aborting the turn.

use crate::model::{
    Message, ModelError, ModelRequest, ModelResponse, Part, Role, ToolArguments, ToolCall,
    ToolChoice, ToolResult, ToolSpec, Usage,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const OPENAI_API_URL: &str = "https://api.openai.com/v1";

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    /// JSON-serialized argument object.
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ApiTool {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// OpenAI chat-completions backend.
#[derive(Clone)]
pub struct OpenAiBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiBackend {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: OPENAI_API_URL.to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Point at an OpenAI-compatible endpoint instead of the default.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn message_to_api(msg: &Message) -> Vec<ApiMessage> {
        match msg.role {
            Role::System => vec![ApiMessage {
                role: "system",
                content: Some(msg.text()),
                tool_calls: None,
                tool_call_id: None,
            }],
            Role::User => vec![ApiMessage {
                role: "user",
                content: Some(msg.text()),
                tool_calls: None,
                tool_call_id: None,
            }],
            Role::Assistant => {
                let text = msg.text();
                let calls: Vec<ApiToolCall> = msg
                    .tool_calls()
                    .into_iter()
                    .map(|call| ApiToolCall {
                        id: call.id,
                        call_type: "function".to_string(),
                        function: ApiFunction {
                            name: call.name,
                            arguments: serialize_arguments(&call.arguments),
                        },
                    })
                    .collect();
                vec![ApiMessage {
                    role: "assistant",
                    content: if text.is_empty() { None } else { Some(text) },
                    tool_calls: if calls.is_empty() { None } else { Some(calls) },
                    tool_call_id: None,
                }]
            }
            // One tool-role message per result, correlated by id.
            Role::Tool => msg
                .parts
                .iter()
                .filter_map(|part| match part {
                    Part::ToolResult(result) => Some(ApiMessage {
                        role: "tool",
                        content: Some(render_result(result)),
                        tool_calls: None,
                        tool_call_id: Some(result.tool_call_id().to_string()),
                    }),
                    _ => None,
                })
                .collect(),
        }
    }

    fn tool_to_api(spec: &ToolSpec) -> ApiTool {
        ApiTool {
            tool_type: "function",
            function: ApiToolFunction {
                name: spec.name.clone(),
                description: spec.description.clone(),
                parameters: spec.schema.clone(),
            },
        }
    }

    fn response_to_message(message: ApiResponseMessage) -> Message {
        let mut parts: Vec<Part> = Vec::new();
        if let Some(text) = message.content {
            if !text.is_empty() {
                parts.push(Part::Text(text));
            }
        }
        for call in message.tool_calls.unwrap_or_default() {
            parts.push(Part::ToolCall(ToolCall {
                id: call.id,
                name: call.function.name,
                arguments: ToolArguments::from_raw(&call.function.arguments),
            }));
        }
        Message {
            role: Role::Assistant,
            parts,
        }
    }
}

fn serialize_arguments(arguments: &ToolArguments) -> String {
    match arguments {
        ToolArguments::Parsed(map) => {
            serde_json::to_string(map).unwrap_or_else(|_| "{}".to_string())
        }
        ToolArguments::Malformed { raw, .. } => raw.clone(),
    }
}

fn render_result(result: &ToolResult) -> String {
    match result {
        ToolResult::Success { output, .. } => match output {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        },
        ToolResult::Failure { error, .. } => error.clone(),
    }
}

impl std::fmt::Display for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "openai({})", self.model)
    }
}

impl crate::model::Backend for OpenAiBackend {
    async fn call(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        let messages: Vec<ApiMessage> = request
            .messages
            .iter()
            .flat_map(Self::message_to_api)
            .collect();
        let tools: Vec<ApiTool> = request.tools.iter().map(Self::tool_to_api).collect();
        let tool_choice = if tools.is_empty() {
            None
        } else {
            Some(match request.tool_choice {
                ToolChoice::Auto => "auto",
                ToolChoice::None => "none",
            })
        };

        let api_request = ApiRequest {
            model: self.model.clone(),
            messages,
            tools,
            tool_choice,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
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

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::InvalidResponse("no choices in response".to_string()))?;

        let usage = api_response
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(ModelResponse {
            message: Self::response_to_message(choice.message),
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tools_nest_under_function_wrapper() {
        let spec = ToolSpec {
            name: "lookup".into(),
            description: "Search".into(),
            schema: json!({"type": "object"}),
        };
        let wire = serde_json::to_value(OpenAiBackend::tool_to_api(&spec)).unwrap();
        assert_eq!(wire["type"], "function");
        assert_eq!(wire["function"]["name"], "lookup");
        assert_eq!(wire["function"]["parameters"]["type"], "object");
    }

    #[test]
    fn response_round_trips_string_arguments() {
        let message: ApiResponseMessage = serde_json::from_value(json!({
            "content": null,
            "tool_calls": [{
                "id": "call_abc",
                "type": "function",
                "function": {"name": "lookup", "arguments": "{\"query\": \"X\"}"},
            }],
        }))
        .unwrap();

        let canonical = OpenAiBackend::response_to_message(message);
        let calls = canonical.tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_abc");
        assert_eq!(calls[0].arguments.as_map().unwrap()["query"], "X");

        // And back out: the assistant message re-serializes the same call.
        let wire = OpenAiBackend::message_to_api(&canonical);
        let call = &wire[0].tool_calls.as_ref().unwrap()[0];
        assert_eq!(call.function.name, "lookup");
        let args: Value = serde_json::from_str(&call.function.arguments).unwrap();
        assert_eq!(args["query"], "X");
    }

    #[test]
    fn undecodable_arguments_survive_as_malformed() {
        let message: ApiResponseMessage = serde_json::from_value(json!({
            "tool_calls": [{
                "id": "call_bad",
                "type": "function",
                "function": {"name": "lookup", "arguments": "{\"query\": "},
            }],
        }))
        .unwrap();

        let canonical = OpenAiBackend::response_to_message(message);
        let calls = canonical.tool_calls();
        assert!(calls[0].arguments.is_malformed());

        // The raw payload is echoed back verbatim when re-serialized.
        let wire = OpenAiBackend::message_to_api(&canonical);
        let call = &wire[0].tool_calls.as_ref().unwrap()[0];
        assert_eq!(call.function.arguments, "{\"query\": ");
    }

    #[test]
    fn tool_results_become_tool_role_messages() {
        let msg = Message::tool_result(ToolResult::success("call_abc", json!({"result": "Y"})));
        let wire = OpenAiBackend::message_to_api(&msg);
        assert_eq!(wire.len(), 1);
        assert_eq!(wire[0].role, "tool");
        assert_eq!(wire[0].tool_call_id.as_deref(), Some("call_abc"));
        assert_eq!(wire[0].content.as_deref(), Some(r#"{"result":"Y"}"#));
    }

    #[test]
    fn empty_assistant_text_is_omitted() {
        let message: ApiResponseMessage = serde_json::from_value(json!({
            "content": "",
            "tool_calls": [{
                "id": "c1",
                "type": "function",
                "function": {"name": "lookup", "arguments": "{}"},
            }],
        }))
        .unwrap();
        let canonical = OpenAiBackend::response_to_message(message);
        let wire = OpenAiBackend::message_to_api(&canonical);
        assert!(wire[0].content.is_none());
    }
}
