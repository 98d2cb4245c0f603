//! Google Gemini generateContent backend.
//!
//! Differences from the other adapters this module absorbs:
//! - `contents`/`parts` instead of `messages`; roles are `user` and `model`.
//! - The system prompt travels as a top-level `system_instruction`.
//! - The API key is a query parameter, not a header.
//! - `functionCall` parts carry no call id; ids are synthesized
//!   deterministically from the tool name and ordinal position, and
//!   `functionResponse` parts are addressed by tool *name*, recovered from
//!   the assistant calls earlier in the conversation.

use crate::model::{
    Message, ModelError, ModelRequest, ModelResponse, Part, Role, ToolArguments, ToolCall,
    ToolChoice, ToolResult, ToolSpec, Usage,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiRequest {
    contents: Vec<ApiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<ApiSystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ApiToolDeclarations>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_config: Option<ApiToolConfig>,
}

#[derive(Debug, Serialize)]
struct ApiSystemInstruction {
    parts: Vec<ApiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiContent {
    role: String,
    #[serde(default)]
    parts: Vec<ApiPart>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<ApiFunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<ApiFunctionResponse>,
}

impl ApiPart {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiToolDeclarations {
    function_declarations: Vec<ApiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct ApiFunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiToolConfig {
    function_calling_config: ApiFunctionCallingConfig,
}

#[derive(Debug, Serialize)]
struct ApiFunctionCallingConfig {
    mode: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
    #[serde(default)]
    usage_metadata: Option<ApiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct ApiCandidate {
    #[serde(default)]
    content: Option<ApiContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Google Gemini generateContent backend.
#[derive(Clone)]
pub struct GeminiBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiBackend {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Separate system messages into `system_instruction` and map the rest
    /// onto `contents`.
    fn conversation_to_api(messages: &[Message]) -> (Option<ApiSystemInstruction>, Vec<ApiContent>) {
        let mut system_parts: Vec<String> = Vec::new();
        let mut contents: Vec<ApiContent> = Vec::new();
        // Call ids seen so far, for addressing results by tool name.
        let mut call_names: HashMap<String, String> = HashMap::new();

        for message in messages {
            match message.role {
                Role::System => system_parts.push(message.text()),
                Role::User => contents.push(ApiContent {
                    role: "user".to_string(),
                    parts: vec![ApiPart::text(message.text())],
                }),
                Role::Assistant => {
                    let parts: Vec<ApiPart> = message
                        .parts
                        .iter()
                        .filter_map(|part| match part {
                            Part::Text(text) => Some(ApiPart::text(text.clone())),
                            Part::ToolCall(call) => {
                                call_names.insert(call.id.clone(), call.name.clone());
                                Some(ApiPart {
                                    function_call: Some(ApiFunctionCall {
                                        name: call.name.clone(),
                                        args: call.arguments.to_wire(),
                                    }),
                                    ..ApiPart::default()
                                })
                            }
                            Part::ToolResult(_) => None,
                        })
                        .collect();
                    contents.push(ApiContent {
                        role: "model".to_string(),
                        parts,
                    });
                }
                Role::Tool => {
                    let parts: Vec<ApiPart> = message
                        .parts
                        .iter()
                        .filter_map(|part| match part {
                            Part::ToolResult(result) => {
                                let name = call_names
                                    .get(result.tool_call_id())
                                    .cloned()
                                    .or_else(|| name_from_call_id(result.tool_call_id()))
                                    .unwrap_or_default();
                                Some(ApiPart {
                                    function_response: Some(ApiFunctionResponse {
                                        name,
                                        response: render_response(result),
                                    }),
                                    ..ApiPart::default()
                                })
                            }
                            _ => None,
                        })
                        .collect();
                    contents.push(ApiContent {
                        role: "user".to_string(),
                        parts,
                    });
                }
            }
        }

        let system_instruction = if system_parts.is_empty() {
            None
        } else {
            Some(ApiSystemInstruction {
                parts: vec![ApiPart::text(system_parts.join("\n\n"))],
            })
        };

        (system_instruction, contents)
    }

    fn tools_to_api(tools: &[ToolSpec]) -> Option<Vec<ApiToolDeclarations>> {
        if tools.is_empty() {
            return None;
        }
        Some(vec![ApiToolDeclarations {
            function_declarations: tools
                .iter()
                .map(|spec| ApiFunctionDeclaration {
                    name: spec.name.clone(),
                    description: spec.description.clone(),
                    parameters: spec.schema.clone(),
                })
                .collect(),
        }])
    }

    fn response_to_message(candidate: Option<ApiCandidate>) -> Message {
        let parts = candidate
            .and_then(|c| c.content)
            .map(|content| content.parts)
            .unwrap_or_default();

        let mut canonical: Vec<Part> = Vec::new();
        let mut ordinal = 0usize;
        for part in parts {
            if let Some(text) = part.text {
                if !text.is_empty() {
                    canonical.push(Part::Text(text));
                }
            }
            if let Some(call) = part.function_call {
                // No native id on this API; synthesize one deterministically.
                let id = synthesize_call_id(&call.name, ordinal);
                ordinal += 1;
                canonical.push(Part::ToolCall(ToolCall {
                    id,
                    name: call.name,
                    arguments: ToolArguments::from_json(call.args),
                }));
            }
        }

        Message {
            role: Role::Assistant,
            parts: canonical,
        }
    }
}

fn synthesize_call_id(name: &str, ordinal: usize) -> String {
    format!("gemini:{name}:{ordinal}")
}

/// Recover the tool name from a synthesized id when the originating call is
/// outside the truncation window.
fn name_from_call_id(id: &str) -> Option<String> {
    let rest = id.strip_prefix("gemini:")?;
    let (name, _) = rest.rsplit_once(':')?;
    Some(name.to_string())
}

/// `functionResponse.response` must be an object; wrap scalars.
fn render_response(result: &ToolResult) -> Value {
    match result {
        ToolResult::Success { output, .. } => match output {
            Value::Object(_) => output.clone(),
            other => json!({ "result": other }),
        },
        ToolResult::Failure { error, .. } => json!({ "error": error }),
    }
}

impl std::fmt::Display for GeminiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gemini({})", self.model)
    }
}

impl crate::model::Backend for GeminiBackend {
    async fn call(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        let (system_instruction, contents) = Self::conversation_to_api(request.messages);
        let tools = Self::tools_to_api(request.tools);
        let tool_config = tools.as_ref().map(|_| ApiToolConfig {
            function_calling_config: ApiFunctionCallingConfig {
                mode: match request.tool_choice {
                    ToolChoice::Auto => "AUTO",
                    ToolChoice::None => "NONE",
                },
            },
        });

        let api_request = ApiRequest {
            contents,
            system_instruction,
            tools,
            tool_config,
        };

        let url = format!(
            "{GEMINI_API_URL}/models/{}:generateContent?key={}",
            self.model, self.api_key
        );

        let response = self
            .client
            .post(url)
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

        let usage = api_response
            .usage_metadata
            .map(|u| Usage {
                input_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
            })
            .unwrap_or_default();

        let message = Self::response_to_message(api_response.candidates.into_iter().next());

        Ok(ModelResponse { message, usage })
    }
}
