//! OpenAI-compatible chat-completion client.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::LlmProvider;
use crate::types::{ChatRequest, ChatResponse, Choice, Role, ToolCall};

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

pub struct OpenAiCompatibleProvider {
    api_key: String,
    api_base: String,
    client: reqwest::Client,
}

// --- API Request Types (OpenAI format) ---

#[derive(Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool>,
}

#[derive(Serialize)]
struct ApiMessage {
    role: Role,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Serialize)]
struct ApiTool {
    r#type: String,
    function: ApiFunction,
}

#[derive(Serialize)]
struct ApiFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct ApiToolCall {
    id: String,
    #[serde(default = "function_type")]
    r#type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function: Option<ApiToolCallFunction>,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct ApiToolCallFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

// --- API Response Types ---

#[derive(Deserialize, Debug)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
}

#[derive(Deserialize, Debug)]
struct ApiChoice {
    message: ApiResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCall>>,
}

// --- Implementation ---

impl OpenAiCompatibleProvider {
    pub fn new(api_key: String, api_base: Option<String>) -> Self {
        Self {
            api_key,
            api_base: api_base.unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            client: reqwest::Client::new(),
        }
    }

    fn build_api_request(&self, request: &ChatRequest) -> ApiRequest {
        let messages = request
            .messages
            .iter()
            .map(|msg| {
                let tool_calls = if msg.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        msg.tool_calls
                            .iter()
                            .map(|tc| ApiToolCall {
                                id: tc.id.clone(),
                                r#type: function_type(),
                                function: Some(ApiToolCallFunction {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.clone(),
                                }),
                            })
                            .collect(),
                    )
                };
                ApiMessage {
                    role: msg.role,
                    content: msg.content.clone(),
                    tool_calls,
                    tool_call_id: msg.tool_call_id.clone(),
                }
            })
            .collect();

        let tools = request
            .tools
            .iter()
            .map(|t| ApiTool {
                r#type: function_type(),
                function: ApiFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.input_schema.clone(),
                },
            })
            .collect();

        ApiRequest {
            model: request.model.clone(),
            messages,
            tools,
        }
    }

    fn parse_response(api_response: ApiResponse) -> ChatResponse {
        let choices = api_response
            .choices
            .into_iter()
            .map(|choice| {
                // Only function-type tool calls are honored
                let tool_calls = choice
                    .message
                    .tool_calls
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|tc| tc.r#type == "function")
                    .filter_map(|tc| {
                        let function = tc.function?;
                        Some(ToolCall {
                            id: tc.id,
                            name: function.name,
                            arguments: function.arguments,
                        })
                    })
                    .collect();
                Choice {
                    content: choice.message.content,
                    tool_calls,
                    finish_reason: choice.finish_reason,
                }
            })
            .collect();

        ChatResponse { choices }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    async fn chat_completion(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let api_request = self.build_api_request(request);
        let url = format!("{}/chat/completions", self.api_base.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&api_request)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, error_body);
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .context("Failed to parse API response")?;

        Ok(Self::parse_response(api_response))
    }

    fn name(&self) -> &str {
        "OpenAI-Compatible"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Message, ToolDefinition, ToolResult, FINISH_REASON_TOOL_CALLS};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request_with_history() -> ChatRequest {
        ChatRequest {
            model: "gpt-test".to_string(),
            messages: vec![
                Message::system("be brief"),
                Message::user("hi"),
                Message::assistant(
                    None,
                    vec![ToolCall {
                        id: "call_1".into(),
                        name: "get_config".into(),
                        arguments: "{}".into(),
                    }],
                ),
                Message::tool_result(&ToolResult::new("call_1", "{\"branch\":\"main\"}")),
            ],
            tools: vec![ToolDefinition {
                name: "get_config".into(),
                description: "config".into(),
                input_schema: json!({"type": "object", "properties": {}}),
            }],
        }
    }

    #[test]
    fn test_build_request_wire_shape() {
        let provider = OpenAiCompatibleProvider::new("k".into(), None);
        let body = serde_json::to_value(provider.build_api_request(&request_with_history())).unwrap();

        assert_eq!(body["model"], "gpt-test");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][2]["role"], "assistant");
        assert_eq!(body["messages"][2]["content"], serde_json::Value::Null);
        assert_eq!(body["messages"][2]["tool_calls"][0]["type"], "function");
        assert_eq!(body["messages"][2]["tool_calls"][0]["function"]["name"], "get_config");
        assert_eq!(body["messages"][3]["role"], "tool");
        assert_eq!(body["messages"][3]["tool_call_id"], "call_1");
        assert_eq!(body["tools"][0]["function"]["name"], "get_config");
    }

    #[test]
    fn test_tools_omitted_when_empty() {
        let provider = OpenAiCompatibleProvider::new("k".into(), None);
        let request = ChatRequest {
            model: "m".into(),
            messages: vec![Message::user("hi")],
            tools: vec![],
        };
        let body = serde_json::to_value(provider.build_api_request(&request)).unwrap();
        assert!(body.get("tools").is_none());
    }

    #[tokio::test]
    async fn test_chat_completion_parses_tool_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({"model": "gpt-test"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chatcmpl-1",
                "choices": [{
                    "index": 0,
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_9",
                            "type": "function",
                            "function": {"name": "list_reports", "arguments": "{\"limit\":5}"}
                        }]
                    },
                    "finish_reason": "tool_calls"
                }]
            })))
            .mount(&server)
            .await;

        let provider =
            OpenAiCompatibleProvider::new("test-key".into(), Some(format!("{}/v1/", server.uri())));
        let response = provider.chat_completion(&request_with_history()).await.unwrap();

        assert_eq!(response.choices.len(), 1);
        let choice = &response.choices[0];
        assert_eq!(choice.finish_reason.as_deref(), Some(FINISH_REASON_TOOL_CALLS));
        assert_eq!(choice.tool_calls[0].id, "call_9");
        assert_eq!(choice.tool_calls[0].name, "list_reports");
        assert_eq!(choice.tool_calls[0].arguments, "{\"limit\":5}");
        assert!(choice.content.is_none());
    }

    #[test]
    fn test_non_function_tool_calls_are_skipped() {
        let api_response: ApiResponse = serde_json::from_value(json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [
                        { "id": "call_x", "type": "custom", "custom": { "name": "grep", "input": "x" } },
                        {
                            "id": "call_1",
                            "type": "function",
                            "function": { "name": "get_config", "arguments": "{}" }
                        }
                    ]
                },
                "finish_reason": "tool_calls"
            }]
        }))
        .unwrap();

        let response = OpenAiCompatibleProvider::parse_response(api_response);
        let calls = &response.choices[0].tool_calls;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].name, "get_config");
    }

    #[tokio::test]
    async fn test_chat_completion_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let provider = OpenAiCompatibleProvider::new("nope".into(), Some(server.uri()));
        let err = provider
            .chat_completion(&request_with_history())
            .await
            .unwrap_err()
            .to_string();
        assert!(err.contains("401"));
        assert!(err.contains("bad key"));
    }
}
