//! Core data types used throughout repo-sentinel.
//!
//! This module defines the message types, tool call structures,
//! and request/response formats that flow between the session,
//! the agent driver and the tools.

use serde::{Deserialize, Serialize};

// --- Message Roles ---

/// The role of a message in the conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

// --- Tool Call ---

/// A tool call request issued by the model.
///
/// The `id` correlates the request with the result that is submitted
/// back. `arguments` is the raw JSON string produced by the model; it is
/// parsed by the registry right before the executor runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// The output of one tool call, tagged with the originating call id.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub content: String,
}

impl ToolResult {
    pub fn new(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }
}

// --- Tool Definition ---

/// Describes a tool's interface to the model via JSON Schema.
///
/// The description doubles as the behavioral contract the model relies on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

// --- Messages ---

/// A single message in the conversation history.
///
/// Messages are immutable once appended to a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tool calls requested by an assistant message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// For tool result messages, this links back to the tool call ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Some(content.into()),
            tool_calls: vec![],
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(content.into()),
            tool_calls: vec![],
            tool_call_id: None,
        }
    }

    /// Create an assistant message, optionally carrying tool calls.
    pub fn assistant(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            tool_calls,
            tool_call_id: None,
        }
    }

    pub fn tool_result(result: &ToolResult) -> Self {
        Self {
            role: Role::Tool,
            content: Some(result.content.clone()),
            tool_calls: vec![],
            tool_call_id: Some(result.tool_call_id.clone()),
        }
    }
}

// --- Chat Request / Response ---

/// A request to send to the chat-completion endpoint.
///
/// This is our internal representation; the LLM client converts it
/// into the wire format.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
}

/// Finish reason reported when the model stopped to request tool calls.
pub const FINISH_REASON_TOOL_CALLS: &str = "tool_calls";

/// One choice of a completion response.
#[derive(Debug, Clone, PartialEq)]
pub struct Choice {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: Option<String>,
}

impl Choice {
    /// The assistant message this choice represents in the history.
    pub fn to_message(&self) -> Message {
        Message::assistant(self.content.clone(), self.tool_calls.clone())
    }
}

/// The response from a chat-completion call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatResponse {
    pub choices: Vec<Choice>,
}

impl ChatResponse {
    /// Non-empty text content from every choice, in choice order.
    pub fn contents(&self) -> Vec<&str> {
        self.choices
            .iter()
            .filter_map(|c| c.content.as_deref())
            .filter(|c| !c.is_empty())
            .collect()
    }

    /// Every tool call from every choice, flattened in order.
    pub fn tool_calls(&self) -> Vec<&ToolCall> {
        self.choices.iter().flat_map(|c| c.tool_calls.iter()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(id: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            name: "noop".to_string(),
            arguments: "{}".to_string(),
        }
    }

    #[test]
    fn test_contents_skip_empty_and_missing() {
        let response = ChatResponse {
            choices: vec![
                Choice {
                    content: Some("first".into()),
                    tool_calls: vec![],
                    finish_reason: Some("stop".into()),
                },
                Choice {
                    content: None,
                    tool_calls: vec![],
                    finish_reason: None,
                },
                Choice {
                    content: Some(String::new()),
                    tool_calls: vec![],
                    finish_reason: None,
                },
                Choice {
                    content: Some("second".into()),
                    tool_calls: vec![],
                    finish_reason: None,
                },
            ],
        };
        assert_eq!(response.contents(), vec!["first", "second"]);
    }

    #[test]
    fn test_tool_calls_flattened_across_choices() {
        let response = ChatResponse {
            choices: vec![
                Choice {
                    content: None,
                    tool_calls: vec![call("a"), call("b")],
                    finish_reason: Some(FINISH_REASON_TOOL_CALLS.into()),
                },
                Choice {
                    content: None,
                    tool_calls: vec![call("c")],
                    finish_reason: Some(FINISH_REASON_TOOL_CALLS.into()),
                },
            ],
        };
        let ids: Vec<&str> = response.tool_calls().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_tool_result_message_links_call_id() {
        let msg = Message::tool_result(&ToolResult::new("call_1", "ok"));
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(msg.content.as_deref(), Some("ok"));
    }
}
