//! A single chat conversation with the completion endpoint.
//!
//! The session owns the ordered message history for one agent run. History
//! is append-only and never truncated; it is dropped together with the
//! session at the end of the run.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use crate::llm::LlmProvider;
use crate::types::{
    ChatRequest, ChatResponse, Message, ToolDefinition, ToolResult, FINISH_REASON_TOOL_CALLS,
};

pub struct ChatSession {
    llm: Arc<dyn LlmProvider>,
    model: String,
    tools: Vec<ToolDefinition>,
    messages: Vec<Message>,
}

impl ChatSession {
    /// Create a session. A system prompt, if given, becomes the first message.
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        model: impl Into<String>,
        system_prompt: Option<&str>,
        tools: Vec<ToolDefinition>,
    ) -> Self {
        let messages = system_prompt.map(Message::system).into_iter().collect();
        Self {
            llm,
            model: model.into(),
            tools,
            messages,
        }
    }

    /// Whether the response stopped to wait for tool results.
    ///
    /// Only the first choice's finish reason is consulted.
    pub fn requires_tool_call(response: &ChatResponse) -> bool {
        response
            .choices
            .first()
            .and_then(|c| c.finish_reason.as_deref())
            == Some(FINISH_REASON_TOOL_CALLS)
    }

    /// Append a user message and request a completion.
    pub async fn chat(&mut self, user_text: &str) -> Result<ChatResponse> {
        self.messages.push(Message::user(user_text));
        self.complete().await
    }

    /// Append one tool message per result and request a completion.
    pub async fn submit_tool_results(&mut self, results: &[ToolResult]) -> Result<ChatResponse> {
        self.messages.extend(results.iter().map(Message::tool_result));
        self.complete().await
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    async fn complete(&mut self) -> Result<ChatResponse> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: self.messages.clone(),
            tools: self.tools.clone(),
        };

        let response = self
            .llm
            .chat_completion(&request)
            .await
            .with_context(|| format!("{} completion failed", self.llm.name()))?;
        debug!(response = ?response, "completion response");

        if let Some(choice) = response.choices.first() {
            self.messages.push(choice.to_message());
        }
        Ok(response)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::{Choice, Role, ToolCall};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses and records every request it receives.
    pub struct ScriptedLlm {
        responses: Mutex<VecDeque<ChatResponse>>,
        pub requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedLlm {
        pub fn new(responses: Vec<ChatResponse>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        async fn chat_completion(&self, request: &ChatRequest) -> Result<ChatResponse> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .context("script exhausted")
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    pub fn text_reply(text: &str) -> ChatResponse {
        ChatResponse {
            choices: vec![Choice {
                content: Some(text.to_string()),
                tool_calls: vec![],
                finish_reason: Some("stop".to_string()),
            }],
        }
    }

    pub fn tool_reply(calls: &[(&str, &str, &str)]) -> ChatResponse {
        ChatResponse {
            choices: vec![Choice {
                content: None,
                tool_calls: calls
                    .iter()
                    .map(|(id, name, args)| ToolCall {
                        id: id.to_string(),
                        name: name.to_string(),
                        arguments: args.to_string(),
                    })
                    .collect(),
                finish_reason: Some(FINISH_REASON_TOOL_CALLS.to_string()),
            }],
        }
    }

    #[test]
    fn test_system_prompt_is_first_message() {
        let llm = Arc::new(ScriptedLlm::new(vec![]));
        let session = ChatSession::new(llm, "m", Some("you are a sentinel"), vec![]);
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].role, Role::System);

        let llm = Arc::new(ScriptedLlm::new(vec![]));
        let session = ChatSession::new(llm, "m", None, vec![]);
        assert!(session.messages().is_empty());
    }

    #[test]
    fn test_requires_tool_call_checks_first_choice() {
        assert!(ChatSession::requires_tool_call(&tool_reply(&[("1", "x", "{}")])));
        assert!(!ChatSession::requires_tool_call(&text_reply("done")));
        assert!(!ChatSession::requires_tool_call(&ChatResponse::default()));
    }

    #[tokio::test]
    async fn test_chat_and_submit_append_history() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            tool_reply(&[("call_1", "get_config", "{}")]),
            text_reply("all done"),
        ]));
        let mut session = ChatSession::new(llm.clone(), "gpt-x", Some("sys"), vec![]);

        let first = session.chat("go").await.unwrap();
        assert!(ChatSession::requires_tool_call(&first));
        assert_eq!(session.messages().len(), 3);

        session
            .submit_tool_results(&[ToolResult::new("call_1", "{}")])
            .await
            .unwrap();

        let roles: Vec<Role> = session.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::Tool, Role::Assistant]
        );
        assert_eq!(session.messages()[3].tool_call_id.as_deref(), Some("call_1"));

        // Every request carries the whole history so far
        let requests = llm.requests.lock().unwrap();
        assert_eq!(requests[0].messages.len(), 2);
        assert_eq!(requests[1].messages.len(), 4);
        assert_eq!(requests[1].model, "gpt-x");
    }

    #[tokio::test]
    async fn test_empty_choices_append_nothing() {
        let llm = Arc::new(ScriptedLlm::new(vec![ChatResponse::default()]));
        let mut session = ChatSession::new(llm, "m", None, vec![]);
        session.chat("hello").await.unwrap();
        assert_eq!(session.messages().len(), 1);
    }
}
