//! Agent Loop - the core of repo-sentinel.
//!
//! The agent drives one chat session through repeated tool-call rounds:
//!
//! ```text
//! User Prompt
//!     |
//!     v
//! +--------+     +-----+     +----------+
//! |  LLM   |<--->|Agent|<--->| Registry |
//! +--------+     +-----+     +----------+
//!     |              |
//!     v              v
//! Final Text    Tool Results
//! ```
//!
//! Every tool call of a round is dispatched concurrently. Results for the
//! round are submitted together, so round N+1 never starts before every
//! call of round N has resolved. A failing tool is reported back to the
//! model as `{"error": "..."}` instead of aborting the run.

use std::sync::Arc;

use anyhow::Result;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::llm::LlmProvider;
use crate::session::ChatSession;
use crate::tools::ToolRegistry;
use crate::types::{ChatResponse, ToolCall, ToolResult};

/// Hooks for visibility into a run. None of them affect control flow.
pub trait AgentObserver: Send + Sync {
    fn on_tool_start(&self, _name: &str, _id: &str, _arguments: &str) {}
    fn on_tool_end(&self, _name: &str, _id: &str, _output: &str) {}
    fn on_tool_error(&self, _name: &str, _id: &str, _error: &str) {}
    fn on_content(&self, _content: &str) {}
}

/// Everything needed to run one isolated agent conversation.
pub struct AgentOptions {
    pub llm: Arc<dyn LlmProvider>,
    pub model: String,
    pub system_prompt: String,
    pub registry: ToolRegistry,
    pub observer: Option<Arc<dyn AgentObserver>>,
}

/// Final text produced by an agent run.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentResult {
    pub content: String,
}

/// Run an agent until the model stops requesting tools.
///
/// The session is created here and dropped on return, so nothing from this
/// conversation leaks into the caller's context except the final content.
pub async fn run_agent(options: AgentOptions, user_prompt: &str) -> Result<AgentResult> {
    let AgentOptions {
        llm,
        model,
        system_prompt,
        registry,
        observer,
    } = options;
    let observer = observer.as_deref();

    let mut session = ChatSession::new(
        llm,
        model,
        Some(system_prompt.as_str()),
        registry.definitions(),
    );

    let mut response = session.chat(user_prompt).await?;
    emit_content(observer, &response);

    let mut round = 0usize;
    while ChatSession::requires_tool_call(&response) {
        round += 1;
        let calls = response.tool_calls();
        debug!(round, calls = calls.len(), "dispatching tool calls");

        let results: Vec<ToolResult> = join_all(
            calls
                .into_iter()
                .map(|call| execute_call(&registry, observer, call)),
        )
        .await;

        response = session.submit_tool_results(&results).await?;
        emit_content(observer, &response);
    }

    Ok(AgentResult {
        content: response.contents().join("\n"),
    })
}

async fn execute_call(
    registry: &ToolRegistry,
    observer: Option<&dyn AgentObserver>,
    call: &ToolCall,
) -> ToolResult {
    if let Some(obs) = observer {
        obs.on_tool_start(&call.name, &call.id, &call.arguments);
    }

    match registry.execute(&call.name, &call.arguments).await {
        Ok(output) => {
            if let Some(obs) = observer {
                obs.on_tool_end(&call.name, &call.id, &output);
            }
            ToolResult::new(&call.id, output)
        }
        Err(e) => {
            let message = format!("{:#}", e);
            if let Some(obs) = observer {
                obs.on_tool_error(&call.name, &call.id, &message);
            }
            ToolResult::new(&call.id, error_envelope(&message))
        }
    }
}

/// The `{"error": "..."}` content reported for a failed tool call.
pub fn error_envelope(message: &str) -> String {
    serde_json::json!({ "error": message }).to_string()
}

fn emit_content(observer: Option<&dyn AgentObserver>, response: &ChatResponse) {
    if let Some(obs) = observer {
        for content in response.contents() {
            obs.on_content(content);
        }
    }
}

/// Observer that writes run events to the tracing subscriber.
///
/// Sub-agents get their own instance with `scope` set to the sub-agent
/// identifier so their events can be told apart from the parent's.
pub struct TracingObserver {
    scope: Option<String>,
}

impl TracingObserver {
    pub fn main() -> Self {
        Self { scope: None }
    }

    pub fn subagent(identifier: impl Into<String>) -> Self {
        Self {
            scope: Some(identifier.into()),
        }
    }

    fn label(&self) -> &str {
        match self.scope {
            Some(_) => "subagent",
            None => "agent",
        }
    }

    fn scope(&self) -> &str {
        self.scope.as_deref().unwrap_or("main")
    }
}

impl AgentObserver for TracingObserver {
    fn on_tool_start(&self, name: &str, id: &str, arguments: &str) {
        info!(agent = self.label(), scope = self.scope(), tool = name, id, input = arguments, "tool start");
    }

    fn on_tool_end(&self, name: &str, id: &str, output: &str) {
        debug!(agent = self.label(), scope = self.scope(), tool = name, id, output, "tool output");
        info!(agent = self.label(), scope = self.scope(), tool = name, id, "tool end");
    }

    fn on_tool_error(&self, name: &str, id: &str, error: &str) {
        warn!(agent = self.label(), scope = self.scope(), tool = name, id, error, "tool failed");
    }

    fn on_content(&self, content: &str) {
        info!(agent = self.label(), scope = self.scope(), "{}", content);
    }
}
