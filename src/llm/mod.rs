//! LLM Client module.
//!
//! Defines the `LlmProvider` trait that abstracts over the chat-completion
//! endpoint, so the session and agent driver can be exercised against a
//! scripted provider in tests.

pub mod openai_compatible;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{ChatRequest, ChatResponse};

/// Trait that all chat-completion backends implement.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a chat completion request and wait for the full response.
    async fn chat_completion(&self, request: &ChatRequest) -> Result<ChatResponse>;

    /// Return the provider's display name (for logging).
    fn name(&self) -> &str;
}
