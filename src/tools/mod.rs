//! Tool System module.
//!
//! Defines the `Tool` trait and the `ToolRegistry` that together form the
//! tool execution framework:
//! - **Tool trait**: every tool provides its name, description, JSON Schema
//!   for parameters, and an async execute method
//! - **ToolRegistry**: a name → tool map that the agent driver dispatches
//!   tool calls through
//!
//! The registry does not validate arguments against the schema; executors
//! parse what they need and fail on anything malformed.

pub mod config;
pub mod report;

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::types::ToolDefinition;

/// Trait that all tools must implement.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g. "get_config").
    fn name(&self) -> &str;

    /// A description of what this tool does and what it returns.
    /// The model reads this to decide when to use the tool.
    fn description(&self) -> &str;

    /// JSON Schema describing the tool's input parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given JSON arguments.
    async fn execute(&self, params: serde_json::Value) -> Result<String>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.parameters_schema(),
        }
    }
}

/// Deserialize tool arguments into a typed parameter struct.
pub fn parse_params<T: DeserializeOwned>(tool: &str, params: serde_json::Value) -> Result<T> {
    serde_json::from_value(params).with_context(|| format!("Invalid arguments for tool '{}'", tool))
}

/// Maps tool names to tool implementations.
///
/// Holds no state about in-flight calls, so concurrent `execute` calls
/// through a shared reference are fine.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A tool with the same name is replaced in place,
    /// keeping its original position in the definition order.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(idx) => self.tools[idx] = tool,
            None => self.tools.push(tool),
        }
    }

    pub fn register_all(&mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) {
        for tool in tools {
            self.register(tool);
        }
    }

    /// Get all tool definitions in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    /// Execute a tool by name with raw JSON arguments.
    ///
    /// The output is returned with surrounding whitespace trimmed.
    pub async fn execute(&self, name: &str, arguments: &str) -> Result<String> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.name() == name)
            .with_context(|| format!("Tool not found: {}", name))?;

        let params: serde_json::Value = serde_json::from_str(arguments)
            .with_context(|| format!("Invalid JSON arguments for tool '{}': {}", name, arguments))?;

        let output = tool.execute(params).await?;
        Ok(output.trim().to_string())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
