//! `analyze_commit`: a tool that runs a nested agent.
//!
//! Each invocation gets a fresh session and a two-tool registry (details +
//! diff), so the diff never enters the parent conversation. Only the
//! sub-agent's final JSON assessment is returned.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::agent::{run_agent, AgentOptions, TracingObserver};
use crate::llm::LlmProvider;
use crate::prompts::subagent_system_prompt;
use crate::providers::{AnalyzerSpec, ProviderStrategy};
use crate::tools::{Tool, ToolRegistry};

pub struct AnalyzeCommitTool {
    llm: Arc<dyn LlmProvider>,
    model: String,
    strategy: Arc<dyn ProviderStrategy>,
    spec: AnalyzerSpec,
}

impl AnalyzeCommitTool {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        model: impl Into<String>,
        strategy: Arc<dyn ProviderStrategy>,
    ) -> Self {
        let spec = strategy.analyzer();
        Self {
            llm,
            model: model.into(),
            strategy,
            spec,
        }
    }

    /// "Analyze commit X." followed by every parameter the tools need.
    fn user_prompt(&self, args: &Map<String, Value>) -> Result<String> {
        let mut lines = Vec::with_capacity(self.spec.params.len());
        for (name, _) in self.spec.params {
            let value = args
                .get(*name)
                .and_then(Value::as_str)
                .with_context(|| format!("Missing required parameter: {}", name))?;
            lines.push(format!("- {}: \"{}\"", name, value));
        }
        let subject = args
            .get(self.spec.subject_key)
            .and_then(Value::as_str)
            .unwrap_or_default();

        Ok(format!(
            "Analyze {} {}.\n\nUse these parameters for tool calls:\n{}",
            self.spec.subject_label,
            subject,
            lines.join("\n")
        ))
    }
}

#[async_trait]
impl Tool for AnalyzeCommitTool {
    fn name(&self) -> &str {
        "analyze_commit"
    }

    fn description(&self) -> &str {
        self.spec.description
    }

    fn parameters_schema(&self) -> Value {
        self.spec.parameters_schema()
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let args = params
            .as_object()
            .context("analyze_commit arguments must be a JSON object")?;
        let user_prompt = self.user_prompt(args)?;

        let [details, diff] = self.strategy.analysis_tools();
        let system_prompt = subagent_system_prompt(details.name(), diff.name());
        let mut registry = ToolRegistry::new();
        registry.register_all([details, diff]);

        let identifier: String = Uuid::new_v4().to_string().chars().take(8).collect();
        let span = info_span!("subagent", id = %identifier);

        let options = AgentOptions {
            llm: self.llm.clone(),
            model: self.model.clone(),
            system_prompt,
            registry,
            observer: Some(Arc::new(TracingObserver::subagent(identifier.clone()))),
        };

        async move {
            info!("sub-agent started");
            let result = run_agent(options, &user_prompt).await?;
            info!("sub-agent finished");
            Ok::<_, anyhow::Error>(result.content)
        }
        .instrument(span)
        .await
    }
}
