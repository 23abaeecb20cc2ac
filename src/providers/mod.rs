//! Source-control providers.
//!
//! Each provider contributes a tool set to the main agent, a pair of
//! analysis tools (details + diff) for the commit analyzer sub-agent, and
//! the provider-specific parts of the system prompt. The provider is
//! chosen once per run by [`strategy_for`].

pub mod ado;
pub mod gerrit;
pub mod git;
pub mod github;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::auth::Credentials;
use crate::config::RepoProvider;
use crate::tools::Tool;

/// Describes the `analyze_commit` tool for one provider.
#[derive(Debug, Clone, Copy)]
pub struct AnalyzerSpec {
    pub description: &'static str,
    /// "commit" or "change", used in the sub-agent's user prompt.
    pub subject_label: &'static str,
    /// Parameter holding the commit/change identifier.
    pub subject_key: &'static str,
    /// `(name, description)` pairs, all required, in prompt order.
    pub params: &'static [(&'static str, &'static str)],
}

impl AnalyzerSpec {
    pub fn parameters_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|(name, description)| {
                (
                    name.to_string(),
                    json!({ "type": "string", "description": description }),
                )
            })
            .collect();
        let required: Vec<&str> = self.params.iter().map(|(name, _)| *name).collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Provider-specific behavior, selected once at startup.
pub trait ProviderStrategy: Send + Sync {
    fn provider(&self) -> RepoProvider;

    /// Tools registered with the main agent, including any token tool.
    fn tools(&self, credentials: Arc<Credentials>) -> Vec<Arc<dyn Tool>>;

    /// The details and diff tools given to the analyzer sub-agent.
    fn analysis_tools(&self) -> [Arc<dyn Tool>; 2];

    /// Numbered workflow for the system prompt.
    fn workflow_steps(&self) -> &'static str;

    /// Which config values the model should pass to the provider tools.
    fn parameter_note(&self) -> &'static str;

    fn analyzer(&self) -> AnalyzerSpec;
}

pub fn strategy_for(provider: RepoProvider) -> Arc<dyn ProviderStrategy> {
    match provider {
        RepoProvider::Local => Arc::new(git::GitStrategy),
        RepoProvider::Github => Arc::new(github::GithubStrategy::new(Arc::new(
            github::GithubClient::new(),
        ))),
        RepoProvider::Gerrit => Arc::new(gerrit::GerritStrategy::new(Arc::new(
            gerrit::GerritClient::new(),
        ))),
        RepoProvider::Ado => Arc::new(ado::AdoStrategy::new(Arc::new(ado::AdoClient::new()))),
    }
}

/// The commit shape shared by every provider's commit listings.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommitSummary {
    pub hash: String,
    pub short_hash: String,
    pub author: String,
    pub date: String,
    pub message: String,
}

impl CommitSummary {
    /// Build a summary from a full hash and a possibly multi-line message.
    pub fn new(hash: &str, author: &str, date: &str, message: &str) -> Self {
        Self {
            hash: hash.to_string(),
            short_hash: short_hash(hash).to_string(),
            author: author.to_string(),
            date: date.to_string(),
            message: first_line(message).to_string(),
        }
    }
}

pub fn short_hash(hash: &str) -> &str {
    hash.get(..7).unwrap_or(hash)
}

pub fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or_default()
}

/// `now` minus a possibly fractional number of hours.
///
/// `hours` comes straight from tool arguments, so non-finite, negative or
/// unrepresentable windows are rejected instead of overflowing.
pub fn hours_ago(hours: f64, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    if !hours.is_finite() || hours < 0.0 {
        bail!("hours must be a non-negative number (got {})", hours);
    }
    let millis = hours * 3_600_000.0;
    if millis >= i64::MAX as f64 {
        bail!("hours is out of range (got {})", hours);
    }
    Duration::try_milliseconds(millis as i64)
        .and_then(|window| now.checked_sub_signed(window))
        .with_context(|| format!("hours is out of range (got {})", hours))
}

/// Error object returned in place of binary file content.
pub fn binary_file_error(path: &str) -> String {
    json!({ "error": "File is binary", "path": path }).to_string()
}

/// Shared addressing parameters merged into each tool's schema.
pub struct SchemaBase {
    properties: Map<String, Value>,
    required: &'static [&'static str],
}

impl SchemaBase {
    pub fn new(properties: Value, required: &'static [&'static str]) -> Self {
        let properties = match properties {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            properties,
            required,
        }
    }

    /// A full object schema: the base properties plus `properties`.
    pub fn with(&self, properties: Value, required: &[&str]) -> Value {
        let mut merged = self.properties.clone();
        if let Value::Object(extra) = properties {
            merged.extend(extra);
        }
        let required: Vec<&str> = self.required.iter().copied().chain(required.iter().copied()).collect();
        json!({
            "type": "object",
            "properties": merged,
            "required": required,
        })
    }
}

/// Fail with a readable message for non-2xx responses.
pub(crate) async fn check_status(
    response: reqwest::Response,
    service: &str,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().clone();
    let body = response.text().await.unwrap_or_default();
    let body: String = body.chars().take(500).collect();
    bail!("{} API error: {} for {}: {}", service, status, url, body.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_commit_summary_shape() {
        let c = CommitSummary::new(
            "0123456789abcdef",
            "Ada",
            "2025-12-01T10:00:00Z",
            "feat: add thing\n\nlong body",
        );
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(v["shortHash"], "0123456");
        assert_eq!(v["message"], "feat: add thing");
        assert_eq!(short_hash("abc"), "abc");
    }

    #[test]
    fn test_hours_ago() {
        let now = Utc.with_ymd_and_hms(2025, 12, 3, 12, 0, 0).unwrap();
        assert_eq!(
            hours_ago(24.0, now).unwrap(),
            Utc.with_ymd_and_hms(2025, 12, 2, 12, 0, 0).unwrap()
        );
        assert_eq!(
            hours_ago(1.5, now).unwrap(),
            Utc.with_ymd_and_hms(2025, 12, 3, 10, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_hours_ago_rejects_unrepresentable_windows() {
        let now = Utc.with_ymd_and_hms(2025, 12, 3, 12, 0, 0).unwrap();
        for hours in [1e15, -1.0, f64::NAN, f64::INFINITY, 1e300] {
            assert!(hours_ago(hours, now).is_err(), "{hours}");
        }
        assert_eq!(hours_ago(0.0, now).unwrap(), now);
    }

    #[test]
    fn test_schema_base_merges() {
        let base = SchemaBase::new(
            json!({ "host": { "type": "string" } }),
            &["host"],
        );
        let schema = base.with(json!({ "changeId": { "type": "string" } }), &["changeId"]);
        assert_eq!(schema["required"], json!(["host", "changeId"]));
        assert!(schema["properties"]["host"].is_object());
        assert!(schema["properties"]["changeId"].is_object());
    }

    #[test]
    fn test_analyzer_schema_requires_every_param() {
        let spec = AnalyzerSpec {
            description: "d",
            subject_label: "commit",
            subject_key: "commitHash",
            params: &[("repoPath", "Path"), ("commitHash", "Hash")],
        };
        let schema = spec.parameters_schema();
        assert_eq!(schema["required"], json!(["repoPath", "commitHash"]));
        assert_eq!(schema["properties"]["commitHash"]["type"], "string");
    }

    #[test]
    fn test_strategy_for_each_provider() {
        for provider in [
            RepoProvider::Local,
            RepoProvider::Github,
            RepoProvider::Gerrit,
            RepoProvider::Ado,
        ] {
            let strategy = strategy_for(provider);
            assert_eq!(strategy.provider(), provider);
            let tools = strategy.tools(Arc::new(Credentials::default()));
            let names: Vec<&str> = tools.iter().map(|t| t.name()).collect();
            for analysis in strategy.analysis_tools() {
                assert!(names.contains(&analysis.name()), "{provider}: {}", analysis.name());
            }
            let spec = strategy.analyzer();
            assert!(spec.params.iter().any(|(n, _)| *n == spec.subject_key));
        }
    }
}
