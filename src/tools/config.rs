//! Configuration and credential tools.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;

use super::Tool;
use crate::auth::Credentials;
use crate::config::{EnvSource, ProcessEnv, RepoConfig};

/// Returns the repository configuration as JSON.
///
/// The environment is re-read on every call; tokens come from the
/// credentials acquired at startup.
pub struct GetConfigTool {
    credentials: Arc<Credentials>,
    env: Box<dyn EnvSource + Send + Sync>,
}

impl GetConfigTool {
    pub fn new(credentials: Arc<Credentials>) -> Self {
        Self::with_env(credentials, ProcessEnv)
    }

    pub fn with_env(
        credentials: Arc<Credentials>,
        env: impl EnvSource + Send + Sync + 'static,
    ) -> Self {
        Self {
            credentials,
            env: Box::new(env),
        }
    }
}

#[async_trait]
impl Tool for GetConfigTool {
    fn name(&self) -> &str {
        "get_config"
    }

    fn description(&self) -> &str {
        "Get the repository configuration: provider, repository identifiers, branch, check interval, report directory and sub-paths."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: serde_json::Value) -> Result<String> {
        let config = RepoConfig::load(self.env.as_ref(), &self.credentials)?;
        serde_json::to_string_pretty(&config).context("Failed to serialize config")
    }
}

/// Returns the GitHub token acquired for this run.
pub struct GetGithubTokenTool {
    credentials: Arc<Credentials>,
}

impl GetGithubTokenTool {
    pub fn new(credentials: Arc<Credentials>) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl Tool for GetGithubTokenTool {
    fn name(&self) -> &str {
        "get_github_token"
    }

    fn description(&self) -> &str {
        "Get the GitHub access token for API calls."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: serde_json::Value) -> Result<String> {
        let token = self
            .credentials
            .github_token
            .as_deref()
            .context("No GitHub token available. Set GITHUB_TOKEN or complete device login.")?;
        Ok(json!({ "token": token }).to_string())
    }
}

/// Returns the Azure DevOps token acquired for this run.
pub struct GetAdoTokenTool {
    credentials: Arc<Credentials>,
}

impl GetAdoTokenTool {
    pub fn new(credentials: Arc<Credentials>) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl Tool for GetAdoTokenTool {
    fn name(&self) -> &str {
        "get_ado_token"
    }

    fn description(&self) -> &str {
        "Get the Azure DevOps access token for API calls."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: serde_json::Value) -> Result<String> {
        let token = self
            .credentials
            .ado_token
            .as_deref()
            .context("No Azure DevOps token available. Set ADO_TOKEN or run `az login`.")?;
        Ok(json!({ "token": token }).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::env_of;

    #[tokio::test]
    async fn test_get_config_gerrit() {
        let tool = GetConfigTool::with_env(
            Arc::new(Credentials::default()),
            env_of(&[
                ("REPO_PROVIDER", "gerrit"),
                ("GERRIT_HOST", "review.example.org"),
                ("GERRIT_PROJECT", "platform/core"),
                ("BRANCH", "main"),
                ("CHECK_INTERVAL_HOURS", "12"),
                ("REPORT_DIR", "./reports"),
                ("SUB_PATH", "ai/apps,docs"),
            ]),
        );
        let out: serde_json::Value =
            serde_json::from_str(&tool.execute(json!({})).await.unwrap()).unwrap();
        assert_eq!(out["provider"], "gerrit");
        assert_eq!(out["host"], "review.example.org");
        assert_eq!(out["project"], "platform/core");
        assert_eq!(out["checkIntervalHours"], 12);
        assert_eq!(out["subPaths"], json!(["ai/apps", "docs"]));
    }

    #[tokio::test]
    async fn test_get_config_reports_missing_vars() {
        let tool = GetConfigTool::with_env(
            Arc::new(Credentials::default()),
            env_of(&[("REPO_PROVIDER", "ado")]),
        );
        let err = tool.execute(json!({})).await.unwrap_err();
        assert!(err.to_string().contains("ADO_ORGANIZATION"));
    }

    struct LocalRepoEnv;

    impl EnvSource for LocalRepoEnv {
        fn var(&self, name: &str) -> Option<String> {
            let value = match name {
                "REPO_PROVIDER" => "local",
                "REPO_PATH" => "/srv/checkout",
                "BRANCH" => "develop",
                "CHECK_INTERVAL_HOURS" => "6",
                "REPORT_DIR" => "/var/reports",
                _ => return None,
            };
            Some(value.to_string())
        }
    }

    #[tokio::test]
    async fn test_get_config_accepts_any_env_source() {
        let tool = GetConfigTool::with_env(Arc::new(Credentials::default()), LocalRepoEnv);
        let out: serde_json::Value =
            serde_json::from_str(&tool.execute(json!({})).await.unwrap()).unwrap();
        assert_eq!(out["provider"], "local");
        assert_eq!(out["repoPath"], "/srv/checkout");
        assert_eq!(out["branch"], "develop");
        assert_eq!(out["subPaths"], json!([]));
    }

    #[tokio::test]
    async fn test_token_tools() {
        let creds = Arc::new(Credentials {
            github_token: Some("gho_x".into()),
            ado_token: None,
        });
        let out = GetGithubTokenTool::new(creds.clone())
            .execute(json!({}))
            .await
            .unwrap();
        assert_eq!(out, r#"{"token":"gho_x"}"#);
        assert!(GetAdoTokenTool::new(creds).execute(json!({})).await.is_err());
    }
}
