//! Azure DevOps provider backed by the Git REST API (7.1).

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use super::{
    binary_file_error, check_status, hours_ago, AnalyzerSpec, CommitSummary, ProviderStrategy,
    SchemaBase,
};
use crate::auth::Credentials;
use crate::binary::{is_binary_buffer, DEFAULT_CHECK_LENGTH};
use crate::config::RepoProvider;
use crate::tools::config::GetAdoTokenTool;
use crate::tools::{parse_params, Tool};

pub const ADO_API_BASE: &str = "https://dev.azure.com";
const API_VERSION: &str = "7.1";
const RECENT_COMMITS_TOP: u32 = 100;
const DETAILS_CHANGE_COUNT: u32 = 1000;
const DEFAULT_HISTORY_LIMIT: u32 = 20;

pub struct AdoClient {
    http: reqwest::Client,
    base_url: String,
}

impl Default for AdoClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Addressing parameters shared by every ADO tool.
#[derive(Deserialize)]
pub struct AdoRepo {
    pub organization: String,
    pub project: String,
    pub repository: String,
    pub token: String,
}

impl AdoClient {
    pub fn new() -> Self {
        Self::with_base_url(ADO_API_BASE)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// `{base}/{org}/{project}/_apis/git/repositories/{repo}/{path...}?api-version=7.1`
    fn endpoint(&self, repo: &AdoRepo, path: &[&str], query: &[(&str, &str)]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid Azure DevOps base URL: {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Azure DevOps base URL cannot hold a path: {}", self.base_url))?
            .pop_if_empty()
            .extend([
                repo.organization.as_str(),
                repo.project.as_str(),
                "_apis",
                "git",
                "repositories",
                repo.repository.as_str(),
            ])
            .extend(path);
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
            pairs.append_pair("api-version", API_VERSION);
        }
        Ok(url)
    }

    async fn send(&self, repo: &AdoRepo, url: Url, accept: &str) -> Result<reqwest::Response> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&repo.token)
            .header("Accept", accept)
            .send()
            .await
            .context("Azure DevOps request failed")?;
        check_status(response, "Azure DevOps").await
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        repo: &AdoRepo,
        path: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = self.endpoint(repo, path, query)?;
        self.send(repo, url, "application/json")
            .await?
            .json()
            .await
            .context("Failed to parse Azure DevOps response")
    }

    pub async fn get_bytes(
        &self,
        repo: &AdoRepo,
        path: &[&str],
        query: &[(&str, &str)],
    ) -> Result<Vec<u8>> {
        let url = self.endpoint(repo, path, query)?;
        let bytes = self
            .send(repo, url, "application/octet-stream")
            .await?
            .bytes()
            .await
            .context("Failed to read Azure DevOps response")?;
        Ok(bytes.to_vec())
    }

    async fn commits(&self, repo: &AdoRepo, criteria: &[(&str, &str)]) -> Result<Vec<CommitSummary>> {
        let list: ApiList<ApiCommit> = self.get_json(repo, &["commits"], criteria).await?;
        Ok(list.value.into_iter().map(CommitSummary::from).collect())
    }

    async fn commit_diff(&self, repo: &AdoRepo, base: &str, target: &str) -> Result<ApiDiff> {
        self.get_json(
            repo,
            &["diffs", "commits"],
            &[
                ("baseVersion", base),
                ("baseVersionType", "commit"),
                ("targetVersion", target),
                ("targetVersionType", "commit"),
                ("diffCommonCommit", "true"),
            ],
        )
        .await
    }
}

#[derive(Deserialize)]
struct ApiList<T> {
    value: Vec<T>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCommit {
    commit_id: String,
    author: Option<ApiSignature>,
    comment: Option<String>,
    #[serde(default)]
    parents: Vec<String>,
    change_counts: Option<Value>,
}

#[derive(Deserialize)]
struct ApiSignature {
    name: Option<String>,
    date: Option<String>,
}

impl ApiCommit {
    fn author_name(&self) -> &str {
        self.author
            .as_ref()
            .and_then(|a| a.name.as_deref())
            .unwrap_or_default()
    }

    fn author_date(&self) -> &str {
        self.author
            .as_ref()
            .and_then(|a| a.date.as_deref())
            .unwrap_or_default()
    }
}

impl From<ApiCommit> for CommitSummary {
    fn from(c: ApiCommit) -> Self {
        CommitSummary::new(
            &c.commit_id,
            c.author_name(),
            c.author_date(),
            c.comment.as_deref().unwrap_or_default(),
        )
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiChange {
    item: Option<ApiItem>,
    change_type: Option<String>,
}

#[derive(Deserialize)]
struct ApiItem {
    path: Option<String>,
}

impl ApiChange {
    fn to_json(&self, type_key: &str) -> Value {
        let mut v = json!({
            "path": self.item.as_ref().and_then(|i| i.path.clone()),
        });
        v[type_key] = json!(self.change_type.as_deref().unwrap_or("unknown"));
        v
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiChanges {
    #[serde(default)]
    changes: Vec<ApiChange>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiDiff {
    base_commit: Option<String>,
    target_commit: Option<String>,
    common_commit: Option<String>,
    change_counts: Option<Value>,
    all_changes_included: Option<bool>,
    #[serde(default)]
    changes: Vec<ApiChange>,
}

impl ApiDiff {
    fn changes_json(&self) -> Vec<Value> {
        self.changes.iter().map(|c| c.to_json("changeType")).collect()
    }
}

/// 40 hex chars is a commit id; anything else is treated as a branch.
fn version_type(reference: &str) -> &'static str {
    if reference.len() == 40 && reference.chars().all(|c| c.is_ascii_hexdigit()) {
        "commit"
    } else {
        "branch"
    }
}

fn repo_schema() -> SchemaBase {
    SchemaBase::new(
        json!({
            "organization": { "type": "string", "description": "Azure DevOps organization name." },
            "project": { "type": "string", "description": "Azure DevOps project name." },
            "repository": { "type": "string", "description": "Repository name or ID." },
            "token": { "type": "string", "description": "Azure DevOps access token." }
        }),
        &["organization", "project", "repository", "token"],
    )
}

macro_rules! ado_tool {
    ($name:ident) => {
        pub struct $name {
            client: Arc<AdoClient>,
        }

        impl $name {
            pub fn new(client: Arc<AdoClient>) -> Self {
                Self { client }
            }
        }
    };
}

ado_tool!(GetRepoInfoTool);
ado_tool!(GetRecentCommitsTool);
ado_tool!(GetCommitDetailsTool);
ado_tool!(GetCommitDiffTool);
ado_tool!(GetFileContentTool);
ado_tool!(GetFileHistoryTool);
ado_tool!(CompareCommitsTool);

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiRepository {
    id: String,
    name: String,
    default_branch: Option<String>,
    project: Option<ApiProjectRef>,
    size: Option<u64>,
    web_url: Option<String>,
}

#[derive(Deserialize)]
struct ApiProjectRef {
    name: Option<String>,
}

#[async_trait]
impl Tool for GetRepoInfoTool {
    fn name(&self) -> &str {
        "ado_get_repo_info"
    }

    fn description(&self) -> &str {
        "Get repository information including default branch and size.\n\nReturns: JSON object with id, name, defaultBranch, project, size and webUrl."
    }

    fn parameters_schema(&self) -> Value {
        repo_schema().with(json!({}), &[])
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let repo: AdoRepo = parse_params(self.name(), params)?;
        let info: ApiRepository = self.client.get_json(&repo, &[], &[]).await?;
        Ok(json!({
            "id": info.id,
            "name": info.name,
            "defaultBranch": info.default_branch,
            "project": info.project.and_then(|p| p.name),
            "size": info.size,
            "webUrl": info.web_url,
        })
        .to_string())
    }
}

#[derive(Deserialize)]
struct RecentCommitsParams {
    #[serde(flatten)]
    repo: AdoRepo,
    branch: String,
    hours: f64,
    path: Option<String>,
}

#[async_trait]
impl Tool for GetRecentCommitsTool {
    fn name(&self) -> &str {
        "ado_get_recent_commits"
    }

    fn description(&self) -> &str {
        "Get commits from a branch within the last N hours.\n\nReturns: JSON array of {hash, shortHash, author, date, message}."
    }

    fn parameters_schema(&self) -> Value {
        repo_schema().with(
            json!({
                "branch": { "type": "string", "description": "Branch name to get commits from." },
                "hours": { "type": "number", "description": "Number of hours to look back." },
                "path": { "type": "string", "description": "Optional path to filter commits by." }
            }),
            &["branch", "hours"],
        )
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let p: RecentCommitsParams = parse_params(self.name(), params)?;
        let since = hours_ago(p.hours, Utc::now())?.to_rfc3339_opts(SecondsFormat::Millis, true);
        let top = RECENT_COMMITS_TOP.to_string();
        let mut criteria = vec![
            ("searchCriteria.itemVersion.version", p.branch.as_str()),
            ("searchCriteria.itemVersion.versionType", "branch"),
            ("searchCriteria.fromDate", since.as_str()),
            ("searchCriteria.$top", top.as_str()),
        ];
        if let Some(path) = p.path.as_deref() {
            criteria.push(("searchCriteria.itemPath", path));
        }
        let commits = self.client.commits(&p.repo, &criteria).await?;
        Ok(serde_json::to_string(&commits)?)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitParams {
    #[serde(flatten)]
    repo: AdoRepo,
    commit_id: String,
}

fn commit_schema() -> Value {
    repo_schema().with(
        json!({
            "commitId": { "type": "string", "description": "Commit ID (full SHA)." }
        }),
        &["commitId"],
    )
}

#[async_trait]
impl Tool for GetCommitDetailsTool {
    fn name(&self) -> &str {
        "ado_get_commit_details"
    }

    fn description(&self) -> &str {
        "Get detailed information about a commit including changed files.\n\nReturns: JSON object with hash, author, date, message, parents and files [{path, status}]."
    }

    fn parameters_schema(&self) -> Value {
        commit_schema()
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let p: CommitParams = parse_params(self.name(), params)?;
        let count = DETAILS_CHANGE_COUNT.to_string();
        let commit: ApiCommit = self
            .client
            .get_json(&p.repo, &["commits", &p.commit_id], &[("changeCount", count.as_str())])
            .await?;
        let changes: ApiChanges = self
            .client
            .get_json(&p.repo, &["commits", &p.commit_id, "changes"], &[])
            .await?;

        let files: Vec<Value> = changes.changes.iter().map(|c| c.to_json("status")).collect();
        Ok(json!({
            "hash": commit.commit_id,
            "author": commit.author_name(),
            "date": commit.author_date(),
            "message": commit.comment,
            "parents": commit.parents,
            "files": files,
        })
        .to_string())
    }
}

#[async_trait]
impl Tool for GetCommitDiffTool {
    fn name(&self) -> &str {
        "ado_get_commit_diff"
    }

    fn description(&self) -> &str {
        "Get the changes a commit made relative to its first parent.\n\nReturns: JSON object with change counts and changed files with their paths and change types."
    }

    fn parameters_schema(&self) -> Value {
        commit_schema()
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let p: CommitParams = parse_params(self.name(), params)?;
        let commit: ApiCommit = self
            .client
            .get_json(&p.repo, &["commits", &p.commit_id], &[])
            .await?;

        let Some(parent) = commit.parents.first() else {
            return Ok(json!({
                "commitId": p.commit_id,
                "message": "Initial commit - no parent to diff against",
                "changeCounts": commit
                    .change_counts
                    .unwrap_or_else(|| json!({ "Add": 0, "Edit": 0, "Delete": 0 })),
            })
            .to_string());
        };

        let diff = self.client.commit_diff(&p.repo, parent, &p.commit_id).await?;
        Ok(json!({
            "baseCommit": diff.base_commit,
            "targetCommit": diff.target_commit,
            "changeCounts": diff.change_counts,
            "allChangesIncluded": diff.all_changes_included,
            "changes": diff.changes_json(),
        })
        .to_string())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileContentParams {
    #[serde(flatten)]
    repo: AdoRepo,
    file_path: String,
    #[serde(rename = "ref")]
    reference: Option<String>,
}

#[async_trait]
impl Tool for GetFileContentTool {
    fn name(&self) -> &str {
        "ado_get_file_content"
    }

    fn description(&self) -> &str {
        "Get the content of a file at a commit or branch.\n\nReturns: the file content as text, or an error object for binary files."
    }

    fn parameters_schema(&self) -> Value {
        repo_schema().with(
            json!({
                "filePath": { "type": "string", "description": "Path to the file in the repository." },
                "ref": { "type": "string", "description": "Commit SHA or branch name. Defaults to the default branch." }
            }),
            &["filePath"],
        )
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let p: FileContentParams = parse_params(self.name(), params)?;
        let mut query = vec![("path", p.file_path.as_str()), ("includeContent", "true")];
        if let Some(reference) = p.reference.as_deref() {
            query.push(("versionDescriptor.version", reference));
            query.push(("versionDescriptor.versionType", version_type(reference)));
        }
        let bytes = self.client.get_bytes(&p.repo, &["items"], &query).await?;
        if is_binary_buffer(&bytes, DEFAULT_CHECK_LENGTH) {
            return Ok(binary_file_error(&p.file_path));
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileHistoryParams {
    #[serde(flatten)]
    repo: AdoRepo,
    file_path: String,
    limit: Option<u32>,
}

#[async_trait]
impl Tool for GetFileHistoryTool {
    fn name(&self) -> &str {
        "ado_get_file_history"
    }

    fn description(&self) -> &str {
        "Get the commits that modified a file.\n\nReturns: JSON array of {hash, shortHash, author, date, message}."
    }

    fn parameters_schema(&self) -> Value {
        repo_schema().with(
            json!({
                "filePath": { "type": "string", "description": "Path to the file in the repository." },
                "limit": { "type": "number", "description": "Maximum number of commits to return. Defaults to 20." }
            }),
            &["filePath"],
        )
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let p: FileHistoryParams = parse_params(self.name(), params)?;
        let top = p.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).to_string();
        let criteria = [
            ("searchCriteria.itemPath", p.file_path.as_str()),
            ("searchCriteria.$top", top.as_str()),
        ];
        let commits = self.client.commits(&p.repo, &criteria).await?;
        Ok(serde_json::to_string(&commits)?)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompareParams {
    #[serde(flatten)]
    repo: AdoRepo,
    base_commit: String,
    target_commit: String,
}

#[async_trait]
impl Tool for CompareCommitsTool {
    fn name(&self) -> &str {
        "ado_compare_commits"
    }

    fn description(&self) -> &str {
        "Compare two commits.\n\nReturns: JSON object with change counts and list of changed files."
    }

    fn parameters_schema(&self) -> Value {
        repo_schema().with(
            json!({
                "baseCommit": { "type": "string", "description": "Base commit ID to compare from." },
                "targetCommit": { "type": "string", "description": "Target commit ID to compare to." }
            }),
            &["baseCommit", "targetCommit"],
        )
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let p: CompareParams = parse_params(self.name(), params)?;
        let diff = self
            .client
            .commit_diff(&p.repo, &p.base_commit, &p.target_commit)
            .await?;
        Ok(json!({
            "baseCommit": diff.base_commit,
            "targetCommit": diff.target_commit,
            "commonCommit": diff.common_commit,
            "changeCounts": diff.change_counts,
            "allChangesIncluded": diff.all_changes_included,
            "changes": diff.changes_json(),
        })
        .to_string())
    }
}

pub struct AdoStrategy {
    client: Arc<AdoClient>,
}

impl AdoStrategy {
    pub fn new(client: Arc<AdoClient>) -> Self {
        Self { client }
    }
}

impl ProviderStrategy for AdoStrategy {
    fn provider(&self) -> RepoProvider {
        RepoProvider::Ado
    }

    fn tools(&self, credentials: Arc<Credentials>) -> Vec<Arc<dyn Tool>> {
        let c = &self.client;
        vec![
            Arc::new(GetAdoTokenTool::new(credentials)),
            Arc::new(GetRepoInfoTool::new(c.clone())),
            Arc::new(GetRecentCommitsTool::new(c.clone())),
            Arc::new(GetCommitDetailsTool::new(c.clone())),
            Arc::new(GetCommitDiffTool::new(c.clone())),
            Arc::new(GetFileContentTool::new(c.clone())),
            Arc::new(GetFileHistoryTool::new(c.clone())),
            Arc::new(CompareCommitsTool::new(c.clone())),
        ]
    }

    fn analysis_tools(&self) -> [Arc<dyn Tool>; 2] {
        [
            Arc::new(GetCommitDetailsTool::new(self.client.clone())),
            Arc::new(GetCommitDiffTool::new(self.client.clone())),
        ]
    }

    fn workflow_steps(&self) -> &'static str {
        "1. Call `get_config` to get configuration\n\
         2. Get repository info to verify access\n\
         3. Get recent commits for the configured branch and time window\n\
         4. For each commit: get details, diff, classify, analyze vital commits\n\
         5. Generate and save report using `save_report`"
    }

    fn parameter_note(&self) -> &'static str {
        "Use `organization`, `project`, `repository`, and `token` from config for all ADO tools."
    }

    fn analyzer(&self) -> AnalyzerSpec {
        AnalyzerSpec {
            description: "Analyze an Azure DevOps commit in detail using a sub-agent.\n\n\
                Use this tool for commits that need detailed analysis:\n\
                - Breaking changes\n\
                - New features\n\
                - Security-related changes\n\
                - Large commits (5+ files or 100+ lines)\n\
                - Changes to critical files\n\n\
                Returns a JSON object with classification, impact assessment, and key changes.",
            subject_label: "commit",
            subject_key: "commitId",
            params: &[
                ("organization", "Azure DevOps organization name."),
                ("project", "Azure DevOps project name."),
                ("repository", "Repository name."),
                ("token", "Azure DevOps access token."),
                ("commitId", "Commit ID to analyze."),
            ],
        }
    }
}
