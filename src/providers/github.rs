//! GitHub provider backed by the REST API.

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use super::{
    binary_file_error, check_status, hours_ago, AnalyzerSpec, CommitSummary, ProviderStrategy,
    SchemaBase,
};
use crate::auth::Credentials;
use crate::binary::{decode_base64, is_binary_base64, DEFAULT_CHECK_LENGTH};
use crate::config::RepoProvider;
use crate::tools::config::GetGithubTokenTool;
use crate::tools::{parse_params, Tool};

pub const GITHUB_API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("repo-sentinel/", env!("CARGO_PKG_VERSION"));
const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const DIFF_MEDIA_TYPE: &str = "application/vnd.github.diff";
const RECENT_COMMITS_PAGE: u32 = 100;
const DEFAULT_HISTORY_COUNT: u32 = 10;

pub struct GithubClient {
    http: reqwest::Client,
    base_url: String,
}

impl Default for GithubClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GithubClient {
    pub fn new() -> Self {
        Self::with_base_url(GITHUB_API_BASE)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid GitHub API base: {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("GitHub API base cannot hold a path: {}", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
        token: Option<&str>,
        accept: &str,
    ) -> Result<reqwest::Response> {
        let url = self.endpoint(segments)?;
        let mut request = self
            .http
            .get(url)
            .query(query)
            .header("User-Agent", USER_AGENT)
            .header("Accept", accept)
            .header("X-GitHub-Api-Version", "2022-11-28");
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.context("GitHub request failed")?;
        check_status(response, "GitHub").await
    }

    pub async fn get_json(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
        token: Option<&str>,
    ) -> Result<Value> {
        self.get(segments, query, token, JSON_MEDIA_TYPE)
            .await?
            .json()
            .await
            .context("Failed to parse GitHub response")
    }

    pub async fn get_text(
        &self,
        segments: &[&str],
        token: Option<&str>,
        accept: &str,
    ) -> Result<String> {
        self.get(segments, &[], token, accept)
            .await?
            .text()
            .await
            .context("Failed to read GitHub response")
    }
}

#[derive(Deserialize)]
struct ApiCommit {
    sha: String,
    commit: ApiCommitData,
}

#[derive(Deserialize)]
struct ApiCommitData {
    author: Option<ApiSignature>,
    message: String,
}

#[derive(Deserialize)]
struct ApiSignature {
    name: Option<String>,
    date: Option<String>,
}

impl From<ApiCommit> for CommitSummary {
    fn from(c: ApiCommit) -> Self {
        let (author, date) = c
            .commit
            .author
            .map(|a| (a.name.unwrap_or_default(), a.date.unwrap_or_default()))
            .unwrap_or_default();
        CommitSummary::new(&c.sha, &author, &date, &c.commit.message)
    }
}

fn summarize(commits: Value) -> Result<Vec<CommitSummary>> {
    let commits: Vec<ApiCommit> =
        serde_json::from_value(commits).context("Unexpected GitHub commit list shape")?;
    Ok(commits.into_iter().map(CommitSummary::from).collect())
}

fn repo_schema() -> SchemaBase {
    SchemaBase::new(
        json!({
            "owner": { "type": "string", "description": "Repository owner (username or organization)." },
            "repo": { "type": "string", "description": "Repository name." },
            "token": { "type": "string", "description": "Optional GitHub token for private repos or higher rate limits." }
        }),
        &["owner", "repo"],
    )
}

#[derive(Deserialize)]
struct RepoParams {
    owner: String,
    repo: String,
    token: Option<String>,
}

macro_rules! github_tool {
    ($name:ident) => {
        pub struct $name {
            client: Arc<GithubClient>,
        }

        impl $name {
            pub fn new(client: Arc<GithubClient>) -> Self {
                Self { client }
            }
        }
    };
}

github_tool!(GetRepoStatusTool);
github_tool!(GetRecentCommitsTool);
github_tool!(GetCommitDetailsTool);
github_tool!(GetCommitDiffTool);
github_tool!(GetFileContentTool);
github_tool!(GetFileHistoryTool);
github_tool!(CompareCommitsTool);

#[async_trait]
impl Tool for GetRepoStatusTool {
    fn name(&self) -> &str {
        "github_get_repo_status"
    }

    fn description(&self) -> &str {
        "Get repository information including default branch, visibility, and recent activity.\n\nReturns: JSON object with repository details from the GitHub API."
    }

    fn parameters_schema(&self) -> Value {
        repo_schema().with(json!({}), &[])
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let p: RepoParams = parse_params(self.name(), params)?;
        let data = self
            .client
            .get_json(&["repos", &p.owner, &p.repo], &[], p.token.as_deref())
            .await?;
        Ok(data.to_string())
    }
}

#[derive(Deserialize)]
struct RecentCommitsParams {
    #[serde(flatten)]
    repo: RepoParams,
    branch: String,
    hours: f64,
    path: Option<String>,
}

#[async_trait]
impl Tool for GetRecentCommitsTool {
    fn name(&self) -> &str {
        "github_get_recent_commits"
    }

    fn description(&self) -> &str {
        "Get recent commits from a branch within the last N hours.\n\nReturns: JSON array of {hash, shortHash, author, date, message}."
    }

    fn parameters_schema(&self) -> Value {
        repo_schema().with(
            json!({
                "branch": { "type": "string", "description": "Branch name to get commits from." },
                "hours": { "type": "number", "description": "Number of hours to look back for commits." },
                "path": { "type": "string", "description": "Optional file path to filter commits by." }
            }),
            &["branch", "hours"],
        )
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let p: RecentCommitsParams = parse_params(self.name(), params)?;
        let since = hours_ago(p.hours, Utc::now())?.to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut query = vec![
            ("sha", p.branch),
            ("since", since),
            ("per_page", RECENT_COMMITS_PAGE.to_string()),
        ];
        if let Some(path) = p.path {
            query.push(("path", path));
        }
        let data = self
            .client
            .get_json(
                &["repos", &p.repo.owner, &p.repo.repo, "commits"],
                &query,
                p.repo.token.as_deref(),
            )
            .await?;
        Ok(serde_json::to_string(&summarize(data)?)?)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitParams {
    #[serde(flatten)]
    repo: RepoParams,
    commit_hash: String,
}

fn commit_schema() -> Value {
    repo_schema().with(
        json!({
            "commitHash": { "type": "string", "description": "Full or abbreviated commit SHA." }
        }),
        &["commitHash"],
    )
}

#[async_trait]
impl Tool for GetCommitDetailsTool {
    fn name(&self) -> &str {
        "github_get_commit_details"
    }

    fn description(&self) -> &str {
        "Get detailed information about a specific commit including changed files.\n\nReturns: JSON commit object from the GitHub API with full details and files array."
    }

    fn parameters_schema(&self) -> Value {
        commit_schema()
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let p: CommitParams = parse_params(self.name(), params)?;
        let data = self
            .client
            .get_json(
                &["repos", &p.repo.owner, &p.repo.repo, "commits", &p.commit_hash],
                &[],
                p.repo.token.as_deref(),
            )
            .await?;
        Ok(data.to_string())
    }
}

#[async_trait]
impl Tool for GetCommitDiffTool {
    fn name(&self) -> &str {
        "github_get_commit_diff"
    }

    fn description(&self) -> &str {
        "Get the diff/patch for a specific commit.\n\nReturns: unified diff showing all changes made in the commit."
    }

    fn parameters_schema(&self) -> Value {
        commit_schema()
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let p: CommitParams = parse_params(self.name(), params)?;
        let diff = self
            .client
            .get_text(
                &["repos", &p.repo.owner, &p.repo.repo, "commits", &p.commit_hash],
                p.repo.token.as_deref(),
                DIFF_MEDIA_TYPE,
            )
            .await?;
        if diff.is_empty() {
            return Ok("(no diff content)".to_string());
        }
        Ok(diff)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileContentParams {
    #[serde(flatten)]
    repo: RepoParams,
    file_path: String,
    #[serde(rename = "ref")]
    reference: Option<String>,
}

#[derive(Deserialize)]
struct ContentResponse {
    #[serde(rename = "type")]
    kind: String,
    content: Option<String>,
}

#[async_trait]
impl Tool for GetFileContentTool {
    fn name(&self) -> &str {
        "github_get_file_content"
    }

    fn description(&self) -> &str {
        "Get the content of a file at a branch, tag or commit.\n\nReturns: file content as text, or an error object for binary files."
    }

    fn parameters_schema(&self) -> Value {
        repo_schema().with(
            json!({
                "filePath": { "type": "string", "description": "Path to the file within the repository." },
                "ref": { "type": "string", "description": "Branch, tag or commit SHA. Defaults to the default branch." }
            }),
            &["filePath"],
        )
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let p: FileContentParams = parse_params(self.name(), params)?;
        let mut segments = vec!["repos", p.repo.owner.as_str(), p.repo.repo.as_str(), "contents"];
        segments.extend(p.file_path.split('/').filter(|s| !s.is_empty()));
        let query: Vec<(&str, String)> = p
            .reference
            .clone()
            .map(|r| vec![("ref", r)])
            .unwrap_or_default();

        let data = self
            .client
            .get_json(&segments, &query, p.repo.token.as_deref())
            .await?;
        if data.is_array() {
            bail!("{} is a directory, not a file", p.file_path);
        }
        let file: ContentResponse =
            serde_json::from_value(data).context("Unexpected GitHub content shape")?;
        if file.kind != "file" {
            bail!("{} is a {}, not a file", p.file_path, file.kind);
        }
        let encoded = file.content.unwrap_or_default();
        if is_binary_base64(&encoded, DEFAULT_CHECK_LENGTH) {
            return Ok(binary_file_error(&p.file_path));
        }
        let bytes = decode_base64(&encoded).context("Invalid base64 file content")?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileHistoryParams {
    #[serde(flatten)]
    repo: RepoParams,
    file_path: String,
    max_count: Option<u32>,
    #[serde(rename = "ref")]
    reference: Option<String>,
}

#[async_trait]
impl Tool for GetFileHistoryTool {
    fn name(&self) -> &str {
        "github_get_file_history"
    }

    fn description(&self) -> &str {
        "Get the commit history for a specific file.\n\nReturns: JSON array of {hash, shortHash, author, date, message}."
    }

    fn parameters_schema(&self) -> Value {
        repo_schema().with(
            json!({
                "filePath": { "type": "string", "description": "Path to the file within the repository." },
                "maxCount": { "type": "number", "description": "Maximum number of commits to return. Defaults to 10." },
                "ref": { "type": "string", "description": "Branch or commit to start history from." }
            }),
            &["filePath"],
        )
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let p: FileHistoryParams = parse_params(self.name(), params)?;
        let mut query = vec![
            ("path", p.file_path),
            (
                "per_page",
                p.max_count.unwrap_or(DEFAULT_HISTORY_COUNT).to_string(),
            ),
        ];
        if let Some(reference) = p.reference {
            query.push(("sha", reference));
        }
        let data = self
            .client
            .get_json(
                &["repos", &p.repo.owner, &p.repo.repo, "commits"],
                &query,
                p.repo.token.as_deref(),
            )
            .await?;
        Ok(serde_json::to_string(&summarize(data)?)?)
    }
}

#[derive(Deserialize)]
struct CompareParams {
    #[serde(flatten)]
    repo: RepoParams,
    base: String,
    head: String,
}

#[derive(Deserialize)]
struct CompareResponse {
    status: String,
    ahead_by: u64,
    behind_by: u64,
    total_commits: u64,
    commits: Vec<ApiCommit>,
    #[serde(default)]
    files: Vec<CompareFile>,
}

#[derive(Deserialize)]
struct CompareFile {
    filename: String,
    status: String,
    additions: u64,
    deletions: u64,
}

#[async_trait]
impl Tool for CompareCommitsTool {
    fn name(&self) -> &str {
        "github_compare_commits"
    }

    fn description(&self) -> &str {
        "Compare two commits, branches, or tags.\n\nReturns: JSON object with status, aheadBy, behindBy, totalCommits, commits and changed files."
    }

    fn parameters_schema(&self) -> Value {
        repo_schema().with(
            json!({
                "base": { "type": "string", "description": "Base commit SHA, branch name, or tag to compare from." },
                "head": { "type": "string", "description": "Head commit SHA, branch name, or tag to compare to." }
            }),
            &["base", "head"],
        )
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let p: CompareParams = parse_params(self.name(), params)?;
        let range = format!("{}...{}", p.base, p.head);
        let data = self
            .client
            .get_json(
                &["repos", &p.repo.owner, &p.repo.repo, "compare", &range],
                &[],
                p.repo.token.as_deref(),
            )
            .await?;
        let cmp: CompareResponse =
            serde_json::from_value(data).context("Unexpected GitHub compare shape")?;

        let files: Vec<Value> = cmp
            .files
            .into_iter()
            .filter(|f| f.status != "unchanged")
            .map(|f| {
                json!({
                    "path": f.filename,
                    "status": f.status,
                    "additions": f.additions,
                    "deletions": f.deletions,
                })
            })
            .collect();
        let commits: Vec<CommitSummary> = cmp.commits.into_iter().map(CommitSummary::from).collect();

        Ok(json!({
            "status": cmp.status,
            "aheadBy": cmp.ahead_by,
            "behindBy": cmp.behind_by,
            "totalCommits": cmp.total_commits,
            "commits": commits,
            "files": files,
        })
        .to_string())
    }
}

pub struct GithubStrategy {
    client: Arc<GithubClient>,
}

impl GithubStrategy {
    pub fn new(client: Arc<GithubClient>) -> Self {
        Self { client }
    }
}

impl ProviderStrategy for GithubStrategy {
    fn provider(&self) -> RepoProvider {
        RepoProvider::Github
    }

    fn tools(&self, credentials: Arc<Credentials>) -> Vec<Arc<dyn Tool>> {
        let c = &self.client;
        vec![
            Arc::new(GetGithubTokenTool::new(credentials)),
            Arc::new(GetRepoStatusTool::new(c.clone())),
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
         2. Check repository status\n\
         3. Get recent commits for the configured branch and time window\n\
         4. For each commit: get details, diff, classify, analyze vital commits\n\
         5. Generate and save report using `save_report`"
    }

    fn parameter_note(&self) -> &'static str {
        "Use `owner`, `repo`, and `token` from config for all repository tools."
    }

    fn analyzer(&self) -> AnalyzerSpec {
        AnalyzerSpec {
            description: "Analyze a GitHub commit in detail using a sub-agent.\n\n\
                Use this tool for commits that need detailed analysis:\n\
                - Breaking changes\n\
                - New features\n\
                - Security-related changes\n\
                - Large commits (5+ files or 100+ lines)\n\
                - Changes to critical files\n\n\
                Returns a JSON object with classification, impact assessment, and key changes.",
            subject_label: "commit",
            subject_key: "commitHash",
            params: &[
                ("owner", "Repository owner (username or organization)."),
                ("repo", "Repository name."),
                ("token", "GitHub access token."),
                ("commitHash", "Commit SHA to analyze."),
            ],
        }
    }
}
