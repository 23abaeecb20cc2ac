//! Local git provider.
//!
//! Every tool shells out to `git -C <repoPath> ...`. Output is capped so a
//! huge diff cannot exhaust memory.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tokio::process::Command;

use super::{
    binary_file_error, hours_ago, AnalyzerSpec, CommitSummary, ProviderStrategy, SchemaBase,
};
use crate::auth::Credentials;
use crate::binary::{is_binary_buffer, DEFAULT_CHECK_LENGTH};
use crate::config::RepoProvider;
use crate::tools::{parse_params, Tool};

const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;
/// `hash|shortHash|author|date|subject`
const LOG_FORMAT: &str = "--pretty=format:%H|%h|%an|%aI|%s";
const DEFAULT_HISTORY_COUNT: u32 = 10;

async fn git_bytes(repo_path: &str, args: &[&str]) -> Result<Vec<u8>> {
    let output = Command::new("git")
        .arg("-C")
        .arg(repo_path)
        .args(args)
        .output()
        .await
        .context("Failed to run git")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "git {} failed ({}): {}",
            args.first().copied().unwrap_or_default(),
            output.status,
            stderr.trim()
        );
    }
    if output.stdout.len() > MAX_OUTPUT_BYTES {
        bail!(
            "git output exceeded {} bytes; narrow the request",
            MAX_OUTPUT_BYTES
        );
    }
    Ok(output.stdout)
}

async fn git(repo_path: &str, args: &[&str]) -> Result<String> {
    let stdout = git_bytes(repo_path, args).await?;
    Ok(String::from_utf8_lossy(&stdout).trim().to_string())
}

fn since_arg(hours: f64) -> Result<String> {
    let since = hours_ago(hours, Utc::now())?;
    Ok(format!("--since={}", since.format("%Y-%m-%d %H:%M:%S +0000")))
}

/// Reject a revision or remote that git would parse as an option.
///
/// Callers also place these values after `--end-of-options`.
fn revision<'a>(name: &str, value: &'a str) -> Result<&'a str> {
    if value.starts_with('-') {
        bail!("{} must not start with '-' (got \"{}\")", name, value);
    }
    if value.is_empty() {
        bail!("{} must not be empty", name);
    }
    Ok(value)
}

/// Parse `LOG_FORMAT` lines. The subject may itself contain `|`.
pub fn parse_log(output: &str) -> Vec<CommitSummary> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let mut parts = line.splitn(5, '|');
            let mut next = || parts.next().unwrap_or_default().to_string();
            CommitSummary {
                hash: next(),
                short_hash: next(),
                author: next(),
                date: next(),
                message: next(),
            }
        })
        .collect()
}

/// Unique non-empty lines, first occurrence order.
pub fn unique_paths(output: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| seen.insert(*line))
        .map(str::to_string)
        .collect()
}

fn repo_schema() -> SchemaBase {
    SchemaBase::new(
        json!({
            "repoPath": { "type": "string", "description": "Absolute path to the git repository." }
        }),
        &["repoPath"],
    )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepoParams {
    repo_path: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WindowParams {
    repo_path: String,
    branch: String,
    hours: f64,
    path: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitParams {
    repo_path: String,
    commit_hash: String,
}

pub struct GetRepoStatusTool;

#[async_trait]
impl Tool for GetRepoStatusTool {
    fn name(&self) -> &str {
        "get_repo_status"
    }

    fn description(&self) -> &str {
        "Get the current branch and working tree status of the local repository.\n\nReturns: JSON object with branch and status lines."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        repo_schema().with(json!({}), &[])
    }

    async fn execute(&self, params: serde_json::Value) -> Result<String> {
        let p: RepoParams = parse_params(self.name(), params)?;
        let branch = git(&p.repo_path, &["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        let status = git(&p.repo_path, &["status", "--short", "--branch"]).await?;
        Ok(json!({
            "branch": branch,
            "status": status.lines().collect::<Vec<_>>(),
        })
        .to_string())
    }
}

pub struct FetchRemoteTool;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FetchParams {
    repo_path: String,
    remote: Option<String>,
}

#[async_trait]
impl Tool for FetchRemoteTool {
    fn name(&self) -> &str {
        "fetch_remote"
    }

    fn description(&self) -> &str {
        "Fetch the latest changes from the remote so recent commits are visible locally."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        repo_schema().with(
            json!({
                "remote": { "type": "string", "description": "Remote to fetch. Defaults to all remotes." }
            }),
            &[],
        )
    }

    async fn execute(&self, params: serde_json::Value) -> Result<String> {
        let p: FetchParams = parse_params(self.name(), params)?;
        match p.remote.as_deref() {
            Some(remote) => {
                let remote = revision("remote", remote)?;
                git(&p.repo_path, &["fetch", "--prune", "--end-of-options", remote]).await?
            }
            None => git(&p.repo_path, &["fetch", "--all", "--prune"]).await?,
        };
        Ok(json!({
            "success": true,
            "remote": p.remote.unwrap_or_else(|| "all".to_string()),
        })
        .to_string())
    }
}

pub struct GetRecentCommitsTool;

#[async_trait]
impl Tool for GetRecentCommitsTool {
    fn name(&self) -> &str {
        "get_recent_commits"
    }

    fn description(&self) -> &str {
        "Get commits from the last N hours on the specified branch, optionally limited to a path.\n\nReturns: JSON array of {hash, shortHash, author, date, message}."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        repo_schema().with(
            json!({
                "branch": { "type": "string", "description": "Branch name to get commits from." },
                "hours": { "type": "number", "description": "Number of hours to look back." },
                "path": { "type": "string", "description": "Optional path to filter commits by." }
            }),
            &["branch", "hours"],
        )
    }

    async fn execute(&self, params: serde_json::Value) -> Result<String> {
        let p: WindowParams = parse_params(self.name(), params)?;
        let since = since_arg(p.hours)?;
        let branch = revision("branch", &p.branch)?;
        let mut args = vec!["log", since.as_str(), LOG_FORMAT, "--end-of-options", branch];
        if let Some(path) = p.path.as_deref() {
            args.extend(["--", path]);
        }
        let output = git(&p.repo_path, &args).await?;
        Ok(serde_json::to_string(&parse_log(&output))?)
    }
}

pub struct GetCommitDetailsTool;

#[async_trait]
impl Tool for GetCommitDetailsTool {
    fn name(&self) -> &str {
        "get_commit_details"
    }

    fn description(&self) -> &str {
        "Get metadata and changed files for a commit.\n\nReturns: JSON object with hash, author, email, date, parents, message and files [{path, additions, deletions}]."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        repo_schema().with(
            json!({
                "commitHash": { "type": "string", "description": "Full or abbreviated commit hash." }
            }),
            &["commitHash"],
        )
    }

    async fn execute(&self, params: serde_json::Value) -> Result<String> {
        let p: CommitParams = parse_params(self.name(), params)?;
        let commit = revision("commitHash", &p.commit_hash)?;
        let meta = git(
            &p.repo_path,
            &[
                "show",
                "-s",
                "--format=%H%x00%an%x00%ae%x00%aI%x00%P%x00%B",
                "--end-of-options",
                commit,
            ],
        )
        .await?;
        let numstat = git(
            &p.repo_path,
            &["show", "--numstat", "--format=", "--end-of-options", commit],
        )
        .await?;

        let mut fields = meta.splitn(6, '\0');
        let mut next = || fields.next().unwrap_or_default().trim().to_string();
        let (hash, author, email, date, parents, message) =
            (next(), next(), next(), next(), next(), next());

        Ok(json!({
            "hash": hash,
            "author": author,
            "email": email,
            "date": date,
            "parents": parents.split_whitespace().collect::<Vec<_>>(),
            "message": message,
            "files": parse_numstat(&numstat),
        })
        .to_string())
    }
}

/// `additions<TAB>deletions<TAB>path`; binary files report `-`.
fn parse_numstat(output: &str) -> Vec<serde_json::Value> {
    output
        .lines()
        .filter_map(|line| {
            let mut cols = line.splitn(3, '\t');
            let additions = cols.next()?;
            let deletions = cols.next()?;
            let path = cols.next()?;
            Some(json!({
                "path": path,
                "additions": additions.parse::<u64>().ok(),
                "deletions": deletions.parse::<u64>().ok(),
            }))
        })
        .collect()
}

pub struct GetCommitDiffTool;

#[async_trait]
impl Tool for GetCommitDiffTool {
    fn name(&self) -> &str {
        "get_commit_diff"
    }

    fn description(&self) -> &str {
        "Get the unified diff for a commit.\n\nReturns: plain-text unified diff."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        repo_schema().with(
            json!({
                "commitHash": { "type": "string", "description": "Full or abbreviated commit hash." }
            }),
            &["commitHash"],
        )
    }

    async fn execute(&self, params: serde_json::Value) -> Result<String> {
        let p: CommitParams = parse_params(self.name(), params)?;
        let commit = revision("commitHash", &p.commit_hash)?;
        let diff = git(
            &p.repo_path,
            &["show", "--format=", "--patch", "--end-of-options", commit],
        )
        .await?;
        if diff.is_empty() {
            return Ok("(no diff content)".to_string());
        }
        Ok(diff)
    }
}

pub struct GetFileContentTool;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileContentParams {
    repo_path: String,
    file_path: String,
    #[serde(rename = "ref")]
    reference: Option<String>,
}

#[async_trait]
impl Tool for GetFileContentTool {
    fn name(&self) -> &str {
        "get_file_content"
    }

    fn description(&self) -> &str {
        "Get the content of a file at a given revision.\n\nReturns: file content as text, or an error object for binary files."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        repo_schema().with(
            json!({
                "filePath": { "type": "string", "description": "Path of the file relative to the repository root." },
                "ref": { "type": "string", "description": "Commit, branch or tag. Defaults to HEAD." }
            }),
            &["filePath"],
        )
    }

    async fn execute(&self, params: serde_json::Value) -> Result<String> {
        let p: FileContentParams = parse_params(self.name(), params)?;
        let reference = revision("ref", p.reference.as_deref().unwrap_or("HEAD"))?;
        let object = format!("{}:{}", reference, p.file_path);
        let bytes = git_bytes(&p.repo_path, &["show", "--end-of-options", &object]).await?;
        if is_binary_buffer(&bytes, DEFAULT_CHECK_LENGTH) {
            return Ok(binary_file_error(&p.file_path));
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

pub struct GetFileHistoryTool;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileHistoryParams {
    repo_path: String,
    file_path: String,
    max_count: Option<u32>,
}

#[async_trait]
impl Tool for GetFileHistoryTool {
    fn name(&self) -> &str {
        "get_file_history"
    }

    fn description(&self) -> &str {
        "Get the commits that touched a file, following renames.\n\nReturns: JSON array of {hash, shortHash, author, date, message}."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        repo_schema().with(
            json!({
                "filePath": { "type": "string", "description": "Path of the file relative to the repository root." },
                "maxCount": { "type": "number", "description": "Maximum number of commits to return. Defaults to 10." }
            }),
            &["filePath"],
        )
    }

    async fn execute(&self, params: serde_json::Value) -> Result<String> {
        let p: FileHistoryParams = parse_params(self.name(), params)?;
        let count = format!("--max-count={}", p.max_count.unwrap_or(DEFAULT_HISTORY_COUNT));
        let output = git(
            &p.repo_path,
            &["log", &count, "--follow", LOG_FORMAT, "--", &p.file_path],
        )
        .await?;
        Ok(serde_json::to_string(&parse_log(&output))?)
    }
}

pub struct SearchCommitsTool;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchParams {
    repo_path: String,
    query: String,
    branch: String,
    hours: f64,
}

#[async_trait]
impl Tool for SearchCommitsTool {
    fn name(&self) -> &str {
        "search_commits"
    }

    fn description(&self) -> &str {
        "Search for commits by message keyword within a time window (case-insensitive). Useful for finding related changes.\n\nReturns: JSON array of {hash, shortHash, author, date, message}."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        repo_schema().with(
            json!({
                "query": { "type": "string", "description": "Keyword or phrase to search for in commit messages." },
                "branch": { "type": "string", "description": "Branch name to search commits in." },
                "hours": { "type": "number", "description": "Number of hours to look back." }
            }),
            &["query", "branch", "hours"],
        )
    }

    async fn execute(&self, params: serde_json::Value) -> Result<String> {
        let p: SearchParams = parse_params(self.name(), params)?;
        let since = since_arg(p.hours)?;
        let branch = revision("branch", &p.branch)?;
        let grep = format!("--grep={}", p.query);
        let output = git(
            &p.repo_path,
            &[
                "log",
                &since,
                &grep,
                "--regexp-ignore-case",
                LOG_FORMAT,
                "--end-of-options",
                branch,
            ],
        )
        .await?;
        Ok(serde_json::to_string(&parse_log(&output))?)
    }
}

pub struct ListChangedFilesTool;

#[async_trait]
impl Tool for ListChangedFilesTool {
    fn name(&self) -> &str {
        "list_changed_files"
    }

    fn description(&self) -> &str {
        "List all unique files changed by commits within the time window.\n\nReturns: JSON array of file paths."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        repo_schema().with(
            json!({
                "branch": { "type": "string", "description": "Branch name to check for changed files." },
                "hours": { "type": "number", "description": "Number of hours to look back." }
            }),
            &["branch", "hours"],
        )
    }

    async fn execute(&self, params: serde_json::Value) -> Result<String> {
        let p: WindowParams = parse_params(self.name(), params)?;
        let since = since_arg(p.hours)?;
        let branch = revision("branch", &p.branch)?;
        let output = git(
            &p.repo_path,
            &["log", &since, "--name-only", "--pretty=format:", "--end-of-options", branch],
        )
        .await?;
        Ok(serde_json::to_string(&unique_paths(&output))?)
    }
}

pub struct GitStrategy;

impl ProviderStrategy for GitStrategy {
    fn provider(&self) -> RepoProvider {
        RepoProvider::Local
    }

    fn tools(&self, _credentials: Arc<Credentials>) -> Vec<Arc<dyn Tool>> {
        vec![
            Arc::new(GetRepoStatusTool),
            Arc::new(FetchRemoteTool),
            Arc::new(GetRecentCommitsTool),
            Arc::new(GetCommitDetailsTool),
            Arc::new(GetCommitDiffTool),
            Arc::new(GetFileContentTool),
            Arc::new(GetFileHistoryTool),
            Arc::new(SearchCommitsTool),
            Arc::new(ListChangedFilesTool),
        ]
    }

    fn analysis_tools(&self) -> [Arc<dyn Tool>; 2] {
        [Arc::new(GetCommitDetailsTool), Arc::new(GetCommitDiffTool)]
    }

    fn workflow_steps(&self) -> &'static str {
        "1. Call `get_config` to get configuration\n\
         2. Check repository status\n\
         3. Fetch latest changes from remote\n\
         4. Get recent commits for the configured branch and time window\n\
         5. For each commit: get details, diff, classify, analyze vital commits\n\
         6. Generate and save report using `save_report`"
    }

    fn parameter_note(&self) -> &'static str {
        "Use `repoPath` from config for all git tools."
    }

    fn analyzer(&self) -> AnalyzerSpec {
        AnalyzerSpec {
            description: "Analyze a local git commit in detail using a sub-agent.\n\n\
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
                ("repoPath", "Absolute path to the git repository."),
                ("commitHash", "The commit hash to analyze."),
            ],
        }
    }
}
