//! Gerrit provider backed by the anonymous REST API.
//!
//! Gerrit prefixes every JSON body with `)]}'` and a newline to defeat
//! XSSI; it is stripped before parsing. Patches and file contents come back
//! base64-encoded.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use super::{binary_file_error, check_status, hours_ago, AnalyzerSpec, ProviderStrategy, SchemaBase};
use crate::auth::Credentials;
use crate::binary::{decode_base64, is_binary_base64, DEFAULT_CHECK_LENGTH};
use crate::config::RepoProvider;
use crate::tools::{parse_params, Tool};

pub const XSSI_PREFIX: &str = ")]}'\n";
const QUERY_LIMIT: &str = "100";
const COMMIT_MSG_PATH: &str = "/COMMIT_MSG";

pub fn strip_xssi(body: &str) -> &str {
    body.strip_prefix(XSSI_PREFIX).unwrap_or(body)
}

/// Gerrit's query timestamp format, always UTC.
pub fn format_gerrit_timestamp(date: DateTime<Utc>) -> String {
    date.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Search terms for `GET /changes/?q=`.
#[derive(Debug, Default)]
pub struct ChangeQuery<'a> {
    pub project: &'a str,
    pub status: Option<&'a str>,
    pub branch: Option<&'a str>,
    pub after: Option<String>,
    pub dir: Option<&'a str>,
    pub file: Option<&'a str>,
}

impl ChangeQuery<'_> {
    /// `key:value` terms joined by spaces; values containing spaces are quoted.
    pub fn build(&self) -> String {
        let terms = [
            ("project", Some(self.project)),
            ("status", self.status),
            ("branch", self.branch),
            ("after", self.after.as_deref()),
            ("dir", self.dir),
            ("file", self.file),
        ];
        terms
            .iter()
            .filter_map(|(key, value)| {
                value.map(|v| {
                    if v.contains(' ') {
                        format!("{}:\"{}\"", key, v)
                    } else {
                        format!("{}:{}", key, v)
                    }
                })
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub struct GerritClient {
    http: reqwest::Client,
}

impl Default for GerritClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GerritClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// `host` may be a bare hostname or a full base URL.
    fn endpoint(host: &str, segments: &[&str]) -> Result<Url> {
        let base = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{}", host)
        };
        let mut url = Url::parse(&base).with_context(|| format!("Invalid Gerrit host: {}", host))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Invalid Gerrit host: {}", host))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn fetch_raw(&self, url: Url) -> Result<String> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .context("Gerrit request failed")?;
        check_status(response, "Gerrit")
            .await?
            .text()
            .await
            .context("Failed to read Gerrit response")
    }

    async fn fetch_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let body = self.fetch_raw(url).await?;
        serde_json::from_str(strip_xssi(&body)).context("Failed to parse Gerrit response")
    }

    pub async fn query_changes(&self, host: &str, query: &str) -> Result<Vec<ChangeSummary>> {
        let mut url = Self::endpoint(host, &["changes", ""])?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("n", QUERY_LIMIT);
        let changes: Vec<ApiChange> = self.fetch_json(url).await?;
        Ok(changes.into_iter().map(ChangeSummary::from).collect())
    }
}

#[derive(Deserialize)]
struct ApiChange {
    change_id: String,
    project: Option<String>,
    branch: String,
    subject: String,
    status: Option<String>,
    created: Option<String>,
    updated: String,
    #[serde(default)]
    insertions: u64,
    #[serde(default)]
    deletions: u64,
    #[serde(rename = "_number")]
    number: u64,
    #[serde(default)]
    owner: ApiAccount,
    current_revision: Option<String>,
    #[serde(default)]
    revisions: BTreeMap<String, ApiRevision>,
}

#[derive(Deserialize, Default)]
struct ApiAccount {
    name: Option<String>,
    email: Option<String>,
}

#[derive(Deserialize)]
struct ApiRevision {
    commit: Option<Value>,
}

/// A change as listed by the query tools.
#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSummary {
    pub number: u64,
    pub change_id: String,
    pub subject: String,
    pub branch: String,
    pub updated: String,
    pub insertions: u64,
    pub deletions: u64,
    pub owner: String,
}

impl From<ApiChange> for ChangeSummary {
    fn from(c: ApiChange) -> Self {
        Self {
            number: c.number,
            change_id: c.change_id,
            subject: c.subject,
            branch: c.branch,
            updated: c.updated,
            insertions: c.insertions,
            deletions: c.deletions,
            owner: c.owner.name.unwrap_or_default(),
        }
    }
}

fn host_schema() -> SchemaBase {
    SchemaBase::new(
        json!({
            "host": { "type": "string", "description": "Gerrit host (e.g. chromium-review.googlesource.com)." }
        }),
        &["host"],
    )
}

macro_rules! gerrit_tool {
    ($name:ident) => {
        pub struct $name {
            client: Arc<GerritClient>,
        }

        impl $name {
            pub fn new(client: Arc<GerritClient>) -> Self {
                Self { client }
            }
        }
    };
}

gerrit_tool!(GetDirectoryChangesTool);
gerrit_tool!(GetFileChangesTool);
gerrit_tool!(GetChangeDetailsTool);
gerrit_tool!(GetChangeDiffTool);
gerrit_tool!(GetFileContentTool);
gerrit_tool!(GetProjectInfoTool);
gerrit_tool!(GetChangedFilesTool);

#[derive(Deserialize)]
struct DirectoryChangesParams {
    host: String,
    project: String,
    branch: String,
    hours: f64,
    directory: Option<String>,
}

fn window_properties() -> Value {
    json!({
        "project": { "type": "string", "description": "Gerrit project name (e.g. chromium/src)." },
        "branch": { "type": "string", "description": "Branch name to get changes from." },
        "hours": { "type": "number", "description": "Number of hours to look back for merged changes." }
    })
}

#[async_trait]
impl Tool for GetDirectoryChangesTool {
    fn name(&self) -> &str {
        "gerrit_get_directory_changes"
    }

    fn description(&self) -> &str {
        "Get merged changes from a branch within the last N hours, optionally filtered by directory.\n\
         For filtering by a specific file, use gerrit_get_file_changes instead.\n\n\
         Returns: JSON array of {number, changeId, subject, branch, updated, insertions, deletions, owner}."
    }

    fn parameters_schema(&self) -> Value {
        let mut props = window_properties();
        props["directory"] = json!({
            "type": "string",
            "description": "Optional directory path to filter changes by (e.g. src/components)."
        });
        host_schema().with(props, &["project", "branch", "hours"])
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let p: DirectoryChangesParams = parse_params(self.name(), params)?;
        let query = ChangeQuery {
            project: &p.project,
            status: Some("merged"),
            branch: Some(&p.branch),
            after: Some(format_gerrit_timestamp(hours_ago(p.hours, Utc::now())?)),
            dir: p.directory.as_deref(),
            file: None,
        };
        let changes = self.client.query_changes(&p.host, &query.build()).await?;
        Ok(serde_json::to_string(&changes)?)
    }
}

#[derive(Deserialize)]
struct FileChangesParams {
    host: String,
    project: String,
    branch: String,
    hours: f64,
    file: String,
}

#[async_trait]
impl Tool for GetFileChangesTool {
    fn name(&self) -> &str {
        "gerrit_get_file_changes"
    }

    fn description(&self) -> &str {
        "Get merged changes touching a specific file within the last N hours.\n\
         For filtering by directory, use gerrit_get_directory_changes instead.\n\n\
         Returns: JSON array of change objects."
    }

    fn parameters_schema(&self) -> Value {
        let mut props = window_properties();
        props["file"] = json!({ "type": "string", "description": "File path to filter changes by." });
        host_schema().with(props, &["project", "branch", "hours", "file"])
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let p: FileChangesParams = parse_params(self.name(), params)?;
        let query = ChangeQuery {
            project: &p.project,
            status: Some("merged"),
            branch: Some(&p.branch),
            after: Some(format_gerrit_timestamp(hours_ago(p.hours, Utc::now())?)),
            dir: None,
            file: Some(&p.file),
        };
        let changes = self.client.query_changes(&p.host, &query.build()).await?;
        Ok(serde_json::to_string(&changes)?)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangeParams {
    host: String,
    change_id: String,
    revision: Option<String>,
}

impl ChangeParams {
    fn revision(&self) -> &str {
        self.revision.as_deref().unwrap_or("current")
    }
}

fn change_properties(with_revision: bool) -> Value {
    let mut props = json!({
        "changeId": { "type": "string", "description": "Change number or Change-Id." }
    });
    if with_revision {
        props["revision"] = json!({
            "type": "string",
            "description": "Revision ID (commit SHA or patch set number). Defaults to current."
        });
    }
    props
}

#[async_trait]
impl Tool for GetChangeDetailsTool {
    fn name(&self) -> &str {
        "gerrit_get_change_details"
    }

    fn description(&self) -> &str {
        "Get details of a change including the current revision's commit.\n\nReturns: JSON object with change details including commit info."
    }

    fn parameters_schema(&self) -> Value {
        host_schema().with(change_properties(false), &["changeId"])
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let p: ChangeParams = parse_params(self.name(), params)?;
        let mut url = GerritClient::endpoint(&p.host, &["changes", &p.change_id])?;
        url.query_pairs_mut()
            .append_pair("o", "CURRENT_REVISION")
            .append_pair("o", "CURRENT_COMMIT");
        let mut change: ApiChange = self.client.fetch_json(url).await?;

        let commit = change
            .current_revision
            .as_ref()
            .and_then(|rev| change.revisions.remove(rev))
            .and_then(|rev| rev.commit)
            .map(|c| {
                json!({
                    "subject": c["subject"],
                    "message": c["message"],
                    "author": c["author"],
                    "committer": c["committer"],
                })
            });

        Ok(json!({
            "number": change.number,
            "changeId": change.change_id,
            "project": change.project,
            "branch": change.branch,
            "subject": change.subject,
            "status": change.status,
            "created": change.created,
            "updated": change.updated,
            "insertions": change.insertions,
            "deletions": change.deletions,
            "owner": {
                "name": change.owner.name.unwrap_or_default(),
                "email": change.owner.email.unwrap_or_default(),
            },
            "currentRevision": change.current_revision,
            "commit": commit,
        })
        .to_string())
    }
}

#[async_trait]
impl Tool for GetChangeDiffTool {
    fn name(&self) -> &str {
        "gerrit_get_change_diff"
    }

    fn description(&self) -> &str {
        "Get the patch for a change revision.\n\nReturns: plain-text unified diff."
    }

    fn parameters_schema(&self) -> Value {
        host_schema().with(change_properties(true), &["changeId"])
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let p: ChangeParams = parse_params(self.name(), params)?;
        let url = GerritClient::endpoint(
            &p.host,
            &["changes", &p.change_id, "revisions", p.revision(), "patch"],
        )?;
        let encoded = self.client.fetch_raw(url).await?;
        let patch = decode_base64(&encoded).context("Gerrit patch is not valid base64")?;
        let patch = String::from_utf8_lossy(&patch);
        if patch.is_empty() {
            return Ok("(no diff content)".to_string());
        }
        Ok(patch.into_owned())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileContentParams {
    #[serde(flatten)]
    change: ChangeParams,
    file_path: String,
}

#[async_trait]
impl Tool for GetFileContentTool {
    fn name(&self) -> &str {
        "gerrit_get_file_content"
    }

    fn description(&self) -> &str {
        "Get the content of a file at a change revision.\n\nReturns: file content as text, or an error object for binary files."
    }

    fn parameters_schema(&self) -> Value {
        let mut props = change_properties(true);
        props["filePath"] = json!({ "type": "string", "description": "Path of the file in the repository." });
        host_schema().with(props, &["changeId", "filePath"])
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let p: FileContentParams = parse_params(self.name(), params)?;
        let url = GerritClient::endpoint(
            &p.change.host,
            &[
                "changes",
                &p.change.change_id,
                "revisions",
                p.change.revision(),
                "files",
                &p.file_path,
                "content",
            ],
        )?;
        let encoded = self.client.fetch_raw(url).await?;
        if is_binary_base64(&encoded, DEFAULT_CHECK_LENGTH) {
            return Ok(binary_file_error(&p.file_path));
        }
        let bytes = decode_base64(&encoded).context("Gerrit file content is not valid base64")?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[derive(Deserialize)]
struct ProjectParams {
    host: String,
    project: String,
}

#[derive(Deserialize)]
struct ApiProject {
    id: String,
    name: Option<String>,
    parent: Option<String>,
    state: Option<String>,
    #[serde(default)]
    web_links: Vec<Value>,
}

#[async_trait]
impl Tool for GetProjectInfoTool {
    fn name(&self) -> &str {
        "gerrit_get_project_info"
    }

    fn description(&self) -> &str {
        "Get project metadata. Useful to verify the project exists and is readable.\n\nReturns: JSON object with id, name, parent, state and webLinks."
    }

    fn parameters_schema(&self) -> Value {
        host_schema().with(
            json!({
                "project": { "type": "string", "description": "Gerrit project name (e.g. chromium/src)." }
            }),
            &["project"],
        )
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let p: ProjectParams = parse_params(self.name(), params)?;
        let url = GerritClient::endpoint(&p.host, &["projects", &p.project])?;
        let project: ApiProject = self.client.fetch_json(url).await?;
        Ok(json!({
            "id": project.id,
            "name": project.name.unwrap_or(p.project),
            "parent": project.parent,
            "state": project.state.unwrap_or_else(|| "ACTIVE".to_string()),
            "webLinks": project.web_links,
        })
        .to_string())
    }
}

#[derive(Deserialize)]
struct ApiFileInfo {
    status: Option<String>,
    lines_inserted: Option<u64>,
    lines_deleted: Option<u64>,
}

#[async_trait]
impl Tool for GetChangedFilesTool {
    fn name(&self) -> &str {
        "gerrit_get_changed_files"
    }

    fn description(&self) -> &str {
        "List the files modified by a change revision.\n\nReturns: JSON array of {path, status, insertions, deletions}."
    }

    fn parameters_schema(&self) -> Value {
        host_schema().with(change_properties(true), &["changeId"])
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let p: ChangeParams = parse_params(self.name(), params)?;
        let url = GerritClient::endpoint(
            &p.host,
            &["changes", &p.change_id, "revisions", p.revision(), "files", ""],
        )?;
        let files: BTreeMap<String, ApiFileInfo> = self.client.fetch_json(url).await?;
        let files: Vec<Value> = files
            .into_iter()
            .filter(|(path, _)| path != COMMIT_MSG_PATH)
            .map(|(path, info)| {
                json!({
                    "path": path,
                    "status": info.status.unwrap_or_else(|| "M".to_string()),
                    "insertions": info.lines_inserted.unwrap_or(0),
                    "deletions": info.lines_deleted.unwrap_or(0),
                })
            })
            .collect();
        Ok(serde_json::to_string(&files)?)
    }
}

pub struct GerritStrategy {
    client: Arc<GerritClient>,
}

impl GerritStrategy {
    pub fn new(client: Arc<GerritClient>) -> Self {
        Self { client }
    }
}

impl ProviderStrategy for GerritStrategy {
    fn provider(&self) -> RepoProvider {
        RepoProvider::Gerrit
    }

    fn tools(&self, _credentials: Arc<Credentials>) -> Vec<Arc<dyn Tool>> {
        let c = &self.client;
        vec![
            Arc::new(GetDirectoryChangesTool::new(c.clone())),
            Arc::new(GetFileChangesTool::new(c.clone())),
            Arc::new(GetChangeDetailsTool::new(c.clone())),
            Arc::new(GetChangeDiffTool::new(c.clone())),
            Arc::new(GetFileContentTool::new(c.clone())),
            Arc::new(GetProjectInfoTool::new(c.clone())),
            Arc::new(GetChangedFilesTool::new(c.clone())),
        ]
    }

    fn analysis_tools(&self) -> [Arc<dyn Tool>; 2] {
        [
            Arc::new(GetChangeDetailsTool::new(self.client.clone())),
            Arc::new(GetChangeDiffTool::new(self.client.clone())),
        ]
    }

    fn workflow_steps(&self) -> &'static str {
        "1. Call `get_config` to get configuration\n\
         2. Get project info to verify access\n\
         3. Get recent changes (merged) for the configured branch and time window\n\
         4. For each change: get details, diff, classify, analyze vital changes\n\
         5. Generate and save report using `save_report`"
    }

    fn parameter_note(&self) -> &'static str {
        "Use `host` and `project` from config for all Gerrit tools. No authentication required."
    }

    fn analyzer(&self) -> AnalyzerSpec {
        AnalyzerSpec {
            description: "Analyze a Gerrit change in detail using a sub-agent.\n\n\
                Use this tool for changes that need detailed analysis:\n\
                - Breaking changes\n\
                - New features\n\
                - Security-related changes\n\
                - Large changes (5+ files or 100+ lines)\n\
                - Changes to critical files\n\n\
                Returns a JSON object with classification, impact assessment, and key changes.",
            subject_label: "change",
            subject_key: "changeId",
            params: &[
                ("host", "Gerrit host."),
                ("changeId", "Change ID to analyze."),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use chrono::TimeZone;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_query_builder() {
        let q = ChangeQuery {
            project: "chromium/src",
            status: Some("merged"),
            branch: Some("main"),
            ..Default::default()
        };
        assert_eq!(q.build(), "project:chromium/src status:merged branch:main");

        let q = ChangeQuery {
            project: "chromium/src",
            after: Some("2025-11-27 08:00:00".to_string()),
            dir: Some("src/components"),
            ..Default::default()
        };
        assert_eq!(
            q.build(),
            "project:chromium/src after:\"2025-11-27 08:00:00\" dir:src/components"
        );
    }

    #[test]
    fn test_timestamp_format() {
        let date = Utc.with_ymd_and_hms(2025, 11, 27, 8, 5, 9).unwrap();
        assert_eq!(format_gerrit_timestamp(date), "2025-11-27 08:05:09");
    }

    #[test]
    fn test_prefixed_and_plain_json_parse_identically() {
        let payload = r#"[{"_number": 42, "subject": "Fix"}]"#;
        let prefixed = format!("{}{}", XSSI_PREFIX, payload);
        let a: Value = serde_json::from_str(strip_xssi(&prefixed)).unwrap();
        let b: Value = serde_json::from_str(strip_xssi(payload)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let url = GerritClient::endpoint("review.example.org", &["projects", "platform/core"]).unwrap();
        assert_eq!(url.as_str(), "https://review.example.org/projects/platform%2Fcore");
        let url = GerritClient::endpoint("http://127.0.0.1:8080", &["changes", ""]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/changes/");
    }

    fn xssi(body: Value) -> String {
        format!("{}{}", XSSI_PREFIX, body)
    }

    #[tokio::test]
    async fn test_directory_changes_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/changes/"))
            .and(query_param("n", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_string(xssi(json!([{
                "id": "x", "project": "platform/core", "branch": "main",
                "change_id": "I123", "subject": "Add feature", "status": "MERGED",
                "created": "2025-12-01 10:00:00.000000000",
                "updated": "2025-12-01 11:00:00.000000000",
                "insertions": 12, "deletions": 3, "_number": 4242,
                "owner": { "name": "Ada" }
            }]))))
            .mount(&server)
            .await;

        let out = GetDirectoryChangesTool::new(Arc::new(GerritClient::new()))
            .execute(json!({
                "host": server.uri(), "project": "platform/core",
                "branch": "main", "hours": 24, "directory": "ai/apps"
            }))
            .await
            .unwrap();
        let changes: Vec<Value> = serde_json::from_str(&out).unwrap();
        assert_eq!(changes[0]["number"], 4242);
        assert_eq!(changes[0]["changeId"], "I123");
        assert_eq!(changes[0]["owner"], "Ada");

        let requests = server.received_requests().await.unwrap();
        let q = requests[0]
            .url
            .query_pairs()
            .find(|(k, _)| k == "q")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        assert!(q.starts_with("project:platform/core status:merged branch:main after:\""));
        assert!(q.ends_with(" dir:ai/apps"));
    }

    #[tokio::test]
    async fn test_change_details_picks_current_revision() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/changes/4242"))
            .and(query_param("o", "CURRENT_COMMIT"))
            .respond_with(ResponseTemplate::new(200).set_body_string(xssi(json!({
                "project": "p", "branch": "main", "change_id": "I1", "subject": "s",
                "status": "MERGED", "updated": "u", "_number": 4242,
                "owner": { "name": "Ada", "email": "ada@example.com" },
                "current_revision": "abc",
                "revisions": { "abc": { "_number": 2, "commit": {
                    "subject": "s", "message": "s\n\nbody",
                    "author": { "name": "Ada" }, "committer": { "name": "Bot" }
                }}}
            }))))
            .mount(&server)
            .await;

        let out = GetChangeDetailsTool::new(Arc::new(GerritClient::new()))
            .execute(json!({ "host": server.uri(), "changeId": "4242" }))
            .await
            .unwrap();
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["currentRevision"], "abc");
        assert_eq!(v["commit"]["message"], "s\n\nbody");
        assert_eq!(v["owner"]["email"], "ada@example.com");
    }

    #[tokio::test]
    async fn test_diff_and_changed_files() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/changes/7/revisions/current/patch"))
            .respond_with(ResponseTemplate::new(200).set_body_string(STANDARD.encode("diff --git a/x b/x\n")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/changes/7/revisions/current/files/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(xssi(json!({
                "/COMMIT_MSG": { "status": "A", "lines_inserted": 10 },
                "src/a.cc": { "lines_inserted": 5, "lines_deleted": 1 },
                "src/b.cc": { "status": "D", "lines_deleted": 20 }
            }))))
            .mount(&server)
            .await;

        let client = Arc::new(GerritClient::new());
        let diff = GetChangeDiffTool::new(client.clone())
            .execute(json!({ "host": server.uri(), "changeId": "7" }))
            .await
            .unwrap();
        assert_eq!(diff, "diff --git a/x b/x\n");

        let out = GetChangedFilesTool::new(client)
            .execute(json!({ "host": server.uri(), "changeId": "7" }))
            .await
            .unwrap();
        let files: Vec<Value> = serde_json::from_str(&out).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0]["path"], "src/a.cc");
        assert_eq!(files[0]["status"], "M");
        assert_eq!(files[1]["status"], "D");
    }

    #[tokio::test]
    async fn test_binary_file_content() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/changes/7/revisions/3/files/img%2Flogo.png/content"))
            .respond_with(ResponseTemplate::new(200).set_body_string(STANDARD.encode([1u8, 0, 2])))
            .mount(&server)
            .await;

        let out = GetFileContentTool::new(Arc::new(GerritClient::new()))
            .execute(json!({
                "host": server.uri(), "changeId": "7", "revision": "3", "filePath": "img/logo.png"
            }))
            .await
            .unwrap();
        assert!(out.contains("File is binary"));
    }
}
