//! Report tools: save, list and read Markdown reports.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::{parse_params, Tool};
use crate::report::{generate_report_filename, ReportError, ReportStore};

const MAX_LIST_LIMIT: i64 = 100;

pub struct SaveReportTool {
    store: Arc<ReportStore>,
}

impl SaveReportTool {
    pub fn new(store: Arc<ReportStore>) -> Self {
        Self { store }
    }
}

#[derive(Deserialize)]
struct SaveReportParams {
    content: String,
    project: String,
    branch: String,
    topic: Option<String>,
}

#[async_trait]
impl Tool for SaveReportTool {
    fn name(&self) -> &str {
        "save_report"
    }

    fn description(&self) -> &str {
        "Save a Markdown report to the report directory. The filename is generated from the current UTC time, project, branch and optional topic."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "content": { "type": "string", "description": "The Markdown content of the report" },
                "project": { "type": "string", "description": "Project or repository name" },
                "branch": { "type": "string", "description": "Branch the report covers" },
                "topic": { "type": "string", "description": "Optional topic, e.g. a sub-path" }
            },
            "required": ["content", "project", "branch"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<String> {
        let p: SaveReportParams = parse_params(self.name(), params)?;
        let filename =
            match generate_report_filename(&p.project, &p.branch, p.topic.as_deref(), Utc::now()) {
                Ok(filename) => filename,
                Err(e) => return save_error(self.store.dir(), &e),
            };
        let file_path = self.store.dir().join(&filename);

        match self.store.save(&filename, &p.content).await {
            Ok(path) => {
                info!(path = %path.display(), "report saved");
                let out = json!({
                    "success": true,
                    "filename": filename,
                    "filePath": path.display().to_string(),
                });
                Ok(serde_json::to_string_pretty(&out)?)
            }
            Err(e) => save_error(&file_path, &e),
        }
    }
}

fn save_error(file_path: &Path, error: &ReportError) -> Result<String> {
    let out = json!({
        "error": "Failed to save report",
        "filePath": file_path.display().to_string(),
        "details": error.to_string(),
    });
    Ok(serde_json::to_string_pretty(&out)?)
}

pub struct ListReportsTool {
    store: Arc<ReportStore>,
}

impl ListReportsTool {
    pub fn new(store: Arc<ReportStore>) -> Self {
        Self { store }
    }
}

#[derive(Deserialize)]
struct ListReportsParams {
    limit: i64,
}

#[async_trait]
impl Tool for ListReportsTool {
    fn name(&self) -> &str {
        "list_reports"
    }

    fn description(&self) -> &str {
        "List previous reports, most recently modified first."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": MAX_LIST_LIMIT,
                    "description": "Maximum number of reports to return (1-100)."
                }
            },
            "required": ["limit"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<String> {
        let p: ListReportsParams = parse_params(self.name(), params)?;
        if !(1..=MAX_LIST_LIMIT).contains(&p.limit) {
            let out = json!({
                "error": format!("limit must be between 1 and {}", MAX_LIST_LIMIT),
            });
            return Ok(out.to_string());
        }

        let out = match self.store.list(p.limit as usize).await {
            Ok(reports) => serde_json::to_value(reports)?,
            Err(e) => json!({
                "error": "Failed to list reports",
                "details": e.to_string(),
            }),
        };
        Ok(serde_json::to_string_pretty(&out)?)
    }
}

pub struct ReadReportTool {
    store: Arc<ReportStore>,
}

impl ReadReportTool {
    pub fn new(store: Arc<ReportStore>) -> Self {
        Self { store }
    }
}

#[derive(Deserialize)]
struct ReadReportParams {
    filename: String,
}

#[async_trait]
impl Tool for ReadReportTool {
    fn name(&self) -> &str {
        "read_report"
    }

    fn description(&self) -> &str {
        "Read the content of a previous report by filename (as returned by list_reports)."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "filename": { "type": "string", "description": "Report filename ending in .md" }
            },
            "required": ["filename"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<String> {
        let p: ReadReportParams = parse_params(self.name(), params)?;
        match self.store.read(&p.filename).await {
            Ok(content) => Ok(content),
            Err(e) => Ok(json!({
                "error": "Failed to read report",
                "filename": p.filename,
                "details": e.to_string(),
            })
            .to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, Arc<ReportStore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ReportStore::new(dir.path().join("reports")));
        (dir, store)
    }

    #[tokio::test]
    async fn test_save_then_list_and_read() {
        let (_dir, store) = store();
        let save = SaveReportTool::new(store.clone());
        let out: serde_json::Value = serde_json::from_str(
            &save
                .execute(json!({
                    "content": "# Weekly Report",
                    "project": "My Repo",
                    "branch": "main",
                    "topic": "ai/apps"
                }))
                .await
                .unwrap(),
        )
        .unwrap();

        assert_eq!(out["success"], true);
        let filename = out["filename"].as_str().unwrap().to_string();
        assert!(filename.ends_with("-my-repo-main-ai-apps.md"));
        assert!(crate::report::parse_report_timestamp(&filename).is_some());

        let list: serde_json::Value = serde_json::from_str(
            &ListReportsTool::new(store.clone())
                .execute(json!({ "limit": 10 }))
                .await
                .unwrap(),
        )
        .unwrap();
        assert_eq!(list[0]["filename"], filename.as_str());
        assert!(list[0]["modifiedAt"].is_string());

        let content = ReadReportTool::new(store)
            .execute(json!({ "filename": filename }))
            .await
            .unwrap();
        assert_eq!(content, "# Weekly Report");
    }

    #[tokio::test]
    async fn test_save_rejects_blank_components() {
        let (_dir, store) = store();
        let save = SaveReportTool::new(store.clone());
        for (project, branch, field) in [("  ", "main", "project"), ("repo", "", "branch")] {
            let out: serde_json::Value = serde_json::from_str(
                &save
                    .execute(json!({ "content": "x", "project": project, "branch": branch }))
                    .await
                    .unwrap(),
            )
            .unwrap();
            assert_eq!(out["error"], "Failed to save report");
            assert_eq!(out["filePath"], store.dir().display().to_string());
            assert!(out["details"].as_str().unwrap().contains(field));
        }
        assert!(!store.dir().exists());
    }

    #[tokio::test]
    async fn test_list_limit_bounds() {
        let (_dir, store) = store();
        let list = ListReportsTool::new(store);
        for limit in [0, -3, 101, 500] {
            let out: serde_json::Value =
                serde_json::from_str(&list.execute(json!({ "limit": limit })).await.unwrap())
                    .unwrap();
            assert_eq!(out["error"], "limit must be between 1 and 100", "{limit}");
        }
        for limit in [1, 100] {
            let out = list.execute(json!({ "limit": limit })).await.unwrap();
            assert_eq!(out, "[]");
        }
        assert!(list.execute(json!({})).await.is_err());
    }

    #[tokio::test]
    async fn test_list_missing_dir_is_empty() {
        let (_dir, store) = store();
        let out = ListReportsTool::new(store)
            .execute(json!({ "limit": 5 }))
            .await
            .unwrap();
        assert_eq!(out, "[]");
    }

    #[tokio::test]
    async fn test_read_rejects_non_markdown() {
        let (_dir, store) = store();
        let out: serde_json::Value = serde_json::from_str(
            &ReadReportTool::new(store)
                .execute(json!({ "filename": "../../etc/passwd" }))
                .await
                .unwrap(),
        )
        .unwrap();
        assert_eq!(out["error"], "Failed to read report");
        assert!(out["details"].as_str().unwrap().contains(".md"));
    }
}
