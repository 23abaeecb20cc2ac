//! Report naming and the on-disk report store.
//!
//! Reports are Markdown files named
//! `<YYYY-MM-DDTHH-MM-SSZ>-<project>-<branch>[-<topic>].md`. They are
//! written once with an exclusive create and never modified afterwards.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDateTime, SecondsFormat, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%SZ";
/// Length of a formatted timestamp, e.g. `2025-12-03T14-30-00Z`.
const TIMESTAMP_LEN: usize = 20;
const REPORT_EXTENSION: &str = ".md";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("{0} cannot be empty")]
    EmptyComponent(&'static str),
    #[error("report already exists: {}", .0.display())]
    AlreadyExists(PathBuf),
    #[error("invalid report filename: {0}")]
    InvalidFilename(String),
    #[error("report I/O failed for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Build a report filename for the given moment.
///
/// Name components are lowercased, anything outside `[a-z0-9-]` becomes a
/// hyphen, and runs of hyphens collapse. Whitespace-only components are
/// rejected.
pub fn generate_report_filename(
    project: &str,
    branch: &str,
    topic: Option<&str>,
    date: DateTime<Utc>,
) -> Result<String, ReportError> {
    if project.trim().is_empty() {
        return Err(ReportError::EmptyComponent("project"));
    }
    if branch.trim().is_empty() {
        return Err(ReportError::EmptyComponent("branch"));
    }
    if let Some(topic) = topic {
        if topic.trim().is_empty() {
            return Err(ReportError::EmptyComponent("topic"));
        }
    }

    let mut name = format!(
        "{}-{}-{}",
        date.format(TIMESTAMP_FORMAT),
        sanitize(project),
        sanitize(branch)
    );
    if let Some(topic) = topic {
        name.push('-');
        name.push_str(&sanitize(topic));
    }
    name.push_str(REPORT_EXTENSION);
    Ok(name)
}

fn sanitize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.to_lowercase().chars() {
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() {
            c
        } else {
            '-'
        };
        if c == '-' && out.ends_with('-') {
            continue;
        }
        out.push(c);
    }
    out
}

/// Parse the timestamp prefix of a report filename.
pub fn parse_report_timestamp(filename: &str) -> Option<DateTime<Utc>> {
    let prefix = filename.get(..TIMESTAMP_LEN)?;
    if filename.as_bytes().get(TIMESTAMP_LEN) != Some(&b'-') {
        return None;
    }
    NaiveDateTime::parse_from_str(prefix, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Metadata for one stored report.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportInfo {
    pub filename: String,
    pub modified_at: String,
}

/// Filesystem-backed report directory.
#[derive(Debug, Clone)]
pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a new report. Fails if a report with this name already exists.
    pub async fn save(&self, filename: &str, content: &str) -> Result<PathBuf, ReportError> {
        let filename = safe_filename(filename)?;
        let path = self.dir.join(filename);

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| ReportError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|source| match source.kind() {
                ErrorKind::AlreadyExists => ReportError::AlreadyExists(path.clone()),
                _ => ReportError::Io {
                    path: path.clone(),
                    source,
                },
            })?;

        let write = async {
            file.write_all(content.as_bytes()).await?;
            file.flush().await
        };
        write.await.map_err(|source| ReportError::Io {
            path: path.clone(),
            source,
        })?;

        Ok(path)
    }

    /// Most recently modified reports first, at most `limit` entries.
    /// A missing directory yields an empty list.
    pub async fn list(&self, limit: usize) -> Result<Vec<ReportInfo>, ReportError> {
        let mut entries = Vec::new();
        for filename in self.markdown_files().await? {
            let Ok(meta) = tokio::fs::metadata(self.dir.join(&filename)).await else {
                continue;
            };
            let Ok(modified) = meta.modified() else {
                continue;
            };
            entries.push((DateTime::<Utc>::from(modified), filename));
        }

        entries.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(entries
            .into_iter()
            .take(limit)
            .map(|(modified, filename)| ReportInfo {
                filename,
                modified_at: modified.to_rfc3339_opts(SecondsFormat::Millis, true),
            })
            .collect())
    }

    /// Read a report by name. Directory components are stripped.
    pub async fn read(&self, filename: &str) -> Result<String, ReportError> {
        let filename = safe_filename(filename)?;
        let path = self.dir.join(filename);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| ReportError::Io { path, source })
    }

    /// Report filenames ordered by their embedded timestamp, newest first.
    /// Names without a parseable timestamp sort last.
    pub async fn filenames_by_timestamp(&self) -> Result<Vec<String>, ReportError> {
        let mut files = self.markdown_files().await?;
        files.sort_by(|a, b| {
            match (parse_report_timestamp(a), parse_report_timestamp(b)) {
                (Some(da), Some(db)) => db.cmp(&da),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }
        });
        Ok(files)
    }

    async fn markdown_files(&self) -> Result<Vec<String>, ReportError> {
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(_) => return Ok(Vec::new()),
        };

        let mut files = Vec::new();
        loop {
            let entry = dir.next_entry().await.map_err(|source| ReportError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let Some(entry) = entry else { break };
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(REPORT_EXTENSION) {
                    files.push(name.to_string());
                }
            }
        }
        Ok(files)
    }
}

/// Reduce a caller-supplied name to its final component and require `.md`.
fn safe_filename(filename: &str) -> Result<&str, ReportError> {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    if base.is_empty() || base == ".." || base == "." {
        return Err(ReportError::InvalidFilename(filename.to_string()));
    }
    if !base.ends_with(REPORT_EXTENSION) {
        return Err(ReportError::InvalidFilename(format!(
            "{} (only .md files are allowed)",
            filename
        )));
    }
    Ok(base)
}

/// Start of the window a run should fetch changes from.
///
/// Uses the newest report's timestamp, but never looks back further than
/// `max_hours` before `now`.
pub async fn calculate_fetch_since(
    store: &ReportStore,
    max_hours: u64,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let max_lookback = i64::try_from(max_hours)
        .ok()
        .and_then(Duration::try_hours)
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    let newest = store
        .filenames_by_timestamp()
        .await
        .unwrap_or_default()
        .iter()
        .find_map(|f| parse_report_timestamp(f));

    match newest {
        Some(ts) if ts > max_lookback => ts,
        _ => max_lookback,
    }
}
