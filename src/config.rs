//! Configuration management for repo-sentinel.
//!
//! All configuration comes from environment variables (optionally seeded
//! from a `.env` file at startup). Values are read through a lookup
//! function so the parsing can be tested without touching the process
//! environment.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use crate::auth::Credentials;
use crate::llm::openai_compatible::DEFAULT_API_BASE;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable is not set")]
    Missing(&'static str),
    #[error("REPO_PROVIDER must be \"local\", \"github\", \"gerrit\", or \"ado\" (got \"{0}\")")]
    InvalidProvider(String),
    #[error("{var} must be an integer between 1 and {max} (got \"{value}\")")]
    InvalidNumber {
        var: &'static str,
        value: String,
        max: u64,
    },
    #[error("Failed to read CUSTOM_PROMPT_FILE: {}", path.display())]
    CustomPrompt {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Source-control backend selected by `REPO_PROVIDER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoProvider {
    Local,
    Github,
    Gerrit,
    Ado,
}

impl FromStr for RepoProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "github" => Ok(Self::Github),
            "gerrit" => Ok(Self::Gerrit),
            "ado" => Ok(Self::Ado),
            other => Err(ConfigError::InvalidProvider(other.to_string())),
        }
    }
}

impl fmt::Display for RepoProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Local => "local",
            Self::Github => "github",
            Self::Gerrit => "gerrit",
            Self::Ado => "ado",
        };
        f.write_str(s)
    }
}

/// Chat-completion endpoint settings.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

/// Settings resolved once at the start of a run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub llm: LlmSettings,
    pub provider: RepoProvider,
    pub check_interval_hours: u64,
    pub custom_prompt: Option<String>,
}

/// Identifiers for the repository being watched.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum RepoTarget {
    Local {
        #[serde(rename = "repoPath")]
        repo_path: PathBuf,
    },
    Github {
        owner: String,
        repo: String,
        token: Option<String>,
    },
    Gerrit {
        host: String,
        project: String,
    },
    Ado {
        organization: String,
        project: String,
        repository: String,
        token: Option<String>,
    },
}

/// The configuration surfaced to the model by `get_config`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RepoConfig {
    #[serde(flatten)]
    pub target: RepoTarget,
    pub branch: String,
    pub check_interval_hours: u64,
    pub report_dir: PathBuf,
    pub sub_paths: Vec<String>,
}

/// Reads configuration values by variable name.
pub trait EnvSource {
    fn var(&self, name: &str) -> Option<String>;

    /// A set, non-empty variable.
    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.var(name)
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing(name))
    }
}

/// The process environment.
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl<F> EnvSource for F
where
    F: Fn(&str) -> Option<String>,
{
    fn var(&self, name: &str) -> Option<String> {
        self(name)
    }
}

pub fn provider(env: &(impl EnvSource + ?Sized)) -> Result<RepoProvider, ConfigError> {
    env.var("REPO_PROVIDER").unwrap_or_default().parse()
}

/// One year.
pub const MAX_CHECK_INTERVAL_HOURS: u64 = 24 * 366;

pub fn check_interval_hours(env: &(impl EnvSource + ?Sized)) -> Result<u64, ConfigError> {
    let raw = env.required("CHECK_INTERVAL_HOURS")?;
    match raw.trim().parse::<u64>() {
        Ok(hours) if (1..=MAX_CHECK_INTERVAL_HOURS).contains(&hours) => Ok(hours),
        _ => Err(ConfigError::InvalidNumber {
            var: "CHECK_INTERVAL_HOURS",
            value: raw,
            max: MAX_CHECK_INTERVAL_HOURS,
        }),
    }
}

pub fn report_dir(env: &(impl EnvSource + ?Sized)) -> Result<PathBuf, ConfigError> {
    env.required("REPORT_DIR").map(PathBuf::from)
}

/// `SUB_PATH` split on commas; unset means the whole repository.
pub fn sub_paths(env: &(impl EnvSource + ?Sized)) -> Vec<String> {
    env.var("SUB_PATH")
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub fn custom_prompt(env: &(impl EnvSource + ?Sized)) -> Result<Option<String>, ConfigError> {
    let Some(path) = env.var("CUSTOM_PROMPT_FILE").filter(|p| !p.is_empty()) else {
        return Ok(None);
    };
    let path = PathBuf::from(path);
    std::fs::read_to_string(&path)
        .map(Some)
        .map_err(|source| ConfigError::CustomPrompt { path, source })
}

impl Settings {
    pub fn load(env: &(impl EnvSource + ?Sized)) -> Result<Self, ConfigError> {
        Ok(Self {
            llm: LlmSettings {
                api_key: env.required("OPENAI_API_KEY")?,
                base_url: env
                    .var("OPENAI_BASE_URL")
                    .filter(|v| !v.is_empty())
                    .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
                model: env.required("OPENAI_MODEL")?,
            },
            provider: provider(env)?,
            check_interval_hours: check_interval_hours(env)?,
            custom_prompt: custom_prompt(env)?,
        })
    }
}

impl RepoConfig {
    /// Resolve the full repository configuration, filling tokens from the
    /// credentials acquired for this run.
    pub fn load(
        env: &(impl EnvSource + ?Sized),
        credentials: &Credentials,
    ) -> Result<Self, ConfigError> {
        let target = match provider(env)? {
            RepoProvider::Local => RepoTarget::Local {
                repo_path: PathBuf::from(env.required("REPO_PATH")?),
            },
            RepoProvider::Github => RepoTarget::Github {
                owner: env.required("GITHUB_OWNER")?,
                repo: env.required("GITHUB_REPO")?,
                token: credentials.github_token.clone(),
            },
            RepoProvider::Gerrit => RepoTarget::Gerrit {
                host: env.required("GERRIT_HOST")?,
                project: env.required("GERRIT_PROJECT")?,
            },
            RepoProvider::Ado => RepoTarget::Ado {
                organization: env.required("ADO_ORGANIZATION")?,
                project: env.required("ADO_PROJECT")?,
                repository: env.required("ADO_REPOSITORY")?,
                token: credentials.ado_token.clone(),
            },
        };

        Ok(Self {
            target,
            branch: env.required("BRANCH")?,
            check_interval_hours: check_interval_hours(env)?,
            report_dir: report_dir(env)?,
            sub_paths: sub_paths(env),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    pub fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    fn base() -> Vec<(&'static str, &'static str)> {
        vec![
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_MODEL", "gpt-test"),
            ("BRANCH", "main"),
            ("CHECK_INTERVAL_HOURS", "24"),
            ("REPORT_DIR", "/tmp/reports"),
        ]
    }

    #[test]
    fn test_provider_parsing() {
        assert_eq!("ado".parse::<RepoProvider>().unwrap(), RepoProvider::Ado);
        assert!(matches!(
            "svn".parse::<RepoProvider>(),
            Err(ConfigError::InvalidProvider(p)) if p == "svn"
        ));
        assert!(provider(&env_of(&[])).is_err());
    }

    #[test]
    fn test_settings_defaults_base_url() {
        let mut vars = base();
        vars.push(("REPO_PROVIDER", "gerrit"));
        let settings = Settings::load(&env_of(&vars)).unwrap();
        assert_eq!(settings.llm.base_url, DEFAULT_API_BASE);
        assert_eq!(settings.llm.model, "gpt-test");
        assert_eq!(settings.provider, RepoProvider::Gerrit);
        assert_eq!(settings.check_interval_hours, 24);
        assert!(settings.custom_prompt.is_none());
    }

    #[test]
    fn test_missing_api_key() {
        let err = Settings::load(&env_of(&[("OPENAI_MODEL", "m")])).unwrap_err();
        assert_eq!(err.to_string(), "OPENAI_API_KEY environment variable is not set");
    }

    #[test]
    fn test_custom_prompt_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("prompt.md");
        std::fs::write(&file, "Focus on security.").unwrap();
        let path = file.to_str().unwrap().to_string();

        let env = move |name: &str| (name == "CUSTOM_PROMPT_FILE").then(|| path.clone());
        assert_eq!(custom_prompt(&env).unwrap().as_deref(), Some("Focus on security."));

        let missing = |name: &str| (name == "CUSTOM_PROMPT_FILE").then(|| "/no/such/file".to_string());
        assert!(matches!(custom_prompt(&missing), Err(ConfigError::CustomPrompt { .. })));
    }

    #[test]
    fn test_sub_paths_trimmed() {
        let env = env_of(&[("SUB_PATH", " src/a , docs,, ")]);
        assert_eq!(sub_paths(&env), vec!["src/a", "docs"]);
        assert!(sub_paths(&env_of(&[])).is_empty());
    }

    #[test]
    fn test_interval_must_be_positive_number() {
        assert!(check_interval_hours(&env_of(&[("CHECK_INTERVAL_HOURS", "0")])).is_err());
        assert!(check_interval_hours(&env_of(&[("CHECK_INTERVAL_HOURS", "abc")])).is_err());
        assert_eq!(check_interval_hours(&env_of(&[("CHECK_INTERVAL_HOURS", " 6 ")])).unwrap(), 6);
        assert_eq!(
            check_interval_hours(&env_of(&[("CHECK_INTERVAL_HOURS", "8784")])).unwrap(),
            MAX_CHECK_INTERVAL_HOURS
        );
        let err = check_interval_hours(&env_of(&[("CHECK_INTERVAL_HOURS", "10000000000")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { max: 8784, .. }));
        assert_eq!(
            err.to_string(),
            "CHECK_INTERVAL_HOURS must be an integer between 1 and 8784 (got \"10000000000\")"
        );
    }

    #[test]
    fn test_github_config_json_shape() {
        let mut vars = base();
        vars.extend([
            ("REPO_PROVIDER", "github"),
            ("GITHUB_OWNER", "octo"),
            ("GITHUB_REPO", "hello"),
            ("SUB_PATH", "src"),
        ]);
        let creds = Credentials {
            github_token: Some("gho_abc".into()),
            ado_token: None,
        };
        let config = RepoConfig::load(&env_of(&vars), &creds).unwrap();
        let json = serde_json::to_value(&config).unwrap();

        assert_eq!(json["provider"], "github");
        assert_eq!(json["owner"], "octo");
        assert_eq!(json["repo"], "hello");
        assert_eq!(json["token"], "gho_abc");
        assert_eq!(json["branch"], "main");
        assert_eq!(json["checkIntervalHours"], 24);
        assert_eq!(json["reportDir"], "/tmp/reports");
        assert_eq!(json["subPaths"][0], "src");
    }

    #[test]
    fn test_local_config_requires_repo_path() {
        let mut vars = base();
        vars.push(("REPO_PROVIDER", "local"));
        let err = RepoConfig::load(&env_of(&vars), &Credentials::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("REPO_PATH")));

        vars.push(("REPO_PATH", "/src/repo"));
        let json = serde_json::to_value(RepoConfig::load(&env_of(&vars), &Credentials::default()).unwrap()).unwrap();
        assert_eq!(json["provider"], "local");
        assert_eq!(json["repoPath"], "/src/repo");
    }
}
