//! Credential acquisition for GitHub and Azure DevOps.
//!
//! Tokens are resolved once per run and handed to the tools that need them
//! through a shared `Credentials` value.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::{EnvSource, RepoProvider};

/// Public OAuth app used for the device flow.
pub const GITHUB_CLIENT_ID: &str = "01ab8ac9400c4e429b23";
const GITHUB_DEVICE_CODE_URL: &str = "https://github.com/login/device/code";
const GITHUB_ACCESS_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const GITHUB_SCOPE: &str = "repo";

/// Azure DevOps resource id for `az account get-access-token`.
pub const ADO_RESOURCE_ID: &str = "499b84ac-1321-427f-aa17-267ca6975798";

#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub github_token: Option<String>,
    pub ado_token: Option<String>,
}

/// Resolve whatever token the selected provider needs.
pub async fn acquire_credentials(
    provider: RepoProvider,
    env: &(impl EnvSource + ?Sized),
) -> Result<Credentials> {
    let mut credentials = Credentials::default();
    match provider {
        RepoProvider::Github => {
            let token = match env.var("GITHUB_TOKEN").filter(|t| !t.is_empty()) {
                Some(token) => token,
                None => DeviceFlow::github()
                    .authenticate()
                    .await
                    .context("GitHub authentication failed")?,
            };
            credentials.github_token = Some(token);
        }
        RepoProvider::Ado => {
            let token = match env.var("ADO_TOKEN").filter(|t| !t.is_empty()) {
                Some(token) => token,
                None => az_cli_token()
                    .await
                    .context("Azure DevOps authentication failed")?,
            };
            credentials.ado_token = Some(token);
        }
        RepoProvider::Local | RepoProvider::Gerrit => {}
    }
    Ok(credentials)
}

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    user_code: String,
    verification_uri: String,
    expires_in: u64,
    interval: u64,
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Outcome of a single poll of the token endpoint.
#[derive(Debug, PartialEq)]
enum PollOutcome {
    Token(String),
    Pending,
    SlowDown,
}

fn interpret_poll(response: AccessTokenResponse) -> Result<PollOutcome> {
    if let Some(token) = response.access_token {
        return Ok(PollOutcome::Token(token));
    }
    match response.error.as_deref() {
        Some("authorization_pending") => Ok(PollOutcome::Pending),
        Some("slow_down") => Ok(PollOutcome::SlowDown),
        Some("expired_token") => bail!("Device code expired. Please try again."),
        Some("access_denied") => bail!("Authorization was denied by the user."),
        Some(other) => Err(anyhow!(
            "OAuth error: {}",
            response.error_description.as_deref().unwrap_or(other)
        )),
        None => bail!("Token endpoint returned neither a token nor an error"),
    }
}

/// OAuth device authorization flow.
pub struct DeviceFlow {
    client: reqwest::Client,
    client_id: String,
    device_code_url: String,
    access_token_url: String,
}

impl DeviceFlow {
    pub fn github() -> Self {
        Self::with_endpoints(GITHUB_CLIENT_ID, GITHUB_DEVICE_CODE_URL, GITHUB_ACCESS_TOKEN_URL)
    }

    pub fn with_endpoints(client_id: &str, device_code_url: &str, access_token_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id: client_id.to_string(),
            device_code_url: device_code_url.to_string(),
            access_token_url: access_token_url.to_string(),
        }
    }

    pub async fn authenticate(&self) -> Result<String> {
        let code = self.request_device_code().await?;
        info!(
            url = %code.verification_uri,
            code = %code.user_code,
            "GitHub authorization required: open the URL and enter the code"
        );
        self.poll(&code).await
    }

    async fn request_device_code(&self) -> Result<DeviceCodeResponse> {
        let response = self
            .client
            .post(&self.device_code_url)
            .header("Accept", "application/json")
            .form(&[("client_id", self.client_id.as_str()), ("scope", GITHUB_SCOPE)])
            .send()
            .await
            .context("Failed to request device code")?;

        if !response.status().is_success() {
            bail!("Failed to request device code: {}", response.status());
        }
        response.json().await.context("Failed to parse device code response")
    }

    async fn poll(&self, code: &DeviceCodeResponse) -> Result<String> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(code.expires_in);
        // Poll slightly slower than the server minimum.
        let mut interval = Duration::from_secs(code.interval + 1);

        loop {
            tokio::time::sleep(interval).await;
            if tokio::time::Instant::now() >= deadline {
                bail!("Authentication timed out. Please try again.");
            }

            let response: AccessTokenResponse = self
                .client
                .post(&self.access_token_url)
                .header("Accept", "application/json")
                .form(&[
                    ("client_id", self.client_id.as_str()),
                    ("device_code", code.device_code.as_str()),
                    ("grant_type", "urn:ietf:params:oauth:grant-type:device_code"),
                ])
                .send()
                .await
                .context("Failed to poll for access token")?
                .json()
                .await
                .context("Failed to parse access token response")?;

            match interpret_poll(response)? {
                PollOutcome::Token(token) => {
                    info!("GitHub authentication successful");
                    return Ok(token);
                }
                PollOutcome::Pending => {}
                PollOutcome::SlowDown => interval += Duration::from_secs(5),
            }
        }
    }
}

async fn az_cli_token() -> Result<String> {
    let output = Command::new("az")
        .args([
            "account",
            "get-access-token",
            "--resource",
            ADO_RESOURCE_ID,
            "--query",
            "accessToken",
            "-o",
            "tsv",
        ])
        .output()
        .await
        .context("Failed to run Azure CLI. Install it or set ADO_TOKEN")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(stderr = %stderr.trim(), "az account get-access-token failed");
        bail!("Azure CLI could not provide a token. Run `az login` or set ADO_TOKEN");
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        bail!("Azure CLI returned an empty token");
    }
    Ok(token)
}
