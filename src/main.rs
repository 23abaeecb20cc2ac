mod agent;
mod analyzer;
mod auth;
mod binary;
mod cli;
mod config;
mod llm;
mod prompts;
mod providers;
mod report;
mod scheduler;
mod session;
mod tools;
mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use agent::{run_agent, AgentOptions, TracingObserver};
use analyzer::AnalyzeCommitTool;
use cli::Cli;
use config::{ProcessEnv, Settings};
use llm::openai_compatible::OpenAiCompatibleProvider;
use llm::LlmProvider;
use report::{calculate_fetch_since, ReportStore};
use tools::config::GetConfigTool;
use tools::report::{ListReportsTool, ReadReportTool, SaveReportTool};
use tools::ToolRegistry;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(false).init();
}

fn load_env_file(cli: &Cli) -> Result<()> {
    match &cli.env_file {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("Failed to load env file: {}", path.display()))?;
            info!(path = %path.display(), "loaded environment file");
        }
        None => match dotenvy::dotenv() {
            Ok(path) => info!(path = %path.display(), "loaded environment file"),
            Err(e) if e.not_found() => {}
            Err(e) => warn!(error = %e, "ignoring unreadable .env file"),
        },
    }
    Ok(())
}

/// One full check: resolve settings and credentials, build the tool set for
/// the configured provider and let the agent write a report.
async fn run_cycle() -> Result<()> {
    let now = Utc::now();
    let settings = Settings::load(&ProcessEnv)?;
    info!(provider = %settings.provider, model = %settings.llm.model, "starting run");

    let credentials = Arc::new(auth::acquire_credentials(settings.provider, &ProcessEnv).await?);
    let strategy = providers::strategy_for(settings.provider);
    let store = Arc::new(ReportStore::new(config::report_dir(&ProcessEnv)?));

    let since = calculate_fetch_since(&store, settings.check_interval_hours, now).await;
    info!(since = %since.to_rfc3339(), "fetching changes");

    let llm: Arc<dyn LlmProvider> = Arc::new(OpenAiCompatibleProvider::new(
        settings.llm.api_key.clone(),
        Some(settings.llm.base_url.clone()),
    ));

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(GetConfigTool::new(credentials.clone())));
    registry.register(Arc::new(SaveReportTool::new(store.clone())));
    registry.register(Arc::new(ListReportsTool::new(store.clone())));
    registry.register(Arc::new(ReadReportTool::new(store)));
    registry.register_all(strategy.tools(credentials));
    registry.register(Arc::new(AnalyzeCommitTool::new(
        llm.clone(),
        settings.llm.model.clone(),
        strategy.clone(),
    )));
    info!(tools = registry.len(), "tools registered");

    let options = AgentOptions {
        llm,
        model: settings.llm.model,
        system_prompt: prompts::system_prompt(strategy.as_ref(), settings.custom_prompt.as_deref()),
        registry,
        observer: Some(Arc::new(TracingObserver::main())),
    };
    run_agent(options, &prompts::user_prompt(since, now)).await?;

    info!("run complete");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();
    load_env_file(&cli)?;

    if cli.once {
        return run_cycle().await;
    }

    let hours = config::check_interval_hours(&ProcessEnv)?;
    info!(hours, "scheduling runs");
    let period = hours
        .checked_mul(3600)
        .map(Duration::from_secs)
        .context("CHECK_INTERVAL_HOURS is too large")?;
    scheduler::run_every(period, run_cycle).await;
    Ok(())
}
