use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use gamestop_content::channels::DiscordChannel;
use gamestop_content::config::{self, Config};
use gamestop_content::llm::{LlmBackend, LlmConfig, create_provider};
use gamestop_content::pipeline::monitor::remediation_hint;
use gamestop_content::pipeline::{Pipeline, RunReport};
use gamestop_content::publisher::TwitterPublisher;
use gamestop_content::sources::{BraveSearch, TwitterSearch};
use gamestop_content::state::StateFiles;
use gamestop_content::synthesis::Synthesizer;

/// Draft GameStop updates, review them in Discord, and post approved ones.
#[derive(Debug, Parser)]
#[command(name = "gamestop-content", version, about)]
struct Cli {
    /// Fetch and synthesize new stories before processing review commands.
    #[arg(long)]
    fetch: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_tracing(&config::log_dir_from_env());

    match run(&cli).await {
        Ok(report) => {
            info!(posted = report.posted, pending = report.pending, "Done");
            ExitCode::SUCCESS
        }
        Err(e) => {
            let text = format!("{e:#}");
            error!(error = %text, hint = remediation_hint(&text), "Run failed");
            ExitCode::FAILURE
        }
    }
}

/// Stdout plus `<log_dir>/latest.log`. The guard flushes the file writer on drop.
fn init_tracing(log_dir: &Path) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false);

    let (file_layer, guard) = match std::fs::create_dir_all(log_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::never(log_dir, "latest.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        Err(e) => {
            eprintln!("Warning: cannot create log dir {}: {e}", log_dir.display());
            (None, None)
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();
    guard
}

async fn run(cli: &Cli) -> anyhow::Result<RunReport> {
    let config = Config::from_env().context("Failed to load configuration")?;
    let pipeline = build_pipeline(&config)?;

    match pipeline.run(cli.fetch).await {
        Ok(report) => Ok(report),
        Err(e) => {
            pipeline.report_failure(&e.to_string()).await;
            Err(e).context("Pipeline run failed")
        }
    }
}

fn build_pipeline(config: &Config) -> anyhow::Result<Pipeline> {
    let llm = create_provider(&LlmConfig {
        backend: LlmBackend::OpenAi,
        api_key: config.openai_api_key.clone(),
        model: config.openai_model.clone(),
    })
    .context("Failed to create LLM provider")?;

    Ok(Pipeline::new(
        Arc::new(TwitterSearch::new(config.twitter.bearer_token.clone())),
        Arc::new(BraveSearch::new(config.brave_api_key.clone())),
        Synthesizer::new(llm),
        Arc::new(DiscordChannel::new(&config.discord)),
        Arc::new(TwitterPublisher::new(config.twitter.clone())),
        StateFiles::new(config.state_dir.clone()),
        config.discord.monitoring_channel_id.clone(),
    ))
}
