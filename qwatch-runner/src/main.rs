//! qwatch Runner
//!
//! Waits for a set of remote batch jobs and exits with a status the host
//! scheduler can act on.
//!
//! Configuration is read from the environment (see
//! [`qwatch_runner::RunnerConfig::from_env`]). Queries run over ssh when
//! `QWATCH_HOST` is set, otherwise through the local shell.
//!
//! Exit codes: `0` all jobs succeeded, `1` a job failed, `2` a poller timed out.

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use qwatch_client::channel_for;
use qwatch_runner::{RunnerConfig, WatchSummary, watch_all};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "qwatch_runner=info,qwatch_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting qwatch runner");

    // Load configuration
    let config = RunnerConfig::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!(
        "Loaded configuration: {} job(s), host={}, poll interval {:?}, timeout {:?}",
        config.handles.len(),
        config
            .channel
            .host
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "local".to_string()),
        config.poller.poll_interval,
        config.poller.timeout
    );

    let channel = channel_for(&config.channel);

    let outcomes = watch_all(config.handles.clone(), channel, config.poller.clone()).await?;
    let summary = WatchSummary::from_outcomes(&outcomes);

    info!(
        "Finished: {} succeeded, {} failed, {} timed out",
        summary.succeeded, summary.failed, summary.timed_out
    );

    std::process::exit(summary.exit_code());
}
