//! qwatch CLI
//!
//! Command-line interface for waiting on remote batch-queue jobs.

mod commands;
mod config;
mod format;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use qwatch_client::{ChannelSettings, SshTarget};

#[derive(Parser)]
#[command(name = "qwatch")]
#[command(about = "Wait for remote batch-queue jobs to finish", long_about = None)]
struct Cli {
    /// Remote host running the batch system ([user@]host[:port]); local shell when unset
    #[arg(long, env = "QWATCH_HOST")]
    host: Option<SshTarget>,

    /// Private key used for the ssh connection
    #[arg(long, env = "QWATCH_IDENTITY_FILE")]
    identity_file: Option<PathBuf>,

    /// Upper bound on a single remote query, in seconds
    #[arg(long, env = "QWATCH_QUERY_TIMEOUT", default_value_t = 120)]
    query_timeout: u64,

    /// Upper bound on establishing the ssh connection, in seconds
    #[arg(long, env = "QWATCH_CONNECT_TIMEOUT", default_value_t = 30)]
    connect_timeout: u64,

    /// Extra ssh option in `key=value` form (repeatable)
    #[arg(long = "ssh-option", env = "QWATCH_SSH_OPTIONS", value_delimiter = ',')]
    ssh_options: Vec<String>,

    /// Log poll attempts and state changes
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "qwatch_cli=info,qwatch_runner=info,qwatch_client=info"
    } else {
        "qwatch_cli=warn,qwatch_runner=warn,qwatch_client=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config {
        channel: ChannelSettings {
            host: cli.host,
            identity_file: cli.identity_file,
            connect_timeout: Duration::from_secs(cli.connect_timeout),
            query_timeout: Duration::from_secs(cli.query_timeout),
            ssh_options: cli.ssh_options,
        },
    };

    let code = handle_command(cli.command, &config).await?;
    if code != 0 {
        std::process::exit(code);
    }

    Ok(())
}
