//! Status command
//!
//! Runs a single poll attempt, the way a host scheduler drives a sensor one
//! poke at a time. The exit code tells the host whether to poke again.

use anyhow::Result;
use clap::Args;
use colored::*;
use qwatch_core::domain::job::JobHandle;
use qwatch_core::domain::poll::PollResult;
use qwatch_runner::{JobPoller, PollerConfig};

use super::QueryArgs;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Job handle (e.g. 12345.gadi-pbs)
    pub handle: JobHandle,

    #[command(flatten)]
    pub query: QueryArgs,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn handle_status(args: StatusArgs, config: &Config) -> Result<i32> {
    let poller_config = PollerConfig::default()
        .with_encoding(args.query.encoding)
        .with_commands(args.query.commands());
    poller_config.validate()?;

    let channel = config.channel();
    let mut poller = JobPoller::new(args.handle.clone(), poller_config);
    let result = poller.poke(channel.as_ref()).await;

    if args.json {
        let body = serde_json::json!({
            "handle": args.handle,
            "result": result,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        let label = match &result {
            PollResult::Running => "RUNNING".blue(),
            PollResult::Succeeded => "SUCCEEDED".green(),
            PollResult::Failed(_) => "FAILED".red(),
            PollResult::Unknown(_) => "UNKNOWN".yellow(),
        };
        println!("{} {}", args.handle.to_string().bold(), label);
        if let PollResult::Failed(reason) = &result {
            println!("  {}", reason);
        }
        if let PollResult::Unknown(detail) = &result {
            println!("  {}", detail.dimmed());
        }
    }

    Ok(exit_code(&result))
}

/// `0` succeeded, `1` failed, `3` still running, `4` status unknown
fn exit_code(result: &PollResult) -> i32 {
    match result {
        PollResult::Succeeded => 0,
        PollResult::Failed(_) => 1,
        PollResult::Running => 3,
        PollResult::Unknown(_) => 4,
    }
}
