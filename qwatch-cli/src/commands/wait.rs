//! Wait command
//!
//! Blocks until every given job has resolved or its poller has timed out.

use anyhow::{Context, Result};
use clap::Args;
use qwatch_core::domain::job::JobHandle;
use qwatch_runner::config::{DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT};
use qwatch_runner::{PollerConfig, WatchSummary, watch_all};
use std::time::Duration;

use super::QueryArgs;
use crate::config::Config;
use crate::format::{print_outcome, print_summary};

#[derive(Args, Debug)]
pub struct WaitArgs {
    /// Job handles (e.g. 12345.gadi-pbs)
    #[arg(required = true)]
    pub handles: Vec<String>,

    /// Treat each handle as raw submission output (may be base64 wrapped)
    #[arg(long)]
    pub from_submission_output: bool,

    /// Seconds between polls
    #[arg(long, env = "QWATCH_POLL_INTERVAL", default_value_t = DEFAULT_POLL_INTERVAL.as_secs())]
    pub interval: u64,

    /// Seconds to wait in total before giving up
    #[arg(long, env = "QWATCH_TIMEOUT", default_value_t = DEFAULT_TIMEOUT.as_secs())]
    pub timeout: u64,

    #[command(flatten)]
    pub query: QueryArgs,

    /// Print outcomes as JSON
    #[arg(long)]
    pub json: bool,
}

/// Exit code: `0` all succeeded, `1` any failed, `2` any timed out
pub async fn handle_wait(args: WaitArgs, config: &Config) -> Result<i32> {
    let handles = parse_handles(&args.handles, args.from_submission_output)?;

    let poller_config = PollerConfig::new(
        Duration::from_secs(args.interval),
        Duration::from_secs(args.timeout),
    )
    .with_encoding(args.query.encoding)
    .with_commands(args.query.commands());
    poller_config.validate()?;

    let outcomes = watch_all(handles, config.channel(), poller_config).await?;
    let summary = WatchSummary::from_outcomes(&outcomes);

    if args.json {
        let body = serde_json::json!({
            "outcomes": outcomes,
            "summary": summary,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        for outcome in &outcomes {
            print_outcome(outcome);
        }
        print_summary(&summary);
    }

    Ok(summary.exit_code())
}

fn parse_handles(raw: &[String], from_submission_output: bool) -> Result<Vec<JobHandle>> {
    raw.iter()
        .map(|value| {
            let handle = if from_submission_output {
                JobHandle::from_submission_output(value.as_bytes())
            } else {
                value.parse()
            };
            handle.with_context(|| format!("Invalid job handle '{}'", value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_handles() {
        let handles = parse_handles(&["12345.gadi-pbs".to_string()], false).unwrap();
        assert_eq!(handles[0].as_str(), "12345.gadi-pbs");
    }

    #[test]
    fn test_parse_submission_output() {
        // base64 of "12345.gadi-pbs\n"
        let handles = parse_handles(&["MTIzNDUuZ2FkaS1wYnMK".to_string()], true).unwrap();
        assert_eq!(handles[0].as_str(), "12345.gadi-pbs");
    }

    #[test]
    fn test_parse_rejects_bad_handle() {
        assert!(parse_handles(&["12345; rm -rf".to_string()], false).is_err());
    }
}
